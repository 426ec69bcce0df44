use std::sync::Arc;

use ash::vk;

use super::bundle::DeviceBundle;
use super::keys;
use super::logical::LogicalDevice;
use super::queue::QueueFamilyIndices;
use super::surface::Surface;
use crate::pipeline::{ArtifactStore, BuildError, BuildStep, ExternalContext};

/// Swapchain creation parameters.
#[derive(Debug, Clone)]
pub struct SwapchainConfig {
    /// Requested present mode.
    ///
    /// FIFO is the only mode every implementation supports; other modes fall
    /// back to FIFO when the surface does not offer them.
    pub present_mode: vk::PresentModeKHR,

    /// Usage flags for the swapchain images.
    pub image_usage: vk::ImageUsageFlags,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            present_mode: vk::PresentModeKHR::FIFO,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        }
    }
}

/// First reported format; a lone `UNDEFINED` entry means any format is
/// acceptable, in which case BGRA8 is used.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, BuildError> {
    let first = formats
        .first()
        .ok_or_else(|| BuildError::unsupported("surface reports no formats"))?;

    if first.format == vk::Format::UNDEFINED {
        return Ok(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        });
    }
    Ok(*first)
}

/// Uses the surface's current extent when it is defined; otherwise clamps the
/// window's drawable size into the supported range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, drawable: (u32, u32)) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let (width, height) = drawable;
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

pub fn choose_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

/// Pre-multiplied, then post-multiplied, then inherit, then opaque.
pub fn choose_composite_alpha(caps: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&mode| caps.supported_composite_alpha.contains(mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    requested: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&requested) {
        requested
    } else {
        if requested != vk::PresentModeKHR::FIFO {
            log::warn!("present mode {requested:?} unsupported; falling back to FIFO");
        }
        vk::PresentModeKHR::FIFO
    }
}

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageSharing {
    pub mode: vk::SharingMode,
    pub family_indices: Vec<u32>,
}

impl ImageSharing {
    /// Exclusive when one family does both jobs. Split families use concurrent
    /// sharing so images need no explicit ownership transfer.
    pub fn for_queues(indices: QueueFamilyIndices) -> Self {
        if indices.is_shared() {
            Self {
                mode: vk::SharingMode::EXCLUSIVE,
                family_indices: Vec::new(),
            }
        } else {
            Self {
                mode: vk::SharingMode::CONCURRENT,
                family_indices: indices.distinct(),
            }
        }
    }
}

/// Swapchain, its images, and one color view per image.
pub struct Swapchain {
    device: Arc<LogicalDevice>,
    surface: Arc<Surface>,
    swapchain_fn: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

impl Swapchain {
    pub fn new(
        device: Arc<LogicalDevice>,
        surface: Arc<Surface>,
        config: &SwapchainConfig,
    ) -> Result<Self, BuildError> {
        let physical = device.physical();
        let caps = surface.capabilities(physical)?;
        let format = choose_surface_format(&surface.formats(physical)?)?;
        let present_mode = choose_present_mode(&surface.present_modes(physical)?, config.present_mode);
        let extent = choose_extent(&caps, surface.drawable_size());
        let sharing = ImageSharing::for_queues(device.queue_indices());

        log::info!(
            "swapchain: {:?}/{:?}, {}x{}, {:?}, {} image(s) min, sharing {:?}",
            format.format,
            format.color_space,
            extent.width,
            extent.height,
            present_mode,
            caps.min_image_count,
            sharing.mode
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(caps.min_image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(config.image_usage)
            .image_sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.family_indices)
            .pre_transform(choose_transform(&caps))
            .composite_alpha(choose_composite_alpha(&caps))
            .present_mode(present_mode)
            .clipped(true);

        let swapchain_fn =
            ash::khr::swapchain::Device::new(device.instance().handle(), device.handle());
        let handle = unsafe { swapchain_fn.create_swapchain(&create_info, None) }
            .external("create swapchain")?;

        // From here on, Drop cleans up whatever has been created.
        let mut swapchain = Self {
            device,
            surface,
            swapchain_fn,
            handle,
            format,
            extent,
            images: Vec::new(),
            views: Vec::new(),
        };

        swapchain.images = unsafe { swapchain.swapchain_fn.get_swapchain_images(handle) }
            .external("get swapchain images")?;

        for image in swapchain.images.clone() {
            let view = swapchain.create_view(image)?;
            swapchain.views.push(view);
        }

        Ok(swapchain)
    }

    fn create_view(&self, image: vk::Image) -> Result<vk::ImageView, BuildError> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format.format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device.handle().create_image_view(&create_info, None) }
            .external("create swapchain image view")
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.format.color_space
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        log::debug!("destroying swapchain ({} views)", self.views.len());
        unsafe {
            for &view in &self.views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.swapchain_fn.destroy_swapchain(self.handle, None);
        }
    }
}

/// Creates the swapchain and its image views.
///
/// Reads: `SURFACE`, `DEVICE`, `RESULT`.
/// Publishes: `SWAPCHAIN_FORMAT`; stores the swapchain in the bundle.
#[derive(Debug, Default)]
pub struct CreateSwapchain {
    config: SwapchainConfig,
}

impl CreateSwapchain {
    pub fn new(config: SwapchainConfig) -> Self {
        Self { config }
    }
}

impl BuildStep for CreateSwapchain {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let surface = store.fetch::<Arc<Surface>>(keys::SURFACE)?.clone();
        let device = store.fetch::<Arc<LogicalDevice>>(keys::DEVICE)?.clone();
        store.fetch::<DeviceBundle>(keys::RESULT)?;

        let swapchain = Swapchain::new(device, surface, &self.config)?;
        let format = swapchain.format();
        log::info!("swapchain created with {} image(s)", swapchain.images().len());

        store.fetch_mut::<DeviceBundle>(keys::RESULT)?.swapchain = Some(swapchain);
        store.push(keys::SWAPCHAIN_FORMAT, format);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 64,
                height: 64,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY
                | vk::SurfaceTransformFlagsKHR::ROTATE_90,
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        }
    }

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn format_takes_first_reported() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap().format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn undefined_format_means_bgra8() {
        let formats = [surface_format(vk::Format::UNDEFINED)];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn no_formats_is_unsupported() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn defined_extent_wins_over_window_size() {
        let e = choose_extent(&caps(), (1920, 1080));
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn undefined_extent_clamps_window_size() {
        let mut c = caps();
        c.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };

        let e = choose_extent(&c, (8000, 32));
        assert_eq!((e.width, e.height), (4096, 64));

        let e = choose_extent(&c, (1024, 768));
        assert_eq!((e.width, e.height), (1024, 768));
    }

    #[test]
    fn transform_prefers_identity() {
        assert_eq!(choose_transform(&caps()), vk::SurfaceTransformFlagsKHR::IDENTITY);

        let mut c = caps();
        c.supported_transforms = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        assert_eq!(choose_transform(&c), vk::SurfaceTransformFlagsKHR::ROTATE_90);
    }

    #[test]
    fn composite_alpha_preference_order() {
        let mut c = caps();
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::OPAQUE);

        c.supported_composite_alpha =
            vk::CompositeAlphaFlagsKHR::OPAQUE | vk::CompositeAlphaFlagsKHR::INHERIT;
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::INHERIT);

        c.supported_composite_alpha |= vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED;
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED);

        c.supported_composite_alpha |= vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED;
        assert_eq!(choose_composite_alpha(&c), vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&available, vk::PresentModeKHR::IMMEDIATE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn sharing_follows_queue_split() {
        let shared = ImageSharing::for_queues(QueueFamilyIndices::shared(0));
        assert_eq!(shared.mode, vk::SharingMode::EXCLUSIVE);
        assert!(shared.family_indices.is_empty());

        let split = ImageSharing::for_queues(QueueFamilyIndices::split(0, 2));
        assert_eq!(split.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(split.family_indices, [0, 2]);
    }
}
