use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use super::bundle::DeviceBundle;
use super::instance::VulkanInstance;
use super::keys;
use crate::pipeline::{ArtifactStore, BuildError, BuildStep, ExternalContext};

/// Presentation surface bound to a window.
///
/// Holds the window and the instance so neither can go away while the
/// surface is alive.
pub struct Surface {
    instance: Arc<VulkanInstance>,
    window: Arc<Window>,
    handle: vk::SurfaceKHR,
}

impl Surface {
    pub fn new(instance: Arc<VulkanInstance>, window: Arc<Window>) -> Result<Self, BuildError> {
        let display = window
            .display_handle()
            .external("obtain display handle")?
            .as_raw();
        let raw_window = window
            .window_handle()
            .external("obtain window handle")?
            .as_raw();

        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display,
                raw_window,
                None,
            )
        }
        .external("create window surface")?;

        Ok(Self {
            instance,
            window,
            handle,
        })
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// Drawable size of the window in physical pixels.
    pub fn drawable_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Whether queue family `family` of `physical` can present to this surface.
    pub fn supports_present(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
    ) -> Result<bool, BuildError> {
        unsafe {
            self.instance
                .surface_fn()
                .get_physical_device_surface_support(physical, family, self.handle)
        }
        .external("query surface present support")
    }

    pub fn capabilities(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, BuildError> {
        unsafe {
            self.instance
                .surface_fn()
                .get_physical_device_surface_capabilities(physical, self.handle)
        }
        .external("query surface capabilities")
    }

    pub fn formats(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, BuildError> {
        unsafe {
            self.instance
                .surface_fn()
                .get_physical_device_surface_formats(physical, self.handle)
        }
        .external("query surface formats")
    }

    pub fn present_modes(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, BuildError> {
        unsafe {
            self.instance
                .surface_fn()
                .get_physical_device_surface_present_modes(physical, self.handle)
        }
        .external("query surface present modes")
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("destroying window surface");
        unsafe { self.instance.surface_fn().destroy_surface(self.handle, None) };
    }
}

/// Creates the presentation surface for a window.
///
/// Reads: `INSTANCE`, `RESULT`.
/// Publishes: `SURFACE`; records the window and surface in the bundle.
pub struct CreateSurface {
    window: Arc<Window>,
}

impl CreateSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl BuildStep for CreateSurface {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let instance = store.fetch::<Arc<VulkanInstance>>(keys::INSTANCE)?.clone();
        store.fetch::<DeviceBundle>(keys::RESULT)?;

        let surface = Arc::new(Surface::new(instance, self.window.clone())?);
        let (width, height) = surface.drawable_size();
        log::info!("surface created for {width}x{height} window");

        let bundle = store.fetch_mut::<DeviceBundle>(keys::RESULT)?;
        bundle.window = Some(self.window.clone());
        bundle.surface = Some(surface.clone());
        store.push(keys::SURFACE, surface);
        Ok(())
    }
}
