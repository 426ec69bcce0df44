//! Vulkan device bootstrap.
//!
//! This module is responsible for:
//! - creating the Vulkan instance and the window surface
//! - selecting a physical device and resolving its queue families
//! - creating the logical device, swapchain and presentation render pass
//!
//! Each of those is a [`BuildStep`](crate::pipeline::BuildStep); they talk to
//! each other only through the artifact keys in [`keys`].

pub mod keys;

mod bundle;
mod instance;
mod logical;
mod physical;
mod queue;
mod render_pass;
mod surface;
mod swapchain;

use std::ffi::CStr;
use std::sync::Arc;

use raw_window_handle::HasDisplayHandle;
use winit::window::Window;

use crate::pipeline::{BuildError, ExternalContext, Pipeline};

pub use bundle::DeviceBundle;
pub use instance::{CreateInstance, InstanceConfig, VulkanInstance};
pub use logical::{CreateDevice, LogicalDevice};
pub use physical::{DEVICE_ENV, DevicePreference, PhysicalDeviceInfo, SelectPhysicalDevice};
pub use queue::{
    DEFAULT_QUEUE_PRIORITY, QueueFamily, QueueFamilyIndices, QueueRequest, SelectQueues,
    first_compute_family, first_family_with, queue_requests, resolve_graphics_present,
};
pub use render_pass::{CreateRenderPass, RenderPass};
pub use surface::{CreateSurface, Surface};
pub use swapchain::{
    CreateSwapchain, ImageSharing, Swapchain, SwapchainConfig, choose_composite_alpha,
    choose_extent, choose_present_mode, choose_surface_format, choose_transform,
};

/// Configuration for the standard bootstrap sequence.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub instance: InstanceConfig,
    pub device: DevicePreference,

    /// Device extensions in addition to `VK_KHR_swapchain`, which is always enabled.
    pub device_extensions: Vec<&'static CStr>,

    pub swapchain: SwapchainConfig,
}

/// Assembles the standard bootstrap pipeline for `window`:
/// instance → surface → physical device → queues → device → swapchain → render pass.
///
/// The pipeline is seeded with an empty [`DeviceBundle`] under [`keys::RESULT`].
pub fn standard_pipeline(window: Arc<Window>, config: BootstrapConfig) -> Result<Pipeline, BuildError> {
    let display = window
        .display_handle()
        .external("obtain display handle")?
        .as_raw();

    Ok(Pipeline::new()
        .with_artifact(keys::RESULT, DeviceBundle::new())
        .with_step(CreateInstance::new(config.instance, display))
        .with_step(CreateSurface::new(window))
        .with_step(SelectPhysicalDevice::new(config.device))
        .with_step(SelectQueues)
        .with_step(CreateDevice::new(config.device_extensions))
        .with_step(CreateSwapchain::new(config.swapchain))
        .with_step(CreateRenderPass))
}
