use std::fmt;
use std::sync::Arc;

use winit::window::Window;

use super::logical::LogicalDevice;
use super::render_pass::RenderPass;
use super::surface::Surface;
use super::swapchain::Swapchain;

/// Aggregate result of a bootstrap run.
///
/// The caller seeds an empty bundle under `keys::RESULT`; steps fill in their
/// part. After a successful run the caller takes it out of the store and owns
/// every object in it. Dropping the bundle releases them in dependency order.
#[derive(Default)]
pub struct DeviceBundle {
    pub render_pass: Option<RenderPass>,
    pub swapchain: Option<Swapchain>,
    pub device: Option<Arc<LogicalDevice>>,
    pub surface: Option<Arc<Surface>>,
    pub window: Option<Arc<Window>>,
}

impl DeviceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once every stage of the standard pipeline has contributed.
    pub fn is_complete(&self) -> bool {
        self.window.is_some()
            && self.surface.is_some()
            && self.device.is_some()
            && self.swapchain.is_some()
            && self.render_pass.is_some()
    }
}

impl fmt::Debug for DeviceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBundle")
            .field("window", &self.window.as_ref().map(|w| w.id()))
            .field("surface", &self.surface.is_some())
            .field("device", &self.device.is_some())
            .field(
                "swapchain",
                &self.swapchain.as_ref().map(|s| (s.format(), s.extent())),
            )
            .field("render_pass", &self.render_pass.as_ref().map(|r| r.handle()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_is_incomplete() {
        let bundle = DeviceBundle::new();
        assert!(!bundle.is_complete());
        assert_eq!(
            format!("{bundle:?}"),
            "DeviceBundle { window: None, surface: false, device: false, swapchain: None, render_pass: None }"
        );
    }
}
