use std::sync::Arc;

use ash::vk;

use super::bundle::DeviceBundle;
use super::keys;
use super::logical::LogicalDevice;
use crate::pipeline::{ArtifactStore, BuildError, BuildStep, ExternalContext};

/// Single-subpass render pass writing one color attachment that is presented
/// afterwards.
pub struct RenderPass {
    device: Arc<LogicalDevice>,
    handle: vk::RenderPass,
}

impl RenderPass {
    pub fn new(device: Arc<LogicalDevice>, color_format: vk::Format) -> Result<Self, BuildError> {
        let attachments = [vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let handle = unsafe { device.handle().create_render_pass(&create_info, None) }
            .external("create render pass")?;

        Ok(Self { device, handle })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_render_pass(self.handle, None) };
    }
}

/// Creates the presentation render pass in the swapchain's format.
///
/// Reads: `DEVICE`, `SWAPCHAIN_FORMAT`, `RESULT`.
#[derive(Debug, Default)]
pub struct CreateRenderPass;

impl BuildStep for CreateRenderPass {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let device = store.fetch::<Arc<LogicalDevice>>(keys::DEVICE)?.clone();
        let format = *store.fetch::<vk::Format>(keys::SWAPCHAIN_FORMAT)?;
        let bundle = store.fetch_mut::<DeviceBundle>(keys::RESULT)?;

        bundle.render_pass = Some(RenderPass::new(device, format)?);
        log::info!("render pass created for {format:?}");
        Ok(())
    }
}
