use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;

use super::bundle::DeviceBundle;
use super::instance::VulkanInstance;
use super::keys;
use super::physical::PhysicalDeviceInfo;
use super::queue::{QueueFamilyIndices, QueueRequest};
use crate::pipeline::{ArtifactStore, BuildError, BuildStep, ExternalContext};

/// Logical device plus the graphics and present queues retrieved from it.
pub struct LogicalDevice {
    instance: Arc<VulkanInstance>,
    device: ash::Device,
    physical: vk::PhysicalDevice,
    indices: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl LogicalDevice {
    pub fn new(
        instance: Arc<VulkanInstance>,
        physical: &PhysicalDeviceInfo,
        requests: &[QueueRequest],
        indices: QueueFamilyIndices,
        extensions: &[&CStr],
    ) -> Result<Self, BuildError> {
        let queue_infos: Vec<_> = requests.iter().map(QueueRequest::to_vk).collect();
        let extension_names: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical.handle, &create_info, None)
        }
        .external("create logical device")?;

        let graphics_queue = unsafe { device.get_device_queue(indices.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(indices.present, 0) };

        Ok(Self {
            instance,
            device,
            physical: physical.handle,
            indices,
            graphics_queue,
            present_queue,
        })
    }

    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &Arc<VulkanInstance> {
        &self.instance
    }

    pub fn physical(&self) -> vk::PhysicalDevice {
        self.physical
    }

    pub fn queue_indices(&self) -> QueueFamilyIndices {
        self.indices
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        log::debug!("destroying logical device");
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("device_wait_idle before destruction failed: {e}");
            }
            self.device.destroy_device(None);
        }
    }
}

/// Device extensions with the swapchain extension always present, in order,
/// without duplicates.
fn device_extensions(requested: &[&'static CStr]) -> Vec<&'static CStr> {
    let mut names = vec![ash::khr::swapchain::NAME];
    for &name in requested {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Creates the logical device.
///
/// Reads: `INSTANCE`, `PHYSICAL_DEVICE`, `QUEUE_REQUESTS`, `QUEUE_INDICES`, `RESULT`.
/// Publishes: `DEVICE`; records the device in the bundle.
#[derive(Debug, Default)]
pub struct CreateDevice {
    extensions: Vec<&'static CStr>,
}

impl CreateDevice {
    pub fn new(extensions: Vec<&'static CStr>) -> Self {
        Self { extensions }
    }
}

impl BuildStep for CreateDevice {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let instance = store.fetch::<Arc<VulkanInstance>>(keys::INSTANCE)?.clone();
        let physical = store.fetch::<PhysicalDeviceInfo>(keys::PHYSICAL_DEVICE)?;
        let requests = store.fetch::<Vec<QueueRequest>>(keys::QUEUE_REQUESTS)?;
        let indices = *store.fetch::<QueueFamilyIndices>(keys::QUEUE_INDICES)?;
        store.fetch::<DeviceBundle>(keys::RESULT)?;

        let extensions = device_extensions(&self.extensions);
        let device = Arc::new(LogicalDevice::new(
            instance,
            physical,
            requests,
            indices,
            &extensions,
        )?);

        log::info!(
            "logical device created on `{}` with {} queue family request(s)",
            physical.name,
            requests.len()
        );
        for ext in &extensions {
            log::debug!("device extension {}", ext.to_string_lossy());
        }

        store.fetch_mut::<DeviceBundle>(keys::RESULT)?.device = Some(device.clone());
        store.push(keys::DEVICE, device);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapchain_extension_is_always_first() {
        assert_eq!(device_extensions(&[]), [ash::khr::swapchain::NAME]);

        let exts = device_extensions(&[
            ash::khr::swapchain::NAME,
            ash::khr::maintenance1::NAME,
        ]);
        assert_eq!(exts, [ash::khr::swapchain::NAME, ash::khr::maintenance1::NAME]);
    }

    #[test]
    fn requested_duplicates_are_dropped() {
        let exts = device_extensions(&[
            ash::khr::maintenance1::NAME,
            ash::khr::maintenance1::NAME,
        ]);
        assert_eq!(exts.len(), 2);
    }
}
