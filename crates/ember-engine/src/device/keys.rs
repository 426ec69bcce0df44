//! Artifact keys shared by the bootstrap steps.
//!
//! Each constant documents the type stored under it. Steps must only push the
//! documented type under a key; readers rely on it.

/// `Arc<VulkanInstance>`, published by `CreateInstance`.
pub const INSTANCE: &str = "vk.instance";

/// `Arc<Surface>`, published by `CreateSurface`.
pub const SURFACE: &str = "vk.surface";

/// `PhysicalDeviceInfo`, published by `SelectPhysicalDevice`.
pub const PHYSICAL_DEVICE: &str = "select.physical_device";

/// `Vec<QueueRequest>`, published by `SelectQueues`.
pub const QUEUE_REQUESTS: &str = "select.device_queue";

/// `QueueFamilyIndices`, published by `SelectQueues`.
pub const QUEUE_INDICES: &str = "select.queue_index";

/// `Arc<LogicalDevice>`, published by `CreateDevice`.
pub const DEVICE: &str = "vk.device";

/// `vk::Format` of the swapchain images, published by `CreateSwapchain`.
pub const SWAPCHAIN_FORMAT: &str = "vk.swapchain_format";

/// `DeviceBundle`, seeded by the caller and filled in by the steps.
pub const RESULT: &str = "select.result";
