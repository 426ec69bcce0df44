use std::sync::Arc;

use ash::vk;

use super::instance::VulkanInstance;
use super::keys;
use super::queue::QueueFamily;
use crate::pipeline::{ArtifactStore, BuildError, BuildStep, ExternalContext};

/// Environment variable read by [`DevicePreference::from_env`].
pub const DEVICE_ENV: &str = "EMBER_DEVICE";

/// Snapshot of a physical device taken at selection time.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub queue_families: Vec<QueueFamily>,
}

impl PhysicalDeviceInfo {
    pub fn query(instance: &VulkanInstance, handle: vk::PhysicalDevice) -> Self {
        let instance = instance.handle();
        let props = unsafe { instance.get_physical_device_properties(handle) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(handle) };

        let name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed device>".to_string());

        Self {
            handle,
            name,
            device_type: props.device_type,
            api_version: props.api_version,
            queue_families: QueueFamily::enumerate(&families),
        }
    }

    pub fn is_discrete(&self) -> bool {
        self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    /// API version as `major.minor.patch`.
    pub fn api_version_string(&self) -> String {
        format!(
            "{}.{}.{}",
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version)
        )
    }
}

/// Which physical device to pick when several are available.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum DevicePreference {
    /// First device in enumeration order.
    #[default]
    First,
    /// Device at this enumeration position.
    Index(usize),
    /// First discrete GPU; falls back to the first device if there is none.
    Discrete,
    /// First device whose name contains this substring (case-insensitive).
    Named(String),
}

impl DevicePreference {
    /// Reads the preference from `EMBER_DEVICE`, defaulting to [`First`](Self::First).
    pub fn from_env() -> Self {
        std::env::var(DEVICE_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    /// Parses `discrete`, `first`, a device index, or `name:<substring>`.
    ///
    /// Unrecognized values fall back to [`First`](Self::First) with a warning.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("first") || value.is_empty() {
            return Self::First;
        }
        if value.eq_ignore_ascii_case("discrete") {
            return Self::Discrete;
        }
        if let Some(name) = value.strip_prefix("name:") {
            return Self::Named(name.to_string());
        }
        if let Ok(index) = value.parse::<usize>() {
            return Self::Index(index);
        }

        log::warn!("unrecognized {DEVICE_ENV} value `{value}`; using the first device");
        Self::First
    }

    /// Applies the preference to the enumerated candidates.
    pub fn select<'a>(
        &self,
        candidates: &'a [PhysicalDeviceInfo],
    ) -> Result<&'a PhysicalDeviceInfo, BuildError> {
        let first = candidates
            .first()
            .ok_or_else(|| BuildError::unsupported("no Vulkan physical devices available"))?;

        match self {
            Self::First => Ok(first),
            Self::Index(index) => candidates.get(*index).ok_or_else(|| {
                BuildError::unsupported(format!(
                    "device index {index} out of range ({} device(s) available)",
                    candidates.len()
                ))
            }),
            Self::Discrete => Ok(candidates
                .iter()
                .find(|c| c.is_discrete())
                .unwrap_or_else(|| {
                    log::info!("no discrete GPU found; using `{}`", first.name);
                    first
                })),
            Self::Named(needle) => {
                let needle = needle.to_lowercase();
                candidates
                    .iter()
                    .find(|c| c.name.to_lowercase().contains(&needle))
                    .ok_or_else(|| {
                        BuildError::unsupported(format!("no device name contains `{needle}`"))
                    })
            }
        }
    }
}

/// Enumerates physical devices and selects one.
///
/// Reads: `INSTANCE`.
/// Publishes: `PHYSICAL_DEVICE`.
#[derive(Debug, Default)]
pub struct SelectPhysicalDevice {
    preference: DevicePreference,
}

impl SelectPhysicalDevice {
    pub fn new(preference: DevicePreference) -> Self {
        Self { preference }
    }
}

impl BuildStep for SelectPhysicalDevice {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let instance = store.fetch::<Arc<VulkanInstance>>(keys::INSTANCE)?;

        let handles = unsafe { instance.handle().enumerate_physical_devices() }
            .external("enumerate physical devices")?;
        let candidates: Vec<_> = handles
            .into_iter()
            .map(|h| PhysicalDeviceInfo::query(instance, h))
            .collect();

        for (i, c) in candidates.iter().enumerate() {
            log::info!(
                "device {i}: {} ({:?}, Vulkan {}, {} queue families)",
                c.name,
                c.device_type,
                c.api_version_string(),
                c.queue_families.len()
            );
        }

        let selected = self.preference.select(&candidates)?.clone();
        log::info!("selected device `{}` ({:?})", selected.name, self.preference);

        store.push(keys::PHYSICAL_DEVICE, selected);
        Ok(())
    }
}
