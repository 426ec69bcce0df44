use std::ffi::{CStr, CString, c_char};
use std::sync::Arc;

use ash::vk;
use raw_window_handle::RawDisplayHandle;

use super::keys;
use crate::pipeline::{ArtifactStore, BuildError, BuildStep, ExternalContext};

/// Parameters for Vulkan instance creation.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub app_name: String,
    pub engine_name: String,
    pub app_version: u32,
    pub engine_version: u32,

    /// Instance extensions requested in addition to the ones the window
    /// system requires.
    pub extensions: Vec<&'static CStr>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_name: "ember".to_string(),
            engine_name: "ember".to_string(),
            app_version: 1,
            engine_version: 1,
            extensions: Vec::new(),
        }
    }
}

/// Owns the Vulkan loader, the instance, and the surface extension loader.
///
/// This is the explicit context every other Vulkan object hangs off. Objects
/// created from it hold an `Arc` to it so the instance is destroyed last.
pub struct VulkanInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_fn: ash::khr::surface::Instance,
}

impl VulkanInstance {
    /// Loads the Vulkan library and creates an instance able to present to
    /// windows on `display`.
    pub fn new(config: &InstanceConfig, display: RawDisplayHandle) -> Result<Self, BuildError> {
        let entry = unsafe { ash::Entry::load() }.external("load Vulkan library")?;

        let app_name = CString::new(config.app_name.as_str()).external("encode application name")?;
        let engine_name = CString::new(config.engine_name.as_str()).external("encode engine name")?;

        let window_extensions = ash_window::enumerate_required_extensions(display)
            .external("query window system instance extensions")?;
        let extensions = merge_extensions(&config.extensions, window_extensions);

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(config.app_version)
            .engine_name(&engine_name)
            .engine_version(config.engine_version)
            .api_version(vk::API_VERSION_1_1);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .external("create Vulkan instance")?;
        let surface_fn = ash::khr::surface::Instance::new(&entry, &instance);

        log::info!(
            "Vulkan instance created for `{}` with {} extension(s)",
            config.app_name,
            extensions.len()
        );

        Ok(Self {
            entry,
            instance,
            surface_fn,
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn surface_fn(&self) -> &ash::khr::surface::Instance {
        &self.surface_fn
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::debug!("destroying Vulkan instance");
        unsafe { self.instance.destroy_instance(None) };
    }
}

/// Caller-requested extensions first, then the window system's, without duplicates.
fn merge_extensions(requested: &[&'static CStr], window: &[*const c_char]) -> Vec<*const c_char> {
    // Pointers from ash-window reference static, NUL-terminated names.
    let window = window.iter().map(|&ptr| unsafe { CStr::from_ptr(ptr) });

    let mut names: Vec<&CStr> = Vec::with_capacity(requested.len() + window.len());
    for name in requested.iter().copied().chain(window) {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    names.into_iter().map(CStr::as_ptr).collect()
}

/// Creates the Vulkan instance.
///
/// Publishes: `INSTANCE`.
pub struct CreateInstance {
    config: InstanceConfig,
    display: RawDisplayHandle,
}

impl CreateInstance {
    pub fn new(config: InstanceConfig, display: RawDisplayHandle) -> Self {
        Self { config, display }
    }
}

impl BuildStep for CreateInstance {
    fn build(&mut self, store: &mut ArtifactStore) -> Result<(), BuildError> {
        let instance = VulkanInstance::new(&self.config, self.display)?;
        store.push(keys::INSTANCE, Arc::new(instance));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ptrs: &[*const c_char]) -> Vec<String> {
        ptrs.iter()
            .map(|&p| unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn merge_puts_requested_first_and_drops_duplicates() {
        let requested = [ash::ext::debug_utils::NAME, ash::khr::surface::NAME];
        let window = [
            ash::khr::surface::NAME.as_ptr(),
            ash::khr::xlib_surface::NAME.as_ptr(),
        ];

        let merged = merge_extensions(&requested, &window);
        assert_eq!(
            names(&merged),
            ["VK_EXT_debug_utils", "VK_KHR_surface", "VK_KHR_xlib_surface"]
        );
    }

    #[test]
    fn merge_drops_duplicates_within_requested() {
        let requested = [ash::ext::debug_utils::NAME, ash::ext::debug_utils::NAME];
        let merged = merge_extensions(&requested, &[]);
        assert_eq!(names(&merged), ["VK_EXT_debug_utils"]);
    }

    #[test]
    fn default_config_names_the_engine() {
        let config = InstanceConfig::default();
        assert_eq!(config.app_name, "ember");
        assert_eq!(config.engine_name, "ember");
        assert!(config.extensions.is_empty());
    }
}
