//! Instance creation and extension negotiation
//!
//! The instance enables the extensions the window system asks for plus, with
//! validation on, `VK_EXT_debug_utils` and the Khronos validation layer.
//! Missing layers are logged and skipped; only allocation or driver failures
//! abort instance creation.

use super::{CapabilityLoader, SharedDriver, VkResultExt, VulkanError, VulkanResult};
use crate::core::VulkanRendererConfig;
use crate::render::window::WindowBackend;
use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::{CStr, CString};

/// Layers requested when validation is enabled
pub const VALIDATION_LAYERS: &[&str] = &["VK_LAYER_KHRONOS_validation"];

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    driver: SharedDriver,
    handle: vk::Instance,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    /// Create the instance and load its function table
    ///
    /// `loader` must already be at the global stage.
    pub fn new(
        driver: SharedDriver,
        loader: &mut CapabilityLoader,
        window: &dyn WindowBackend,
        config: &VulkanRendererConfig,
    ) -> VulkanResult<Self> {
        let enable_validation = config.validation_enabled();

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {}", e)))?;
        let engine_name = CString::new("kq")
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid engine name: {}", e)))?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let extensions = negotiate_extensions(window.required_instance_extensions()?, enable_validation);
        let layers = if enable_validation {
            let available = driver.enumerate_instance_layers().check("vkEnumerateInstanceLayerProperties")?;
            negotiate_layers(VALIDATION_LAYERS, &available)
        } else {
            Vec::new()
        };

        let extension_names = to_cstrings(&extensions)?;
        let layer_names = to_cstrings(&layers)?;
        let extension_ptrs: Vec<*const std::os::raw::c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<*const std::os::raw::c_char> = layer_names.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let handle = driver.create_instance(&create_info).check("vkCreateInstance")?;
        let mut instance = Self {
            driver,
            handle,
            debug_messenger: None,
        };
        log::debug!("Created instance with extensions {:?}, layers {:?}", extensions, layers);

        loader.refresh(handle, vk::PhysicalDevice::null(), vk::Device::null())?;

        if enable_validation {
            instance.debug_messenger = Some(instance.create_debug_messenger()?);
        }

        Ok(instance)
    }

    fn create_debug_messenger(&self) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        self.driver
            .create_debug_messenger(&create_info)
            .check("vkCreateDebugUtilsMessengerEXT")
    }

    /// Get instance handle
    pub fn handle(&self) -> vk::Instance {
        self.handle
    }

    /// Whether a debug messenger is installed
    pub fn has_debug_messenger(&self) -> bool {
        self.debug_messenger.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        if let Some(messenger) = self.debug_messenger.take() {
            self.driver.destroy_debug_messenger(messenger);
        }
        self.driver.destroy_instance(self.handle);
    }
}

/// Window-system extensions, plus debug utils when validating
fn negotiate_extensions(mut required: Vec<String>, enable_validation: bool) -> Vec<String> {
    if enable_validation {
        let debug_utils = DebugUtils::name().to_string_lossy().into_owned();
        if !required.contains(&debug_utils) {
            required.push(debug_utils);
        }
    }
    required
}

/// Requested layers that the driver actually offers
fn negotiate_layers(wanted: &[&str], available: &[String]) -> Vec<String> {
    wanted
        .iter()
        .filter(|layer| {
            let found = available.iter().any(|a| a == *layer);
            if !found {
                log::error!("Validation layer {} not available", layer);
            }
            found
        })
        .map(|layer| layer.to_string())
        .collect()
}

fn to_cstrings(names: &[String]) -> VulkanResult<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str())
                .map_err(|e| VulkanError::InitializationFailed(format!("Invalid name {:?}: {}", name, e)))
        })
        .collect()
}

/// Presentation surface owned by the session
pub struct Surface {
    driver: SharedDriver,
    handle: vk::SurfaceKHR,
}

impl Surface {
    /// Create a surface for `instance` through the window system
    pub fn new(driver: SharedDriver, window: &mut dyn WindowBackend, instance: &VulkanInstance) -> VulkanResult<Self> {
        let handle = window.create_surface(instance.handle())?;
        Ok(Self { driver, handle })
    }

    /// Get surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.driver.destroy_surface(self.handle);
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
