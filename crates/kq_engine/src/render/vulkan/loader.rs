//! Capability loader
//!
//! Driver entry points become resolvable in three stages. Callers must refresh
//! the loader once with no handles (before the instance exists), once after
//! instance creation and once after logical device creation.

use super::{SharedDriver, VulkanError, VulkanResult};
use ash::vk;

/// How far entry-point loading has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoaderStage {
    /// Nothing loaded
    Unloaded,
    /// Instance-independent functions (enough to create an instance)
    Global,
    /// Instance-level functions
    Instance,
    /// Device-level functions
    Device,
}

/// Tracks and advances the driver's loaded function tables
pub struct CapabilityLoader {
    driver: SharedDriver,
    stage: LoaderStage,
    version: u32,
}

impl CapabilityLoader {
    /// Create a loader with nothing loaded
    pub fn new(driver: SharedDriver) -> Self {
        Self {
            driver,
            stage: LoaderStage::Unloaded,
            version: 0,
        }
    }

    /// Reload entry points for the handles available so far
    ///
    /// Returns the encoded API version. A zero version from the driver is
    /// unrecoverable and maps to [`VulkanError::LoaderFailed`].
    pub fn refresh(
        &mut self,
        instance: vk::Instance,
        physical_device: vk::PhysicalDevice,
        device: vk::Device,
    ) -> VulkanResult<u32> {
        let version = self.driver.reload(instance, physical_device, device);
        if version == 0 {
            log::error!("Failed to load Vulkan");
            return Err(VulkanError::LoaderFailed);
        }

        let stage = if instance == vk::Instance::null() {
            LoaderStage::Global
        } else if device == vk::Device::null() {
            LoaderStage::Instance
        } else {
            LoaderStage::Device
        };

        match stage {
            LoaderStage::Global => log::debug!("Vulkan loaded"),
            LoaderStage::Instance => log::debug!("Vulkan reloaded (VkInstance, NULL, NULL)"),
            _ => {
                log::debug!("Vulkan reloaded (VkInstance, VkPhysicalDevice, VkDevice)");
                log::info!(
                    "Vulkan {}.{}",
                    vk::api_version_major(version),
                    vk::api_version_minor(version)
                );
            }
        }

        if cfg!(debug_assertions) {
            self.driver.install_debug_hook();
        }

        self.stage = stage;
        self.version = version;
        Ok(version)
    }

    /// Stage reached by the last successful refresh
    pub fn stage(&self) -> LoaderStage {
        self.stage
    }

    /// Version reported by the last successful refresh
    pub fn version(&self) -> u32 {
        self.version
    }
}
