//! Vulkan synchronization primitives
//!
//! RAII semaphores and fences, grouped per frame in flight

use super::{SharedDriver, VkResultExt, VulkanResult};
use ash::vk;

/// Semaphore wrapper with RAII cleanup
pub struct Semaphore {
    driver: SharedDriver,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(driver: SharedDriver) -> VulkanResult<Self> {
        let semaphore = driver.create_semaphore().check("vkCreateSemaphore")?;
        Ok(Self { driver, semaphore })
    }

    /// Get semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.driver.destroy_semaphore(self.semaphore);
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    driver: SharedDriver,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(driver: SharedDriver, signaled: bool) -> VulkanResult<Self> {
        let fence = driver.create_fence(signaled).check("vkCreateFence")?;
        Ok(Self { driver, fence })
    }

    /// Block until the fence is signalled
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        self.driver.wait_for_fence(self.fence, timeout).check("vkWaitForFences")
    }

    /// Return the fence to the unsignalled state
    pub fn reset(&self) -> VulkanResult<()> {
        self.driver.reset_fence(self.fence).check("vkResetFences")
    }

    /// Get fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.driver.destroy_fence(self.fence);
    }
}

/// Synchronization objects for one frame in flight
pub struct FrameSync {
    // Declared in reverse creation order so they drop newest first
    /// Signalled when the slot's submission completes
    pub in_flight: Fence,
    /// Signalled when rendering finishes, waited on by presentation
    pub render_finished: Semaphore,
    /// Signalled when the acquired swapchain image is ready
    pub image_available: Semaphore,
}

impl FrameSync {
    /// Create the triple; the fence starts signalled so the first wait returns
    pub fn new(driver: SharedDriver) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(driver.clone())?,
            render_finished: Semaphore::new(driver.clone())?,
            in_flight: Fence::new(driver, true)?,
        })
    }
}
