//! Command pool and one-shot submissions

use super::{SharedDriver, VkResultExt, VulkanError, VulkanResult};
use ash::vk;

/// Command pool wrapper with RAII cleanup
///
/// Destroying the pool frees every command buffer allocated from it.
pub struct CommandPool {
    driver: SharedDriver,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(driver: SharedDriver, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = driver
            .create_command_pool(&pool_create_info)
            .check("vkCreateCommandPool")?;

        Ok(Self { driver, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        self.driver
            .allocate_command_buffers(&alloc_info)
            .check("vkAllocateCommandBuffers")
    }

    /// Record and run a throwaway command buffer, waiting for it to finish
    ///
    /// The buffer is freed whether recording or submission succeeds or not.
    pub fn submit_once<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> VulkanResult<()>,
    {
        let command_buffers = self.allocate_command_buffers(1)?;
        let result = match command_buffers.first() {
            Some(&command_buffer) => self.record_and_wait(queue, command_buffer, record),
            None => Err(VulkanError::InvalidOperation {
                reason: "driver returned no command buffer".to_string(),
            }),
        };
        self.driver.free_command_buffers(self.command_pool, &command_buffers);
        result
    }

    fn record_and_wait<F>(&self, queue: vk::Queue, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(vk::CommandBuffer) -> VulkanResult<()>,
    {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.driver
            .begin_command_buffer(command_buffer, &begin_info)
            .check("vkBeginCommandBuffer")?;

        record(command_buffer)?;

        self.driver
            .end_command_buffer(command_buffer)
            .check("vkEndCommandBuffer")?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        self.driver
            .queue_submit(queue, &submit_info, vk::Fence::null())
            .check("vkQueueSubmit")?;
        self.driver.queue_wait_idle(queue).check("vkQueueWaitIdle")
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.driver.destroy_command_pool(self.command_pool);
    }
}
