//! GPU driver seam
//!
//! Every Vulkan call the session makes goes through the [`Driver`] trait. The
//! production implementation is [`VulkanDriver`] (ash); tests use a counting
//! mock so object lifetimes and call ordering can be checked without a GPU.
//!
//! Handles are plain `ash::vk` handle types and create-info arguments are the
//! `ash::vk` create-info structs, so wrappers build exactly the same
//! descriptors whichever implementation sits underneath.

use ash::prelude::VkResult;
use ash::vk;
use std::ffi::c_void;
use std::rc::Rc;

pub mod vulkan;

#[cfg(test)]
pub mod mock;

pub use vulkan::VulkanDriver;

/// Shared driver handle held by every RAII wrapper
pub type SharedDriver = Rc<dyn Driver>;

/// Vulkan entry points used by the renderer
///
/// Functions are grouped by the loader stage that makes them resolvable:
/// global (before any instance), instance level, and device level. See
/// [`Driver::reload`] for the staging contract.
pub trait Driver {
    // --- loader ---------------------------------------------------------

    /// Resolve entry points for the given context
    ///
    /// Must be called three times during initialization: with all null
    /// handles, after instance creation, and after logical device creation.
    /// Returns the encoded API version, or 0 when loading failed.
    fn reload(&self, instance: vk::Instance, physical_device: vk::PhysicalDevice, device: vk::Device) -> u32;

    /// Install the call-result hook that logs failing driver calls
    fn install_debug_hook(&self);

    // --- global ---------------------------------------------------------

    /// Names of the instance layers the loader can enable
    fn enumerate_instance_layers(&self) -> VkResult<Vec<String>>;
    /// Create the API instance (the instance table is installed by a later reload)
    fn create_instance(&self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance>;

    // --- instance -------------------------------------------------------

    /// Destroy the instance; every child object must already be gone
    fn destroy_instance(&self, instance: vk::Instance);
    /// Create the validation message callback
    fn create_debug_messenger(&self, info: &vk::DebugUtilsMessengerCreateInfoEXT) -> VkResult<vk::DebugUtilsMessengerEXT>;
    /// Destroy the validation message callback
    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT);
    /// Destroy a presentation surface
    fn destroy_surface(&self, surface: vk::SurfaceKHR);
    /// Physical devices in driver order
    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    /// Human-readable device name
    fn physical_device_name(&self, physical_device: vk::PhysicalDevice) -> String;
    /// Names of the extensions the device supports
    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<String>>;
    /// Queue family properties, indexed by family
    fn queue_families(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    /// Whether `family` can present to `surface`
    fn surface_support(&self, physical_device: vk::PhysicalDevice, family: u32, surface: vk::SurfaceKHR) -> VkResult<bool>;
    /// Image count, extent and transform limits of the surface
    fn surface_capabilities(&self, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    /// Present modes the surface supports
    fn surface_present_modes(&self, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>>;
    /// Memory types and heaps of the device
    fn memory_properties(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties;
    /// Create the logical device (the device table is installed by a later reload)
    fn create_device(&self, physical_device: vk::PhysicalDevice, info: &vk::DeviceCreateInfo) -> VkResult<vk::Device>;

    // --- device ---------------------------------------------------------

    /// Destroy the logical device
    fn destroy_device(&self, device: vk::Device);
    /// Queue `index` of `family`, which must have been requested at device creation
    fn device_queue(&self, family: u32, index: u32) -> vk::Queue;
    /// Block until the device has no pending work
    fn device_wait_idle(&self) -> VkResult<()>;

    /// Create a swapchain, possibly chaining an old one
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR>;
    /// Destroy a swapchain and release its images
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    /// Images owned by the swapchain
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    /// Returns the image index and whether the swapchain is suboptimal
    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, timeout: u64, semaphore: vk::Semaphore) -> VkResult<(u32, bool)>;
    /// Returns whether the swapchain is suboptimal
    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool>;

    /// Create an image view
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);
    /// Create a framebuffer
    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer>;
    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);
    /// Create a render pass
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass>;
    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule>;
    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    /// Create a descriptor set layout
    fn create_descriptor_set_layout(&self, info: &vk::DescriptorSetLayoutCreateInfo) -> VkResult<vk::DescriptorSetLayout>;
    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    /// Create a pipeline layout
    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VkResult<vk::PipelineLayout>;
    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    /// Create one graphics pipeline
    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VkResult<vk::Pipeline>;
    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);
    /// Create a descriptor pool
    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VkResult<vk::DescriptorPool>;
    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// Allocate one set per layout in `info`
    fn allocate_descriptor_sets(&self, info: &vk::DescriptorSetAllocateInfo) -> VkResult<Vec<vk::DescriptorSet>>;
    /// Apply descriptor writes
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]);

    /// Create a buffer with no memory bound
    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer>;
    /// Destroy a buffer
    fn destroy_buffer(&self, buffer: vk::Buffer);
    /// Size, alignment and allowed memory types for a buffer
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    /// Bind memory to a buffer at offset 0
    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()>;
    /// Create an image with no memory bound
    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image>;
    /// Destroy an image
    fn destroy_image(&self, image: vk::Image);
    /// Size, alignment and allowed memory types for an image
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    /// Bind memory to an image at offset 0
    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> VkResult<()>;
    /// Create a sampler
    fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler>;
    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: vk::Sampler);
    /// Allocate device memory
    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory>;
    /// Free device memory
    fn free_memory(&self, memory: vk::DeviceMemory);
    /// Map a range of host-visible memory
    fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VkResult<*mut c_void>;
    /// Unmap previously mapped memory
    fn unmap_memory(&self, memory: vk::DeviceMemory);

    /// Create a command pool
    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo) -> VkResult<vk::CommandPool>;
    /// Destroy a command pool and the buffers allocated from it
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Allocate the command buffers `info` describes
    fn allocate_command_buffers(&self, info: &vk::CommandBufferAllocateInfo) -> VkResult<Vec<vk::CommandBuffer>>;
    /// Return command buffers to their pool
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    /// Discard recorded commands
    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;
    /// Start recording
    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, info: &vk::CommandBufferBeginInfo) -> VkResult<()>;
    /// Finish recording
    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()>;

    /// Record the start of a render pass with inline contents
    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo);
    /// Record the end of the current render pass
    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);
    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    /// Set viewport 0
    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport);
    /// Set scissor 0
    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D);
    /// Bind a vertex buffer to binding 0
    fn cmd_bind_vertex_buffer(&self, buffer: vk::CommandBuffer, vertex_buffer: vk::Buffer);
    /// Bind an index buffer
    fn cmd_bind_index_buffer(&self, buffer: vk::CommandBuffer, index_buffer: vk::Buffer, index_type: vk::IndexType);
    /// Bind a descriptor set to set 0 of the graphics bind point
    fn cmd_bind_descriptor_set(&self, buffer: vk::CommandBuffer, layout: vk::PipelineLayout, set: vk::DescriptorSet);
    /// Push constants at offset 0
    fn cmd_push_constants(&self, buffer: vk::CommandBuffer, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]);
    /// Draw one instance of `index_count` indices
    fn cmd_draw_indexed(&self, buffer: vk::CommandBuffer, index_count: u32);
    /// Copy `size` bytes between buffers
    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize);
    /// Copy buffer contents into an image
    fn cmd_copy_buffer_to_image(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]);
    /// Record a single image memory barrier
    fn cmd_image_barrier(
        &self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    );

    /// Create a binary semaphore
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// Create a fence, optionally signalled
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);
    /// Wait for a fence to signal
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;
    /// Return a fence to the unsignalled state
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;
    /// Submit one batch, signalling `fence` when it completes
    fn queue_submit(&self, queue: vk::Queue, submit: &vk::SubmitInfo, fence: vk::Fence) -> VkResult<()>;
    /// Block until the queue has no pending work
    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()>;
}
