//! ash-backed driver
//!
//! Function tables are installed in three stages by [`Driver::reload`]: the
//! global entry (null handles), the instance table after instance creation and
//! the device table after logical device creation. A call made before its
//! stage was loaded fails with `ERROR_INITIALIZATION_FAILED`.

use super::Driver;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::prelude::VkResult;
use ash::vk;
use ash::{Device, Entry, Instance};
use std::cell::{Cell, OnceCell};
use std::ffi::{c_void, CStr};
use std::ptr;

struct InstanceTables {
    instance: Instance,
    surface: Surface,
    debug_utils: DebugUtils,
}

struct DeviceTables {
    device: Device,
    swapchain: SwapchainLoader,
}

/// Production driver over the system Vulkan loader
pub struct VulkanDriver {
    entry: OnceCell<Entry>,
    instance: OnceCell<InstanceTables>,
    device: OnceCell<DeviceTables>,
    debug_hook: Cell<bool>,
}

impl Default for VulkanDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl VulkanDriver {
    /// Create a driver with no tables loaded
    pub fn new() -> Self {
        Self {
            entry: OnceCell::new(),
            instance: OnceCell::new(),
            device: OnceCell::new(),
            debug_hook: Cell::new(false),
        }
    }

    fn entry(&self) -> VkResult<&Entry> {
        self.entry.get().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn inst(&self) -> VkResult<&InstanceTables> {
        self.instance.get().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn dev(&self) -> VkResult<&DeviceTables> {
        self.device.get().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    /// Pass a call result through, logging failures while the hook is installed
    fn checked<T>(&self, call: &'static str, result: VkResult<T>) -> VkResult<T> {
        if let Err(err) = &result {
            if self.debug_hook.get() {
                log::error!("[Vulkan] {} failed: {:?}", call, err);
            }
        }
        result
    }

    fn load_global(&self) -> u32 {
        if self.entry.get().is_none() {
            match unsafe { Entry::load() } {
                Ok(entry) => {
                    let _ = self.entry.set(entry);
                }
                Err(e) => {
                    log::error!("Failed to load Vulkan loader: {}", e);
                    return 0;
                }
            }
        }
        match self.entry.get().map(|entry| entry.try_enumerate_instance_version()) {
            Some(Ok(Some(version))) => version,
            Some(Ok(None)) => vk::API_VERSION_1_0,
            _ => 0,
        }
    }

    fn load_instance(&self, instance: vk::Instance) -> u32 {
        let Some(entry) = self.entry.get() else {
            return 0;
        };
        if let Some(tables) = self.instance.get() {
            if tables.instance.handle() != instance {
                log::error!("Instance table already loaded for a different VkInstance");
                return 0;
            }
        } else {
            let loaded = unsafe { Instance::load(entry.static_fn(), instance) };
            let tables = InstanceTables {
                surface: Surface::new(entry, &loaded),
                debug_utils: DebugUtils::new(entry, &loaded),
                instance: loaded,
            };
            let _ = self.instance.set(tables);
        }
        self.load_global()
    }

    fn load_device(&self, physical_device: vk::PhysicalDevice, device: vk::Device) -> u32 {
        let Some(tables) = self.instance.get() else {
            return 0;
        };
        if let Some(loaded) = self.device.get() {
            if loaded.device.handle() != device {
                log::error!("Device table already loaded for a different VkDevice");
                return 0;
            }
        } else {
            let loaded = unsafe { Device::load(tables.instance.fp_v1_0(), device) };
            let swapchain = SwapchainLoader::new(&tables.instance, &loaded);
            let _ = self.device.set(DeviceTables { device: loaded, swapchain });
        }
        let properties = unsafe { tables.instance.get_physical_device_properties(physical_device) };
        properties.api_version
    }
}

fn c_name(raw: &[std::os::raw::c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

impl Driver for VulkanDriver {
    fn reload(&self, instance: vk::Instance, physical_device: vk::PhysicalDevice, device: vk::Device) -> u32 {
        if instance == vk::Instance::null() {
            self.load_global()
        } else if device == vk::Device::null() {
            self.load_instance(instance)
        } else {
            self.load_device(physical_device, device)
        }
    }

    fn install_debug_hook(&self) {
        self.debug_hook.set(cfg!(debug_assertions));
    }

    fn enumerate_instance_layers(&self) -> VkResult<Vec<String>> {
        let layers = self.checked(
            "vkEnumerateInstanceLayerProperties",
            self.entry().and_then(|entry| entry.enumerate_instance_layer_properties()),
        )?;
        Ok(layers.iter().map(|layer| c_name(&layer.layer_name)).collect())
    }

    fn create_instance(&self, info: &vk::InstanceCreateInfo) -> VkResult<vk::Instance> {
        let entry = self.entry()?;
        let mut instance = vk::Instance::null();
        let result = unsafe { (entry.fp_v1_0().create_instance)(info, ptr::null(), &mut instance) };
        self.checked("vkCreateInstance", result.result_with_success(instance))
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        match self.instance.get() {
            Some(tables) if tables.instance.handle() == instance => unsafe { tables.instance.destroy_instance(None) },
            Some(_) => log::error!("vkDestroyInstance called with a foreign VkInstance"),
            // Instance created but its table never loaded
            None => {
                if let Some(entry) = self.entry.get() {
                    unsafe { Instance::load(entry.static_fn(), instance).destroy_instance(None) };
                }
            }
        }
    }

    fn create_debug_messenger(&self, info: &vk::DebugUtilsMessengerCreateInfoEXT) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let result = self
            .inst()
            .and_then(|t| unsafe { t.debug_utils.create_debug_utils_messenger(info, None) });
        self.checked("vkCreateDebugUtilsMessengerEXT", result)
    }

    fn destroy_debug_messenger(&self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Ok(t) = self.inst() {
            unsafe { t.debug_utils.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        if let Ok(t) = self.inst() {
            unsafe { t.surface.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let result = self.inst().and_then(|t| unsafe { t.instance.enumerate_physical_devices() });
        self.checked("vkEnumeratePhysicalDevices", result)
    }

    fn physical_device_name(&self, physical_device: vk::PhysicalDevice) -> String {
        match self.inst() {
            Ok(t) => {
                let properties = unsafe { t.instance.get_physical_device_properties(physical_device) };
                c_name(&properties.device_name)
            }
            Err(_) => String::new(),
        }
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> VkResult<Vec<String>> {
        let result = self
            .inst()
            .and_then(|t| unsafe { t.instance.enumerate_device_extension_properties(physical_device) });
        let extensions = self.checked("vkEnumerateDeviceExtensionProperties", result)?;
        Ok(extensions.iter().map(|ext| c_name(&ext.extension_name)).collect())
    }

    fn queue_families(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.inst()
            .map(|t| unsafe { t.instance.get_physical_device_queue_family_properties(physical_device) })
            .unwrap_or_default()
    }

    fn surface_support(&self, physical_device: vk::PhysicalDevice, family: u32, surface: vk::SurfaceKHR) -> VkResult<bool> {
        let result = self.inst().and_then(|t| unsafe {
            t.surface.get_physical_device_surface_support(physical_device, family, surface)
        });
        self.checked("vkGetPhysicalDeviceSurfaceSupportKHR", result)
    }

    fn surface_capabilities(&self, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let result = self.inst().and_then(|t| unsafe {
            t.surface.get_physical_device_surface_capabilities(physical_device, surface)
        });
        self.checked("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", result)
    }

    fn surface_present_modes(&self, physical_device: vk::PhysicalDevice, surface: vk::SurfaceKHR) -> VkResult<Vec<vk::PresentModeKHR>> {
        let result = self.inst().and_then(|t| unsafe {
            t.surface.get_physical_device_surface_present_modes(physical_device, surface)
        });
        self.checked("vkGetPhysicalDeviceSurfacePresentModesKHR", result)
    }

    fn memory_properties(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties {
        self.inst()
            .map(|t| unsafe { t.instance.get_physical_device_memory_properties(physical_device) })
            .unwrap_or_default()
    }

    fn create_device(&self, physical_device: vk::PhysicalDevice, info: &vk::DeviceCreateInfo) -> VkResult<vk::Device> {
        let tables = self.inst()?;
        let mut device = vk::Device::null();
        let result = unsafe {
            (tables.instance.fp_v1_0().create_device)(physical_device, info, ptr::null(), &mut device)
        };
        self.checked("vkCreateDevice", result.result_with_success(device))
    }

    fn destroy_device(&self, device: vk::Device) {
        match self.device.get() {
            Some(t) if t.device.handle() == device => unsafe { t.device.destroy_device(None) },
            Some(_) => log::error!("vkDestroyDevice called with a foreign VkDevice"),
            // Device created but its table never loaded
            None => {
                if let Some(tables) = self.instance.get() {
                    unsafe { Device::load(tables.instance.fp_v1_0(), device).destroy_device(None) };
                }
            }
        }
    }

    fn device_queue(&self, family: u32, index: u32) -> vk::Queue {
        self.dev()
            .map(|t| unsafe { t.device.get_device_queue(family, index) })
            .unwrap_or_else(|_| vk::Queue::null())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.device_wait_idle() });
        self.checked("vkDeviceWaitIdle", result)
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VkResult<vk::SwapchainKHR> {
        let result = self.dev().and_then(|t| unsafe { t.swapchain.create_swapchain(info, None) });
        self.checked("vkCreateSwapchainKHR", result)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        if let Ok(t) = self.dev() {
            unsafe { t.swapchain.destroy_swapchain(swapchain, None) };
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let result = self.dev().and_then(|t| unsafe { t.swapchain.get_swapchain_images(swapchain) });
        self.checked("vkGetSwapchainImagesKHR", result)
    }

    fn acquire_next_image(&self, swapchain: vk::SwapchainKHR, timeout: u64, semaphore: vk::Semaphore) -> VkResult<(u32, bool)> {
        // Out-of-date is a normal outcome here; the caller decides whether to log it
        self.dev().and_then(|t| unsafe {
            t.swapchain.acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        })
    }

    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> VkResult<bool> {
        self.dev().and_then(|t| unsafe { t.swapchain.queue_present(queue, info) })
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VkResult<vk::ImageView> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_image_view(info, None) });
        self.checked("vkCreateImageView", result)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_image_view(view, None) };
        }
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VkResult<vk::Framebuffer> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_framebuffer(info, None) });
        self.checked("vkCreateFramebuffer", result)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_render_pass(info, None) });
        self.checked("vkCreateRenderPass", result)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::builder().code(code);
        let result = self.dev().and_then(|t| unsafe { t.device.create_shader_module(&info, None) });
        self.checked("vkCreateShaderModule", result)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_shader_module(module, None) };
        }
    }

    fn create_descriptor_set_layout(&self, info: &vk::DescriptorSetLayoutCreateInfo) -> VkResult<vk::DescriptorSetLayout> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_descriptor_set_layout(info, None) });
        self.checked("vkCreateDescriptorSetLayout", result)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_descriptor_set_layout(layout, None) };
        }
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VkResult<vk::PipelineLayout> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_pipeline_layout(info, None) });
        self.checked("vkCreatePipelineLayout", result)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VkResult<vk::Pipeline> {
        let result = self.dev().and_then(|t| {
            let pipelines = unsafe {
                t.device
                    .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(info), None)
                    .map_err(|(_, err)| err)?
            };
            pipelines.first().copied().ok_or(vk::Result::ERROR_UNKNOWN)
        });
        self.checked("vkCreateGraphicsPipelines", result)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_pipeline(pipeline, None) };
        }
    }

    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VkResult<vk::DescriptorPool> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_descriptor_pool(info, None) });
        self.checked("vkCreateDescriptorPool", result)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_descriptor_pool(pool, None) };
        }
    }

    fn allocate_descriptor_sets(&self, info: &vk::DescriptorSetAllocateInfo) -> VkResult<Vec<vk::DescriptorSet>> {
        let result = self.dev().and_then(|t| unsafe { t.device.allocate_descriptor_sets(info) });
        self.checked("vkAllocateDescriptorSets", result)
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.update_descriptor_sets(writes, &[]) };
        }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_buffer(info, None) });
        self.checked("vkCreateBuffer", result)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_buffer(buffer, None) };
        }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        self.dev()
            .map(|t| unsafe { t.device.get_buffer_memory_requirements(buffer) })
            .unwrap_or_default()
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.bind_buffer_memory(buffer, memory, 0) });
        self.checked("vkBindBufferMemory", result)
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_image(info, None) });
        self.checked("vkCreateImage", result)
    }

    fn destroy_image(&self, image: vk::Image) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_image(image, None) };
        }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        self.dev()
            .map(|t| unsafe { t.device.get_image_memory_requirements(image) })
            .unwrap_or_default()
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.bind_image_memory(image, memory, 0) });
        self.checked("vkBindImageMemory", result)
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_sampler(info, None) });
        self.checked("vkCreateSampler", result)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_sampler(sampler, None) };
        }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory> {
        let result = self.dev().and_then(|t| unsafe { t.device.allocate_memory(info, None) });
        self.checked("vkAllocateMemory", result)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.free_memory(memory, None) };
        }
    }

    fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VkResult<*mut c_void> {
        let result = self.dev().and_then(|t| unsafe {
            t.device.map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
        });
        self.checked("vkMapMemory", result)
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.unmap_memory(memory) };
        }
    }

    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo) -> VkResult<vk::CommandPool> {
        let result = self.dev().and_then(|t| unsafe { t.device.create_command_pool(info, None) });
        self.checked("vkCreateCommandPool", result)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(&self, info: &vk::CommandBufferAllocateInfo) -> VkResult<Vec<vk::CommandBuffer>> {
        let result = self.dev().and_then(|t| unsafe { t.device.allocate_command_buffers(info) });
        self.checked("vkAllocateCommandBuffers", result)
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.free_command_buffers(pool, buffers) };
        }
    }

    fn reset_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe {
            t.device.reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())
        });
        self.checked("vkResetCommandBuffer", result)
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, info: &vk::CommandBufferBeginInfo) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.begin_command_buffer(buffer, info) });
        self.checked("vkBeginCommandBuffer", result)
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.end_command_buffer(buffer) });
        self.checked("vkEndCommandBuffer", result)
    }

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_begin_render_pass(buffer, info, vk::SubpassContents::INLINE) };
        }
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_end_render_pass(buffer) };
        }
    }

    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline) };
        }
    }

    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_set_viewport(buffer, 0, std::slice::from_ref(viewport)) };
        }
    }

    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_set_scissor(buffer, 0, std::slice::from_ref(scissor)) };
        }
    }

    fn cmd_bind_vertex_buffer(&self, buffer: vk::CommandBuffer, vertex_buffer: vk::Buffer) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_bind_vertex_buffers(buffer, 0, &[vertex_buffer], &[0]) };
        }
    }

    fn cmd_bind_index_buffer(&self, buffer: vk::CommandBuffer, index_buffer: vk::Buffer, index_type: vk::IndexType) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_bind_index_buffer(buffer, index_buffer, 0, index_type) };
        }
    }

    fn cmd_bind_descriptor_set(&self, buffer: vk::CommandBuffer, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        if let Ok(t) = self.dev() {
            unsafe {
                t.device.cmd_bind_descriptor_sets(buffer, vk::PipelineBindPoint::GRAPHICS, layout, 0, &[set], &[])
            };
        }
    }

    fn cmd_push_constants(&self, buffer: vk::CommandBuffer, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_push_constants(buffer, layout, stages, 0, data) };
        }
    }

    fn cmd_draw_indexed(&self, buffer: vk::CommandBuffer, index_count: u32) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.cmd_draw_indexed(buffer, index_count, 1, 0, 0, 0) };
        }
    }

    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        if let Ok(t) = self.dev() {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
            unsafe { t.device.cmd_copy_buffer(buffer, src, dst, &[region]) };
        }
    }

    fn cmd_copy_buffer_to_image(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]) {
        if let Ok(t) = self.dev() {
            unsafe {
                t.device.cmd_copy_buffer_to_image(buffer, src, dst, vk::ImageLayout::TRANSFER_DST_OPTIMAL, regions)
            };
        }
    }

    fn cmd_image_barrier(
        &self,
        buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: &vk::ImageMemoryBarrier,
    ) {
        if let Ok(t) = self.dev() {
            unsafe {
                t.device.cmd_pipeline_barrier(
                    buffer,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    std::slice::from_ref(barrier),
                )
            };
        }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::builder();
        let result = self.dev().and_then(|t| unsafe { t.device.create_semaphore(&info, None) });
        self.checked("vkCreateSemaphore", result)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        let result = self.dev().and_then(|t| unsafe { t.device.create_fence(&info, None) });
        self.checked("vkCreateFence", result)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        if let Ok(t) = self.dev() {
            unsafe { t.device.destroy_fence(fence, None) };
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.wait_for_fences(&[fence], true, timeout) });
        self.checked("vkWaitForFences", result)
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.reset_fences(&[fence]) });
        self.checked("vkResetFences", result)
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &vk::SubmitInfo, fence: vk::Fence) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe {
            t.device.queue_submit(queue, std::slice::from_ref(submit), fence)
        });
        self.checked("vkQueueSubmit", result)
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        let result = self.dev().and_then(|t| unsafe { t.device.queue_wait_idle(queue) });
        self.checked("vkQueueWaitIdle", result)
    }
}
