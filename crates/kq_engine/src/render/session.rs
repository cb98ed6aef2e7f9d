//! Rendering session and frame orchestration
//!
//! A [`Session`] owns every GPU object the renderer uses, from the instance
//! down to the per-frame synchronization primitives. It is created in strict
//! dependency order by [`Session::init`]; when any step fails, the objects
//! built by earlier steps are released in reverse order as the partially
//! initialized locals go out of scope.
//!
//! Each frame is bracketed by [`Session::render_begin`] and
//! [`Session::render_end`], with any number of [`Session::draw_quad`] calls in
//! between:
//!
//! ```text
//! Idle --render_begin--> Recording --render_end--> Idle
//!                          |    ^
//!                          +----+ draw_quad
//! ```
//!
//! Calls made in the wrong state are rejected with
//! [`VulkanError::InvalidOperation`] before any driver call is issued.

use crate::core::ApplicationConfig;
use crate::foundation::time::Timer;
use crate::render::frame::{FrameUniforms, QuadPushConstants, QUAD_INDICES, QUAD_VERTICES};
use crate::render::vulkan::{
    Buffer, CapabilityLoader, CommandPool, DescriptorPool, DescriptorSetLayout, DeviceConfig, Fence, FrameSync,
    LogicalDevice, MappedBuffer, MemoryTypePolicy, MemoryTypes, PhysicalDeviceInfo, RenderPass, SharedDriver,
    Surface, Swapchain, TextureArray, TilePipeline, VkResultExt, VulkanDriver, VulkanError, VulkanInstance,
    VulkanResult,
};
use crate::render::window::{GlfwWindow, WindowBackend};
use ash::vk;
use std::mem::size_of;
use std::rc::Rc;

/// Objects created one after another and released newest first
struct ReleaseStack<T>(Vec<T>);

impl<T> ReleaseStack<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    fn push(&mut self, item: T) {
        self.0.push(item);
    }
}

impl<T> std::ops::Deref for ReleaseStack<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> std::ops::DerefMut for ReleaseStack<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.0
    }
}

impl<T> Drop for ReleaseStack<T> {
    fn drop(&mut self) {
        while self.0.pop().is_some() {}
    }
}

/// Rendering session over a window backend
pub struct Session<W: WindowBackend> {
    // Field order is drop order, the reverse of the order `init` creates
    // them in; the window outlives everything rendered into it.
    frame_sync: ReleaseStack<FrameSync>,
    descriptor_pool: DescriptorPool,
    uniforms: ReleaseStack<MappedBuffer>,
    texture: TextureArray,
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    // Freed with the pool
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    pipeline: TilePipeline,
    set_layout: DescriptorSetLayout,
    swapchain: Swapchain,
    render_pass: RenderPass,
    device: LogicalDevice,
    device_config: DeviceConfig,
    physical: PhysicalDeviceInfo,
    surface: Surface,
    instance: VulkanInstance,
    loader: CapabilityLoader,
    window: W,
    driver: SharedDriver,

    timer: Timer,
    current_frame: usize,
    image_index: u32,
    rendering: bool,
    fb_resized: bool,
    recreation_count: usize,
}

impl Session<GlfwWindow> {
    /// Open a GLFW window and bring up a session on the system Vulkan driver
    pub fn open(config: &ApplicationConfig) -> VulkanResult<Self> {
        let window = GlfwWindow::new(&config.window)?;
        let driver: SharedDriver = Rc::new(VulkanDriver::new());
        Self::init(config, window, driver)
    }
}

impl<W: WindowBackend> Session<W> {
    /// Create every session object in dependency order
    pub fn init(config: &ApplicationConfig, mut window: W, driver: SharedDriver) -> VulkanResult<Self> {
        config.validate().map_err(|reason| {
            log::error!("Invalid configuration: {}", reason);
            VulkanError::InitializationFailed(reason)
        })?;
        let renderer = &config.renderer;
        let frames_in_flight = renderer.max_frames_in_flight;

        let mut loader = CapabilityLoader::new(driver.clone());
        loader.refresh(vk::Instance::null(), vk::PhysicalDevice::null(), vk::Device::null())?;

        let instance = VulkanInstance::new(driver.clone(), &mut loader, &window, renderer)?;
        let surface = Surface::new(driver.clone(), &mut window, &instance)?;
        let physical = PhysicalDeviceInfo::select(&driver, &surface)?;

        let mut device_config = DeviceConfig::new(&physical, frames_in_flight, renderer.prefer_mailbox);
        let (width, height) = window.framebuffer_size();
        device_config.ready_new_resolution(width, height);
        if !device_config.has_drawable_size() {
            log::warn!("Window reports a {}x{} framebuffer, using the configured size", width, height);
            device_config.ready_new_resolution(config.window.width, config.window.height);
        }

        let device = LogicalDevice::new(driver.clone(), &mut loader, &instance, &physical)?;

        let render_pass = RenderPass::new_color_pass(driver.clone(), device_config.surface_format.format)?;
        let mut swapchain = Swapchain::new(driver.clone(), &device_config, surface.handle())?;
        swapchain.create_framebuffers(render_pass.handle())?;

        let set_layout = DescriptorSetLayout::new(driver.clone())?;
        let pipeline = TilePipeline::new(driver.clone(), &renderer.shaders, render_pass.handle(), &set_layout)?;

        let command_pool = CommandPool::new(driver.clone(), physical.queue_layout.graphics_family())?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;

        let memory_types = MemoryTypes::new(physical.memory_properties, MemoryTypePolicy::Strict);
        let vertex_buffer = Buffer::device_local_with_data(
            driver.clone(),
            &memory_types,
            &command_pool,
            device.graphics_queue,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &QUAD_VERTICES[..],
        )?;
        let index_buffer = Buffer::device_local_with_data(
            driver.clone(),
            &memory_types,
            &command_pool,
            device.graphics_queue,
            vk::BufferUsageFlags::INDEX_BUFFER,
            &QUAD_INDICES[..],
        )?;
        let texture = TextureArray::load(
            driver.clone(),
            &memory_types,
            &command_pool,
            device.graphics_queue,
            &renderer.textures,
        )?;

        let mut uniforms = ReleaseStack::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            uniforms.push(MappedBuffer::new(
                driver.clone(),
                &memory_types,
                size_of::<FrameUniforms>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?);
        }

        let mut descriptor_pool = DescriptorPool::new(driver.clone(), frames_in_flight as u32)?;
        let uniform_ranges: Vec<(vk::Buffer, vk::DeviceSize)> =
            uniforms.iter().map(|buffer| (buffer.handle(), buffer.size())).collect();
        descriptor_pool.allocate_sets(&set_layout, &uniform_ranges, texture.view(), texture.sampler())?;

        let mut frame_sync = ReleaseStack::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            frame_sync.push(FrameSync::new(driver.clone())?);
        }

        // Size changes seen during setup are already reflected in the swapchain
        window.take_resize();

        log::info!(
            "Session ready on {}: {} frames in flight, {} swapchain images at {}x{}",
            physical.name,
            frame_sync.len(),
            swapchain.image_count(),
            swapchain.extent().width,
            swapchain.extent().height
        );

        Ok(Self {
            frame_sync,
            descriptor_pool,
            uniforms,
            texture,
            index_buffer,
            vertex_buffer,
            command_buffers,
            command_pool,
            pipeline,
            set_layout,
            swapchain,
            render_pass,
            device,
            device_config,
            physical,
            surface,
            instance,
            loader,
            window,
            driver,
            timer: Timer::new(),
            current_frame: 0,
            image_index: 0,
            rendering: false,
            fb_resized: false,
            recreation_count: 0,
        })
    }

    /// Wait for the device and release everything in reverse creation order
    pub fn stop(self) {
        log::info!(
            "Stopping session after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        drop(self);
    }

    /// Start recording the next frame
    ///
    /// Waits for the current slot's previous submission, rebuilds the
    /// swapchain if a resize is pending and acquires an image. A stale
    /// swapchain during acquisition is rebuilt and acquisition retried.
    pub fn render_begin(&mut self) -> VulkanResult<()> {
        if self.rendering {
            return Err(VulkanError::InvalidOperation {
                reason: "render_begin called while a frame is being recorded".to_string(),
            });
        }

        let slot = self.current_frame;
        self.frame_sync[slot].in_flight.wait(u64::MAX)?;

        if self.window.take_resize().is_some() {
            self.fb_resized = true;
        }
        if self.fb_resized {
            self.recreate_swapchain()?;
        }

        let image_index = loop {
            let semaphore = self.frame_sync[slot].image_available.handle();
            match self.swapchain.acquire_next_image(semaphore) {
                Ok((index, suboptimal)) => {
                    if suboptimal {
                        log::debug!("Acquired image {} from a suboptimal swapchain", index);
                    }
                    break index;
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    log::debug!("Swapchain out of date during acquire");
                    self.recreate_swapchain()?;
                }
                Err(result) => {
                    log::error!("vkAcquireNextImageKHR failed: {:?}", result);
                    return Err(VulkanError::Call {
                        call: "vkAcquireNextImageKHR",
                        result,
                    });
                }
            }
        };

        let framebuffer = self
            .swapchain
            .framebuffer(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for swapchain image {}", image_index),
            })?;
        let descriptor_set = self
            .descriptor_pool
            .set(slot)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no descriptor set for frame {}", slot),
            })?;

        // The fence stays signalled until submission, so a failure from here
        // on leaves the slot reusable
        let command_buffer = self.command_buffers[slot];
        self.driver
            .reset_command_buffer(command_buffer)
            .check("vkResetCommandBuffer")?;

        self.timer.update();
        self.uniforms[slot].write(&FrameUniforms::new(self.timer.total_time()))?;

        let begin_info = vk::CommandBufferBeginInfo::builder();
        self.driver
            .begin_command_buffer(command_buffer, &begin_info)
            .check("vkBeginCommandBuffer")?;

        let clear_values = [self.device_config.clear_value()];
        let render_pass_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .clear_values(&clear_values);

        self.driver.cmd_begin_render_pass(command_buffer, &render_pass_info);
        self.driver.cmd_bind_pipeline(command_buffer, self.pipeline.handle());
        self.driver.cmd_set_viewport(command_buffer, &self.device_config.viewport);
        self.driver.cmd_set_scissor(command_buffer, &self.device_config.scissor);
        self.driver.cmd_bind_vertex_buffer(command_buffer, self.vertex_buffer.handle());
        self.driver
            .cmd_bind_index_buffer(command_buffer, self.index_buffer.handle(), vk::IndexType::UINT16);
        self.driver
            .cmd_bind_descriptor_set(command_buffer, self.pipeline.layout(), descriptor_set);

        self.image_index = image_index;
        self.rendering = true;
        Ok(())
    }

    /// Record one textured quad
    ///
    /// `texture_index` selects the texture array layer.
    pub fn draw_quad(&self, position: [f32; 2], scale: [f32; 2], texture_index: u32) -> VulkanResult<()> {
        if !self.rendering {
            return Err(VulkanError::InvalidOperation {
                reason: "draw_quad called outside render_begin/render_end".to_string(),
            });
        }
        if texture_index >= self.texture.layers() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture index {} out of range for {} layers",
                    texture_index,
                    self.texture.layers()
                ),
            });
        }

        let command_buffer = self.command_buffers[self.current_frame];
        let constants = QuadPushConstants::new(position, scale, texture_index);
        self.driver.cmd_push_constants(
            command_buffer,
            self.pipeline.layout(),
            TilePipeline::PUSH_CONSTANT_STAGES,
            bytemuck::bytes_of(&constants),
        );
        self.driver.cmd_draw_indexed(command_buffer, QUAD_INDICES.len() as u32);
        Ok(())
    }

    /// Finish recording, submit and present, then advance to the next slot
    ///
    /// A stale or suboptimal swapchain reported by presentation is rebuilt
    /// and the frame still counts as presented.
    pub fn render_end(&mut self) -> VulkanResult<()> {
        if !self.rendering {
            return Err(VulkanError::InvalidOperation {
                reason: "render_end called without render_begin".to_string(),
            });
        }
        self.rendering = false;

        let slot = self.current_frame;
        let command_buffer = self.command_buffers[slot];
        let sync = &self.frame_sync[slot];
        let image_available = sync.image_available.handle();
        let render_finished = sync.render_finished.handle();
        let in_flight = sync.in_flight.handle();

        self.driver.cmd_end_render_pass(command_buffer);
        self.driver
            .end_command_buffer(command_buffer)
            .check("vkEndCommandBuffer")?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        self.frame_sync[slot].in_flight.reset()?;
        if let Err(err) = self
            .driver
            .queue_submit(self.device.graphics_queue, &submit_info, in_flight)
            .check("vkQueueSubmit")
        {
            // Nothing will signal the reset fence; swap in a signalled one
            match Fence::new(self.driver.clone(), true) {
                Ok(fence) => self.frame_sync[slot].in_flight = fence,
                Err(e) => log::error!("Could not replace fence for frame {}: {}", slot, e),
            }
            return Err(err);
        }

        let result = match self
            .swapchain
            .present(self.device.present_queue, render_finished, self.image_index)
        {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain stale after present");
                self.recreate_swapchain()
            }
            Err(result) => {
                log::error!("vkQueuePresentKHR failed: {:?}", result);
                Err(VulkanError::Call {
                    call: "vkQueuePresentKHR",
                    result,
                })
            }
        };

        self.current_frame = (slot + 1) % self.frame_sync.len();
        result
    }

    /// Flag a framebuffer size change for callers running their own event loop
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        log::debug!("Framebuffer resized to {}x{}", width, height);
        self.fb_resized = true;
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<()> {
        self.swapchain.recreate(
            &mut self.window,
            &mut self.device_config,
            self.surface.handle(),
            self.render_pass.handle(),
            self.physical.device,
            self.frame_sync.len(),
        )?;

        // Every resize up to now is covered by this swapchain
        self.window.take_resize();
        self.fb_resized = false;
        self.recreation_count += 1;

        let extent = self.swapchain.extent();
        log::info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Process pending window events without blocking
    pub fn poll_events(&mut self) {
        self.window.poll_events();
    }

    /// Whether the window has been asked to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Frame slot the next `render_begin` will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Swapchain image acquired by the last `render_begin`
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Whether a frame is being recorded
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Extent of the current swapchain images
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Number of swapchain rebuilds since init
    pub fn recreation_count(&self) -> usize {
        self.recreation_count
    }

    /// Entry-point version the driver reported at the device stage
    pub fn api_version(&self) -> u32 {
        self.loader.version()
    }

    /// Whether validation messages are routed to the log
    pub fn has_debug_messenger(&self) -> bool {
        self.instance.has_debug_messenger()
    }

    /// Frame timer, updated once per `render_begin`
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Window the session renders into
    pub fn window(&self) -> &W {
        &self.window
    }

    /// Mutable access to the window, for input and resize handling
    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }
}

impl<W: WindowBackend> Drop for Session<W> {
    fn drop(&mut self) {
        log::debug!("Waiting for device idle before teardown");
        if let Err(e) = self.device.wait_idle() {
            log::warn!("Device wait before teardown failed: {}", e);
        }
    }
}
