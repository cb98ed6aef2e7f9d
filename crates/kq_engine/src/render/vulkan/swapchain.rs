//! Vulkan swapchain management
//!
//! Handles swapchain creation, recreation, and the per-image views and
//! framebuffers that live and die with it.

use super::framebuffer::{Framebuffer, ImageView};
use super::{DeviceConfig, SharedDriver, VkResultExt, VulkanError, VulkanResult};
use crate::render::window::WindowBackend;
use ash::prelude::VkResult;
use ash::vk;

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    driver: SharedDriver,
    // Views and framebuffers are dropped before the swapchain handle
    framebuffers: Vec<Framebuffer>,
    views: Vec<ImageView>,
    images: Vec<vk::Image>,
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    reallocations: usize,
}

impl Swapchain {
    /// Create a new swapchain with views for every image
    ///
    /// `config` must have had `ready_new_resolution` called with a drawable size.
    pub fn new(driver: SharedDriver, config: &DeviceConfig, surface: vk::SurfaceKHR) -> VulkanResult<Self> {
        let mut swapchain = Self {
            driver,
            framebuffers: Vec::new(),
            views: Vec::new(),
            images: Vec::new(),
            swapchain: vk::SwapchainKHR::null(),
            format: config.surface_format.format,
            extent: config.extent,
            reallocations: 0,
        };
        swapchain.create(config, surface)?;
        Ok(swapchain)
    }

    /// Build the swapchain, chaining the current handle as the old one
    ///
    /// The old handle is destroyed whether or not creation succeeds. The
    /// view and framebuffer arrays are reallocated only when the image
    /// count differs from the previous swapchain.
    pub fn create(&mut self, config: &DeviceConfig, surface: vk::SurfaceKHR) -> VulkanResult<()> {
        self.teardown();

        let old_swapchain = self.swapchain;
        let create_info = config.swapchain_info(surface, old_swapchain);
        let result = self.driver.create_swapchain(&create_info).check("vkCreateSwapchainKHR");
        if old_swapchain != vk::SwapchainKHR::null() {
            self.driver.destroy_swapchain(old_swapchain);
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.swapchain = result?;
        self.format = config.surface_format.format;
        self.extent = config.extent;

        let images = self.driver.swapchain_images(self.swapchain).check("vkGetSwapchainImagesKHR")?;
        if images.len() != self.images.len() {
            log::debug!("Swapchain image count {} -> {}", self.images.len(), images.len());
            self.views = Vec::with_capacity(images.len());
            self.framebuffers = Vec::with_capacity(images.len());
            self.reallocations += 1;
        }
        self.images = images;

        // A failure part way through drops the views made so far
        let mut views = std::mem::take(&mut self.views);
        for &image in &self.images {
            views.push(ImageView::new(
                self.driver.clone(),
                image,
                vk::ImageViewType::TYPE_2D,
                self.format,
                1,
            )?);
        }
        self.views = views;

        log::debug!(
            "Created swapchain: {} images, {}x{}",
            self.images.len(),
            self.extent.width,
            self.extent.height
        );
        Ok(())
    }

    /// Create one framebuffer per image view
    pub fn create_framebuffers(&mut self, render_pass: vk::RenderPass) -> VulkanResult<()> {
        let mut framebuffers = std::mem::take(&mut self.framebuffers);
        framebuffers.clear();
        for view in &self.views {
            framebuffers.push(Framebuffer::new(
                self.driver.clone(),
                render_pass,
                &[view.handle()],
                self.extent,
            )?);
        }
        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Destroy framebuffers and views, keeping the swapchain handle for chaining
    pub fn teardown(&mut self) {
        // Newest first; `clear` would release front to back
        while self.framebuffers.pop().is_some() {}
        while self.views.pop().is_some() {}
    }

    /// Rebuild for the window's current size
    ///
    /// Blocks on window events while the framebuffer has zero area. Returns
    /// [`VulkanError::WindowClosed`] if the window closes during that wait.
    pub fn recreate(
        &mut self,
        window: &mut dyn WindowBackend,
        config: &mut DeviceConfig,
        surface: vk::SurfaceKHR,
        render_pass: vk::RenderPass,
        physical_device: vk::PhysicalDevice,
        frames_in_flight: usize,
    ) -> VulkanResult<()> {
        let (mut width, mut height) = window.framebuffer_size();
        config.ready_new_resolution(width, height);
        while !config.has_drawable_size() {
            if window.should_close() {
                log::info!("Window closed while minimized");
                return Err(VulkanError::WindowClosed);
            }
            window.wait_events();
            (width, height) = window.framebuffer_size();
            config.ready_new_resolution(width, height);
        }

        self.driver.device_wait_idle().check("vkDeviceWaitIdle")?;

        let capabilities = self
            .driver
            .surface_capabilities(physical_device, surface)
            .check("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        config.update_capabilities(capabilities, frames_in_flight);
        config.ready_new_resolution(width, height);

        self.teardown();
        self.create(config, surface)?;
        self.create_framebuffers(render_pass)?;
        log::debug!("Swapchain recreated at {}x{}", self.extent.width, self.extent.height);
        Ok(())
    }

    /// Acquire the next image, signalling `semaphore` when it is ready
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VkResult<(u32, bool)> {
        self.driver.acquire_next_image(self.swapchain, u64::MAX, semaphore)
    }

    /// Present `image_index` once `wait_semaphore` is signalled
    pub fn present(&self, queue: vk::Queue, wait_semaphore: vk::Semaphore, image_index: u32) -> VkResult<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        self.driver.queue_present(queue, &present_info)
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get swapchain format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer for an acquired image
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Framebuffer::handle)
    }

    /// How many times the per-image arrays were reallocated
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.teardown();
        if self.swapchain != vk::SwapchainKHR::null() {
            self.driver.destroy_swapchain(self.swapchain);
        }
    }
}
