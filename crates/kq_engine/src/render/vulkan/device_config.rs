//! Device configuration builder
//!
//! Holds the fixed choices (surface format, present mode, clear colour) and the
//! values that become known as the session is built (surface capabilities,
//! queue layout, current extent). Create-info structs are produced on demand
//! and borrow from the builder, so nothing in here points at itself.

use super::{PhysicalDeviceInfo, QueueLayout};
use ash::vk;

/// Mutable configuration threaded through session setup
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Swapchain image format
    pub surface_format: vk::SurfaceFormatKHR,
    /// Chosen present mode
    pub present_mode: vk::PresentModeKHR,
    /// Swapchain composite alpha
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    /// Clear value for the colour attachment
    pub clear_color: [f32; 4],
    /// Surface capabilities, refreshed before each recreation
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    /// Graphics/present family mapping
    pub queue_layout: QueueLayout,
    /// Minimum swapchain image count requested from the driver
    pub min_image_count: u32,
    /// Size last requested by the window, before clamping
    pub requested_extent: vk::Extent2D,
    /// Clamped swapchain extent
    pub extent: vk::Extent2D,
    /// Full-extent viewport
    pub viewport: vk::Viewport,
    /// Full-extent scissor
    pub scissor: vk::Rect2D,
    sharing_families: Vec<u32>,
}

impl DeviceConfig {
    /// Build the configuration for a selected device
    pub fn new(physical: &PhysicalDeviceInfo, frames_in_flight: usize, prefer_mailbox: bool) -> Self {
        let present_mode = if prefer_mailbox && physical.present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            vk::PresentModeKHR::FIFO
        };
        log::debug!("Present mode: {:?}", present_mode);

        let mut config = Self {
            surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            present_mode,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            surface_capabilities: physical.surface_capabilities,
            queue_layout: physical.queue_layout,
            min_image_count: 0,
            requested_extent: vk::Extent2D::default(),
            extent: vk::Extent2D::default(),
            viewport: vk::Viewport::default(),
            scissor: vk::Rect2D::default(),
            sharing_families: physical.queue_layout.sharing_families(),
        };
        config.set_image_count(frames_in_flight);
        config
    }

    fn set_image_count(&mut self, frames_in_flight: usize) {
        let caps = &self.surface_capabilities;
        let mut count = caps.min_image_count + frames_in_flight.saturating_sub(1) as u32;
        if caps.max_image_count > 0 {
            count = count.min(caps.max_image_count);
        }
        self.min_image_count = count;
    }

    /// Replace the surface capabilities, keeping the image count policy
    pub fn update_capabilities(&mut self, capabilities: vk::SurfaceCapabilitiesKHR, frames_in_flight: usize) {
        self.surface_capabilities = capabilities;
        self.set_image_count(frames_in_flight);
    }

    /// Record a new window size and derive the swapchain extent from it
    ///
    /// Must run before every swapchain (re)creation. A zero-area request is
    /// recorded but not applied; the caller has to wait for a real size.
    pub fn ready_new_resolution(&mut self, width: u32, height: u32) {
        self.requested_extent = vk::Extent2D { width, height };
        if !self.has_drawable_size() {
            return;
        }

        let caps = &self.surface_capabilities;
        self.extent = vk::Extent2D {
            width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width.max(caps.min_image_extent.width)),
            height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height.max(caps.min_image_extent.height)),
        };
        self.viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };
        log::debug!("Resolution {}x{} -> extent {:?}", width, height, self.extent);
    }

    /// Whether the last requested size has a non-zero area
    pub fn has_drawable_size(&self) -> bool {
        self.requested_extent.width > 0 && self.requested_extent.height > 0
    }

    /// Swapchain create info for the current extent
    pub fn swapchain_info<'a>(
        &'a self,
        surface: vk::SurfaceKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> vk::SwapchainCreateInfoKHRBuilder<'a> {
        vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(self.min_image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(self.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(self.queue_layout.sharing_mode())
            .queue_family_indices(&self.sharing_families)
            .pre_transform(self.surface_capabilities.current_transform)
            .composite_alpha(self.composite_alpha)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain)
    }

    /// Clear value for the render pass
    pub fn clear_value(&self) -> vk::ClearValue {
        vk::ClearValue {
            color: vk::ClearColorValue { float32: self.clear_color },
        }
    }
}
