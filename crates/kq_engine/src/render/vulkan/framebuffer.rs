//! Image views and framebuffers
//!
//! Handles creation and destruction following RAII principles

use super::{SharedDriver, VkResultExt, VulkanResult};
use ash::vk;

/// Image view wrapper with RAII cleanup
pub struct ImageView {
    driver: SharedDriver,
    view: vk::ImageView,
}

impl ImageView {
    /// Create a colour view over `layer_count` layers of `image`
    pub fn new(
        driver: SharedDriver,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        layer_count: u32,
    ) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(view_type)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count,
            });

        let view = driver.create_image_view(&create_info).check("vkCreateImageView")?;
        Ok(Self { driver, view })
    }

    /// Get the image view handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        self.driver.destroy_image_view(self.view);
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    driver: SharedDriver,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        driver: SharedDriver,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = driver.create_framebuffer(&create_info).check("vkCreateFramebuffer")?;
        Ok(Self { driver, framebuffer })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.driver.destroy_framebuffer(self.framebuffer);
    }
}
