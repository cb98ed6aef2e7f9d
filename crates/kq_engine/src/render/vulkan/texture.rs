//! Tile texture array
//!
//! All layers are decoded up front, packed into one staging buffer and copied
//! into a device-local array image between two layout transitions.

use super::buffer::allocate_memory;
use super::framebuffer::ImageView;
use super::{Buffer, CommandPool, MemoryTypes, SharedDriver, VkResultExt, VulkanError, VulkanResult};
use crate::assets::ImageData;
use crate::core::TextureConfig;
use ash::vk;

/// Texel format of every layer
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Access masks and pipeline stages for a supported layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    /// Writes that must be available before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage blocked until the barrier completes
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier masks for the two transitions a texture upload needs
///
/// Any other pair is rejected.
pub fn transition_masks(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        _ => {
            log::error!("Unsupported layout transition {:?} -> {:?}", old, new);
            Err(VulkanError::UnsupportedLayoutTransition { old, new })
        }
    }
}

/// Image plus its bound memory
struct DeviceImage {
    driver: SharedDriver,
    image: vk::Image,
    memory: vk::DeviceMemory,
}

impl DeviceImage {
    fn new(
        driver: SharedDriver,
        memory_types: &MemoryTypes,
        extent: vk::Extent2D,
        layers: u32,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(layers)
            .format(format)
            .tiling(tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = driver.create_image(&image_info).check("vkCreateImage")?;
        let mut result = Self {
            driver,
            image,
            memory: vk::DeviceMemory::null(),
        };

        let requirements = result.driver.image_memory_requirements(image);
        result.memory = allocate_memory(&result.driver, memory_types, requirements, properties)?;
        result
            .driver
            .bind_image_memory(image, result.memory)
            .check("vkBindImageMemory")?;
        Ok(result)
    }
}

impl Drop for DeviceImage {
    fn drop(&mut self) {
        self.driver.destroy_image(self.image);
        if self.memory != vk::DeviceMemory::null() {
            self.driver.free_memory(self.memory);
        }
    }
}

/// Sampler wrapper with RAII cleanup
struct Sampler {
    driver: SharedDriver,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Nearest filtering, clamped at the edges
    fn nearest_clamped(driver: SharedDriver) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = driver.create_sampler(&create_info).check("vkCreateSampler")?;
        Ok(Self { driver, sampler })
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.driver.destroy_sampler(self.sampler);
    }
}

/// Layered tile texture sampled by the fragment shader
pub struct TextureArray {
    // Field order is drop order
    sampler: Sampler,
    view: ImageView,
    image: DeviceImage,
    extent: vk::Extent2D,
    layers: u32,
}

impl TextureArray {
    /// Decode every configured layer and upload them as one array image
    pub fn load(
        driver: SharedDriver,
        memory_types: &MemoryTypes,
        command_pool: &CommandPool,
        queue: vk::Queue,
        config: &TextureConfig,
    ) -> VulkanResult<Self> {
        let images = config
            .layers
            .iter()
            .map(|path| ImageData::load_exact(path, config.width, config.height))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_images(driver, memory_types, command_pool, queue, &images)
    }

    /// Upload already decoded RGBA8 layers of equal size
    pub fn from_images(
        driver: SharedDriver,
        memory_types: &MemoryTypes,
        command_pool: &CommandPool,
        queue: vk::Queue,
        images: &[ImageData],
    ) -> VulkanResult<Self> {
        let first = images.first().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "texture array needs at least one layer".to_string(),
        })?;
        let extent = vk::Extent2D {
            width: first.width,
            height: first.height,
        };
        let layer_size = first.size_bytes();
        if images.iter().any(|i| i.width != extent.width || i.height != extent.height) {
            return Err(VulkanError::InvalidOperation {
                reason: "texture layers differ in size".to_string(),
            });
        }
        let layers = images.len() as u32;

        let pixels: Vec<u8> = images.iter().flat_map(|i| i.data.iter().copied()).collect();
        let staging = Buffer::new(
            driver.clone(),
            memory_types,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(&pixels)?;

        let image = DeviceImage::new(
            driver.clone(),
            memory_types,
            extent,
            layers,
            TEXTURE_FORMAT,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        transition_layout(
            &driver,
            command_pool,
            queue,
            image.image,
            layers,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;

        let regions: Vec<vk::BufferImageCopy> = (0..layers)
            .map(|layer| vk::BufferImageCopy {
                buffer_offset: (layer as usize * layer_size) as vk::DeviceSize,
                buffer_row_length: 0,
                buffer_image_height: 0,
                image_subresource: vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: layer,
                    layer_count: 1,
                },
                image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                image_extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
            })
            .collect();
        command_pool.submit_once(queue, |command_buffer| {
            driver.cmd_copy_buffer_to_image(command_buffer, staging.handle(), image.image, &regions);
            Ok(())
        })?;

        transition_layout(
            &driver,
            command_pool,
            queue,
            image.image,
            layers,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let view = ImageView::new(driver.clone(), image.image, vk::ImageViewType::TYPE_2D_ARRAY, TEXTURE_FORMAT, layers)?;
        let sampler = Sampler::nearest_clamped(driver)?;

        log::debug!("Uploaded {} texture layers of {}x{}", layers, extent.width, extent.height);
        Ok(Self {
            sampler,
            view,
            image,
            extent,
            layers,
        })
    }

    /// Get image handle
    pub fn image(&self) -> vk::Image {
        self.image.image
    }

    /// Get array view handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Get sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.sampler
    }

    /// Size of each layer
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of layers
    pub fn layers(&self) -> u32 {
        self.layers
    }
}

/// Move every layer of `image` from `old` to `new` with a one-shot barrier
pub fn transition_layout(
    driver: &SharedDriver,
    command_pool: &CommandPool,
    queue: vk::Queue,
    image: vk::Image,
    layers: u32,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<()> {
    let masks = transition_masks(old, new)?;
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: layers,
        })
        .src_access_mask(masks.src_access)
        .dst_access_mask(masks.dst_access)
        .build();

    command_pool.submit_once(queue, |command_buffer| {
        driver.cmd_image_barrier(command_buffer, masks.src_stage, masks.dst_stage, &barrier);
        Ok(())
    })
}
