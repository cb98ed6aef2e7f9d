//! Descriptor set layout, pool and per-frame sets
//!
//! Binding 0 is the frame uniform buffer, binding 1 the tile texture array.

use super::{SharedDriver, VkResultExt, VulkanError, VulkanResult};
use ash::vk;

/// Descriptor set layout wrapper with RAII cleanup
pub struct DescriptorSetLayout {
    driver: SharedDriver,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Uniform buffer at binding 0, combined image sampler at binding 1
    pub fn new(driver: SharedDriver) -> VulkanResult<Self> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
        ];
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        let layout = driver
            .create_descriptor_set_layout(&create_info)
            .check("vkCreateDescriptorSetLayout")?;
        Ok(Self { driver, layout })
    }

    /// Get layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.driver.destroy_descriptor_set_layout(self.layout);
    }
}

/// Descriptor pool holding one set per frame in flight
///
/// Sets are freed together with the pool.
pub struct DescriptorPool {
    driver: SharedDriver,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorPool {
    /// Create a pool sized for `set_count` sets of the tile layout
    pub fn new(driver: SharedDriver, set_count: u32) -> VulkanResult<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: set_count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: set_count,
            },
        ];
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(set_count);

        let pool = driver.create_descriptor_pool(&create_info).check("vkCreateDescriptorPool")?;
        Ok(Self {
            driver,
            pool,
            sets: Vec::new(),
        })
    }

    /// Allocate one set per uniform buffer and point each at the texture
    pub fn allocate_sets(
        &mut self,
        layout: &DescriptorSetLayout,
        uniform_buffers: &[(vk::Buffer, vk::DeviceSize)],
        image_view: vk::ImageView,
        sampler: vk::Sampler,
    ) -> VulkanResult<()> {
        if !self.sets.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "descriptor sets already allocated".to_string(),
            });
        }

        let layouts = vec![layout.handle(); uniform_buffers.len()];
        let allocate_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let sets = self
            .driver
            .allocate_descriptor_sets(&allocate_info)
            .check("vkAllocateDescriptorSets")?;

        let image_info = [vk::DescriptorImageInfo {
            sampler,
            image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }];
        for (&set, &(buffer, range)) in sets.iter().zip(uniform_buffers) {
            let buffer_info = [vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            }];
            let writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info)
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info)
                    .build(),
            ];
            self.driver.update_descriptor_sets(&writes);
        }

        self.sets = sets;
        Ok(())
    }

    /// Set for a frame slot
    pub fn set(&self, frame: usize) -> Option<vk::DescriptorSet> {
        self.sets.get(frame).copied()
    }

    /// Number of allocated sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no sets have been allocated yet
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        self.driver.destroy_descriptor_pool(self.pool);
    }
}
