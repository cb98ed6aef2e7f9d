//! Buffer management and memory-type selection
//!
//! Every allocation follows the same steps: create the handle, query its
//! memory requirements, pick a compatible memory type, allocate, bind.
//! Device-local data goes through a host-visible staging buffer.

use super::{CommandPool, SharedDriver, VkResultExt, VulkanError, VulkanResult};
use ash::vk;
use bytemuck::Pod;
use std::ffi::c_void;

/// What to do when no memory type satisfies a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemoryTypePolicy {
    /// Fail with [`VulkanError::NoSuitableMemoryType`]
    #[default]
    Strict,
    /// Log an error and use memory type 0
    FallbackToFirst,
}

/// Device memory types plus the policy for unmatched requests
#[derive(Clone, Copy)]
pub struct MemoryTypes {
    properties: vk::PhysicalDeviceMemoryProperties,
    policy: MemoryTypePolicy,
}

impl MemoryTypes {
    /// Wrap the device's memory properties with an unmatched-request policy
    pub fn new(properties: vk::PhysicalDeviceMemoryProperties, policy: MemoryTypePolicy) -> Self {
        Self { properties, policy }
    }

    /// Index of a type allowed by `type_bits` that has every `required` flag
    pub fn find(&self, type_bits: u32, required: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        find_memory_type(&self.properties, type_bits, required, self.policy)
    }

    /// Policy applied when nothing matches
    pub fn policy(&self) -> MemoryTypePolicy {
        self.policy
    }
}

/// Find a suitable memory type index
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
    policy: MemoryTypePolicy,
) -> VulkanResult<u32> {
    let count = properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    let found = (0..count).find(|&i| {
        type_bits & (1 << i) != 0 && properties.memory_types[i as usize].property_flags.contains(required)
    });

    match (found, policy) {
        (Some(index), _) => Ok(index),
        (None, MemoryTypePolicy::Strict) => {
            log::error!("No memory type for bits {:#b} with {:?}", type_bits, required);
            Err(VulkanError::NoSuitableMemoryType)
        }
        (None, MemoryTypePolicy::FallbackToFirst) => {
            log::error!(
                "No memory type for bits {:#b} with {:?}, falling back to type 0",
                type_bits,
                required
            );
            Ok(0)
        }
    }
}

/// Allocate memory that satisfies `requirements`
pub(crate) fn allocate_memory(
    driver: &SharedDriver,
    memory_types: &MemoryTypes,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = memory_types.find(requirements.memory_type_bits, properties)?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);
    driver.allocate_memory(&alloc_info).check("vkAllocateMemory")
}

/// Vulkan buffer wrapper with RAII cleanup
pub struct Buffer {
    driver: SharedDriver,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer with its own bound memory
    pub fn new(
        driver: SharedDriver,
        memory_types: &MemoryTypes,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = driver.create_buffer(&buffer_info).check("vkCreateBuffer")?;
        let mut result = Self {
            driver,
            buffer,
            memory: vk::DeviceMemory::null(),
            size,
        };

        let requirements = result.driver.buffer_memory_requirements(buffer);
        result.memory = allocate_memory(&result.driver, memory_types, requirements, properties)?;
        result
            .driver
            .bind_buffer_memory(buffer, result.memory)
            .check("vkBindBufferMemory")?;

        Ok(result)
    }

    /// Create a device-local buffer holding `data`, uploaded through staging
    pub fn device_local_with_data<T: Pod>(
        driver: SharedDriver,
        memory_types: &MemoryTypes,
        command_pool: &CommandPool,
        queue: vk::Queue,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let size = bytes.len() as vk::DeviceSize;

        let staging = Self::new(
            driver.clone(),
            memory_types,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytes)?;

        let destination = Self::new(
            driver.clone(),
            memory_types,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        command_pool.submit_once(queue, |command_buffer| {
            driver.cmd_copy_buffer(command_buffer, staging.handle(), destination.handle(), size);
            Ok(())
        })?;

        log::trace!("Uploaded {} bytes to device-local buffer", size);
        Ok(destination)
    }

    /// Map, copy `bytes` to the start of the buffer, unmap
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes into a {} byte buffer", bytes.len(), self.size),
            });
        }
        let mapped = self
            .driver
            .map_memory(self.memory, 0, self.size)
            .check("vkMapMemory")?;
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
        }
        self.driver.unmap_memory(self.memory);
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get backing memory handle
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Get buffer size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.driver.destroy_buffer(self.buffer);
        if self.memory != vk::DeviceMemory::null() {
            self.driver.free_memory(self.memory);
        }
    }
}

/// Host-visible buffer that stays mapped for its whole life
///
/// Used for per-frame uniforms: writes are visible to the device without
/// remapping because the memory is coherent.
pub struct MappedBuffer {
    buffer: Buffer,
    mapped: *mut c_void,
}

impl MappedBuffer {
    /// Create and map a host-visible, coherent buffer
    pub fn new(
        driver: SharedDriver,
        memory_types: &MemoryTypes,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            driver,
            memory_types,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let mapped = buffer
            .driver
            .map_memory(buffer.memory, 0, size)
            .check("vkMapMemory")?;
        Ok(Self { buffer, mapped })
    }

    /// Copy `value` to the start of the mapping
    pub fn write<T: Pod>(&self, value: &T) -> VulkanResult<()> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() as vk::DeviceSize > self.buffer.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes into a {} byte mapping", bytes.len(), self.buffer.size),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.cast::<u8>(), bytes.len());
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Get buffer size
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl Drop for MappedBuffer {
    fn drop(&mut self) {
        self.buffer.driver.unmap_memory(self.buffer.memory);
    }
}
