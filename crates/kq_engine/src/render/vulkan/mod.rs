//! Vulkan rendering backend
//!
//! RAII wrappers for every object the session creates. Each wrapper holds the
//! shared [`Driver`](driver::Driver) and destroys its handle on drop, so a
//! failure anywhere during initialization releases exactly the objects that
//! were created before it, in reverse order.

pub mod buffer;
pub mod commands;
pub mod descriptor;
pub mod device;
pub mod device_config;
pub mod driver;
pub mod framebuffer;
pub mod instance;
pub mod loader;
pub mod pipeline;
pub mod render_pass;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use buffer::{find_memory_type, Buffer, MappedBuffer, MemoryTypePolicy, MemoryTypes};
pub use commands::CommandPool;
pub use descriptor::{DescriptorPool, DescriptorSetLayout};
pub use device::{LogicalDevice, PhysicalDeviceInfo, QueueLayout};
pub use device_config::DeviceConfig;
pub use driver::{Driver, SharedDriver, VulkanDriver};
pub use framebuffer::{Framebuffer, ImageView};
pub use instance::{Surface, VulkanInstance};
pub use loader::{CapabilityLoader, LoaderStage};
pub use pipeline::{GraphicsPipeline, PipelineLayout, ShaderModule, TilePipeline};
pub use render_pass::RenderPass;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use texture::{transition_layout, transition_masks, TextureArray, TransitionMasks, TEXTURE_FORMAT};

use crate::assets::AssetError;
use crate::render::window::WindowError;
use ash::prelude::VkResult;
use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A driver call returned a failure code
    #[error("{call} failed: {result:?}")]
    Call {
        /// Vulkan entry point that failed
        call: &'static str,
        /// Result code it returned
        result: vk::Result,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Entry points could not be loaded for the current stage
    #[error("Vulkan loader failed")]
    LoaderFailed,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No physical device supports presenting to a swapchain
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// The selected device lacks a queue family for one role
    #[error("No {0} queue family found")]
    MissingQueueFamily(&'static str),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// An image layout transition with no known stage/access mapping
    #[error("Unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Layout the image is in
        old: vk::ImageLayout,
        /// Layout requested
        new: vk::ImageLayout,
    },

    /// The window was closed while the renderer waited for it to be restored
    #[error("Window closed while minimized")]
    WindowClosed,

    /// Shader or texture loading failed
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Window system failure
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Attach the failing entry point's name to a driver result
pub(crate) trait VkResultExt<T> {
    /// Convert to [`VulkanResult`], logging a failure with the call name
    fn check(self, call: &'static str) -> VulkanResult<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn check(self, call: &'static str) -> VulkanResult<T> {
        self.map_err(|result| {
            log::error!("{} failed: {:?}", call, result);
            VulkanError::Call { call, result }
        })
    }
}
