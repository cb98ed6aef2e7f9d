//! Rendering
//!
//! [`Session`] is the entry point: it opens the Vulkan objects for a window
//! and records textured quads frame by frame. The submodules hold the Vulkan
//! wrappers, the window capability and the data layouts shared with the
//! shaders.

pub mod frame;
pub mod session;
pub mod vulkan;
pub mod window;

pub use frame::{FrameUniforms, QuadPushConstants, Vertex};
pub use session::Session;
pub use vulkan::{VulkanError, VulkanResult};
pub use window::{GlfwWindow, WindowBackend, WindowError};
