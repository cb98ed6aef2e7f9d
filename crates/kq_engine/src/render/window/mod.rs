//! Windowing capability
//!
//! The session only needs a handful of operations from the window system;
//! they are collected in [`WindowBackend`]. [`GlfwWindow`] is the production
//! backend.

mod backend;
mod glfw_window;


pub use backend::WindowBackend;
pub use glfw_window::GlfwWindow;

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialised
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The window system cannot report the instance extensions Vulkan needs
    #[error("Vulkan is not supported by the window system")]
    VulkanUnsupported,

    /// Surface creation returned an error
    #[error("Failed to create Vulkan surface: {0:?}")]
    SurfaceCreation(ash::vk::Result),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;
