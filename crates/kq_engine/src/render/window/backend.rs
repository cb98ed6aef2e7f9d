//! Backend-agnostic window trait

use super::WindowResult;
use ash::vk;

/// Window operations the Vulkan session depends on
///
/// Window operations happen on the main thread, so implementations are not
/// required to be `Send`.
pub trait WindowBackend {
    /// Check if the window should close
    fn should_close(&self) -> bool;

    /// Set whether the window should close
    fn set_should_close(&mut self, should_close: bool);

    /// Process pending events without blocking
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then process it
    ///
    /// Used while the window is minimized, where a swapchain cannot be built.
    fn wait_events(&mut self);

    /// Current framebuffer size in pixels; `(0, 0)` while minimized
    fn framebuffer_size(&self) -> (u32, u32);

    /// Instance extensions the window system needs to create a surface
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Create a presentation surface for `instance`
    ///
    /// The caller owns the returned surface and destroys it through the driver.
    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR>;

    /// Take the latest framebuffer size reported since the last call
    ///
    /// Any number of resize events between two calls collapse into one.
    fn take_resize(&mut self) -> Option<(u32, u32)>;
}
