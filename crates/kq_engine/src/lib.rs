//! # kq
//!
//! A minimal Vulkan renderer: one window, one pipeline and a frame loop that
//! draws textured quads from a two-layer texture array.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kq_engine::core::{ApplicationConfig, Config};
//! use kq_engine::render::Session;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::load_or_default("kq.toml")?;
//!     let mut session = Session::open(&config)?;
//!
//!     while !session.should_close() {
//!         session.poll_events();
//!         session.render_begin()?;
//!         session.draw_quad([-0.5, 0.0], [1.0, 1.0], 0)?;
//!         session.draw_quad([0.5, 0.0], [1.0, 1.0], 1)?;
//!         session.render_end()?;
//!     }
//!
//!     session.stop();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;


/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::{ApplicationConfig, Config, ShaderConfig, TextureConfig, VulkanRendererConfig, WindowConfig},
        foundation::time::Timer,
        render::{Session, VulkanError, VulkanResult, WindowBackend},
    };
}
