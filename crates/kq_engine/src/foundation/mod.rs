//! Foundation module - Core utilities shared by the renderer
//!
//! - Logging setup
//! - Frame timing

pub mod logging;
pub mod time;
