//! Core engine types

pub mod config;

pub use config::{
    ApplicationConfig, Config, ConfigError, EngineConfig, ShaderConfig, TextureConfig, VulkanRendererConfig,
    WindowConfig, MAX_FRAMES_IN_FLIGHT,
};
