//! # Renderer Configuration
//!
//! Typed configuration for the window, the Vulkan session and the assets it
//! reads at startup. Every default reproduces the renderer's built-in
//! constants, so an application that never touches a config file gets an
//! 800x600 window drawing the two 64x64 tile textures.
//!
//! Files are loaded through the [`Config`] trait in either TOML or RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Upper bound on frames in flight accepted by [`VulkanRendererConfig::validate`]
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Initial framebuffer width in pixels
    pub width: u32,
    /// Initial framebuffer height in pixels
    pub height: u32,
    /// Window title
    pub title: String,
    /// Whether the window can be resized by the user
    pub resizable: bool,
}

impl WindowConfig {
    /// Create a window configuration
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Self {
        Self {
            width,
            height,
            title: title.into(),
            resizable: true,
        }
    }

    /// Set whether the window is resizable
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new(800, 600, "kq")
    }
}

/// # Shader Configuration
///
/// Paths of the precompiled SPIR-V binaries for the tile pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex_shader_path));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment_shader_path));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("shaders/tile.vert.spv", "shaders/tile.frag.spv")
    }
}

/// # Texture Configuration
///
/// One PNG per texture-array layer. Every image must decode to exactly
/// `width` x `height` RGBA pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureConfig {
    /// PNG paths, in array-layer order
    pub layers: Vec<String>,
    /// Expected width of every layer
    pub width: u32,
    /// Expected height of every layer
    pub height: u32,
}

impl TextureConfig {
    /// Create a texture configuration
    pub fn new(layers: Vec<String>, width: u32, height: u32) -> Self {
        Self { layers, width, height }
    }

    /// Validate layer count, dimensions and that every file exists
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("At least one texture layer is required".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err(format!("Texture size {}x{} is empty", self.width, self.height));
        }
        for layer in &self.layers {
            if !Path::new(layer).exists() {
                return Err(format!("Texture not found: {}", layer));
            }
        }
        Ok(())
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self::new(
            vec!["textures/tile0.png".to_string(), "textures/tile1.png".to_string()],
            64,
            64,
        )
    }
}

/// # Vulkan Renderer Configuration
///
/// Configuration specific to the Vulkan session: application metadata for
/// instance creation, asset paths, frames in flight and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulkanRendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Number of frame slots recorded ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers (auto-detected when `None`)
    pub enable_validation: Option<bool>,
    /// Whether the present mode may be MAILBOX when the surface offers it
    pub prefer_mailbox: bool,
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Texture array configuration
    pub textures: TextureConfig,
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            max_frames_in_flight: 2,
            enable_validation: None,
            prefer_mailbox: true,
            shaders: ShaderConfig::default(),
            textures: TextureConfig::default(),
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set custom texture configuration
    pub fn with_textures(mut self, textures: TextureConfig) -> Self {
        self.textures = textures;
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation resolves on for this build
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Check the name and frames-in-flight bounds without touching the file system
    pub fn check_limits(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.max_frames_in_flight == 0 {
            return Err("Max frames in flight must be at least 1".to_string());
        }

        if self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(format!("Max frames in flight must not exceed {}", MAX_FRAMES_IN_FLIGHT));
        }

        Ok(())
    }

    /// Validate the configuration, including that every asset exists
    pub fn validate(&self) -> Result<(), String> {
        self.check_limits()?;
        self.shaders.validate()?;
        self.textures.validate()?;

        Ok(())
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new("kq")
    }
}

/// # Engine Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: if cfg!(debug_assertions) { "debug" } else { "info" }.to_string(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration an application hands to the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering system configuration
    pub renderer: VulkanRendererConfig,
    /// Window configuration
    pub window: WindowConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.check()?;
        self.renderer.validate()
    }
}

impl Config for ApplicationConfig {
    fn check(&self) -> Result<(), String> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err("Window size cannot be zero".to_string());
        }
        self.renderer.check_limits()
    }
}
