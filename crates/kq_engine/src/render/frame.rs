//! Per-frame data layouts shared with the tile shaders

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem::{offset_of, size_of};

/// Quad vertex: clip-space position and texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Clip-space position before the per-draw offset and scale
    pub position: [f32; 2],
    /// Texture coordinate
    pub uv: [f32; 2],
}

impl Vertex {
    /// Binding description for a tightly packed vertex buffer at binding 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position at location 0, uv at location 1
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, uv) as u32,
            },
        ]
    }
}

/// The unit quad every tile is drawn from
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-0.25, -0.25], uv: [0.0, 0.0] },
    Vertex { position: [0.25, -0.25], uv: [1.0, 0.0] },
    Vertex { position: [0.25, 0.25], uv: [1.0, 1.0] },
    Vertex { position: [-0.25, 0.25], uv: [0.0, 1.0] },
];

/// Two triangles over [`QUAD_VERTICES`]
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Uniform block at binding 0, padded to std140 size
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Seconds since the session started
    pub time: f32,
    _pad: [f32; 3],
}

impl FrameUniforms {
    /// Uniforms for a frame `time` seconds into the session
    pub fn new(time: f32) -> Self {
        Self { time, _pad: [0.0; 3] }
    }
}

/// Per-draw push constants
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct QuadPushConstants {
    /// Clip-space offset of the quad centre
    pub position: [f32; 2],
    /// Per-axis scale applied to the unit quad
    pub scale: [f32; 2],
    /// Texture array layer, as a float for the shader
    pub texture_index: f32,
}

impl QuadPushConstants {
    /// Constants for one tile drawn from array layer `texture_index`
    pub fn new(position: [f32; 2], scale: [f32; 2], texture_index: u32) -> Self {
        Self {
            position,
            scale,
            texture_index: texture_index as f32,
        }
    }
}
