//! Shader modules and the tile graphics pipeline
//!
//! SPIR-V shader loading and graphics pipeline management following RAII patterns

use super::{DescriptorSetLayout, SharedDriver, VkResultExt, VulkanResult};
use crate::assets::ShaderBinary;
use crate::core::ShaderConfig;
use crate::render::frame::{QuadPushConstants, Vertex};
use ash::vk;
use std::ffi::CStr;
use std::mem::size_of;

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    driver: SharedDriver,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V words
    pub fn new(driver: SharedDriver, binary: &ShaderBinary) -> VulkanResult<Self> {
        let module = driver.create_shader_module(&binary.words).check("vkCreateShaderModule")?;
        Ok(Self { driver, module })
    }

    /// Load and create a shader module from a SPIR-V file
    pub fn from_file<P: AsRef<std::path::Path>>(driver: SharedDriver, path: P) -> VulkanResult<Self> {
        let binary = ShaderBinary::from_file(path)?;
        Self::new(driver, &binary)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Create shader stage create info
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        self.driver.destroy_shader_module(self.module);
    }
}

/// Pipeline layout wrapper with RAII cleanup
pub struct PipelineLayout {
    driver: SharedDriver,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// One descriptor set and one push-constant range
    pub fn new(
        driver: SharedDriver,
        set_layout: &DescriptorSetLayout,
        push_constant_range: vk::PushConstantRange,
    ) -> VulkanResult<Self> {
        let set_layouts = [set_layout.handle()];
        let push_constant_ranges = [push_constant_range];
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = driver.create_pipeline_layout(&create_info).check("vkCreatePipelineLayout")?;
        Ok(Self { driver, layout })
    }

    /// Get pipeline layout handle
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        self.driver.destroy_pipeline_layout(self.layout);
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    driver: SharedDriver,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Build the fixed-function tile pipeline for `render_pass`
    pub fn new(
        driver: SharedDriver,
        render_pass: vk::RenderPass,
        layout: &PipelineLayout,
        vertex: &ShaderModule,
        fragment: &ShaderModule,
    ) -> VulkanResult<Self> {
        let stages = [
            vertex.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = [Vertex::binding_description()];
        let attributes = Vertex::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only the counts are fixed
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();
        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass)
            .subpass(0);

        let pipeline = driver
            .create_graphics_pipeline(&create_info)
            .check("vkCreateGraphicsPipelines")?;
        Ok(Self { driver, pipeline })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.driver.destroy_pipeline(self.pipeline);
    }
}

/// The single pipeline the renderer draws tiles with
///
/// Shader modules only live for the duration of [`TilePipeline::new`].
pub struct TilePipeline {
    pipeline: GraphicsPipeline,
    layout: PipelineLayout,
}

impl TilePipeline {
    /// Stages that read the push constants
    pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags =
        vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

    /// Load the configured shaders and build layout and pipeline
    pub fn new(
        driver: SharedDriver,
        shaders: &ShaderConfig,
        render_pass: vk::RenderPass,
        set_layout: &DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let vertex = ShaderModule::from_file(driver.clone(), &shaders.vertex_shader_path)?;
        let fragment = ShaderModule::from_file(driver.clone(), &shaders.fragment_shader_path)?;

        let push_constant_range = vk::PushConstantRange {
            stage_flags: Self::PUSH_CONSTANT_STAGES,
            offset: 0,
            size: size_of::<QuadPushConstants>() as u32,
        };
        let layout = PipelineLayout::new(driver.clone(), set_layout, push_constant_range)?;
        let pipeline = GraphicsPipeline::new(driver, render_pass, &layout, &vertex, &fragment)?;

        log::debug!(
            "Created tile pipeline from {} and {}",
            shaders.vertex_shader_path,
            shaders.fragment_shader_path
        );
        Ok(Self { pipeline, layout })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    /// Get pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }
}
