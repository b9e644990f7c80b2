//! 3x3 box blur over the raw occlusion buffer.
//!
//! Smooths out the banding the tiled noise rotation leaves behind. The
//! pass state is an ordinary [`Material`]: one sampled texture uniform,
//! re-pointed at the raw occlusion attachment after every resize.

use std::sync::Arc;

use crate::data_structures::geometry::Vertex;
use crate::data_structures::material::Material;
use crate::data_structures::texture::Texture;
use crate::pipelines::QuadVertex;
use crate::shader::{ShaderBuildError, ShaderProgram};

pub fn blur_program(device: &wgpu::Device) -> Result<Arc<ShaderProgram>, ShaderBuildError> {
    ShaderProgram::build(device, "ssao blur shader", include_str!("blur.wgsl"), 0)
}

pub fn mk_blur_material(program: Arc<ShaderProgram>, input: Arc<Texture>) -> Material {
    let mut material = Material::new(program);
    material.declare_texture("ssao_input", input);
    material
}

pub fn mk_blur_pipeline(
    device: &wgpu::Device,
    program: &ShaderProgram,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("SSAO Blur Pipeline Layout"),
        bind_group_layouts: &[Some(program.material_layout())],
        immediate_size: 0,
    });

    super::mk_render_pipeline(
        device,
        "SSAO Blur Pipeline",
        &layout,
        program.module(),
        &[QuadVertex::desc()],
        &[Some(wgpu::ColorTargetState {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })],
        None,
        None,
    )
}
