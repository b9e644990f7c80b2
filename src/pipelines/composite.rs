//! Final composite: the scene image multiplied by the blurred occlusion.

use std::sync::Arc;

use crate::data_structures::geometry::Vertex;
use crate::data_structures::material::Material;
use crate::data_structures::texture::Texture;
use crate::pipelines::QuadVertex;
use crate::shader::{ShaderBuildError, ShaderProgram};

pub fn composite_program(device: &wgpu::Device) -> Result<Arc<ShaderProgram>, ShaderBuildError> {
    ShaderProgram::build(
        device,
        "ssao composite shader",
        include_str!("composite.wgsl"),
        0,
    )
}

pub fn mk_composite_material(
    program: Arc<ShaderProgram>,
    scene: Arc<Texture>,
    occlusion: Arc<Texture>,
) -> Material {
    let mut material = Material::new(program);
    material.declare_texture("scene_texture", scene);
    material.declare_texture("ssao_blur_texture", occlusion);
    material
}

pub fn mk_composite_pipeline(
    device: &wgpu::Device,
    program: &ShaderProgram,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("SSAO Composite Pipeline Layout"),
        bind_group_layouts: &[Some(program.material_layout())],
        immediate_size: 0,
    });

    super::mk_render_pipeline(
        device,
        "SSAO Composite Pipeline",
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
