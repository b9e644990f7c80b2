use crate::data_structures::geometry::{MeshVertex, Vertex};
use crate::data_structures::texture::Texture;
use crate::data_structures::transform::TransformRaw;
use crate::shader::{ShaderBuildError, ShaderProgram};
use crate::targets::RenderTargets;

use std::sync::Arc;

/// Build the G-buffer program. The geometry pass has no material uniforms,
/// so the reflected material group is empty.
pub fn geometry_program(device: &wgpu::Device) -> Result<Arc<ShaderProgram>, ShaderBuildError> {
    ShaderProgram::build(
        device,
        "gbuffer shader",
        include_str!("geometry.wgsl"),
        1,
    )
}

/// Pipeline for the geometry pass: writes view-space position and normal
/// into the two G-buffer color attachments, nothing else.
pub fn mk_geometry_pipeline(
    device: &wgpu::Device,
    program: &ShaderProgram,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("GBuffer Pipeline Layout"),
        bind_group_layouts: &[Some(camera_bind_group_layout)],
        immediate_size: 0,
    });

    let target = Some(wgpu::ColorTargetState {
        format: RenderTargets::GBUFFER_FORMAT,
        blend: Some(wgpu::BlendState {
            alpha: wgpu::BlendComponent::REPLACE,
            color: wgpu::BlendComponent::REPLACE,
        }),
        write_mask: wgpu::ColorWrites::ALL,
    });

    super::mk_render_pipeline(
        device,
        "GBuffer Pipeline",
        &layout,
        program.module(),
        &[MeshVertex::desc(), TransformRaw::desc()],
        &[target.clone(), target],
        Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        Some(wgpu::Face::Back),
    )
}
