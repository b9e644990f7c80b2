//! The scene-color pass: meshes drawn with their own materials.
//!
//! This is the image the composite pass darkens with the blurred
//! occlusion. Materials choose a pipeline variant through their
//! render-state flags (depth test, blend mode, double-sidedness).

use std::sync::Arc;

use crate::data_structures::geometry::{MeshVertex, Vertex};
use crate::data_structures::material::{BlendMode, Material, MaterialFlags};
use crate::data_structures::texture::Texture;
use crate::data_structures::transform::TransformRaw;
use crate::data_structures::uniform::UniformValue;
use crate::shader::{ShaderBuildError, ShaderProgram};
use crate::targets::RenderTargets;

/// Build the shared surface program. Material uniforms live in group 1.
pub fn surface_program(device: &wgpu::Device) -> Result<Arc<ShaderProgram>, ShaderBuildError> {
    ShaderProgram::build(device, "surface shader", include_str!("surface.wgsl"), 1)
}

/// A ready-to-use surface material: solid base color, full opacity and a
/// white placeholder diffuse map.
///
/// Game code tweaks it through the uniform binder, e.g.
/// `set("base_color", UniformValue::Vec3(..))` for a spotlight cone tint
/// or `set_texture("diffuse_map", ..)` once the real image is loaded.
pub fn mk_surface_material(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    program: Arc<ShaderProgram>,
) -> Material {
    let white = Arc::new(Texture::single_pixel(
        device,
        queue,
        [255, 255, 255, 255],
        "default diffuse map",
    ));
    let mut material = Material::new(program);
    material.declare("base_color", UniformValue::Vec3([1.0, 1.0, 1.0]));
    material.declare("opacity", UniformValue::Float(1.0));
    material.declare("use_texture", UniformValue::Bool(false));
    material.declare_texture("diffuse_map", white);
    material
}

fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    match mode {
        BlendMode::Replace => wgpu::BlendState::REPLACE,
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
        BlendMode::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::REPLACE,
        },
    }
}

pub fn mk_surface_pipeline(
    device: &wgpu::Device,
    program: &ShaderProgram,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    flags: MaterialFlags,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Surface Pipeline Layout"),
        bind_group_layouts: &[Some(camera_bind_group_layout), Some(program.material_layout())],
        immediate_size: 0,
    });

    super::mk_render_pipeline(
        device,
        "Surface Pipeline",
        &layout,
        program.module(),
        &[MeshVertex::desc(), TransformRaw::desc()],
        &[Some(wgpu::ColorTargetState {
            format: RenderTargets::SCENE_FORMAT,
            blend: Some(blend_state(flags.blend)),
            write_mask: wgpu::ColorWrites::ALL,
        })],
        Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: Some(flags.depth_test),
            depth_compare: Some(if flags.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            }),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        if flags.double_sided {
            None
        } else {
            Some(wgpu::Face::Back)
        },
    )
}
