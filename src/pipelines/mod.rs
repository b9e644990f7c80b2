//! Render pipeline definitions for the deferred stages.
//!
//! - `geometry` rasterizes view-space position/normal into the G-buffer
//! - `surface` draws scene meshes with their materials (pre-occlusion)
//! - `ssao` computes raw screen-space ambient occlusion
//! - `blur` box-filters the raw occlusion
//! - `composite` multiplies the scene image by the blurred occlusion

pub mod blur;
pub mod composite;
pub mod geometry;
pub mod ssao;
pub mod surface;

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::data_structures::geometry::Vertex;
use crate::data_structures::material::MaterialFlags;
use crate::shader::ShaderProgram;
use crate::targets::RenderTargets;

/// Vertex of the fullscreen quad the image passes draw.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl Vertex for QuadVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Two screen-covering triangles; v points down because texture space does.
pub const FULLSCREEN_QUAD: [QuadVertex; 6] = [
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
];

pub fn mk_quad_buffer(device: &wgpu::Device) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Fullscreen Quad Buffer"),
        contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Shared render pipeline constructor all passes funnel through.
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    targets: &[Option<wgpu::ColorTargetState>],
    depth_stencil: Option<wgpu::DepthStencilState>,
    cull_mode: Option<wgpu::Face>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

/// Every pipeline of the frame, built once at renderer construction.
///
/// Surface pipelines are variants keyed by the material's render-state
/// flags and created on demand the first time a flag combination shows up.
pub struct Pipelines {
    pub geometry: wgpu::RenderPipeline,
    pub ssao: wgpu::RenderPipeline,
    pub blur: wgpu::RenderPipeline,
    pub composite: wgpu::RenderPipeline,
    surface: HashMap<MaterialFlags, wgpu::RenderPipeline>,
    camera_layout: wgpu::BindGroupLayout,
    surface_program: Arc<ShaderProgram>,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        camera_layout: &wgpu::BindGroupLayout,
        geometry_program: &ShaderProgram,
        surface_program: Arc<ShaderProgram>,
        blur_program: &ShaderProgram,
        composite_program: &ShaderProgram,
        ssao: &ssao::SsaoResources,
    ) -> Self {
        let geometry = geometry::mk_geometry_pipeline(device, geometry_program, camera_layout);
        let ssao_pipeline = ssao::mk_ssao_pipeline(device, ssao);
        let blur_pipeline = blur::mk_blur_pipeline(device, blur_program, RenderTargets::AO_FORMAT);
        let composite = composite::mk_composite_pipeline(device, composite_program, output_format);

        let mut pipelines = Self {
            geometry,
            ssao: ssao_pipeline,
            blur: blur_pipeline,
            composite,
            surface: HashMap::new(),
            camera_layout: camera_layout.clone(),
            surface_program,
        };
        // Opaque depth-tested geometry is what almost every mesh uses.
        pipelines.ensure_surface(device, MaterialFlags::default());
        pipelines
    }

    /// Make sure a pipeline variant exists for the given flags.
    pub fn ensure_surface(&mut self, device: &wgpu::Device, flags: MaterialFlags) {
        if self.surface.contains_key(&flags) {
            return;
        }
        let pipeline = surface::mk_surface_pipeline(
            device,
            &self.surface_program,
            &self.camera_layout,
            flags,
        );
        self.surface.insert(flags, pipeline);
    }

    pub fn surface(&self, flags: MaterialFlags) -> &wgpu::RenderPipeline {
        self.surface
            .get(&flags)
            .expect("surface pipeline variant was not ensured before drawing")
    }
}
