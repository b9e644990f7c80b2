//! Screen-space ambient occlusion: kernel/noise generation and the AO pass.
//!
//! The hemisphere kernel and the noise tile are generated once when the
//! renderer is built and live exactly as long as it does; they are owned by
//! [`SsaoResources`] and handed to the pass explicitly instead of sitting
//! in module-level state.

use anyhow::ensure;
use cgmath::{InnerSpace, Matrix4, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};

use std::sync::Arc;

use crate::data_structures::geometry::Vertex;
use crate::data_structures::texture::Texture;
use crate::pipelines::QuadVertex;
use crate::shader::ShaderProgram;
use crate::targets::RenderTargets;

/// Upper bound on the kernel length; the uniform block reserves this many
/// sample slots.
pub const MAX_KERNEL_SIZE: usize = 64;

/// Recognized configuration surface of the ambient-occlusion pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsaoConfig {
    /// Sampling hemisphere radius in view-space units.
    pub radius: f32,
    /// Depth-comparison bias that avoids self-occlusion on flat surfaces.
    pub bias: f32,
    /// Number of kernel samples; must match the generated kernel length.
    pub kernel_size: u32,
    /// Contrast exponent applied to the final occlusion factor.
    pub power: f32,
    /// Edge length of the square noise tile.
    pub noise_size: u32,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            radius: 0.5,
            bias: 0.025,
            kernel_size: 64,
            power: 1.0,
            noise_size: 4,
        }
    }
}

impl SsaoConfig {
    /// Tiling factor that repeats the noise texture across the viewport.
    pub fn noise_scale(&self, width: u32, height: u32) -> [f32; 2] {
        [
            width as f32 / self.noise_size as f32,
            height as f32 / self.noise_size as f32,
        ]
    }
}

/// Generate `count` sample offsets in the tangent-space hemisphere.
///
/// Each sample is a random direction with z in [0, 1], normalized, scaled
/// by a random length and then by `lerp(0.1, 1.0, (i/count)^2)`. The
/// accelerating interpolation clusters samples near the origin, which
/// concentrates occlusion sensitivity close to the surface.
pub fn generate_kernel(count: u32, rng: &mut impl Rng) -> Vec<Vector3<f32>> {
    (0..count)
        .map(|i| {
            let sample = Vector3::new(
                rng.gen_range(-1.0f32..=1.0),
                rng.gen_range(-1.0f32..=1.0),
                rng.gen_range(0.0f32..=1.0),
            );
            let length = sample.magnitude();
            let mut sample = if length < 1e-6 {
                Vector3::unit_z()
            } else {
                sample / length
            };
            sample *= rng.gen_range(0.0f32..=1.0);
            let t = i as f32 / count as f32;
            sample * (0.1 + 0.9 * t * t)
        })
        .collect()
}

/// Generate the `size * size` random tangent-plane vectors of the noise
/// tile. z stays 0: the vectors only rotate the kernel around the normal.
pub fn generate_noise_vectors(size: u32, rng: &mut impl Rng) -> Vec<[f32; 4]> {
    (0..size * size)
        .map(|_| {
            [
                rng.gen_range(-1.0f32..=1.0),
                rng.gen_range(-1.0f32..=1.0),
                0.0,
                0.0,
            ]
        })
        .collect()
}

/// GPU-side parameters of the AO pass.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SsaoUniform {
    projection: [[f32; 4]; 4],
    samples: [[f32; 4]; MAX_KERNEL_SIZE],
    noise_scale: [f32; 2],
    radius: f32,
    bias: f32,
    power: f32,
    kernel_size: i32,
    // Uniform blocks round up to 16-byte multiples.
    _padding: [f32; 2],
}

/// Process-lifetime resources of the ambient-occlusion pass: the sample
/// kernel, the noise texture, the parameter buffer and the bind groups
/// that wire the G-buffer into the pass.
pub struct SsaoResources {
    pub config: SsaoConfig,
    pub kernel: Vec<Vector3<f32>>,
    pub noise_texture: Texture,
    pub program: Arc<ShaderProgram>,
    pub params_layout: wgpu::BindGroupLayout,
    pub inputs_layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    inputs_bind_group: Option<wgpu::BindGroup>,
}

impl SsaoResources {
    /// Generate kernel and noise and create the pass's GPU objects.
    ///
    /// `seed` makes generation reproducible; `None` seeds from the OS.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: SsaoConfig,
        seed: Option<u64>,
    ) -> anyhow::Result<Self> {
        ensure!(
            config.kernel_size >= 1 && config.kernel_size as usize <= MAX_KERNEL_SIZE,
            "kernel size {} outside 1..={}",
            config.kernel_size,
            MAX_KERNEL_SIZE
        );
        ensure!(config.noise_size >= 1, "noise texture cannot be empty");

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let kernel = generate_kernel(config.kernel_size, &mut rng);
        let noise = generate_noise_vectors(config.noise_size, &mut rng);
        let noise_texture = Texture::from_vectors(
            device,
            queue,
            [config.noise_size, config.noise_size],
            &noise,
            wgpu::AddressMode::Repeat,
            "ssao noise",
        );
        log::info!(
            "generated ssao kernel ({} samples) and {}x{} noise tile",
            kernel.len(),
            config.noise_size,
            config.noise_size
        );

        let program = ShaderProgram::build(device, "ssao shader", include_str!("ssao.wgsl"), 2)?;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSAO Uniform Buffer"),
            size: std::mem::size_of::<SsaoUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("ssao_params_bind_group_layout"),
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("ssao_params_bind_group"),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let inputs_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                sampler_entry(3),
                sampler_entry(4),
            ],
            label: Some("ssao_inputs_bind_group_layout"),
        });

        Ok(Self {
            config,
            kernel,
            noise_texture,
            program,
            params_layout,
            inputs_layout,
            buffer,
            params_bind_group,
            inputs_bind_group: None,
        })
    }

    /// Write the per-frame parameters: the projection used to re-project
    /// samples, and the tiling factor for the current viewport.
    pub fn write_uniform(
        &self,
        queue: &wgpu::Queue,
        projection: Matrix4<f32>,
        viewport: (u32, u32),
    ) {
        let mut samples = [[0.0f32; 4]; MAX_KERNEL_SIZE];
        for (slot, sample) in samples.iter_mut().zip(&self.kernel) {
            *slot = [sample.x, sample.y, sample.z, 0.0];
        }
        let uniform = SsaoUniform {
            projection: projection.into(),
            samples,
            noise_scale: self.config.noise_scale(viewport.0, viewport.1),
            radius: self.config.radius,
            bias: self.config.bias,
            power: self.config.power,
            kernel_size: self.kernel.len() as i32,
            _padding: [0.0; 2],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    /// Point the pass at the (re)created G-buffer attachments. Must run
    /// after every render-target resize, before the next frame.
    pub fn rebind_inputs(&mut self, device: &wgpu::Device, targets: &RenderTargets) {
        self.inputs_bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.inputs_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.g_position.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.g_normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.noise_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&targets.g_position.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.noise_texture.sampler),
                },
            ],
            label: Some("ssao_inputs_bind_group"),
        }));
    }

    pub fn params_bind_group(&self) -> &wgpu::BindGroup {
        &self.params_bind_group
    }

    pub fn inputs_bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.inputs_bind_group.as_ref()
    }
}

pub fn mk_ssao_pipeline(device: &wgpu::Device, ssao: &SsaoResources) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("SSAO Pipeline Layout"),
        bind_group_layouts: &[Some(&ssao.params_layout), Some(&ssao.inputs_layout)],
        immediate_size: 0,
    });

    super::mk_render_pipeline(
        device,
        "SSAO Pipeline",
        &layout,
        ssao.program.module(),
        &[QuadVertex::desc()],
        &[Some(wgpu::ColorTargetState {
            format: RenderTargets::AO_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })],
        None,
        None,
    )
}
