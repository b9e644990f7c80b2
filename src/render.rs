//! Frame orchestration for the deferred ambient-occlusion pipeline.
//!
//! [`Renderer`] owns the render targets, the generated kernel/noise
//! resources and every pipeline, and encodes the fixed pass sequence for
//! one frame:
//!
//! 1. geometry pass - view-space position/normal into the G-buffer
//! 2. ambient-occlusion pass - raw per-pixel occlusion
//! 3. blur pass - 3x3 box filter over the raw occlusion
//! 4. scene-color pass - meshes drawn with their materials
//! 5. composite pass - scene color times blurred occlusion
//!
//! All five passes live in one command encoder, so each pass's writes are
//! complete before the next pass reads them. Exactly one pass writes each
//! attachment per frame. Viewport resizes are recorded and applied at the
//! next frame boundary, never mid-frame.

use std::iter;
use std::sync::Arc;

use anyhow::Context as _;

use crate::camera::{CameraResources, Projection};
use crate::data_structures::material::Material;
use crate::data_structures::scene_graph::{MeshData, SceneGraph};
use crate::pipelines::{Pipelines, blur, composite, geometry, mk_quad_buffer, ssao, surface};
use crate::shader::ShaderProgram;
use crate::targets::RenderTargets;

pub struct Renderer {
    pub targets: RenderTargets,
    pub ssao: ssao::SsaoResources,
    pipelines: Pipelines,
    surface_program: Arc<ShaderProgram>,
    quad_buffer: wgpu::Buffer,
    blur_material: Material,
    composite_material: Material,
    pending_resize: Option<(u32, u32)>,
}

impl Renderer {
    /// Build every pipeline, the render targets and the one-time
    /// kernel/noise resources.
    ///
    /// Shader build failures and zero-sized targets are fatal here; there
    /// is no fallback state to fall into.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        config: ssao::SsaoConfig,
        seed: Option<u64>,
    ) -> anyhow::Result<Self> {
        let targets = RenderTargets::new(device, width, height)?;
        let mut ssao_resources = ssao::SsaoResources::new(device, queue, config, seed)?;
        ssao_resources.rebind_inputs(device, &targets);

        let geometry_program = geometry::geometry_program(device)?;
        let surface_program = surface::surface_program(device)?;
        let blur_program = blur::blur_program(device)?;
        let composite_program = composite::composite_program(device)?;

        let blur_material = blur::mk_blur_material(blur_program.clone(), targets.ao_raw.clone());
        let composite_material = composite::mk_composite_material(
            composite_program.clone(),
            targets.scene_color.clone(),
            targets.ao_blur.clone(),
        );

        let pipelines = Pipelines::new(
            device,
            output_format,
            camera_bind_group_layout,
            &geometry_program,
            surface_program.clone(),
            &blur_program,
            &composite_program,
            &ssao_resources,
        );

        Ok(Self {
            targets,
            ssao: ssao_resources,
            pipelines,
            surface_program,
            quad_buffer: mk_quad_buffer(device),
            blur_material,
            composite_material,
            pending_resize: None,
        })
    }

    /// The shared program scene materials are built against.
    pub fn surface_program(&self) -> Arc<ShaderProgram> {
        self.surface_program.clone()
    }

    /// Record a viewport resize. It takes effect at the start of the next
    /// frame, when all size-dependent attachments are recreated at once.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width, height));
    }

    fn apply_pending_resize(&mut self, device: &wgpu::Device) -> anyhow::Result<()> {
        let Some((width, height)) = self.pending_resize.take() else {
            return Ok(());
        };
        if (width, height) == (self.targets.width(), self.targets.height()) {
            return Ok(());
        }
        self.targets.resize(device, width, height)?;
        self.ssao.rebind_inputs(device, &self.targets);
        self.blur_material
            .set_texture("ssao_input", self.targets.ao_raw.clone());
        self.composite_material
            .set_texture("scene_texture", self.targets.scene_color.clone());
        self.composite_material
            .set_texture("ssao_blur_texture", self.targets.ao_blur.clone());
        Ok(())
    }

    /// Render one frame of `scene` into `output`.
    ///
    /// `viewport` is the size the caller believes it is rendering at; a
    /// mismatch against the attachments is a fatal `FramebufferError`
    /// rather than a silently stretched frame.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera: &mut CameraResources,
        projection: &Projection,
        scene: &mut SceneGraph,
        output: &wgpu::TextureView,
        viewport: (u32, u32),
        clear_colour: wgpu::Color,
    ) -> anyhow::Result<()> {
        self.apply_pending_resize(device)?;
        self.targets.check(viewport.0, viewport.1)?;

        scene.update_world_transforms();
        let meshes: Vec<(&MeshData, _)> = scene
            .visible_meshes()
            .map(|(_, mesh, world)| (mesh, world))
            .collect();

        // Host-side uploads all happen before the encoder is built, so
        // every pass sees this frame's state.
        camera.write(queue, projection);
        self.ssao
            .write_uniform(queue, projection.calc_matrix(), viewport);
        for (mesh, world) in &meshes {
            queue.write_buffer(
                &mesh.transform_buffer,
                0,
                bytemuck::cast_slice(&[world.to_raw()]),
            );
            // TODO: skip duplicate uploads when many meshes share a material
            mesh.material.borrow_mut().upload(device, queue)?;
        }
        self.blur_material.upload(device, queue)?;
        self.composite_material.upload(device, queue)?;
        for (mesh, _) in &meshes {
            let flags = mesh.material.borrow().flags;
            self.pipelines.ensure_surface(device, flags);
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        self.encode_geometry_pass(&mut encoder, camera, &meshes);
        self.encode_ssao_pass(&mut encoder)?;
        self.encode_blur_pass(&mut encoder)?;
        self.encode_scene_pass(&mut encoder, camera, &meshes, clear_colour)?;
        self.encode_composite_pass(&mut encoder, output)?;

        queue.submit(iter::once(encoder.finish()));
        Ok(())
    }

    fn encode_geometry_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        camera: &CameraResources,
        meshes: &[(&MeshData, crate::data_structures::transform::Transform)],
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("GBuffer Pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.g_position.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.g_normal.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.g_depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipelines.geometry);
        pass.set_bind_group(0, &camera.bind_group, &[]);
        for (mesh, _) in meshes {
            pass.set_vertex_buffer(0, mesh.geometry.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, mesh.transform_buffer.slice(..));
            pass.set_index_buffer(mesh.geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.geometry.index_count, 0, 0..1);
        }
    }

    fn encode_ssao_pass(&self, encoder: &mut wgpu::CommandEncoder) -> anyhow::Result<()> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSAO Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.ao_raw.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    // White means unoccluded.
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipelines.ssao);
        pass.set_bind_group(0, self.ssao.params_bind_group(), &[]);
        pass.set_bind_group(
            1,
            self.ssao
                .inputs_bind_group()
                .context("ssao inputs were never bound to the render targets")?,
            &[],
        );
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        pass.draw(0..6, 0..1);
        Ok(())
    }

    fn encode_blur_pass(&self, encoder: &mut wgpu::CommandEncoder) -> anyhow::Result<()> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("SSAO Blur Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.ao_blur.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipelines.blur);
        pass.set_bind_group(
            0,
            self.blur_material
                .bind_group()
                .context("blur material was never uploaded")?,
            &[],
        );
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        pass.draw(0..6, 0..1);
        Ok(())
    }

    fn encode_scene_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        camera: &CameraResources,
        meshes: &[(&MeshData, crate::data_structures::transform::Transform)],
        clear_colour: wgpu::Color,
    ) -> anyhow::Result<()> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.targets.scene_color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.scene_depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        pass.set_bind_group(0, &camera.bind_group, &[]);
        for (mesh, _) in meshes {
            let material = mesh.material.borrow();
            pass.set_pipeline(self.pipelines.surface(material.flags));
            pass.set_bind_group(
                material.program().group,
                material
                    .bind_group()
                    .context("mesh material was never uploaded")?,
                &[],
            );
            pass.set_vertex_buffer(0, mesh.geometry.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, mesh.transform_buffer.slice(..));
            pass.set_index_buffer(mesh.geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.geometry.index_count, 0, 0..1);
        }
        Ok(())
    }

    fn encode_composite_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
    ) -> anyhow::Result<()> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipelines.composite);
        pass.set_bind_group(
            0,
            self.composite_material
                .bind_group()
                .context("composite material was never uploaded")?,
            &[],
        );
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        pass.draw(0..6, 0..1);
        Ok(())
    }
}
