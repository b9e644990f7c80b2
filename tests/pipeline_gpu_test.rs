//! GPU-backed pipeline tests. These need a real adapter, so they hide
//! behind the `integration-tests` feature and stay out of the default
//! headless test run.

#![cfg(feature = "integration-tests")]

mod common;

use std::cell::RefCell;
use std::iter;
use std::rc::Rc;
use std::sync::Arc;

use cgmath::{Deg, Vector3};

use beatstage::camera::{Camera, CameraResources, Projection, mk_bind_group_layout};
use beatstage::data_structures::geometry::Geometry;
use beatstage::data_structures::scene_graph::SceneGraph;
use beatstage::data_structures::texture::Texture;
use beatstage::data_structures::transform::Transform;
use beatstage::pipelines::blur::{blur_program, mk_blur_material, mk_blur_pipeline};
use beatstage::pipelines::composite::{
    composite_program, mk_composite_material, mk_composite_pipeline,
};
use beatstage::pipelines::mk_quad_buffer;
use beatstage::pipelines::ssao::SsaoConfig;
use beatstage::pipelines::surface::mk_surface_material;
use beatstage::render::Renderer;
use beatstage::targets::{FramebufferError, RenderTargets};

use common::test_utils::*;

/// Draw one fullscreen-quad pass of `pipeline` into `output`.
fn run_quad_pass(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    output: &wgpu::TextureView,
) {
    let quad = mk_quad_buffer(device);
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("test pass encoder"),
    });
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("test pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.set_vertex_buffer(0, quad.slice(..));
        pass.draw(0..6, 0..1);
    }
    queue.submit(iter::once(encoder.finish()));
}

#[test]
fn flat_surface_renders_unoccluded() {
    let (device, queue) = create_device();
    let camera_layout = mk_bind_group_layout(&device);
    let mut renderer = Renderer::new(
        &device,
        &queue,
        128,
        128,
        wgpu::TextureFormat::Rgba8Unorm,
        &camera_layout,
        SsaoConfig::default(),
        Some(7),
    )
    .unwrap();

    let mut camera = CameraResources::new(
        &device,
        Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0)),
    );
    let projection = Projection::new(128, 128, Deg(45.0), 0.1, 100.0);

    // A white wall at z = -5 facing the camera, wide enough to fill the
    // whole view: no neighbouring geometry within the sampling radius.
    let mut scene = SceneGraph::new();
    let material = Rc::new(RefCell::new(mk_surface_material(
        &device,
        &queue,
        renderer.surface_program(),
    )));
    let geometry = Arc::new(Geometry::plane(&device, "wall", 50.0));
    let wall = scene.add_mesh(&device, None, geometry, material).unwrap();
    scene
        .set_local_transform(wall, Transform::from_position(Vector3::new(0.0, 0.0, -5.0)))
        .unwrap();

    let output = mk_output_texture(&device, wgpu::TextureFormat::Rgba8Unorm, 128, 128);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    renderer
        .render(
            &device,
            &queue,
            &mut camera,
            &projection,
            &mut scene,
            &view,
            (128, 128),
            wgpu::Color::BLACK,
        )
        .unwrap();

    let ao = read_texture_r16f(&device, &queue, &renderer.targets.ao_raw.texture);
    for &v in &ao {
        assert!((0.0..=1.001).contains(&v), "occlusion {v} out of range");
    }
    for y in 16..112usize {
        for x in 16..112usize {
            let v = ao[y * 128 + x];
            assert!(
                v >= 0.98,
                "unexpected occlusion {v} at ({x},{y}) on a flat unoccluded wall"
            );
        }
    }

    // Composite: white wall times no occlusion stays white.
    let pixels = read_texture_rgba8(&device, &queue, &output);
    let center = pixels[64 * 128 + 64];
    assert!(
        center[0] >= 250 && center[1] >= 250 && center[2] >= 250,
        "composited wall should stay white, got {center:?}"
    );
}

#[test]
fn blur_pass_averages_the_3x3_neighbourhood() {
    let (device, queue) = create_device();
    let program = blur_program(&device).unwrap();

    let input = Arc::new(Texture::create_color_attachment(
        &device,
        [64, 64],
        RenderTargets::AO_FORMAT,
        wgpu::FilterMode::Nearest,
        "blur input",
    ));
    let values: Vec<f32> = (0..64 * 64)
        .map(|i| {
            let (x, y) = (i % 64, i / 64);
            ((x * 7 + y * 13) % 97) as f32 / 96.0
        })
        .collect();
    write_texture_r16f(&queue, &input.texture, &values);

    let mut material = mk_blur_material(program.clone(), input);
    material.upload(&device, &queue).unwrap();
    let pipeline = mk_blur_pipeline(&device, &program, RenderTargets::AO_FORMAT);
    let output = Texture::create_color_attachment(
        &device,
        [64, 64],
        RenderTargets::AO_FORMAT,
        wgpu::FilterMode::Nearest,
        "blur output",
    );
    run_quad_pass(
        &device,
        &queue,
        &pipeline,
        material.bind_group().unwrap(),
        &output.view,
    );

    let result = read_texture_r16f(&device, &queue, &output.texture);
    let stored: Vec<f32> = values.iter().map(|&v| as_f16(v)).collect();
    for y in 1..63usize {
        for x in 1..63usize {
            let mut sum = 0.0;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sx = (x as i32 + dx) as usize;
                    let sy = (y as i32 + dy) as usize;
                    sum += stored[sy * 64 + sx];
                }
            }
            let expected = sum / 9.0;
            let got = result[y * 64 + x];
            assert!(
                (got - expected).abs() <= 3e-3,
                "blur at ({x},{y}): got {got}, expected 3x3 mean {expected}"
            );
        }
    }
}

#[test]
fn composite_multiplies_scene_color_by_occlusion() {
    let (device, queue) = create_device();
    let program = composite_program(&device).unwrap();

    let scene = Arc::new(Texture::create_color_attachment(
        &device,
        [64, 64],
        RenderTargets::SCENE_FORMAT,
        wgpu::FilterMode::Linear,
        "scene input",
    ));
    write_texture_rgba16f(
        &queue,
        &scene.texture,
        &vec![[0.8, 0.4, 0.2, 1.0]; 64 * 64],
    );
    let occlusion = Arc::new(Texture::create_color_attachment(
        &device,
        [64, 64],
        RenderTargets::AO_FORMAT,
        wgpu::FilterMode::Nearest,
        "occlusion input",
    ));
    write_texture_r16f(&queue, &occlusion.texture, &vec![0.5; 64 * 64]);

    let mut material = mk_composite_material(program.clone(), scene, occlusion);
    material.upload(&device, &queue).unwrap();
    let pipeline = mk_composite_pipeline(&device, &program, wgpu::TextureFormat::Rgba8Unorm);
    let output = mk_output_texture(&device, wgpu::TextureFormat::Rgba8Unorm, 64, 64);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    run_quad_pass(&device, &queue, &pipeline, material.bind_group().unwrap(), &view);

    let pixels = read_texture_rgba8(&device, &queue, &output);
    // (0.8, 0.4, 0.2) times 0.5 is (0.4, 0.2, 0.1).
    let expected = [102u8, 51, 26];
    for (i, pixel) in pixels.iter().enumerate() {
        for c in 0..3 {
            assert!(
                (pixel[c] as i32 - expected[c] as i32).abs() <= 2,
                "pixel {i} channel {c}: got {}, expected ~{}",
                pixel[c],
                expected[c]
            );
        }
        assert_eq!(pixel[3], 255);
    }
}

#[test]
fn texture_units_stay_stable_across_uploads() {
    let (device, queue) = create_device();
    let program = beatstage::pipelines::surface::surface_program(&device).unwrap();
    let mut material = mk_surface_material(&device, &queue, program);
    assert_eq!(material.texture_unit("diffuse_map"), Some(0));

    let extra = Arc::new(Texture::single_pixel(&device, &queue, [1, 2, 3, 255], "extra"));
    // A second sampler gets the next unit, even though this shader never
    // samples it (it simply resolves to nothing and is skipped).
    assert_eq!(material.declare_texture("glow_map", extra.clone()), 1);

    material.upload(&device, &queue).unwrap();
    assert_eq!(material.texture_unit("diffuse_map"), Some(0));
    assert_eq!(material.texture_unit("glow_map"), Some(1));

    material.upload(&device, &queue).unwrap();
    assert_eq!(material.texture_unit("diffuse_map"), Some(0));
    assert_eq!(material.texture_unit("glow_map"), Some(1));

    // Re-declaring an existing sampler keeps its unit instead of leaking
    // a new one.
    assert_eq!(material.declare_texture("diffuse_map", extra), 0);
}

#[test]
fn resize_applies_at_the_frame_boundary() {
    let (device, queue) = create_device();
    let camera_layout = mk_bind_group_layout(&device);
    let mut renderer = Renderer::new(
        &device,
        &queue,
        128,
        128,
        wgpu::TextureFormat::Rgba8Unorm,
        &camera_layout,
        SsaoConfig::default(),
        None,
    )
    .unwrap();
    let mut camera = CameraResources::new(
        &device,
        Camera::new((0.0, 0.0, 0.0), Deg(-90.0), Deg(0.0)),
    );
    let projection = Projection::new(96, 96, Deg(45.0), 0.1, 100.0);
    let mut scene = SceneGraph::new();

    renderer.request_resize(96, 96);
    let output = mk_output_texture(&device, wgpu::TextureFormat::Rgba8Unorm, 96, 96);
    let view = output.create_view(&wgpu::TextureViewDescriptor::default());
    renderer
        .render(
            &device,
            &queue,
            &mut camera,
            &projection,
            &mut scene,
            &view,
            (96, 96),
            wgpu::Color::BLACK,
        )
        .unwrap();
    assert_eq!(renderer.targets.width(), 96);

    // Rendering with a viewport the attachments no longer match is fatal,
    // not a silently stretched frame.
    let err = renderer
        .render(
            &device,
            &queue,
            &mut camera,
            &projection,
            &mut scene,
            &view,
            (128, 128),
            wgpu::Color::BLACK,
        )
        .unwrap_err();
    assert!(err.downcast_ref::<FramebufferError>().is_some(), "{err:#}");
}

#[test]
fn zero_sized_targets_are_rejected_at_creation() {
    let (device, _queue) = create_device();
    assert_eq!(
        RenderTargets::new(&device, 0, 128).unwrap_err(),
        FramebufferError::ZeroSize {
            width: 0,
            height: 128
        }
    );
}
