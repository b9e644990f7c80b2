//! beatstage
//!
//! A scene-graph 3D rendering engine with a four-stage deferred
//! screen-space ambient-occlusion pipeline, built as the rendering core of
//! a rhythm-style game. The crate exposes a small surface for composing
//! hierarchical scenes, binding per-draw shader state through a generic
//! uniform protocol, and running the fixed geometry -> occlusion -> blur
//! -> composite frame loop.
//!
//! High-level modules
//! - `app`: windowed runner and the `GameFlow` trait game logic implements
//! - `camera`: camera types and uniforms for view/projection
//! - `context`: central GPU and window context that owns device/queue
//! - `data_structures`: scene graph, geometry, materials, uniforms, textures
//! - `pipelines`: the deferred passes (geometry, surface, ssao, blur, composite)
//! - `render`: per-frame pass orchestration
//! - `resources`: OBJ and image loading at the engine boundary
//! - `shader`: WGSL programs with reflected uniform locations
//! - `targets`: viewport-sized offscreen attachments
//!

pub mod app;
pub mod camera;
pub mod context;
pub mod data_structures;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod shader;
pub mod targets;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
pub use winit::event::WindowEvent;
