//! Engine data structures: geometry, materials, uniforms, textures and the
//! scene graph.
//!
//! - `geometry` contains immutable vertex/index data and vertex layouts
//! - `material` holds shader programs, uniform declarations and render flags
//! - `scene_graph` enables hierarchical scene organization
//! - `texture` contains the GPU texture wrapper and creation utilities
//! - `transform` holds local/world transforms and their GPU form
//! - `uniform` defines the typed uniform values materials upload

pub mod geometry;
pub mod material;
pub mod scene_graph;
pub mod texture;
pub mod transform;
pub mod uniform;
