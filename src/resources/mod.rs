//! Asset loading at the engine boundary.
//!
//! The render pipeline itself never parses files; this module turns OBJ
//! models and image files into the immutable [`Geometry`] and shared
//! [`Texture`] values the pipeline consumes. Load failures surface to the
//! caller; no half-loaded resource ever reaches a material.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;

use crate::data_structures::geometry::{Geometry, MeshVertex};
use crate::data_structures::texture::Texture;

/// Load every model in an OBJ file as one [`Geometry`] each.
pub fn load_obj(device: &wgpu::Device, path: impl AsRef<Path>) -> anyhow::Result<Vec<Geometry>> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("loading {}", path.display()))?;

    Ok(models
        .into_iter()
        .map(|m| {
            let vertices = (0..m.mesh.positions.len() / 3)
                .map(|i| MeshVertex {
                    position: [
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ],
                    normal: [
                        m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                        m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
                    ],
                    uv: [
                        m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                        // OBJ uv origin is bottom-left, texture space is top-left.
                        1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                    ],
                })
                .collect::<Vec<_>>();
            Geometry::new(device, &m.name, &vertices, &m.mesh.indices)
        })
        .collect())
}

/// Decode an image file into a shared texture.
pub fn load_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: impl AsRef<Path>,
) -> anyhow::Result<Arc<Texture>> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("loading {}", path.display()))?;
    let texture = Texture::from_bytes(device, queue, &bytes, &path.display().to_string())?;
    Ok(Arc::new(texture))
}
