//! Materials: a shared shader program, declared uniforms and render-state
//! flags.
//!
//! The material is the host side of the uniform-binding protocol. Data
//! uniforms are packed into one uniform buffer at the byte offsets the
//! program's reflection reports; texture uniforms own a stable
//! material-local texture unit and are bound into the material bind group
//! at their reflected slots. The shader only ever addresses "which slot",
//! never a resource handle.

use std::sync::Arc;

use anyhow::{Context, anyhow};

use crate::data_structures::texture::Texture;
use crate::data_structures::uniform::{Uniform, UniformValue};
use crate::shader::{ShaderProgram, UniformLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Overwrite the destination (opaque geometry).
    Replace,
    /// Standard source-over alpha blending.
    Alpha,
    /// Additive blending, e.g. for light cones.
    Additive,
}

/// Render-state flags a material requires from its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialFlags {
    pub depth_test: bool,
    pub blend: BlendMode,
    pub double_sided: bool,
}

impl Default for MaterialFlags {
    fn default() -> Self {
        Self {
            depth_test: true,
            blend: BlendMode::Replace,
            double_sided: false,
        }
    }
}

#[derive(Debug)]
pub struct Material {
    program: Arc<ShaderProgram>,
    pub flags: MaterialFlags,
    /// Declared uniforms in declaration order; names are unique.
    uniforms: Vec<(String, Uniform)>,
    next_unit: u32,
    resolved_program: Option<u64>,
    uniform_buffer: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
    bind_group_dirty: bool,
}

impl Material {
    pub fn new(program: Arc<ShaderProgram>) -> Self {
        Self {
            program,
            flags: MaterialFlags::default(),
            uniforms: Vec::new(),
            next_unit: 0,
            resolved_program: None,
            uniform_buffer: None,
            bind_group: None,
            bind_group_dirty: true,
        }
    }

    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn program(&self) -> &Arc<ShaderProgram> {
        &self.program
    }

    /// Swap the shader program. Every cached location is invalidated and
    /// re-resolved against the new program on the next upload.
    pub fn set_program(&mut self, program: Arc<ShaderProgram>) {
        self.program = program;
        self.resolved_program = None;
        self.uniform_buffer = None;
        self.bind_group = None;
        self.bind_group_dirty = true;
        for (_, uniform) in &mut self.uniforms {
            uniform.location = None;
        }
    }

    /// Register a data uniform. Declaring an existing name replaces its
    /// value.
    pub fn declare(&mut self, name: &str, value: UniformValue) {
        debug_assert!(
            !matches!(value, UniformValue::Texture { .. }),
            "use declare_texture for sampled textures"
        );
        self.set(name, value);
    }

    /// Register a texture uniform and assign it the next free texture
    /// unit. Units are handed out once per material and stay stable for
    /// its whole lifetime; two samplers never share one.
    ///
    /// Returns the assigned unit.
    pub fn declare_texture(&mut self, name: &str, texture: Arc<Texture>) -> u32 {
        if let Some(unit) = self.texture_unit(name) {
            self.set_texture(name, texture);
            return unit;
        }
        let unit = self.next_unit;
        self.next_unit += 1;
        let value = UniformValue::Texture { texture, unit };
        let location = self.resolve_one(name, &value);
        self.uniforms
            .push((name.to_string(), Uniform { value, location }));
        self.bind_group_dirty = true;
        unit
    }

    /// Update a declared uniform's value, or declare it if unknown.
    pub fn set(&mut self, name: &str, value: UniformValue) {
        let location = self.resolve_one(name, &value);
        if let Some((_, uniform)) = self.uniforms.iter_mut().find(|(n, _)| n == name) {
            uniform.value = value;
            uniform.location = location;
        } else {
            self.uniforms
                .push((name.to_string(), Uniform { value, location }));
        }
    }

    /// Swap the texture of a declared texture uniform, keeping its unit.
    pub fn set_texture(&mut self, name: &str, texture: Arc<Texture>) {
        let Some((_, uniform)) = self.uniforms.iter_mut().find(|(n, _)| n == name) else {
            self.declare_texture(name, texture);
            return;
        };
        match &mut uniform.value {
            UniformValue::Texture { texture: slot, .. } => {
                *slot = texture;
                self.bind_group_dirty = true;
            }
            other => {
                log::warn!("set_texture on non-texture uniform {:?} ({:?})", name, other);
            }
        }
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, u)| u)
    }

    pub fn texture_unit(&self, name: &str) -> Option<u32> {
        match self.uniform(name)?.value {
            UniformValue::Texture { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// Re-resolve every declared uniform against the current program.
    ///
    /// Called lazily by [`Self::upload`]; only needed explicitly when
    /// inspecting locations before the first upload.
    pub fn resolve(&mut self) {
        let mut resolved = Vec::with_capacity(self.uniforms.len());
        for (name, uniform) in &self.uniforms {
            resolved.push(Self::resolve_against(&self.program, name, &uniform.value));
        }
        for ((_, uniform), location) in self.uniforms.iter_mut().zip(resolved) {
            uniform.location = location;
        }
        self.resolved_program = Some(self.program.id());
    }

    fn resolve_one(&self, name: &str, value: &UniformValue) -> Option<UniformLocation> {
        Self::resolve_against(&self.program, name, value)
    }

    /// Data values may only land in the uniform block, texture values only
    /// in sampled slots; a name that resolves to the wrong shape counts as
    /// not found.
    fn resolve_against(
        program: &ShaderProgram,
        name: &str,
        value: &UniformValue,
    ) -> Option<UniformLocation> {
        match (value, program.uniform_location(name)) {
            (UniformValue::Texture { .. }, Some(loc @ UniformLocation::Sampled { .. })) => {
                Some(loc)
            }
            (UniformValue::Texture { .. }, _) => None,
            (_, Some(loc @ UniformLocation::Block { .. })) => Some(loc),
            (_, _) => None,
        }
    }

    /// Pack every resolved data uniform into the material uniform block.
    ///
    /// Returns `None` when there is nothing to write: the program has no
    /// uniform block, or no declared uniform resolved into it. In that
    /// case upload performs no buffer write at all.
    pub fn pack_block(&self) -> Option<Vec<u8>> {
        let span = self.program.block_size()?;
        let mut block = vec![0u8; span as usize];
        let mut wrote = false;
        for (_, uniform) in &self.uniforms {
            if let Some(UniformLocation::Block { offset, size }) = uniform.location {
                uniform.value.write_block(&mut block, offset, size);
                wrote = true;
            }
        }
        wrote.then_some(block)
    }

    /// Push the material's state to the GPU: write the uniform block and
    /// (re)build the bind group if any texture binding changed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> anyhow::Result<()> {
        if self.resolved_program != Some(self.program.id()) {
            self.resolve();
        }
        if let Some(block) = self.pack_block() {
            let buffer = self.ensure_uniform_buffer(device);
            queue.write_buffer(&buffer, 0, &block);
        }
        if self.bind_group_dirty || self.bind_group.is_none() {
            self.bind_group = Some(self.mk_bind_group(device)?);
            self.bind_group_dirty = false;
        }
        Ok(())
    }

    /// The bind group to set at the program's material group index.
    /// `None` before the first upload.
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    fn ensure_uniform_buffer(&mut self, device: &wgpu::Device) -> wgpu::Buffer {
        let span = self.program.block_size().unwrap_or(0) as u64;
        match &self.uniform_buffer {
            Some(buffer) if buffer.size() == span => buffer.clone(),
            _ => {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Material Uniform Buffer"),
                    size: span,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                self.uniform_buffer = Some(buffer.clone());
                self.bind_group_dirty = true;
                buffer
            }
        }
    }

    fn mk_bind_group(&mut self, device: &wgpu::Device) -> anyhow::Result<wgpu::BindGroup> {
        let mut entries = Vec::new();
        let buffer = if self.program.block_size().is_some() {
            Some(self.ensure_uniform_buffer(device))
        } else {
            None
        };
        if let (Some(buffer), Some((binding, _))) = (&buffer, self.program.reflection().block) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
        }
        let reflection = self.program.reflection();
        for (shader_name, binding) in &reflection.textures {
            let texture = self
                .uniforms
                .iter()
                .find_map(|(_, uniform)| match &uniform.value {
                    UniformValue::Texture { texture, .. }
                        if uniform.location
                            == Some(UniformLocation::Sampled { binding: *binding }) =>
                    {
                        Some(texture)
                    }
                    _ => None,
                })
                .with_context(|| {
                    anyhow!(
                        "shader {:?} samples {:?} but the material declares no texture for it",
                        self.program.label,
                        shader_name
                    )
                })?;
            entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            // The paired sampler sits right after its texture.
            if reflection.samplers.contains(&(binding + 1)) {
                entries.push(wgpu::BindGroupEntry {
                    binding: binding + 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }
        }
        entries.sort_by_key(|entry| entry.binding);
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: self.program.material_layout(),
            entries: &entries,
            label: Some("material_bind_group"),
        }))
    }
}
