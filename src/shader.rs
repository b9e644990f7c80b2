//! Shader programs and uniform-variable reflection.
//!
//! A [`ShaderProgram`] owns a compiled WGSL module plus the reflected
//! layout of its material bind group. Reflection happens on the CPU with
//! naga at build time, which gives two things: shader build errors are
//! caught before the program ever reaches the GPU, and uniform names can
//! be resolved to concrete locations (byte ranges in the material uniform
//! block, or texture bind slots) without asking the driver.
//!
//! Programs are immutable after build and shared between materials via
//! `Arc`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fatal error raised when a shader fails to parse or validate.
///
/// There is no fallback shader; callers are expected to abort
/// initialization.
#[derive(Debug)]
pub struct ShaderBuildError {
    pub label: String,
    pub message: String,
}

impl fmt::Display for ShaderBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader {:?} failed to build: {}", self.label, self.message)
    }
}

impl std::error::Error for ShaderBuildError {}

/// Where a named uniform lives inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformLocation {
    /// A member of the material uniform block: a byte range inside the
    /// material's uniform buffer.
    Block { offset: u32, size: u32 },
    /// A sampled texture: the bind-group slot of the texture view. Its
    /// sampler sits at `binding + 1` by convention.
    Sampled { binding: u32 },
}

#[derive(Debug, Default)]
pub(crate) struct ShaderReflection {
    /// Binding and total byte span of the material uniform block, if the
    /// shader declares one.
    pub block: Option<(u32, u32)>,
    /// Members of the uniform block: name, byte offset, byte size.
    pub members: Vec<(String, u32, u32)>,
    /// Sampled textures in the material group: name and binding.
    pub textures: Vec<(String, u32)>,
    /// Sampler bindings in the material group.
    pub samplers: Vec<u32>,
}

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// A validated WGSL program plus the reflected shape of its material
/// uniforms.
///
/// The material bind group follows one convention: an optional uniform
/// struct whose members are the data uniforms, and one
/// `texture_2d`/`sampler` pair per texture uniform, with the sampler
/// directly after its texture.
#[derive(Debug)]
pub struct ShaderProgram {
    pub label: String,
    /// Index of the bind group that holds the material's uniforms.
    pub group: u32,
    id: u64,
    module: Option<wgpu::ShaderModule>,
    layout: Option<wgpu::BindGroupLayout>,
    reflection: ShaderReflection,
}

impl ShaderProgram {
    /// Parse, validate and compile a WGSL program.
    ///
    /// # Arguments
    ///
    /// * `group` is the bind group index reserved for material uniforms;
    ///   reflection only considers globals in that group
    pub fn build(
        device: &wgpu::Device,
        label: &str,
        source: &str,
        group: u32,
    ) -> Result<Arc<Self>, ShaderBuildError> {
        let reflection = reflect(label, source, group)?;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout = mk_material_layout(device, label, &reflection);
        Ok(Arc::new(Self {
            label: label.to_string(),
            group,
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            module: Some(module),
            layout: Some(layout),
            reflection,
        }))
    }

    /// Parse and validate a program without creating GPU objects.
    ///
    /// Location resolution and uniform packing work on the result; only
    /// pipeline creation and uploads need the full [`Self::build`] path.
    pub fn reflect(label: &str, source: &str, group: u32) -> Result<Arc<Self>, ShaderBuildError> {
        let reflection = reflect(label, source, group)?;
        Ok(Arc::new(Self {
            label: label.to_string(),
            group,
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            module: None,
            layout: None,
            reflection,
        }))
    }

    /// Identity of this program; materials use it to notice that their
    /// cached locations have to be re-resolved.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        self.module
            .as_ref()
            .expect("program was reflected without a device; use ShaderProgram::build for rendering")
    }

    /// Bind group layout of the material group, derived from reflection.
    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        self.layout
            .as_ref()
            .expect("program was reflected without a device; use ShaderProgram::build for rendering")
    }

    /// Resolve a uniform name against this program.
    ///
    /// `None` is a valid, non-error result: the shader simply does not use
    /// that variable and uploads of it degrade to a no-op.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        if let Some((_, offset, size)) = self
            .reflection
            .members
            .iter()
            .find(|(member, _, _)| member == name)
        {
            return Some(UniformLocation::Block {
                offset: *offset,
                size: *size,
            });
        }
        self.reflection
            .textures
            .iter()
            .find(|(texture, _)| texture == name)
            .map(|(_, binding)| UniformLocation::Sampled { binding: *binding })
    }

    /// Byte span of the material uniform block, if the shader has one.
    pub fn block_size(&self) -> Option<u32> {
        self.reflection.block.map(|(_, span)| span)
    }

    pub(crate) fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }
}

fn reflect(label: &str, source: &str, group: u32) -> Result<ShaderReflection, ShaderBuildError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderBuildError {
        label: label.to_string(),
        message: format!("{}", e),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderBuildError {
        label: label.to_string(),
        message: format!("{e:?}"),
    })?;

    let mut reflection = ShaderReflection::default();
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        if binding.group != group {
            continue;
        }
        match &module.types[var.ty].inner {
            naga::TypeInner::Struct { members, span }
                if var.space == naga::AddressSpace::Uniform =>
            {
                if reflection.block.is_some() {
                    log::warn!(
                        "shader {:?} declares more than one uniform block in group {}; \
                         only the first is addressable by name",
                        label,
                        group
                    );
                    continue;
                }
                reflection.block = Some((binding.binding, *span));
                for member in members {
                    let size = module.types[member.ty].inner.size(module.to_ctx());
                    reflection.members.push((
                        member.name.clone().unwrap_or_default(),
                        member.offset,
                        size,
                    ));
                }
            }
            naga::TypeInner::Image { .. } => {
                reflection
                    .textures
                    .push((var.name.clone().unwrap_or_default(), binding.binding));
            }
            naga::TypeInner::Sampler { .. } => {
                reflection.samplers.push(binding.binding);
            }
            _ => {}
        }
    }
    reflection.textures.sort_by_key(|(_, binding)| *binding);
    reflection.samplers.sort_unstable();
    Ok(reflection)
}

fn mk_material_layout(
    device: &wgpu::Device,
    label: &str,
    reflection: &ShaderReflection,
) -> wgpu::BindGroupLayout {
    let mut entries = Vec::new();
    if let Some((binding, _)) = reflection.block {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    for (_, binding) in &reflection.textures {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: *binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        });
    }
    for binding in &reflection.samplers {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: *binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries.sort_by_key(|entry| entry.binding);
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some(&format!("{} material_bind_group_layout", label)),
    })
}
