//! Typed CPU-side uniform values.
//!
//! Each material uniform is a tagged value with a cached location inside
//! the material's shader program. The closed enum replaces the stringly
//! typed dispatch a dynamic engine would use: packing is an exhaustive
//! match, so adding a kind without handling its transfer fails to compile.

use std::sync::Arc;

use crate::data_structures::texture::Texture;
use crate::shader::UniformLocation;

#[derive(Debug, Clone)]
pub enum UniformValue {
    Int(i32),
    Bool(bool),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
    /// A sampled texture together with its texture unit. The unit is the
    /// material-local slot the shader reads from; it is assigned when the
    /// uniform is declared and never changes afterwards.
    Texture { texture: Arc<Texture>, unit: u32 },
}

impl UniformValue {
    /// Serialize this value into the material uniform block at `offset`.
    ///
    /// `size` is the reflected byte size of the shader-side member; values
    /// that do not fit are skipped (with a log) rather than corrupting
    /// neighbouring members. Texture values never land in the block.
    pub fn write_block(&self, block: &mut [u8], offset: u32, size: u32) {
        let bytes: &[u8] = match self {
            UniformValue::Int(v) => bytemuck::bytes_of(v),
            // WGSL uniform blocks cannot hold bools; the shader-side member
            // is an i32 and zero means false.
            UniformValue::Bool(v) => {
                let as_int: i32 = if *v { 1 } else { 0 };
                return Self::copy(block, offset, size, bytemuck::bytes_of(&as_int));
            }
            UniformValue::Float(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::cast_slice(v),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v),
            UniformValue::Mat4(v) => bytemuck::cast_slice(v.as_flattened()),
            UniformValue::Texture { .. } => return,
        };
        Self::copy(block, offset, size, bytes);
    }

    fn copy(block: &mut [u8], offset: u32, size: u32, bytes: &[u8]) {
        let offset = offset as usize;
        let end = offset + bytes.len();
        if bytes.len() > size as usize || end > block.len() {
            log::warn!(
                "uniform value of {} bytes does not fit its {} byte slot at offset {}",
                bytes.len(),
                size,
                offset
            );
            return;
        }
        block[offset..end].copy_from_slice(bytes);
    }
}

/// A declared material uniform: its current value and the location it
/// resolved to within the material's program.
///
/// `location == None` after resolution is not an error; it means the
/// program does not use the variable and uploads of it are silent no-ops.
#[derive(Debug, Clone)]
pub struct Uniform {
    pub value: UniformValue,
    pub location: Option<UniformLocation>,
}

impl Uniform {
    pub fn new(value: UniformValue) -> Self {
        Self {
            value,
            location: None,
        }
    }
}
