use beatstage::data_structures::material::Material;
use beatstage::data_structures::uniform::UniformValue;
use beatstage::shader::{ShaderProgram, UniformLocation};

/// A minimal but valid program with the material-group shape the engine
/// uses: a uniform block at binding 0 and a texture/sampler pair after it.
const TEST_SHADER: &str = r#"
struct Params {
    base_color: vec3<f32>,
    opacity: f32,
    use_texture: i32,
}
@group(1) @binding(0)
var<uniform> params: Params;
@group(1) @binding(1)
var diffuse_map: texture_2d<f32>;
@group(1) @binding(2)
var diffuse_sampler: sampler;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = textureSample(diffuse_map, diffuse_sampler, position.xy);
    let color = select(params.base_color, params.base_color * texel.rgb, params.use_texture != 0);
    return vec4<f32>(color, params.opacity);
}
"#;

#[test]
fn reflection_resolves_block_members_and_textures() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 1).unwrap();

    assert_eq!(
        program.uniform_location("base_color"),
        Some(UniformLocation::Block { offset: 0, size: 12 })
    );
    assert_eq!(
        program.uniform_location("opacity"),
        Some(UniformLocation::Block { offset: 12, size: 4 })
    );
    assert_eq!(
        program.uniform_location("use_texture"),
        Some(UniformLocation::Block { offset: 16, size: 4 })
    );
    assert_eq!(
        program.uniform_location("diffuse_map"),
        Some(UniformLocation::Sampled { binding: 1 })
    );
    // The block span rounds up to a 16-byte multiple.
    assert_eq!(program.block_size(), Some(32));
}

#[test]
fn unknown_uniform_resolves_to_none_without_error() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 1).unwrap();
    assert_eq!(program.uniform_location("shininess"), None);
}

#[test]
fn pack_writes_each_value_at_its_reflected_offset() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 1).unwrap();
    let mut material = Material::new(program);
    material.declare("base_color", UniformValue::Vec3([0.25, 0.5, 0.75]));
    material.declare("opacity", UniformValue::Float(0.5));
    material.declare("use_texture", UniformValue::Bool(true));
    material.resolve();

    let block = material.pack_block().expect("resolved uniforms to pack");
    assert_eq!(block.len(), 32);

    let floats: Vec<f32> = block[0..16]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
        .collect();
    assert_eq!(floats, vec![0.25, 0.5, 0.75, 0.5]);
    let flag = i32::from_le_bytes(block[16..20].try_into().unwrap());
    assert_eq!(flag, 1);
}

#[test]
fn unresolved_uniforms_produce_no_write_at_all() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 1).unwrap();
    let mut material = Material::new(program);
    material.declare("shininess", UniformValue::Float(80.0));
    material.declare("specular_strength", UniformValue::Float(3.0));
    material.resolve();

    assert_eq!(material.uniform("shininess").unwrap().location, None);
    // With every declared uniform ignored by the program there is nothing
    // to upload; pack reports that by returning no block.
    assert!(material.pack_block().is_none());
}

#[test]
fn unresolved_uniforms_are_skipped_next_to_resolved_ones() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 1).unwrap();
    let mut material = Material::new(program);
    material.declare("opacity", UniformValue::Float(0.6));
    material.declare("shininess", UniformValue::Float(80.0));
    material.resolve();

    let block = material.pack_block().unwrap();
    let opacity = f32::from_le_bytes(block[12..16].try_into().unwrap());
    assert_eq!(opacity, 0.6);
    // The skipped uniform left the rest of the block untouched.
    assert!(block[0..12].iter().all(|&b| b == 0));
    assert!(block[16..].iter().all(|&b| b == 0));
}

#[test]
fn program_without_material_group_has_no_locations() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 0).unwrap();
    assert_eq!(program.block_size(), None);
    assert_eq!(program.uniform_location("base_color"), None);
    assert_eq!(program.uniform_location("diffuse_map"), None);
}

#[test]
fn invalid_wgsl_is_a_fatal_build_error() {
    let err = ShaderProgram::reflect("broken shader", "this is not wgsl", 0).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("broken shader"), "{message}");
}

#[test]
fn data_uniform_never_resolves_into_a_texture_slot() {
    let program = ShaderProgram::reflect("test shader", TEST_SHADER, 1).unwrap();
    let mut material = Material::new(program);
    // Declaring a float under a sampler's name must not alias the slot.
    material.declare("diffuse_map", UniformValue::Float(1.0));
    material.resolve();
    assert_eq!(material.uniform("diffuse_map").unwrap().location, None);
}
