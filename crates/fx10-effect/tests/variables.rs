mod common;

use common::RecordingDevice;
use fx10_dxbc::test_utils::fx10::{
    object_type, BufferRecord, Fx10Builder, NumericBase, NumericClass, NumericMember, ObjectInit, ObjectRecord,
    PassRecord, TechniqueRecord,
};
use fx10_effect::device::ShaderResourceViewHandle;
use fx10_effect::{Effect, EffectError, EffectFlags, TypeClass, VariableFlags, VariableInterface};
use pretty_assertions::assert_eq;

fn load(builder: &Fx10Builder) -> Effect {
    common::init_tracing();
    Effect::from_memory(&builder.finish(), EffectFlags::empty(), RecordingDevice::new(), None).unwrap()
}

#[test]
fn members_pack_into_registers() {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    let float2 = b.float_vector_type(2);
    let float4 = b.float_vector_type(4);
    b.buffer(
        BufferRecord::cbuffer("PerFrame")
            .member(NumericMember::new("a", float))
            .member(NumericMember::new("b", float))
            .member(NumericMember::new("c", float2))
            .member(NumericMember::new("d", float4)),
    );
    let effect = load(&b);

    let offsets: Vec<u32> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| effect.variable_by_name(name).desc().unwrap().buffer_offset)
        .collect();
    assert_eq!(offsets, vec![0, 4, 8, 16]);

    let cb = effect.constant_buffer_by_name("PerFrame");
    assert!(cb.is_valid());
    assert_eq!(cb.effect_type().desc().unwrap().unpacked_size, 32);
    assert_eq!(cb.member_by_index(3).desc().unwrap().name.as_deref(), Some("d"));
    assert_eq!(effect.variable_by_name("c").parent_constant_buffer().desc().unwrap().name.as_deref(), Some("PerFrame"));
}

#[test]
fn explicit_offsets_are_flagged() {
    let mut b = Fx10Builder::new();
    let float4 = b.float_vector_type(4);
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("light", float4).packoffset(32)));
    let effect = load(&b);

    let desc = effect.variable_by_name("light").desc().unwrap();
    assert_eq!(desc.buffer_offset, 32);
    assert!(desc.flags.contains(VariableFlags::EXPLICIT_BIND_POINT));
    assert_eq!(effect.constant_buffer_by_index(0).effect_type().desc().unwrap().unpacked_size, 48);
}

#[test]
fn recorded_offsets_and_size_give_way_to_packing() {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    let float4 = b.float_vector_type(4);
    b.buffer(
        BufferRecord::cbuffer("cb")
            .member(NumericMember::new("a", float).recorded_offset(0))
            .member(NumericMember::new("b", float).recorded_offset(0))
            .member(NumericMember::new("c", float).recorded_offset(0))
            .member(NumericMember::new("d", float4).recorded_offset(0).default_value(&[1, 2, 3, 4]))
            .size(64),
    );
    let device = RecordingDevice::new();
    let effect = Effect::from_memory(&b.finish(), EffectFlags::empty(), device.clone(), None).unwrap();

    let offsets: Vec<u32> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| effect.variable_by_name(name).desc().unwrap().buffer_offset)
        .collect();
    assert_eq!(offsets, vec![0, 4, 8, 16]);

    let cb = effect.constant_buffer_by_name("cb");
    let desc = cb.effect_type().desc().unwrap();
    assert_eq!((desc.unpacked_size, desc.stride), (32, 32));

    let data = device.initial_data(cb.get_constant_buffer().unwrap().unwrap()).unwrap();
    assert_eq!(data.len(), 32);
    assert_eq!(&data[16..20], &1u32.to_le_bytes());
    assert_eq!(&data[28..32], &4u32.to_le_bytes());
}

#[test]
fn structs_align_and_vectors_fill_registers() {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    let float3 = b.float_vector_type(3);
    let single = b.struct_type("Single", &[("x", float)], 0);
    b.buffer(
        BufferRecord::cbuffer("vectors")
            .member(NumericMember::new("scale", float).recorded_offset(0))
            .member(NumericMember::new("axis", float3).recorded_offset(0)),
    );
    b.buffer(
        BufferRecord::cbuffer("structs")
            .member(NumericMember::new("weight", float).recorded_offset(0))
            .member(NumericMember::new("inner", single).recorded_offset(0))
            .member(NumericMember::new("bias", float).recorded_offset(0)),
    );
    let effect = load(&b);

    let offset = |name: &str| effect.variable_by_name(name).desc().unwrap().buffer_offset;
    assert_eq!((offset("scale"), offset("axis")), (0, 4));
    assert_eq!((offset("weight"), offset("inner"), offset("bias")), (0, 16, 20));
    let size = |name: &str| effect.constant_buffer_by_name(name).effect_type().desc().unwrap().unpacked_size;
    assert_eq!((size("vectors"), size("structs")), (16, 32));

    effect.variable_by_name("inner").member_by_name("x").as_scalar().set_float(2.0).unwrap();
    assert_eq!(effect.variable_by_name("bias").as_scalar().get_float().unwrap(), 0.0);
    assert_eq!(effect.variable_by_name("inner").member_by_name("x").desc().unwrap().buffer_offset, 16);
}

#[test]
fn buffer_packing_past_the_size_cap_is_malformed() {
    let mut b = Fx10Builder::new();
    let float4 = b.float_vector_type(4);
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("v", float4).packoffset(1 << 24)));

    let err = Effect::from_memory(&b.finish(), EffectFlags::empty(), RecordingDevice::new(), None).unwrap_err();
    assert!(matches!(err, EffectError::Malformed { .. }), "{err:?}");
    assert!(err.is_malformed_input());
}

#[test]
fn float_values_roundtrip() {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    let float3 = b.float_vector_type(3);
    b.buffer(
        BufferRecord::cbuffer("cb")
            .member(NumericMember::new("scale", float))
            .member(NumericMember::new("dir", float3)),
    );
    let effect = load(&b);

    let scale = effect.variable_by_name("scale").as_scalar();
    scale.set_float(-2.5).unwrap();
    assert_eq!(scale.get_float().unwrap(), -2.5);

    let dir = effect.variable_by_name("dir").as_vector();
    dir.set_float_vector(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    // Only three components are stored.
    assert_eq!(dir.get_float_vector().unwrap(), [1.0, 2.0, 3.0, 0.0]);
}

#[test]
fn float_written_to_int_truncates() {
    let mut b = Fx10Builder::new();
    let int = b.numeric_type("int", NumericClass::Scalar, NumericBase::Int, 1, 1, 0, false);
    let flag = b.numeric_type("bool", NumericClass::Scalar, NumericBase::Bool, 1, 1, 0, false);
    b.buffer(
        BufferRecord::cbuffer("cb")
            .member(NumericMember::new("count", int))
            .member(NumericMember::new("enabled", flag)),
    );
    let effect = load(&b);

    let count = effect.variable_by_name("count").as_scalar();
    count.set_float(2.75).unwrap();
    assert_eq!(count.get_int().unwrap(), 2);
    assert_eq!(count.get_float().unwrap(), 2.0);

    let enabled = effect.variable_by_name("enabled").as_scalar();
    enabled.set_int(5).unwrap();
    assert!(enabled.get_bool().unwrap());
    let mut raw = [0u8; 4];
    enabled.get_raw_value(&mut raw, 0).unwrap();
    assert_eq!(u32::from_le_bytes(raw), 0xffff_ffff);
}

#[test]
fn array_elements_sit_one_register_apart() {
    let mut b = Fx10Builder::new();
    let weights = b.numeric_type("float", NumericClass::Scalar, NumericBase::Float, 1, 1, 3, false);
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("weights", weights)));
    let effect = load(&b);

    let array = effect.variable_by_name("weights");
    let offsets: Vec<u32> = (0..3).map(|i| array.element(i).desc().unwrap().buffer_offset).collect();
    assert_eq!(offsets, vec![0, 16, 32]);
    assert!(!array.element(3).is_valid());
    assert_eq!(array.element(1).desc().unwrap().name.as_deref(), Some("weights"));

    let scalar = array.as_scalar();
    scalar.set_array(&[1.0f32, 2.0, 3.0, 4.0, 5.0], 1).unwrap();
    let mut out = [0.0f32; 3];
    scalar.get_array(&mut out, 0).unwrap();
    assert_eq!(out, [0.0, 1.0, 2.0]);

    // Starting past the end is ignored.
    scalar.set_array(&[9.0f32], 3).unwrap();
    assert_eq!(array.element(2).as_scalar().get_float().unwrap(), 2.0);
}

#[test]
fn default_values_are_unpacked_into_the_buffer() {
    let mut b = Fx10Builder::new();
    let weights = b.numeric_type("float", NumericClass::Scalar, NumericBase::Float, 1, 1, 3, false);
    let float2 = b.float_vector_type(2);
    b.buffer(
        BufferRecord::cbuffer("cb")
            .member(NumericMember::new("weights", weights).default_value(&[
                1.0f32.to_bits(),
                2.0f32.to_bits(),
                3.0f32.to_bits(),
            ]))
            .member(NumericMember::new("offset", float2).default_value(&[0.5f32.to_bits(), 0.25f32.to_bits()])),
    );
    let device = RecordingDevice::new();
    let effect = Effect::from_memory(&b.finish(), EffectFlags::empty(), device.clone(), None).unwrap();

    let mut out = [0.0f32; 3];
    effect.variable_by_name("weights").as_scalar().get_array(&mut out, 0).unwrap();
    assert_eq!(out, [1.0, 2.0, 3.0]);
    assert_eq!(
        effect.variable_by_name("offset").as_vector().get_float_vector().unwrap(),
        [0.5, 0.25, 0.0, 0.0]
    );

    let buffer = effect.constant_buffer_by_name("cb").get_constant_buffer().unwrap().unwrap();
    let initial = device.initial_data(buffer).unwrap();
    let word = |at: usize| f32::from_le_bytes(initial[at..at + 4].try_into().unwrap());
    assert_eq!([word(0), word(16), word(32), word(36), word(40)], [1.0, 2.0, 3.0, 0.5, 0.25]);
}

#[test]
fn matrices_follow_their_major_order() {
    let mut b = Fx10Builder::new();
    let rows = b.numeric_type("float4x4", NumericClass::Matrix, NumericBase::Float, 4, 4, 0, false);
    let columns = b.numeric_type("float3x2", NumericClass::Matrix, NumericBase::Float, 3, 2, 0, true);
    b.buffer(
        BufferRecord::cbuffer("cb")
            .member(NumericMember::new("world", rows))
            .member(NumericMember::new("uv", columns)),
    );
    let effect = load(&b);

    let mut m = [[0.0f32; 4]; 4];
    for (r, row) in m.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = (r * 10 + c) as f32;
        }
    }

    let world = effect.variable_by_name("world").as_matrix();
    world.set_matrix(&m).unwrap();
    assert_eq!(world.get_matrix().unwrap(), m);
    let mut raw = [0u8; 4];
    world.get_raw_value(&mut raw, 16 + 8).unwrap();
    assert_eq!(f32::from_le_bytes(raw), 12.0);

    world.set_matrix_transpose(&m).unwrap();
    let stored = world.get_matrix().unwrap();
    assert_eq!(stored[1][2], m[2][1]);
    assert_eq!(world.get_matrix_transpose().unwrap(), m);

    let uv = effect.variable_by_name("uv").as_matrix();
    assert_eq!(uv.effect_type().desc().unwrap().class, TypeClass::MatrixColumns);
    uv.set_matrix(&m).unwrap();
    // Column 1, row 2 is word 6 of a column-major element.
    uv.get_raw_value(&mut raw, 24).unwrap();
    assert_eq!(f32::from_le_bytes(raw), 21.0);
    let back = uv.get_matrix().unwrap();
    assert_eq!(back[2][1], 21.0);
    assert_eq!(back[3], [0.0; 4]);
    assert_eq!(back[0][2], 0.0);
}

#[test]
fn raw_access_is_bounded_by_the_variable() {
    let mut b = Fx10Builder::new();
    let float2 = b.float_vector_type(2);
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("v", float2)));
    let effect = load(&b);

    let v = effect.variable_by_name("v");
    v.set_raw_value(&1.0f32.to_le_bytes(), 4).unwrap();
    assert_eq!(v.as_vector().get_float_vector().unwrap(), [0.0, 1.0, 0.0, 0.0]);
    assert!(matches!(v.set_raw_value(&[0; 8], 4), Err(EffectError::InvalidUsage(_))));
}

#[test]
fn struct_members_are_reachable_by_name_and_semantic() {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    let float3 = b.float_vector_type(3);
    let light = b.struct_type("Light", &[("color", float3), ("range", float)], 0);
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("sun", light).semantic("SUN")));
    let effect = load(&b);

    let sun = effect.variable_by_semantic("sun");
    assert!(sun.is_valid());
    assert!(!sun.as_scalar().is_valid());
    let range = sun.member_by_name("range");
    assert_eq!(range.desc().unwrap().buffer_offset, 12);
    range.as_scalar().set_float(40.0).unwrap();
    assert_eq!(sun.member_by_index(1).as_scalar().get_float().unwrap(), 40.0);
    assert!(!sun.member_by_name("missing").is_valid());
    assert_eq!(sun.effect_type().member_type_by_index(0).desc().unwrap().columns, 3);
}

#[test]
fn annotations_are_read_only() {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    let weight = b.annotation_numeric("weight", float, &[1.5f32.to_bits()]);
    let label = b.annotation_string("label", &["hello"]);
    b.technique(
        TechniqueRecord::new("main")
            .annotation(weight)
            .annotation(label)
            .pass(PassRecord::new("p0")),
    );
    let effect = load(&b);

    let technique = effect.technique_by_name("main");
    assert_eq!(technique.desc().unwrap().annotations, 2);
    let weight = technique.annotation_by_name("weight");
    assert!(weight.desc().unwrap().flags.contains(VariableFlags::ANNOTATION));
    assert_eq!(weight.as_scalar().get_float().unwrap(), 1.5);
    assert!(matches!(weight.as_scalar().set_float(2.0), Err(EffectError::InvalidUsage(_))));
    assert_eq!(technique.annotation_by_index(1).as_string().get_string().unwrap(), Some("hello"));
    assert!(!technique.annotation_by_index(2).is_valid());
}

#[test]
fn strings_and_views_live_outside_buffers() {
    let mut b = Fx10Builder::new();
    let string = b.object_type("String", object_type::STRING, 2);
    let textures = b.object_type("Texture2D", object_type::TEXTURE2D, 2);
    b.object(ObjectRecord::new("names", string).init(ObjectInit::Strings(vec!["albedo".into(), "normal".into()])));
    b.object(ObjectRecord::new("maps", textures).semantic("MAPS"));
    let effect = load(&b);

    let mut names = [None; 2];
    effect.variable_by_name("names").as_string().get_string_array(&mut names, 0).unwrap();
    assert_eq!(names, [Some("albedo"), Some("normal")]);

    let maps = effect.variable_by_semantic("maps").as_shader_resource();
    maps.set_resource_array(&[Some(ShaderResourceViewHandle(7)), Some(ShaderResourceViewHandle(8))], 0)
        .unwrap();
    assert_eq!(
        maps.element(1).as_shader_resource().get_resource().unwrap(),
        Some(ShaderResourceViewHandle(8))
    );
    assert!(matches!(
        maps.set_resource_array(&[None], 2),
        Err(EffectError::InvalidUsage(_))
    ));
}

#[test]
fn failed_lookups_return_sentinels() {
    let mut b = Fx10Builder::new();
    let float4 = b.float_vector_type(4);
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("tint", float4)));
    let effect = load(&b);

    assert!(!effect.variable_by_name("missing").is_valid());
    assert!(!effect.variable_by_index(1).is_valid());
    assert!(!effect.constant_buffer_by_index(1).is_valid());
    assert!(!effect.technique_by_index(0).is_valid());
    assert!(!effect.technique_by_name("t").pass_by_name("p").is_valid());

    let tint = effect.variable_by_name("tint");
    assert!(tint.as_vector().is_valid());
    assert!(!tint.as_matrix().is_valid());
    assert!(matches!(tint.as_matrix().get_matrix(), Err(EffectError::InvalidUsage(_))));
    assert!(matches!(
        effect.variable_by_name("missing").as_scalar().set_float(1.0),
        Err(EffectError::InvalidUsage(_))
    ));
    assert!(matches!(
        effect.technique_by_index(3).pass_by_index(0).apply(0),
        Err(EffectError::InvalidUsage(_))
    ));
}
