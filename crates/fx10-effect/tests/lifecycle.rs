mod common;

use common::RecordingDevice;
use fx10_dxbc::test_utils::fx10::{
    object_type, BufferRecord, Fx10Builder, NumericMember, ObjectInit, ObjectRecord, PassRecord, TechniqueRecord,
    FX_4_1,
};
use fx10_dxbc::test_utils::{build_container, build_shader, SignatureEntryDesc};
use fx10_dxbc::FourCC;
use fx10_effect::stream_output::StreamOutputEntry;
use fx10_effect::{Effect, EffectError, EffectFlags, NullDevice, VariableInterface};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn vertex_shader() -> Vec<u8> {
    build_shader(
        &[],
        &[SignatureEntryDesc {
            semantic_name: "POSITION",
            semantic_index: 0,
            register: 0,
            mask: 0xf,
        }],
        &[],
    )
}

/// A buffer and two shaders: three device objects.
fn three_objects() -> Fx10Builder {
    let mut b = Fx10Builder::new();
    let float = b.float_type();
    b.buffer(BufferRecord::cbuffer("cb").member(NumericMember::new("x", float)));
    let code = vertex_shader();
    let first = b.shader(&code);
    let second = b.shader(&code);
    let vs_ty = b.object_type("VertexShader", object_type::VERTEX_SHADER, 2);
    b.object(ObjectRecord::new("shaders", vs_ty).init(ObjectInit::Shaders(vec![(first, None), (second, None)])));
    b
}

#[test]
fn dropping_the_effect_releases_in_reverse_order() {
    let device = RecordingDevice::new();
    let effect = Effect::from_memory(&three_objects().finish(), EffectFlags::empty(), device.clone(), None).unwrap();
    assert_eq!(device.created().len(), 3);
    assert!(device.released().is_empty());

    let clone = effect.clone();
    drop(effect);
    assert!(device.released().is_empty());
    drop(clone);

    let mut created = device.created();
    created.reverse();
    assert_eq!(device.released(), created);
}

#[test]
fn failed_creation_releases_what_was_created() {
    let device = RecordingDevice::failing_after(2);
    let err = Effect::from_memory(&three_objects().finish(), EffectFlags::empty(), device.clone(), None).unwrap_err();
    assert!(matches!(err, EffectError::Device(_)), "{err:?}");
    assert!(!err.is_malformed_input());

    let mut created = device.created();
    assert_eq!(created.len(), 2);
    created.reverse();
    assert_eq!(device.released(), created);
}

#[test]
fn both_effect_versions_load() {
    let mut b = Fx10Builder::new().version(FX_4_1);
    b.technique(TechniqueRecord::new("t").pass(PassRecord::new("p")));
    let effect = Effect::from_memory(&b.finish(), EffectFlags::empty(), Arc::new(NullDevice::new()), None).unwrap();
    assert_eq!(effect.desc().techniques, 1);
    assert!(!effect.desc().is_child_effect);
}

#[test]
fn unknown_versions_and_missing_chunks_are_rejected() {
    let device = Arc::new(NullDevice::new());
    let b = Fx10Builder::new().version(0xfeff_2001);
    let err = Effect::from_memory(&b.finish(), EffectFlags::empty(), device.clone(), None).unwrap_err();
    assert!(matches!(err, EffectError::UnsupportedVersion(0xfeff_2001)), "{err:?}");

    let shader_only = build_container(&[(FourCC::SHDR, &[0u8; 4][..])]);
    let err = Effect::from_memory(&shader_only, EffectFlags::empty(), device.clone(), None).unwrap_err();
    assert!(matches!(err, EffectError::MissingEffectChunk), "{err:?}");

    let err = Effect::from_memory(b"DXBC", EffectFlags::empty(), device, None).unwrap_err();
    assert!(matches!(err, EffectError::Container(_)), "{err:?}");
}

#[test]
fn truncated_payloads_fail_cleanly() {
    let mut b = three_objects();
    b.technique(TechniqueRecord::new("t").pass(PassRecord::new("p")));
    let payload = b.finish_payload();
    for len in [0, 8, 76, payload.len() / 2, payload.len() - 4] {
        let device = RecordingDevice::new();
        let blob = build_container(&[(FourCC::FX10, &payload[..len])]);
        let err = Effect::from_memory(&blob, EffectFlags::empty(), device.clone(), None).unwrap_err();
        assert!(err.is_malformed_input(), "length {len}: {err:?}");
        assert_eq!(device.released().len(), device.created().len());
    }
}

#[test]
fn unsupported_pass_properties_are_not_implemented() {
    let mut b = Fx10Builder::new();
    let pass = PassRecord::new("p").assign(b.assign_constant(0x03, 0, &[]));
    b.technique(TechniqueRecord::new("t").pass(pass));
    let err = Effect::from_memory(&b.finish(), EffectFlags::empty(), RecordingDevice::new(), None).unwrap_err();
    assert!(matches!(err, EffectError::NotImplemented(_)), "{err:?}");
}

#[test]
fn unknown_pass_references_fail() {
    let mut b = Fx10Builder::new();
    let pass = PassRecord::new("p").assign(b.assign_variable(0x06, 0, "missing"));
    b.technique(TechniqueRecord::new("t").pass(pass));
    let err = Effect::from_memory(&b.finish(), EffectFlags::empty(), RecordingDevice::new(), None).unwrap_err();
    assert!(matches!(&err, EffectError::UnknownSymbol(name) if name == "missing"), "{err:?}");

    // A pixel shader cannot be bound to the vertex stage.
    let mut b = Fx10Builder::new();
    let code = vertex_shader();
    let ps = b.shader(&code);
    let ps_ty = b.object_type("PixelShader", object_type::PIXEL_SHADER, 0);
    b.object(ObjectRecord::new("ps", ps_ty).init(ObjectInit::Shaders(vec![(ps, None)])));
    let pass = PassRecord::new("p").assign(b.assign_variable(0x06, 0, "ps"));
    b.technique(TechniqueRecord::new("t").pass(pass));
    let err = Effect::from_memory(&b.finish(), EffectFlags::empty(), RecordingDevice::new(), None).unwrap_err();
    assert!(matches!(err, EffectError::SymbolTypeMismatch { .. }), "{err:?}");
}

#[test]
fn inline_shaders_beyond_the_declared_count_are_rejected() {
    let mut b = Fx10Builder::new();
    let code = vertex_shader();
    let pass = PassRecord::new("p").assign(b.assign_anonymous_shader(0x06, Some(&code), None));
    b.technique(TechniqueRecord::new("t").pass(pass));
    b.set_anonymous_shader_count(0);

    let device = RecordingDevice::new();
    let err = Effect::from_memory(&b.finish(), EffectFlags::empty(), device.clone(), None).unwrap_err();
    assert!(matches!(err, EffectError::Malformed { .. }), "{err:?}");
    assert!(device.created().is_empty());
}

#[test]
fn inline_geometry_shader_streams_output() {
    let mut b = Fx10Builder::new();
    let code = vertex_shader();
    let decl = "SV_POSITION.xyzw; 1:TEXCOORD0.xy";
    let pass = PassRecord::new("p")
        .assign(b.assign_anonymous_shader(0x06, Some(&code), None))
        .assign(b.assign_anonymous_shader(0x08, Some(&code), Some(decl)))
        .assign(b.assign_anonymous_shader(0x07, None, None));
    b.technique(TechniqueRecord::new("t").pass(pass));

    let device = RecordingDevice::new();
    let effect = Effect::from_memory(&b.finish(), EffectFlags::empty(), device.clone(), None).unwrap();

    let streamed = device.stream_output_shaders();
    assert_eq!(streamed.len(), 1);
    assert_eq!(streamed[0].stride, 16);
    assert_eq!(
        streamed[0].entries,
        vec![
            StreamOutputEntry {
                semantic_name: Some("SV_POSITION".into()),
                semantic_index: 0,
                start_component: 0,
                component_count: 4,
                output_slot: 0,
            },
            StreamOutputEntry {
                semantic_name: Some("TEXCOORD".into()),
                semantic_index: 0,
                start_component: 0,
                component_count: 2,
                output_slot: 1,
            },
        ]
    );

    let pass = effect.technique_by_index(0).pass_by_index(0);
    let gs = pass.geometry_shader_desc().unwrap().shader;
    let gs_desc = gs.shader_desc(0).unwrap();
    assert!(gs_desc.is_inline);
    assert_eq!(gs_desc.stream_output_declaration.as_deref(), Some(decl));
    assert_eq!(gs.geometry_shader(0).unwrap(), Some(streamed[0].handle));

    let desc = gs.desc().unwrap();
    assert_eq!(desc.name.as_deref(), Some("geometryshader"));
    assert_eq!(desc.explicit_bind_point, 0);

    // The null pixel shader is a valid variable whose shader is `None`.
    let ps = pass.pixel_shader_desc().unwrap().shader;
    assert!(ps.is_valid());
    assert_eq!(ps.pixel_shader(0).unwrap(), None);
    assert_eq!(ps.shader_desc(0).unwrap().bytecode, None);
}

#[test]
fn optimize_drops_names_and_bytecode() {
    let mut b = three_objects();
    let pass = PassRecord::new("p").assign(b.assign_constant_index(0x06, 0, "shaders", 0));
    b.technique(TechniqueRecord::new("t").pass(pass));
    let mut effect =
        Effect::from_memory(&b.finish(), EffectFlags::empty(), RecordingDevice::new(), None).unwrap();
    assert!(effect.variable_by_name("shaders").as_shader().shader_desc(1).unwrap().bytecode.is_some());

    let other = effect.clone();
    assert!(matches!(effect.optimize(), Err(EffectError::InvalidUsage(_))));
    drop(other);

    effect.optimize().unwrap();
    assert!(effect.is_optimized());
    effect.optimize().unwrap();

    assert!(!effect.technique_by_name("t").is_valid());
    let technique = effect.technique_by_index(0);
    assert!(technique.is_valid());
    assert_eq!(technique.desc().unwrap().name, None);
    assert!(!technique.pass_by_name("p").is_valid());

    let shader = effect.variable_by_name("shaders").as_shader().shader_desc(1).unwrap();
    assert_eq!(shader.bytecode, None);
    assert!(shader.input_signature.is_some());
    technique.pass_by_index(0).apply(0).unwrap();
}
