mod common;

use std::sync::Arc;

use common::{Call, RecordingDevice};
use fx10_dxbc::test_utils::fx10::{
    object_type, value_type, BufferRecord, Fx10Builder, NumericMember, ObjectInit, ObjectRecord, PassRecord,
    TechniqueRecord,
};
use fx10_dxbc::test_utils::{build_shader, ResourceBindingDesc, SignatureEntryDesc};
use fx10_dxbc::{DxbcFile, FourCC};
use fx10_effect::device::{BufferHandle, ShaderResourceViewHandle};
use fx10_effect::{Effect, EffectError, EffectFlags, ShaderStage, VariableInterface};
use pretty_assertions::assert_eq;

const CBUFFER: u32 = 0;
const TEXTURE: u32 = 2;
const SAMPLER: u32 = 3;

fn resource(name: &str, input_type: u32, bind_point: u32, bind_count: u32) -> ResourceBindingDesc<'_> {
    ResourceBindingDesc {
        name,
        input_type,
        bind_point,
        bind_count,
    }
}

fn position() -> SignatureEntryDesc<'static> {
    SignatureEntryDesc {
        semantic_name: "POSITION",
        semantic_index: 0,
        register: 0,
        mask: 0xf,
    }
}

fn load(builder: &Fx10Builder) -> (Arc<RecordingDevice>, Effect) {
    common::init_tracing();
    let device = RecordingDevice::new();
    let effect = Effect::from_memory(&builder.finish(), EffectFlags::empty(), device.clone(), None).unwrap();
    device.clear_calls();
    (device, effect)
}

/// One cbuffer read by the vertex shader at slot 1.
fn tinted() -> Fx10Builder {
    let mut b = Fx10Builder::new();
    let float4 = b.float_vector_type(4);
    b.buffer(BufferRecord::cbuffer("PerFrame").member(NumericMember::new("tint", float4)));

    let vs = build_shader(&[resource("PerFrame", CBUFFER, 1, 1)], &[position()], &[position()]);
    let vs = b.shader(&vs);
    let vs_ty = b.object_type("VertexShader", object_type::VERTEX_SHADER, 0);
    b.object(ObjectRecord::new("vs", vs_ty).init(ObjectInit::Shaders(vec![(vs, None)])));

    let pass = PassRecord::new("p0").assign(b.assign_variable(0x06, 0, "vs"));
    b.technique(TechniqueRecord::new("main").pass(pass));
    b
}

#[test]
fn dirty_buffers_upload_once() {
    let (device, effect) = load(&tinted());
    let buffer = effect.constant_buffer_by_name("PerFrame").get_constant_buffer().unwrap().unwrap();
    let vs = effect.variable_by_name("vs").as_shader().vertex_shader(0).unwrap();
    assert!(vs.is_some());

    effect
        .variable_by_name("tint")
        .as_vector()
        .set_float_vector(&[1.0, 0.5, 0.25, 1.0])
        .unwrap();
    let pass = effect.technique_by_name("main").pass_by_name("p0");
    pass.apply(0).unwrap();
    pass.apply(0).unwrap();

    let bytes: Vec<u8> = [1.0f32, 0.5, 0.25, 1.0].iter().flat_map(|f| f.to_le_bytes()).collect();
    let bind = [
        Call::SetShader(ShaderStage::Vertex, vs),
        Call::SetConstantBuffers(ShaderStage::Vertex, 1, vec![Some(buffer)]),
    ];
    let mut expected = vec![bind[0].clone(), Call::UpdateBuffer(buffer, bytes), bind[1].clone()];
    expected.extend(bind.iter().cloned());
    assert_eq!(device.calls(), expected);
    assert_eq!(device.uploads(), 1);
}

#[test]
fn overridden_buffers_are_bound_without_uploading() {
    let (device, effect) = load(&tinted());
    let cb = effect.constant_buffer_by_name("PerFrame");
    let own = cb.get_constant_buffer().unwrap().unwrap();
    let pass = effect.technique_by_index(0).pass_by_index(0);

    cb.set_constant_buffer(Some(BufferHandle(999))).unwrap();
    assert_eq!(cb.get_constant_buffer().unwrap(), Some(BufferHandle(999)));
    effect.variable_by_name("tint").as_vector().set_float_vector(&[1.0; 4]).unwrap();
    pass.apply(0).unwrap();
    assert_eq!(device.uploads(), 0);
    assert!(device
        .calls()
        .contains(&Call::SetConstantBuffers(ShaderStage::Vertex, 1, vec![Some(BufferHandle(999))])));

    // The write made while overridden is uploaded once the effect's buffer is back.
    cb.set_constant_buffer(None).unwrap();
    device.clear_calls();
    pass.apply(0).unwrap();
    assert_eq!(device.uploads(), 1);
    assert!(device
        .calls()
        .contains(&Call::SetConstantBuffers(ShaderStage::Vertex, 1, vec![Some(own)])));

    assert!(matches!(cb.set_texture_buffer(None), Err(EffectError::InvalidUsage(_))));
}

#[test]
fn pass_describes_its_input_signature() {
    let (_, effect) = load(&tinted());
    let pass = effect.technique_by_index(0).pass_by_index(0);
    let desc = pass.desc().unwrap();
    assert_eq!(desc.name.as_deref(), Some("p0"));
    assert_eq!(desc.sample_mask, 0xffff_ffff);

    let signature = desc.ia_input_signature.unwrap();
    let file = DxbcFile::parse(&signature).unwrap();
    let isgn = file.get_signature(FourCC::ISGN).unwrap().unwrap();
    assert_eq!(isgn.entries[0].semantic_name, "POSITION");

    let vs = pass.vertex_shader_desc().unwrap();
    assert!(vs.shader.is_valid());
    assert_eq!(vs.shader.shader_desc(0).unwrap().input_parameters, 1);
    let element = vs.shader.output_signature_element_desc(0, 0).unwrap();
    assert_eq!(element.semantic_name, "POSITION");
    assert!(!pass.pixel_shader_desc().unwrap().shader.is_valid());
    assert!(matches!(
        vs.shader.pixel_shader(0),
        Err(EffectError::InvalidUsage(_))
    ));
}

#[test]
fn sampler_textures_and_arrays_bind_per_slot() {
    let mut b = Fx10Builder::new();
    let tex = b.object_type("Texture2D", object_type::TEXTURE2D, 0);
    let texs = b.object_type("Texture2D", object_type::TEXTURE2D, 2);
    let sampler = b.object_type("SamplerState", object_type::SAMPLER, 0);
    b.object(ObjectRecord::new("diffuse", tex));
    b.object(ObjectRecord::new("maps", texs));
    let texture = b.assign_variable(0x37, 0, "diffuse");
    let filter = b.assign_constant(0x2d, 0, &[(value_type::INT, 0x0)]);
    b.object(ObjectRecord::new("linear", sampler).init(ObjectInit::States(vec![vec![filter, texture]])));

    let ps = build_shader(
        &[
            resource("linear", TEXTURE, 0, 1),
            resource("linear", SAMPLER, 0, 1),
            resource("maps", TEXTURE, 1, 3),
        ],
        &[],
        &[],
    );
    let ps = b.shader(&ps);
    let ps_ty = b.object_type("PixelShader", object_type::PIXEL_SHADER, 0);
    b.object(ObjectRecord::new("ps", ps_ty).init(ObjectInit::Shaders(vec![(ps, None)])));
    let pass = PassRecord::new("p").assign(b.assign_variable(0x07, 0, "ps"));
    b.technique(TechniqueRecord::new("t").pass(pass));
    let (device, effect) = load(&b);

    let linear = effect.variable_by_name("linear").as_sampler();
    assert_eq!(linear.backing_store(0).unwrap().filter, 0x0);
    let default = linear.default_texture(0);
    assert_eq!(default.desc().unwrap().name.as_deref(), Some("diffuse"));

    default.set_resource(Some(ShaderResourceViewHandle(42))).unwrap();
    effect
        .variable_by_name("maps")
        .as_shader_resource()
        .set_resource_array(&[Some(ShaderResourceViewHandle(5)), Some(ShaderResourceViewHandle(6))], 0)
        .unwrap();
    effect.technique_by_index(0).pass_by_index(0).apply(0).unwrap();

    let ps = effect.variable_by_name("ps").as_shader().pixel_shader(0).unwrap();
    assert_eq!(
        device.calls(),
        vec![
            Call::SetShader(ShaderStage::Pixel, ps),
            Call::SetShaderResources(ShaderStage::Pixel, 0, vec![Some(ShaderResourceViewHandle(42))]),
            Call::SetSamplers(ShaderStage::Pixel, 0, vec![Some(linear.sampler(0).unwrap())]),
            Call::SetShaderResources(
                ShaderStage::Pixel,
                1,
                vec![Some(ShaderResourceViewHandle(5)), Some(ShaderResourceViewHandle(6)), None],
            ),
        ]
    );
}

#[test]
fn shader_arrays_are_indexed_by_the_pass() {
    let mut b = Fx10Builder::new();
    let first = build_shader(&[], &[position()], &[]);
    let second = build_shader(&[], &[position(), position()], &[]);
    let first = b.shader(&first);
    let second = b.shader(&second);
    let vs_ty = b.object_type("VertexShader", object_type::VERTEX_SHADER, 2);
    b.object(ObjectRecord::new("shaders", vs_ty).init(ObjectInit::Shaders(vec![(first, None), (second, None)])));
    let pass = PassRecord::new("p").assign(b.assign_constant_index(0x06, 0, "shaders", 1));
    b.technique(TechniqueRecord::new("t").pass(pass));
    let (device, effect) = load(&b);

    let shaders = effect.variable_by_name("shaders").as_shader();
    let pass = effect.technique_by_index(0).pass_by_index(0);
    let vs = pass.vertex_shader_desc().unwrap();
    assert_eq!(vs.shader_index, 1);
    assert_eq!(vs.shader.shader_desc(vs.shader_index).unwrap().input_parameters, 2);

    pass.apply(0).unwrap();
    assert_eq!(
        device.calls(),
        vec![Call::SetShader(ShaderStage::Vertex, shaders.vertex_shader(1).unwrap())]
    );
}

#[test]
fn states_bind_after_shaders_with_their_pass_values() {
    let mut b = Fx10Builder::new();
    let rs_ty = b.object_type("RasterizerState", object_type::RASTERIZER, 0);
    let ds_ty = b.object_type("DepthStencilState", object_type::DEPTH_STENCIL, 0);
    let bs_ty = b.object_type("BlendState", object_type::BLEND, 0);
    let wireframe = b.assign_constant(0x0c, 0, &[(value_type::INT, 2)]);
    let depth_off = b.assign_constant(0x16, 0, &[(value_type::BOOL, 0)]);
    b.object(ObjectRecord::new("wire", rs_ty).init(ObjectInit::States(vec![vec![wireframe]])));
    b.object(ObjectRecord::new("nodepth", ds_ty).init(ObjectInit::States(vec![vec![depth_off]])));
    b.object(ObjectRecord::new("opaque", bs_ty).init(ObjectInit::States(vec![vec![]])));

    let half = 0.5f32.to_bits();
    let pass = PassRecord::new("p")
        .assign(b.assign_constant(0x08, 0, &[]))
        .assign(b.assign_variable(0x00, 0, "wire"))
        .assign(b.assign_variable(0x01, 0, "nodepth"))
        .assign(b.assign_constant(0x09, 0, &[(value_type::UINT, 3)]))
        .assign(b.assign_variable(0x02, 0, "opaque"))
        .assign(b.assign_constant(
            0x0a,
            0,
            &[
                (value_type::FLOAT, half),
                (value_type::FLOAT, half),
                (value_type::FLOAT, half),
                (value_type::FLOAT, half),
            ],
        ))
        .assign(b.assign_constant(0x0b, 0, &[(value_type::UINT, 0xff)]));
    let reset = PassRecord::new("reset").assign(b.assign_constant(0x00, 0, &[]));
    b.technique(TechniqueRecord::new("t").pass(pass).pass(reset));
    let (device, effect) = load(&b);

    assert_eq!(device.rasterizer_descs()[0].fill_mode, 2);
    let wire = effect.variable_by_name("wire").as_rasterizer();
    assert_eq!(wire.backing_store(0).unwrap().fill_mode, 2);
    assert!(!effect.variable_by_name("nodepth").as_depth_stencil().backing_store(0).unwrap().depth_enable);

    let technique = effect.technique_by_index(0);
    let desc = technique.pass_by_index(0).desc().unwrap();
    assert_eq!((desc.stencil_ref, desc.sample_mask, desc.blend_factor), (3, 0xff, [0.5; 4]));

    technique.pass_by_index(0).apply(0).unwrap();
    technique.pass_by_name("reset").apply(0).unwrap();
    assert_eq!(
        device.calls(),
        vec![
            Call::SetShader(ShaderStage::Geometry, None),
            Call::SetRasterizer(Some(wire.rasterizer_state(0).unwrap())),
            Call::SetDepthStencil(
                Some(effect.variable_by_name("nodepth").as_depth_stencil().depth_stencil_state(0).unwrap()),
                3
            ),
            Call::SetBlend(
                Some(effect.variable_by_name("opaque").as_blend().blend_state(0).unwrap()),
                [0.5; 4],
                0xff
            ),
            Call::SetRasterizer(None),
        ]
    );
}
