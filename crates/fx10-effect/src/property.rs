//! Property table for pass and state-block assignments.
//!
//! Every assignment names a property by id. The table says which container the
//! property belongs to, how its value is typed, how many components it has and
//! how many indexed slots it exposes, and which field it lands in.

use crate::convert::NumericType;
use crate::error::EffectError;
use crate::graph::{ObjectRef, PassState, ShaderRef};
use crate::state::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc};
use crate::types::BaseType;

/// Which kind of record a property can be assigned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    Pass,
    Rasterizer,
    DepthStencil,
    Blend,
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropertyType {
    Numeric(NumericType),
    /// Stored as an unsigned integer, narrowed to a byte.
    Uint8,
    Object(BaseType),
}

impl PropertyType {
    pub(crate) fn numeric(self) -> Option<NumericType> {
        match self {
            Self::Numeric(t) => Some(t),
            Self::Uint8 => Some(NumericType::Uint),
            Self::Object(_) => None,
        }
    }

    /// Whether a variable of `base` may be assigned to an object property of this type.
    pub(crate) fn accepts(self, base: BaseType) -> bool {
        match self {
            Self::Object(BaseType::Texture) => base.is_texture(),
            Self::Object(expected) => expected == base,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    PassRasterizer,
    PassDepthStencil,
    PassBlend,
    PassVertexShader,
    PassPixelShader,
    PassGeometryShader,
    PassStencilRef,
    PassBlendFactor,
    PassSampleMask,
    FillMode,
    CullMode,
    FrontCounterClockwise,
    DepthBias,
    DepthBiasClamp,
    SlopeScaledDepthBias,
    DepthClipEnable,
    ScissorEnable,
    MultisampleEnable,
    AntialiasedLineEnable,
    DepthEnable,
    DepthWriteMask,
    DepthFunc,
    StencilEnable,
    StencilReadMask,
    StencilWriteMask,
    FrontStencilFail,
    FrontStencilDepthFail,
    FrontStencilPass,
    FrontStencilFunc,
    BackStencilFail,
    BackStencilDepthFail,
    BackStencilPass,
    BackStencilFunc,
    AlphaToCoverageEnable,
    BlendEnable,
    SrcBlend,
    DestBlend,
    BlendOp,
    SrcBlendAlpha,
    DestBlendAlpha,
    BlendOpAlpha,
    RenderTargetWriteMask,
    Filter,
    AddressU,
    AddressV,
    AddressW,
    MipLodBias,
    MaxAnisotropy,
    ComparisonFunc,
    BorderColor,
    MinLod,
    MaxLod,
    SamplerTexture,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PropertyInfo {
    pub(crate) id: u32,
    pub(crate) name: &'static str,
    pub(crate) ty: PropertyType,
    /// Components per value.
    pub(crate) size: u32,
    /// Number of indexed slots.
    pub(crate) count: u32,
    pub(crate) container: ContainerKind,
    /// `None` for recognized properties the runtime does not support.
    pub(crate) field: Option<Field>,
}

const fn prop(
    id: u32,
    name: &'static str,
    ty: PropertyType,
    size: u32,
    count: u32,
    container: ContainerKind,
    field: Option<Field>,
) -> PropertyInfo {
    PropertyInfo {
        id,
        name,
        ty,
        size,
        count,
        container,
        field,
    }
}

const FLOAT: PropertyType = PropertyType::Numeric(NumericType::Float);
const INT: PropertyType = PropertyType::Numeric(NumericType::Int);
const UINT: PropertyType = PropertyType::Numeric(NumericType::Uint);
const BOOL: PropertyType = PropertyType::Numeric(NumericType::Bool);
const UINT8: PropertyType = PropertyType::Uint8;

const fn object(base: BaseType) -> PropertyType {
    PropertyType::Object(base)
}

use ContainerKind::{Blend as BS, DepthStencil as DS, Pass as P, Rasterizer as RS, Sampler as SS};
use Field as F;

static PROPERTIES: [PropertyInfo; 0x38] = [
    prop(0x00, "Pass.RasterizerState", object(BaseType::Rasterizer), 1, 1, P, Some(F::PassRasterizer)),
    prop(0x01, "Pass.DepthStencilState", object(BaseType::DepthStencil), 1, 1, P, Some(F::PassDepthStencil)),
    prop(0x02, "Pass.BlendState", object(BaseType::Blend), 1, 1, P, Some(F::PassBlend)),
    prop(0x03, "Pass.RenderTargets", object(BaseType::RenderTargetView), 1, 8, P, None),
    prop(0x04, "Pass.DepthStencilView", object(BaseType::DepthStencilView), 1, 1, P, None),
    prop(0x05, "Pass.Unknown5", object(BaseType::Void), 0, 0, P, None),
    prop(0x06, "Pass.VertexShader", object(BaseType::VertexShader), 1, 1, P, Some(F::PassVertexShader)),
    prop(0x07, "Pass.PixelShader", object(BaseType::PixelShader), 1, 1, P, Some(F::PassPixelShader)),
    prop(0x08, "Pass.GeometryShader", object(BaseType::GeometryShader), 1, 1, P, Some(F::PassGeometryShader)),
    prop(0x09, "Pass.StencilRef", UINT, 1, 1, P, Some(F::PassStencilRef)),
    prop(0x0a, "Pass.BlendFactor", FLOAT, 4, 1, P, Some(F::PassBlendFactor)),
    prop(0x0b, "Pass.SampleMask", UINT, 1, 1, P, Some(F::PassSampleMask)),
    prop(0x0c, "RasterizerState.FillMode", INT, 1, 1, RS, Some(F::FillMode)),
    prop(0x0d, "RasterizerState.CullMode", INT, 1, 1, RS, Some(F::CullMode)),
    prop(0x0e, "RasterizerState.FrontCounterClockwise", BOOL, 1, 1, RS, Some(F::FrontCounterClockwise)),
    prop(0x0f, "RasterizerState.DepthBias", INT, 1, 1, RS, Some(F::DepthBias)),
    prop(0x10, "RasterizerState.DepthBiasClamp", FLOAT, 1, 1, RS, Some(F::DepthBiasClamp)),
    prop(0x11, "RasterizerState.SlopeScaledDepthBias", FLOAT, 1, 1, RS, Some(F::SlopeScaledDepthBias)),
    prop(0x12, "RasterizerState.DepthClipEnable", BOOL, 1, 1, RS, Some(F::DepthClipEnable)),
    prop(0x13, "RasterizerState.ScissorEnable", BOOL, 1, 1, RS, Some(F::ScissorEnable)),
    prop(0x14, "RasterizerState.MultisampleEnable", BOOL, 1, 1, RS, Some(F::MultisampleEnable)),
    prop(0x15, "RasterizerState.AntialiasedLineEnable", BOOL, 1, 1, RS, Some(F::AntialiasedLineEnable)),
    prop(0x16, "DepthStencilState.DepthEnable", BOOL, 1, 1, DS, Some(F::DepthEnable)),
    prop(0x17, "DepthStencilState.DepthWriteMask", INT, 1, 1, DS, Some(F::DepthWriteMask)),
    prop(0x18, "DepthStencilState.DepthFunc", INT, 1, 1, DS, Some(F::DepthFunc)),
    prop(0x19, "DepthStencilState.StencilEnable", BOOL, 1, 1, DS, Some(F::StencilEnable)),
    prop(0x1a, "DepthStencilState.StencilReadMask", UINT8, 1, 1, DS, Some(F::StencilReadMask)),
    prop(0x1b, "DepthStencilState.StencilWriteMask", UINT8, 1, 1, DS, Some(F::StencilWriteMask)),
    prop(0x1c, "DepthStencilState.FrontFaceStencilFail", INT, 1, 1, DS, Some(F::FrontStencilFail)),
    prop(0x1d, "DepthStencilState.FrontFaceStencilDepthFail", INT, 1, 1, DS, Some(F::FrontStencilDepthFail)),
    prop(0x1e, "DepthStencilState.FrontFaceStencilPass", INT, 1, 1, DS, Some(F::FrontStencilPass)),
    prop(0x1f, "DepthStencilState.FrontFaceStencilFunc", INT, 1, 1, DS, Some(F::FrontStencilFunc)),
    prop(0x20, "DepthStencilState.BackFaceStencilFail", INT, 1, 1, DS, Some(F::BackStencilFail)),
    prop(0x21, "DepthStencilState.BackFaceStencilDepthFail", INT, 1, 1, DS, Some(F::BackStencilDepthFail)),
    prop(0x22, "DepthStencilState.BackFaceStencilPass", INT, 1, 1, DS, Some(F::BackStencilPass)),
    prop(0x23, "DepthStencilState.BackFaceStencilFunc", INT, 1, 1, DS, Some(F::BackStencilFunc)),
    prop(0x24, "BlendState.AlphaToCoverageEnable", BOOL, 1, 1, BS, Some(F::AlphaToCoverageEnable)),
    prop(0x25, "BlendState.BlendEnable", BOOL, 1, 8, BS, Some(F::BlendEnable)),
    prop(0x26, "BlendState.SrcBlend", INT, 1, 1, BS, Some(F::SrcBlend)),
    prop(0x27, "BlendState.DestBlend", INT, 1, 1, BS, Some(F::DestBlend)),
    prop(0x28, "BlendState.BlendOp", INT, 1, 1, BS, Some(F::BlendOp)),
    prop(0x29, "BlendState.SrcBlendAlpha", INT, 1, 1, BS, Some(F::SrcBlendAlpha)),
    prop(0x2a, "BlendState.DestBlendAlpha", INT, 1, 1, BS, Some(F::DestBlendAlpha)),
    prop(0x2b, "BlendState.BlendOpAlpha", INT, 1, 1, BS, Some(F::BlendOpAlpha)),
    prop(0x2c, "BlendState.RenderTargetWriteMask", UINT8, 1, 8, BS, Some(F::RenderTargetWriteMask)),
    prop(0x2d, "SamplerState.Filter", INT, 1, 1, SS, Some(F::Filter)),
    prop(0x2e, "SamplerState.AddressU", INT, 1, 1, SS, Some(F::AddressU)),
    prop(0x2f, "SamplerState.AddressV", INT, 1, 1, SS, Some(F::AddressV)),
    prop(0x30, "SamplerState.AddressW", INT, 1, 1, SS, Some(F::AddressW)),
    prop(0x31, "SamplerState.MipLODBias", FLOAT, 1, 1, SS, Some(F::MipLodBias)),
    prop(0x32, "SamplerState.MaxAnisotropy", UINT, 1, 1, SS, Some(F::MaxAnisotropy)),
    prop(0x33, "SamplerState.ComparisonFunc", INT, 1, 1, SS, Some(F::ComparisonFunc)),
    prop(0x34, "SamplerState.BorderColor", FLOAT, 4, 1, SS, Some(F::BorderColor)),
    prop(0x35, "SamplerState.MinLOD", FLOAT, 1, 1, SS, Some(F::MinLod)),
    prop(0x36, "SamplerState.MaxLOD", FLOAT, 1, 1, SS, Some(F::MaxLod)),
    prop(0x37, "SamplerState.Texture", object(BaseType::Texture), 1, 1, SS, Some(F::SamplerTexture)),
];

pub(crate) fn property_info(id: u32) -> Option<&'static PropertyInfo> {
    PROPERTIES.get(id as usize)
}

/// A sampler description together with its default texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SamplerBlock {
    pub(crate) desc: SamplerDesc,
    pub(crate) texture: ObjectRef,
}

/// The record an assignment list is being applied to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum StateBlock {
    Pass(PassState),
    Rasterizer(RasterizerDesc),
    DepthStencil(DepthStencilDesc),
    Blend(BlendDesc),
    Sampler(SamplerBlock),
}

impl StateBlock {
    pub(crate) fn kind(&self) -> ContainerKind {
        match self {
            Self::Pass(_) => ContainerKind::Pass,
            Self::Rasterizer(_) => ContainerKind::Rasterizer,
            Self::DepthStencil(_) => ContainerKind::DepthStencil,
            Self::Blend(_) => ContainerKind::Blend,
            Self::Sampler(_) => ContainerKind::Sampler,
        }
    }

    /// Stores one already-converted component of a numeric property.
    pub(crate) fn store_numeric(
        &mut self,
        field: Field,
        index: u32,
        component: u32,
        word: u32,
    ) -> Result<(), EffectError> {
        let float = f32::from_bits(word);
        let flag = word != 0;
        let index = index as usize;
        let component = component as usize;
        match (self, field) {
            (Self::Pass(p), F::PassStencilRef) => p.stencil_ref = word,
            (Self::Pass(p), F::PassBlendFactor) => p.blend_factor[component] = float,
            (Self::Pass(p), F::PassSampleMask) => p.sample_mask = word,

            (Self::Rasterizer(r), F::FillMode) => r.fill_mode = word,
            (Self::Rasterizer(r), F::CullMode) => r.cull_mode = word,
            (Self::Rasterizer(r), F::FrontCounterClockwise) => r.front_counter_clockwise = flag,
            (Self::Rasterizer(r), F::DepthBias) => r.depth_bias = word as i32,
            (Self::Rasterizer(r), F::DepthBiasClamp) => r.depth_bias_clamp = float,
            (Self::Rasterizer(r), F::SlopeScaledDepthBias) => r.slope_scaled_depth_bias = float,
            (Self::Rasterizer(r), F::DepthClipEnable) => r.depth_clip_enable = flag,
            (Self::Rasterizer(r), F::ScissorEnable) => r.scissor_enable = flag,
            (Self::Rasterizer(r), F::MultisampleEnable) => r.multisample_enable = flag,
            (Self::Rasterizer(r), F::AntialiasedLineEnable) => r.antialiased_line_enable = flag,

            (Self::DepthStencil(d), F::DepthEnable) => d.depth_enable = flag,
            (Self::DepthStencil(d), F::DepthWriteMask) => d.depth_write_mask = word,
            (Self::DepthStencil(d), F::DepthFunc) => d.depth_func = word,
            (Self::DepthStencil(d), F::StencilEnable) => d.stencil_enable = flag,
            (Self::DepthStencil(d), F::StencilReadMask) => d.stencil_read_mask = word as u8,
            (Self::DepthStencil(d), F::StencilWriteMask) => d.stencil_write_mask = word as u8,
            (Self::DepthStencil(d), F::FrontStencilFail) => d.front_face.stencil_fail_op = word,
            (Self::DepthStencil(d), F::FrontStencilDepthFail) => d.front_face.stencil_depth_fail_op = word,
            (Self::DepthStencil(d), F::FrontStencilPass) => d.front_face.stencil_pass_op = word,
            (Self::DepthStencil(d), F::FrontStencilFunc) => d.front_face.stencil_func = word,
            (Self::DepthStencil(d), F::BackStencilFail) => d.back_face.stencil_fail_op = word,
            (Self::DepthStencil(d), F::BackStencilDepthFail) => d.back_face.stencil_depth_fail_op = word,
            (Self::DepthStencil(d), F::BackStencilPass) => d.back_face.stencil_pass_op = word,
            (Self::DepthStencil(d), F::BackStencilFunc) => d.back_face.stencil_func = word,

            (Self::Blend(b), F::AlphaToCoverageEnable) => b.alpha_to_coverage_enable = flag,
            (Self::Blend(b), F::BlendEnable) => b.blend_enable[index] = flag,
            (Self::Blend(b), F::SrcBlend) => b.src_blend = word,
            (Self::Blend(b), F::DestBlend) => b.dest_blend = word,
            (Self::Blend(b), F::BlendOp) => b.blend_op = word,
            (Self::Blend(b), F::SrcBlendAlpha) => b.src_blend_alpha = word,
            (Self::Blend(b), F::DestBlendAlpha) => b.dest_blend_alpha = word,
            (Self::Blend(b), F::BlendOpAlpha) => b.blend_op_alpha = word,
            (Self::Blend(b), F::RenderTargetWriteMask) => b.render_target_write_mask[index] = word as u8,

            (Self::Sampler(s), F::Filter) => s.desc.filter = word,
            (Self::Sampler(s), F::AddressU) => s.desc.address_u = word,
            (Self::Sampler(s), F::AddressV) => s.desc.address_v = word,
            (Self::Sampler(s), F::AddressW) => s.desc.address_w = word,
            (Self::Sampler(s), F::MipLodBias) => s.desc.mip_lod_bias = float,
            (Self::Sampler(s), F::MaxAnisotropy) => s.desc.max_anisotropy = word,
            (Self::Sampler(s), F::ComparisonFunc) => s.desc.comparison_func = word,
            (Self::Sampler(s), F::BorderColor) => s.desc.border_color[component] = float,
            (Self::Sampler(s), F::MinLod) => s.desc.min_lod = float,
            (Self::Sampler(s), F::MaxLod) => s.desc.max_lod = float,

            (_, field) => {
                return Err(EffectError::malformed(format!(
                    "numeric value for {field:?} in the wrong container"
                )))
            }
        }
        Ok(())
    }

    /// Stores an object reference; `shader_index` selects the element for shader arrays.
    pub(crate) fn store_object(
        &mut self,
        field: Field,
        value: ObjectRef,
        shader_index: u32,
    ) -> Result<(), EffectError> {
        let shader = ShaderRef {
            object: value,
            index: shader_index,
        };
        match (self, field) {
            (Self::Pass(p), F::PassRasterizer) => p.rasterizer = value,
            (Self::Pass(p), F::PassDepthStencil) => p.depth_stencil = value,
            (Self::Pass(p), F::PassBlend) => p.blend = value,
            (Self::Pass(p), F::PassVertexShader) => p.vs = shader,
            (Self::Pass(p), F::PassPixelShader) => p.ps = shader,
            (Self::Pass(p), F::PassGeometryShader) => p.gs = shader,
            (Self::Sampler(s), F::SamplerTexture) => s.texture = value,
            (_, field) => {
                return Err(EffectError::malformed(format!(
                    "object value for {field:?} in the wrong container"
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{Owner, VarLoc, VariableId};

    #[test]
    fn table_ids_match_positions() {
        for (i, info) in PROPERTIES.iter().enumerate() {
            assert_eq!(info.id as usize, i, "{}", info.name);
        }
        assert!(property_info(0x38).is_none());
    }

    #[test]
    fn unsupported_pass_properties_have_no_field() {
        for id in 0x03..=0x05 {
            assert!(property_info(id).unwrap().field.is_none());
        }
    }

    #[test]
    fn generic_texture_property_accepts_any_texture() {
        let texture = property_info(0x37).unwrap().ty;
        assert!(texture.accepts(BaseType::Texture2D));
        assert!(texture.accepts(BaseType::Buffer));
        assert!(!texture.accepts(BaseType::Sampler));

        let vs = property_info(0x06).unwrap().ty;
        assert!(vs.accepts(BaseType::VertexShader));
        assert!(!vs.accepts(BaseType::PixelShader));
    }

    #[test]
    fn indexed_blend_fields_land_in_their_slot() {
        let mut block = StateBlock::Blend(BlendDesc::default());
        block.store_numeric(F::BlendEnable, 3, 0, crate::convert::BOOL_TRUE).unwrap();
        block.store_numeric(F::RenderTargetWriteMask, 7, 0, 0x0103).unwrap();
        let StateBlock::Blend(desc) = block else { unreachable!() };
        assert_eq!(desc.blend_enable, [false, false, false, true, false, false, false, false]);
        assert_eq!(desc.render_target_write_mask[7], 0x03);
    }

    #[test]
    fn shader_refs_keep_the_element_index() {
        let loc = VarLoc {
            owner: Owner::Local,
            id: VariableId(4),
        };
        let mut block = StateBlock::Pass(PassState::default());
        block
            .store_object(F::PassGeometryShader, ObjectRef::Variable(loc), 2)
            .unwrap();
        let StateBlock::Pass(pass) = block else { unreachable!() };
        assert_eq!(pass.gs.object, ObjectRef::Variable(loc));
        assert_eq!(pass.gs.index, 2);
        assert_eq!(pass.sample_mask, 0xffff_ffff);
    }

    #[test]
    fn fields_outside_their_container_are_rejected() {
        let mut block = StateBlock::Rasterizer(RasterizerDesc::default());
        assert!(block.store_numeric(F::DepthEnable, 0, 0, 1).is_err());
        assert!(block
            .store_object(F::SamplerTexture, ObjectRef::Placeholder, 0)
            .is_err());
    }
}
