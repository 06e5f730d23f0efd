//! Fixed-function state descriptions.
//!
//! Field values are the raw D3D10 enumerants, so a state block written in an
//! effect reaches the device exactly as authored. Defaults match the D3D10
//! defaults an effect starts from before its assignments are applied.

/// `D3D10_FILL_MODE`.
pub mod fill {
    #![allow(missing_docs)]
    pub const WIREFRAME: u32 = 2;
    pub const SOLID: u32 = 3;
}

/// `D3D10_CULL_MODE`.
pub mod cull {
    #![allow(missing_docs)]
    pub const NONE: u32 = 1;
    pub const FRONT: u32 = 2;
    pub const BACK: u32 = 3;
}

/// `D3D10_COMPARISON_FUNC`.
pub mod comparison {
    #![allow(missing_docs)]
    pub const NEVER: u32 = 1;
    pub const LESS: u32 = 2;
    pub const EQUAL: u32 = 3;
    pub const LESS_EQUAL: u32 = 4;
    pub const GREATER: u32 = 5;
    pub const NOT_EQUAL: u32 = 6;
    pub const GREATER_EQUAL: u32 = 7;
    pub const ALWAYS: u32 = 8;
}

/// `D3D10_STENCIL_OP`.
pub mod stencil_op {
    #![allow(missing_docs)]
    pub const KEEP: u32 = 1;
    pub const ZERO: u32 = 2;
    pub const REPLACE: u32 = 3;
    pub const INCR_SAT: u32 = 4;
    pub const DECR_SAT: u32 = 5;
    pub const INVERT: u32 = 6;
    pub const INCR: u32 = 7;
    pub const DECR: u32 = 8;
}

/// `D3D10_BLEND`.
pub mod blend {
    #![allow(missing_docs)]
    pub const ZERO: u32 = 1;
    pub const ONE: u32 = 2;
    pub const SRC_COLOR: u32 = 3;
    pub const INV_SRC_COLOR: u32 = 4;
    pub const SRC_ALPHA: u32 = 5;
    pub const INV_SRC_ALPHA: u32 = 6;
}

/// `D3D10_BLEND_OP`.
pub mod blend_op {
    #![allow(missing_docs)]
    pub const ADD: u32 = 1;
    pub const SUBTRACT: u32 = 2;
    pub const REV_SUBTRACT: u32 = 3;
    pub const MIN: u32 = 4;
    pub const MAX: u32 = 5;
}

/// `D3D10_FILTER` values used as defaults.
pub mod filter {
    #![allow(missing_docs)]
    pub const MIN_MAG_MIP_POINT: u32 = 0x00;
    pub const MIN_MAG_MIP_LINEAR: u32 = 0x15;
    pub const ANISOTROPIC: u32 = 0x55;
}

/// `D3D10_TEXTURE_ADDRESS_MODE`.
pub mod address {
    #![allow(missing_docs)]
    pub const WRAP: u32 = 1;
    pub const MIRROR: u32 = 2;
    pub const CLAMP: u32 = 3;
    pub const BORDER: u32 = 4;
}

/// `D3D10_DEPTH_WRITE_MASK_ALL`.
pub const DEPTH_WRITE_MASK_ALL: u32 = 1;
/// `D3D10_COLOR_WRITE_ENABLE_ALL`.
pub const COLOR_WRITE_ENABLE_ALL: u8 = 0xf;
/// Number of render target slots a blend state covers.
pub const RENDER_TARGET_SLOTS: usize = 8;

/// `D3D10_RASTERIZER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct RasterizerDesc {
    pub fill_mode: u32,
    pub cull_mode: u32,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            fill_mode: fill::SOLID,
            cull_mode: cull::BACK,
            front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_enable: false,
            multisample_enable: false,
            antialiased_line_enable: false,
        }
    }
}

/// `D3D10_DEPTH_STENCILOP_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DepthStencilOpDesc {
    pub stencil_fail_op: u32,
    pub stencil_depth_fail_op: u32,
    pub stencil_pass_op: u32,
    pub stencil_func: u32,
}

impl Default for DepthStencilOpDesc {
    fn default() -> Self {
        Self {
            stencil_fail_op: stencil_op::KEEP,
            stencil_depth_fail_op: stencil_op::KEEP,
            stencil_pass_op: stencil_op::KEEP,
            stencil_func: comparison::ALWAYS,
        }
    }
}

/// `D3D10_DEPTH_STENCIL_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write_mask: u32,
    pub depth_func: u32,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: DepthStencilOpDesc,
    pub back_face: DepthStencilOpDesc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write_mask: DEPTH_WRITE_MASK_ALL,
            depth_func: comparison::LESS,
            stencil_enable: false,
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
            front_face: DepthStencilOpDesc::default(),
            back_face: DepthStencilOpDesc::default(),
        }
    }
}

/// `D3D10_BLEND_DESC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct BlendDesc {
    pub alpha_to_coverage_enable: bool,
    pub blend_enable: [bool; RENDER_TARGET_SLOTS],
    pub src_blend: u32,
    pub dest_blend: u32,
    pub blend_op: u32,
    pub src_blend_alpha: u32,
    pub dest_blend_alpha: u32,
    pub blend_op_alpha: u32,
    pub render_target_write_mask: [u8; RENDER_TARGET_SLOTS],
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self {
            alpha_to_coverage_enable: false,
            blend_enable: [false; RENDER_TARGET_SLOTS],
            src_blend: blend::ONE,
            dest_blend: blend::ZERO,
            blend_op: blend_op::ADD,
            src_blend_alpha: blend::ONE,
            dest_blend_alpha: blend::ZERO,
            blend_op_alpha: blend_op::ADD,
            render_target_write_mask: [COLOR_WRITE_ENABLE_ALL; RENDER_TARGET_SLOTS],
        }
    }
}

/// `D3D10_SAMPLER_DESC`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct SamplerDesc {
    pub filter: u32,
    pub address_u: u32,
    pub address_v: u32,
    pub address_w: u32,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: u32,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: filter::MIN_MAG_MIP_LINEAR,
            address_u: address::CLAMP,
            address_v: address::CLAMP,
            address_w: address::CLAMP,
            mip_lod_bias: 0.0,
            max_anisotropy: 16,
            comparison_func: comparison::NEVER,
            border_color: [0.0; 4],
            min_lod: -f32::MAX,
            max_lod: f32::MAX,
        }
    }
}

/// Which kind of state block an assignment list configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// `RasterizerState`.
    Rasterizer,
    /// `DepthStencilState`.
    DepthStencil,
    /// `BlendState`.
    Blend,
    /// `SamplerState`.
    Sampler,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_d3d10() {
        let rs = RasterizerDesc::default();
        assert_eq!((rs.fill_mode, rs.cull_mode), (fill::SOLID, cull::BACK));
        assert!(rs.depth_clip_enable);

        let ds = DepthStencilDesc::default();
        assert!(ds.depth_enable && !ds.stencil_enable);
        assert_eq!(ds.back_face.stencil_func, comparison::ALWAYS);

        let bs = BlendDesc::default();
        assert_eq!(bs.render_target_write_mask, [0xf; 8]);

        let ss = SamplerDesc::default();
        assert_eq!(ss.filter, filter::MIN_MAG_MIP_LINEAR);
        assert_eq!(ss.min_lod, -f32::MAX);
    }
}
