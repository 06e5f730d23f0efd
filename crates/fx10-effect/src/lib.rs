//! Runtime for compiled Direct3D 10 effects (`fx_4_0` and `fx_4_1`).
//!
//! An effect blob is a `DXBC` container holding one `FX10` chunk: constant
//! buffers, object variables, shaders, state blocks, and the techniques and
//! passes that combine them. [`Effect::from_memory`] parses the blob, creates
//! every shader and state object on a [`Device`], and exposes the result as a
//! graph of variables that can be read, written and applied:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use fx10_effect::{Effect, EffectFlags, NullDevice, VariableInterface};
//! # fn run(blob: &[u8]) -> Result<(), fx10_effect::EffectError> {
//! let effect = Effect::from_memory(blob, EffectFlags::empty(), Arc::new(NullDevice::new()), None)?;
//! effect.variable_by_name("world").as_matrix().set_matrix(&[[1.0, 0.0, 0.0, 0.0]; 4])?;
//! effect.technique_by_index(0).pass_by_index(0).apply(0)?;
//! # Ok(())
//! # }
//! ```
//!
//! Failed lookups never fail loudly: they return handles whose `is_valid()` is
//! `false`, and every operation on such a handle returns
//! [`EffectError::InvalidUsage`].

#![forbid(unsafe_code)]

mod apply;
pub mod convert;
pub mod device;
mod effect;
mod error;
mod graph;
mod layout;
mod parse;
mod property;
mod reader;
pub mod shader;
pub mod state;
pub mod stream_output;
mod technique;
pub mod types;
pub mod variable;

pub use crate::device::{Device, DeviceError, NullDevice, ShaderStage};
pub use crate::effect::{Effect, EffectDesc, EffectFlags, EffectPool};
pub use crate::error::EffectError;
pub use crate::parse::{Fx10Header, FX10_VERSION_4_0, FX10_VERSION_4_1};
pub use crate::shader::{DxbcReflector, EffectShaderDesc, ShaderReflector};
pub use crate::technique::{Pass, PassDesc, PassShaderDesc, Technique, TechniqueDesc};
pub use crate::types::{BaseType, EffectTypeDesc, EffectTypeRef, TypeClass};
pub use crate::variable::{
    BlendVariable, ConstantBufferVariable, DepthStencilVariable, DepthStencilViewVariable,
    EffectVariable, EffectVariableDesc, MatrixVariable, RasterizerVariable,
    RenderTargetViewVariable, SamplerVariable, ScalarVariable, ShaderResourceVariable,
    ShaderVariable, StringVariable, VariableFlags, VariableInterface, VariableKind, VectorVariable,
};
