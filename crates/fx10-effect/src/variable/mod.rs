//! The variable tree of an effect.
//!
//! Variables live in a flat arena owned by the effect and refer to each other by
//! [`VariableId`]. Struct variables own one child per member and array variables
//! one child per element; a child's storage offset is its parent's plus the
//! member offset or `index * stride`. Public access goes through the
//! lightweight handles in [`handle`], [`numeric`] and [`object`].

use bitflags::bitflags;

use crate::types::{EffectType, TypeClass, TypeId};

/// Declares a typed handle that wraps an [`EffectVariable`] of the given kinds.
macro_rules! typed_variable {
    ($(#[$meta:meta])* $name:ident, $($kind:ident)|+) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a>(crate::variable::EffectVariable<'a>);

        impl<'a> $name<'a> {
            pub(crate) fn from_variable(variable: crate::variable::EffectVariable<'a>) -> Self {
                Self(variable.with_kind(&[$(crate::variable::VariableKind::$kind),+]))
            }
        }

        impl crate::variable::handle::sealed::Sealed for $name<'_> {}

        impl<'a> crate::variable::VariableInterface<'a> for $name<'a> {
            fn as_variable(&self) -> crate::variable::EffectVariable<'a> {
                self.0
            }
        }
    };
}

pub mod handle;
pub mod numeric;
pub mod object;

pub use handle::{EffectVariable, VariableInterface};
pub use numeric::{Component, Matrix4, MatrixVariable, ScalarVariable, VectorVariable};
pub use object::{
    BlendVariable, ConstantBufferVariable, DepthStencilVariable, DepthStencilViewVariable,
    RasterizerVariable, RenderTargetViewVariable, SamplerVariable, ShaderResourceVariable,
    ShaderVariable, StringVariable,
};

/// Index of a variable in its effect's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VariableId(pub(crate) u32);

/// Which effect a stored reference points into, relative to the effect that stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Owner {
    Local,
    Pool,
}

/// A variable reference stored in the graph (pass assignments, resource bindings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VarLoc {
    pub(crate) owner: Owner,
    pub(crate) id: VariableId,
}

/// The concrete kind behind a variable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Numeric scalar (or array of scalars).
    Scalar,
    /// Numeric vector.
    Vector,
    /// Numeric matrix, either major order.
    Matrix,
    /// String.
    String,
    /// Texture or typed buffer.
    ShaderResource,
    /// Render target view.
    RenderTargetView,
    /// Depth-stencil view.
    DepthStencilView,
    /// `cbuffer` or `tbuffer`.
    ConstantBuffer,
    /// Vertex, geometry or pixel shader.
    Shader,
    /// Blend state.
    Blend,
    /// Depth-stencil state.
    DepthStencil,
    /// Rasterizer state.
    Rasterizer,
    /// Sampler state.
    Sampler,
    /// Struct; only generic access.
    Struct,
}

impl VariableKind {
    pub(crate) fn classify(ty: &EffectType) -> Self {
        use crate::types::BaseType as B;

        match ty.class {
            TypeClass::Scalar => Self::Scalar,
            TypeClass::Vector => Self::Vector,
            TypeClass::MatrixRows | TypeClass::MatrixColumns => Self::Matrix,
            TypeClass::Struct => Self::Struct,
            TypeClass::Object => match ty.base_type {
                B::String => Self::String,
                B::RenderTargetView => Self::RenderTargetView,
                B::DepthStencilView => Self::DepthStencilView,
                B::ConstantBuffer | B::TextureBuffer => Self::ConstantBuffer,
                B::VertexShader | B::PixelShader | B::GeometryShader => Self::Shader,
                B::Blend => Self::Blend,
                B::DepthStencil => Self::DepthStencil,
                B::Rasterizer => Self::Rasterizer,
                B::Sampler => Self::Sampler,
                b if b.is_texture() => Self::ShaderResource,
                _ => Self::Struct,
            },
        }
    }
}

bitflags! {
    /// `D3D10_EFFECT_VARIABLE_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VariableFlags: u32 {
        /// Declared in (or shared with) an effect pool.
        const POOLED = 0x1;
        /// The variable is an annotation.
        const ANNOTATION = 0x2;
        /// The variable was given an explicit register or offset.
        const EXPLICIT_BIND_POINT = 0x4;
    }
}

/// Where a numeric variable's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Storage {
    None,
    /// Inside the CPU copy of a local buffer.
    Buffer { buffer: usize, offset: u32 },
    /// Inside a read-only annotation value store.
    Inline { store: usize, offset: u32 },
}

impl Storage {
    pub(crate) fn offset_by(self, delta: u32) -> Self {
        match self {
            Self::None => Self::None,
            Self::Buffer { buffer, offset } => Self::Buffer {
                buffer,
                offset: offset.saturating_add(delta),
            },
            Self::Inline { store, offset } => Self::Inline {
                store,
                offset: offset.saturating_add(delta),
            },
        }
    }

    pub(crate) fn offset(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Buffer { offset, .. } | Self::Inline { offset, .. } => offset,
        }
    }
}

/// The kind-specific data of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    None,
    /// A local buffer, by index.
    Buffer(usize),
    String(Option<String>),
    /// First shader resource slot in the effect state.
    Resource(usize),
    /// First render target view slot.
    RenderTarget(usize),
    /// First depth-stencil view slot.
    DepthStencilView(usize),
    /// Index into the effect's shaders.
    Shader(usize),
    /// Index into the effect's state objects.
    State(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct VariableNode {
    pub(crate) name: Option<String>,
    pub(crate) semantic: Option<String>,
    pub(crate) ty: TypeId,
    pub(crate) kind: VariableKind,
    pub(crate) flags: VariableFlags,
    pub(crate) explicit_bind_point: u32,
    /// Buffer this variable lives in, for buffer members and their children.
    pub(crate) parent_buffer: Option<usize>,
    pub(crate) storage: Storage,
    pub(crate) payload: Payload,
    pub(crate) members: Vec<VariableId>,
    pub(crate) elements: Vec<VariableId>,
    pub(crate) annotations: Vec<VariableId>,
}

/// `D3D10_EFFECT_VARIABLE_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectVariableDesc {
    /// Name, if any.
    pub name: Option<String>,
    /// Semantic, if any.
    pub semantic: Option<String>,
    /// Flags.
    pub flags: VariableFlags,
    /// Number of annotations.
    pub annotations: u32,
    /// Byte offset in the owning buffer, `0` outside buffers.
    pub buffer_offset: u32,
    /// Explicit register or offset; meaningful with [`VariableFlags::EXPLICIT_BIND_POINT`].
    pub explicit_bind_point: u32,
}
