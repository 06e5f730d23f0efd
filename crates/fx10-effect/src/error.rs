use fx10_dxbc::DxbcError;
use thiserror::Error;

use crate::device::DeviceError;

/// Errors produced while creating or using an effect.
#[derive(Debug, Error)]
pub enum EffectError {
    /// The outer `DXBC` container is malformed.
    #[error(transparent)]
    Container(#[from] DxbcError),
    /// The container holds no `FX10` chunk.
    #[error("container has no FX10 chunk")]
    MissingEffectChunk,
    /// The effect header version is not `fx_4_0` or `fx_4_1`.
    #[error("unsupported effect version {0:#010x}")]
    UnsupportedVersion(u32),
    /// A record, offset or count in the effect body is invalid.
    #[error("malformed effect: {context}")]
    Malformed {
        /// Human-readable details.
        context: String,
    },
    /// A type record uses an unknown kind discriminant.
    #[error("unknown type kind {kind} at offset {offset:#x}")]
    UnknownTypeKind {
        /// The discriminant found.
        kind: u32,
        /// Offset of the type record.
        offset: u32,
    },
    /// The effect declares shared symbols but was created without a pool.
    #[error("effect declares {buffers} shared buffers and {objects} shared objects but has no pool")]
    MissingPool {
        /// Declared shared buffer count.
        buffers: u32,
        /// Declared shared object count.
        objects: u32,
    },
    /// A referenced variable or buffer does not exist.
    #[error("unknown symbol {0:?}")]
    UnknownSymbol(String),
    /// A referenced variable exists but cannot be used where it is referenced.
    #[error("symbol {name:?} cannot be used here: {reason}")]
    SymbolTypeMismatch {
        /// Symbol name.
        name: String,
        /// Why the symbol was rejected.
        reason: &'static str,
    },
    /// A shared symbol's type differs from the pool's declaration.
    #[error("shared symbol {0:?} does not match the pool declaration")]
    SharedSymbolMismatch(String),
    /// The device refused to create an object.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// Shader bytecode could not be reflected.
    #[error("shader reflection failed: {0}")]
    Reflection(String),
    /// Recognized but unsupported feature.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// API misuse on a successfully created effect.
    #[error("invalid usage: {0}")]
    InvalidUsage(&'static str),
}

impl EffectError {
    pub(crate) fn malformed(context: impl Into<String>) -> Self {
        Self::Malformed {
            context: context.into(),
        }
    }

    /// Returns `true` for errors caused by malformed input bytes.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::Container(_)
                | Self::MissingEffectChunk
                | Self::UnsupportedVersion(_)
                | Self::Malformed { .. }
                | Self::UnknownTypeKind { .. }
                | Self::Reflection(_)
        )
    }
}
