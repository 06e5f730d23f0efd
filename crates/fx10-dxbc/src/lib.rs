//! A safe, zero-copy parser for DirectX bytecode containers (`DXBC`).
//!
//! The container format wraps both compiled shaders and compiled effects
//! (`FX10` chunks). Every offset and size is validated before it is used, so
//! the parser is suitable for untrusted input.
//!
//! In addition to container parsing, this crate also provides:
//!
//! - A parser for D3D10 signature chunks (`ISGN`/`OSGN`), which describe shader
//!   inputs and outputs.
//! - A minimal parser for the `RDEF` resource definition chunk (bound resources
//!   and constant buffers), which is what the effect runtime needs to wire
//!   effect variables to shader slots.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dxbc;
mod error;
mod fourcc;
/// Parser for DXBC resource definition chunks (`RDEF`).
pub mod rdef;
/// Parsers for DXBC signature chunks (`ISGN`, `OSGN`).
pub mod signature;

/// Helpers for building synthetic DXBC blobs in tests.
///
/// This module is only available when compiling this crate's own tests, or when
/// the `test-utils` feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::dxbc::{
    write_container, DxbcChunk, DxbcFile, DxbcHeader, DXBC_HEADER_LEN, DXBC_VERSION,
};
pub use crate::error::DxbcError;
pub use crate::fourcc::FourCC;
pub use crate::rdef::{parse_rdef_chunk, RdefChunk, RdefConstantBuffer, RdefResourceBinding, ShaderInputType};
pub use crate::signature::{parse_signature_chunk, SignatureChunk, SignatureEntry};
