use std::borrow::Cow;

use thiserror::Error;

/// Errors produced while parsing a `DXBC` container or one of its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DxbcError {
    /// The fixed container header is truncated or carries a bad magic.
    #[error("malformed DXBC header: {context}")]
    MalformedHeader {
        /// Human-readable details.
        context: String,
    },
    /// The container version word is not `1`.
    #[error("unsupported DXBC container version {version:#010x}")]
    UnsupportedVersion {
        /// The version word found in the header.
        version: u32,
    },
    /// The declared `total_size` does not equal the buffer length.
    #[error("DXBC total_size {declared} does not match buffer length {actual}")]
    SizeMismatch {
        /// Size declared in the header.
        declared: u32,
        /// Actual length of the input.
        actual: usize,
    },
    /// The chunk offset table is inconsistent.
    #[error("malformed DXBC chunk offsets: {context}")]
    MalformedOffsets {
        /// Human-readable details.
        context: String,
    },
    /// A chunk header or payload lies outside the container.
    #[error("DXBC data out of bounds: {context}")]
    OutOfBounds {
        /// Human-readable details.
        context: String,
    },
    /// A chunk payload could not be parsed.
    #[error("invalid DXBC chunk: {context}")]
    InvalidChunk {
        /// Human-readable details.
        context: String,
    },
}

impl DxbcError {
    pub(crate) fn malformed_header(context: impl Into<String>) -> Self {
        Self::MalformedHeader {
            context: context.into(),
        }
    }

    pub(crate) fn malformed_offsets(context: impl Into<String>) -> Self {
        Self::MalformedOffsets {
            context: context.into(),
        }
    }

    pub(crate) fn out_of_bounds(context: impl Into<String>) -> Self {
        Self::OutOfBounds {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_chunk(context: impl Into<String>) -> Self {
        Self::InvalidChunk {
            context: context.into(),
        }
    }

    /// Returns the detail message without the error-kind prefix.
    pub fn context(&self) -> Cow<'_, str> {
        match self {
            Self::MalformedHeader { context }
            | Self::MalformedOffsets { context }
            | Self::OutOfBounds { context }
            | Self::InvalidChunk { context } => Cow::Borrowed(context),
            Self::UnsupportedVersion { .. } | Self::SizeMismatch { .. } => {
                Cow::Owned(self.to_string())
            }
        }
    }
}
