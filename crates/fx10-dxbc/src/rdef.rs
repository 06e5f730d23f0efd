//! `RDEF` chunk parsing.
//!
//! Only the parts the effect runtime consumes are decoded: the constant buffer
//! table (names, sizes, kinds) and the bound resource table.

use crate::DxbcError;

const RDEF_HEADER_LEN: usize = 28;
const CBUFFER_DESC_LEN: usize = 24;
const BINDING_DESC_LEN: usize = 32;

/// `D3D10_SHADER_INPUT_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderInputType {
    /// `cbuffer`
    ConstantBuffer,
    /// `tbuffer`
    TextureBuffer,
    /// Any texture/buffer SRV.
    Texture,
    /// Sampler state.
    Sampler,
    /// Any value this crate does not model.
    Other(u32),
}

impl ShaderInputType {
    /// Maps the raw enumerant.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::ConstantBuffer,
            1 => Self::TextureBuffer,
            2 => Self::Texture,
            3 => Self::Sampler,
            other => Self::Other(other),
        }
    }
}

/// A parsed `RDEF` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefChunk {
    /// Encoded shader target (`0xfffe0400` is `vs_4_0`, ...).
    pub target: u32,
    /// Compile flags.
    pub flags: u32,
    /// Compiler string, if present.
    pub creator: Option<String>,
    /// Constant buffer descriptions.
    pub constant_buffers: Vec<RdefConstantBuffer>,
    /// Resources bound by the shader, in declaration order.
    pub bound_resources: Vec<RdefResourceBinding>,
}

/// One constant buffer described by an `RDEF` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefConstantBuffer {
    /// Buffer name.
    pub name: String,
    /// Number of variables in the buffer.
    pub variable_count: u32,
    /// Size in bytes.
    pub size: u32,
    /// `D3D10_CBUFFER_TYPE`.
    pub kind: u32,
}

/// One bound resource described by an `RDEF` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefResourceBinding {
    /// Resource name as referenced by the shader.
    pub name: String,
    /// Resource kind.
    pub input_type: ShaderInputType,
    /// First register (`b#`, `t#` or `s#`).
    pub bind_point: u32,
    /// Number of contiguous registers.
    pub bind_count: u32,
    /// `D3D10_SHADER_INPUT_FLAGS`.
    pub flags: u32,
}

/// Parses an `RDEF` chunk payload.
pub fn parse_rdef_chunk(bytes: &[u8]) -> Result<RdefChunk, DxbcError> {
    if bytes.len() < RDEF_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "RDEF chunk is truncated: need {RDEF_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }

    let cb_count = read_u32_le(bytes, 0, "cb_count")?;
    let cb_offset = read_u32_le(bytes, 4, "cb_offset")?;
    let rb_count = read_u32_le(bytes, 8, "rb_count")?;
    let rb_offset = read_u32_le(bytes, 12, "rb_offset")?;
    let target = read_u32_le(bytes, 16, "target")?;
    let flags = read_u32_le(bytes, 20, "flags")?;
    let creator_offset = read_u32_le(bytes, 24, "creator_offset")?;

    let creator = (creator_offset != 0)
        .then(|| read_cstring(bytes, creator_offset as usize, "creator").map(str::to_owned))
        .transpose()?;

    let cb_table = table(bytes, cb_offset, cb_count, CBUFFER_DESC_LEN, "constant buffer")?;
    let mut constant_buffers = Vec::with_capacity(cb_count as usize);
    for desc in cb_table.chunks_exact(CBUFFER_DESC_LEN) {
        let name_offset = read_u32_le(desc, 0, "cb name")?;
        constant_buffers.push(RdefConstantBuffer {
            name: read_cstring(bytes, name_offset as usize, "cb name")?.to_owned(),
            variable_count: read_u32_le(desc, 4, "cb variable count")?,
            size: read_u32_le(desc, 12, "cb size")?,
            kind: read_u32_le(desc, 20, "cb type")?,
        });
    }

    let rb_table = table(bytes, rb_offset, rb_count, BINDING_DESC_LEN, "resource")?;
    let mut bound_resources = Vec::with_capacity(rb_count as usize);
    for desc in rb_table.chunks_exact(BINDING_DESC_LEN) {
        let name_offset = read_u32_le(desc, 0, "resource name")?;
        bound_resources.push(RdefResourceBinding {
            name: read_cstring(bytes, name_offset as usize, "resource name")?.to_owned(),
            input_type: ShaderInputType::from_raw(read_u32_le(desc, 4, "input type")?),
            bind_point: read_u32_le(desc, 20, "bind point")?,
            bind_count: read_u32_le(desc, 24, "bind count")?,
            flags: read_u32_le(desc, 28, "resource flags")?,
        });
    }

    Ok(RdefChunk {
        target,
        flags,
        creator,
        constant_buffers,
        bound_resources,
    })
}

fn table<'a>(
    bytes: &'a [u8],
    offset: u32,
    count: u32,
    entry_len: usize,
    what: &str,
) -> Result<&'a [u8], DxbcError> {
    if count == 0 {
        return Ok(&[]);
    }
    let start = offset as usize;
    let end = (count as usize)
        .checked_mul(entry_len)
        .and_then(|len| start.checked_add(len))
        .ok_or_else(|| DxbcError::invalid_chunk(format!("{what} table size overflows")))?;
    bytes.get(start..end).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "{what} table at {start}..{end} is outside chunk length {}",
            bytes.len()
        ))
    })
}

fn read_u32_le(bytes: &[u8], offset: usize, what: &str) -> Result<u32, DxbcError> {
    let slice = offset
        .checked_add(4)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            DxbcError::invalid_chunk(format!(
                "need 4 bytes for {what} at {offset}, but length is {}",
                bytes.len()
            ))
        })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

pub(crate) fn read_cstring<'a>(
    bytes: &'a [u8],
    offset: usize,
    what: &str,
) -> Result<&'a str, DxbcError> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "{what} offset {offset} is outside chunk length {}",
            bytes.len()
        ))
    })?;
    let nul = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "{what} at offset {offset} is missing a null terminator"
        ))
    })?;
    core::str::from_utf8(&tail[..nul]).map_err(|_| {
        DxbcError::invalid_chunk(format!("{what} at offset {offset} is not valid UTF-8"))
    })
}
