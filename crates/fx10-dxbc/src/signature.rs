//! Parsers for DXBC signature chunks (`ISGN`, `OSGN`).
//!
//! Signature chunks provide semantic/register mappings for shader inputs and
//! outputs in shader model 4.

use crate::rdef::read_cstring;
use crate::DxbcError;

const SIGNATURE_HEADER_LEN: usize = 8;
const SIGNATURE_ENTRY_LEN: usize = 24;

/// A parsed DXBC signature chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureChunk {
    /// Parsed signature entries.
    pub entries: Vec<SignatureEntry>,
}

/// A single entry in a DXBC signature chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// The semantic name (e.g. `"POSITION"` or `"TEXCOORD"`).
    pub semantic_name: String,
    /// The semantic index (e.g. `0` for `TEXCOORD0`).
    pub semantic_index: u32,
    /// System value type (`D3D10_NAME`) stored as a raw `u32`.
    pub system_value_type: u32,
    /// Register component type stored as a raw `u32`.
    pub component_type: u32,
    /// Register index assigned by the compiler.
    pub register: u32,
    /// Component presence mask.
    pub mask: u8,
    /// Read/write mask.
    pub read_write_mask: u8,
}

/// Parses a DXBC signature chunk payload.
pub fn parse_signature_chunk(bytes: &[u8]) -> Result<SignatureChunk, DxbcError> {
    if bytes.len() < SIGNATURE_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "signature chunk is truncated: need {SIGNATURE_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }

    let param_count = read_u32_le(bytes, 0)? as usize;
    let param_offset = read_u32_le(bytes, 4)? as usize;
    if param_count == 0 {
        return Ok(SignatureChunk::default());
    }

    let table_end = param_count
        .checked_mul(SIGNATURE_ENTRY_LEN)
        .and_then(|len| param_offset.checked_add(len))
        .ok_or_else(|| DxbcError::invalid_chunk("signature table size overflows"))?;
    let table = bytes.get(param_offset..table_end).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "signature table at {param_offset}..{table_end} is outside chunk length {}",
            bytes.len()
        ))
    })?;

    let mut entries = Vec::with_capacity(param_count);
    for (entry_index, entry) in table.chunks_exact(SIGNATURE_ENTRY_LEN).enumerate() {
        let name_offset = read_u32_le(entry, 0)? as usize;
        if (param_offset..table_end).contains(&name_offset) {
            return Err(DxbcError::invalid_chunk(format!(
                "entry {entry_index} semantic_name_offset {name_offset} points into signature table"
            )));
        }
        let semantic_name = read_cstring(bytes, name_offset, "semantic_name")
            .map_err(|e| {
                DxbcError::invalid_chunk(format!("entry {entry_index}: {}", e.context()))
            })?
            .to_owned();

        entries.push(SignatureEntry {
            semantic_name,
            semantic_index: read_u32_le(entry, 4)?,
            system_value_type: read_u32_le(entry, 8)?,
            component_type: read_u32_le(entry, 12)?,
            register: read_u32_le(entry, 16)?,
            mask: entry[20],
            read_write_mask: entry[21],
        });
    }

    Ok(SignatureChunk { entries })
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    let slice = bytes.get(offset..offset + 4).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "need 4 bytes at {offset}, but chunk length is {}",
            bytes.len()
        ))
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
