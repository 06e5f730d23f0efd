//! Builders for synthetic `DXBC` payloads.

use crate::FourCC;

pub mod fx10;

/// Builds a `DXBC` container holding the provided chunks.
///
/// The checksum is left zeroed; the version word is [`crate::DXBC_VERSION`] and
/// `total_size` matches the returned length.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    crate::write_container(chunks).expect("test container fits in u32")
}

/// One bound resource for [`build_rdef_chunk`].
#[derive(Debug, Clone, Copy)]
pub struct ResourceBindingDesc<'a> {
    /// Name the shader uses for the resource.
    pub name: &'a str,
    /// `D3D10_SHADER_INPUT_TYPE` value.
    pub input_type: u32,
    /// First register.
    pub bind_point: u32,
    /// Number of registers.
    pub bind_count: u32,
}

/// Builds an `RDEF` chunk with bound resources and no constant buffer descriptions.
pub fn build_rdef_chunk(resources: &[ResourceBindingDesc<'_>]) -> Vec<u8> {
    const HEADER_LEN: u32 = 28;
    const ENTRY_LEN: u32 = 32;

    let mut strings = Vec::new();
    let strings_base = HEADER_LEN + ENTRY_LEN * resources.len() as u32;
    let mut name_offsets = Vec::with_capacity(resources.len());
    for res in resources {
        name_offsets.push(strings_base + strings.len() as u32);
        strings.extend_from_slice(res.name.as_bytes());
        strings.push(0);
    }

    let mut out = Vec::new();
    push_u32(&mut out, 0); // cb count
    push_u32(&mut out, 0); // cb offset
    push_u32(&mut out, resources.len() as u32);
    push_u32(&mut out, HEADER_LEN);
    push_u32(&mut out, 0xfffe_0400); // vs_4_0 target
    push_u32(&mut out, 0); // flags
    push_u32(&mut out, 0); // creator

    for (res, name_offset) in resources.iter().zip(name_offsets) {
        push_u32(&mut out, name_offset);
        push_u32(&mut out, res.input_type);
        push_u32(&mut out, 0); // return type
        push_u32(&mut out, 0); // dimension
        push_u32(&mut out, 0); // sample count
        push_u32(&mut out, res.bind_point);
        push_u32(&mut out, res.bind_count);
        push_u32(&mut out, 0); // flags
    }
    out.extend_from_slice(&strings);
    out
}

/// One entry for [`build_signature_chunk`].
#[derive(Debug, Clone, Copy)]
pub struct SignatureEntryDesc<'a> {
    /// Semantic name (e.g. `"POSITION"`).
    pub semantic_name: &'a str,
    /// Semantic index.
    pub semantic_index: u32,
    /// Register index.
    pub register: u32,
    /// Component mask.
    pub mask: u8,
}

/// Builds a 24-byte-per-entry `ISGN`/`OSGN` chunk payload.
pub fn build_signature_chunk(entries: &[SignatureEntryDesc<'_>]) -> Vec<u8> {
    let table_end = 8 + 24 * entries.len() as u32;
    let mut strings = Vec::new();
    let mut out = Vec::new();
    push_u32(&mut out, entries.len() as u32);
    push_u32(&mut out, 8);
    for entry in entries {
        push_u32(&mut out, table_end + strings.len() as u32);
        strings.extend_from_slice(entry.semantic_name.as_bytes());
        strings.push(0);
        push_u32(&mut out, entry.semantic_index);
        push_u32(&mut out, 0); // system value
        push_u32(&mut out, 3); // float32
        push_u32(&mut out, entry.register);
        out.extend_from_slice(&[entry.mask, entry.mask, 0, 0]);
    }
    out.extend_from_slice(&strings);
    out
}

/// Builds a shader container with `RDEF`, `ISGN`, `OSGN` and a placeholder `SHDR` chunk.
pub fn build_shader(
    resources: &[ResourceBindingDesc<'_>],
    inputs: &[SignatureEntryDesc<'_>],
    outputs: &[SignatureEntryDesc<'_>],
) -> Vec<u8> {
    let rdef = build_rdef_chunk(resources);
    let isgn = build_signature_chunk(inputs);
    let osgn = build_signature_chunk(outputs);
    build_container(&[
        (FourCC::RDEF, &rdef[..]),
        (FourCC::ISGN, &isgn[..]),
        (FourCC::OSGN, &osgn[..]),
        (FourCC::SHDR, &[0x40u8, 0x00, 0x01, 0x00][..]),
    ])
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DxbcFile;

    #[test]
    fn build_container_roundtrips_through_parser() {
        let payload = [1u8, 2, 3, 4];
        let bytes = build_container(&[(FourCC::FX10, &payload)]);

        let file = DxbcFile::parse(&bytes).expect("built container should parse");
        assert_eq!(file.header().magic, FourCC::DXBC);
        assert_eq!(file.header().total_size as usize, bytes.len());
        assert_eq!(file.header().chunk_count, 1);

        let chunk = file.get_chunk(FourCC::FX10).expect("missing FX10");
        assert_eq!(chunk.data, &payload);
    }
}
