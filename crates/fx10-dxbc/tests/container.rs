use fx10_dxbc::test_utils::build_container;
use fx10_dxbc::{parse_signature_chunk, DxbcError, DxbcFile, FourCC};
use pretty_assertions::assert_eq;

#[test]
fn valid_container_parses() {
    let bytes = build_container(&[(FourCC::FX10, &[0xAA; 12]), (FourCC(*b"STAT"), &[])]);
    let file = DxbcFile::parse(&bytes).expect("container should parse");
    assert_eq!(file.header().chunk_count, 2);
    assert_eq!(file.header().version, 1);
    assert_eq!(file.get_chunk(FourCC::FX10).unwrap().data, &[0xAA; 12]);
    assert!(file.get_chunk(FourCC(*b"STAT")).unwrap().data.is_empty());
}

#[test]
fn total_size_must_equal_buffer_length() {
    let mut bytes = build_container(&[(FourCC::FX10, &[0; 8])]);
    let declared = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
    bytes[24..28].copy_from_slice(&(declared - 1).to_le_bytes());

    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::SizeMismatch { .. }));

    // Trailing garbage past the declared size is rejected as well.
    let mut bytes = build_container(&[(FourCC::FX10, &[0; 8])]);
    bytes.push(0);
    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::SizeMismatch { .. }));
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = build_container(&[]);
    bytes[0] = b'X';
    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::MalformedHeader { .. }));
    assert!(err.context().contains("bad magic"));
}

#[test]
fn truncated_header_is_rejected() {
    let err = DxbcFile::parse(b"DXBC").unwrap_err();
    assert!(matches!(err, DxbcError::MalformedHeader { .. }));
}

#[test]
fn chunk_header_outside_container_is_rejected() {
    let mut bytes = build_container(&[(FourCC::FX10, &[0; 4])]);
    // Point the only chunk at the last four bytes; its 8-byte header no longer fits.
    let bad_offset = (bytes.len() - 4) as u32;
    bytes[32..36].copy_from_slice(&bad_offset.to_le_bytes());

    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::OutOfBounds { .. }), "{err}");
}

#[test]
fn chunk_size_past_end_is_rejected() {
    let mut bytes = build_container(&[(FourCC::FX10, &[0; 4])]);
    // Chunk header starts right after the offset table (36); size lives at +4.
    bytes[40..44].copy_from_slice(&64u32.to_le_bytes());

    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::OutOfBounds { .. }), "{err}");
}

#[test]
fn chunk_offset_into_header_is_rejected() {
    let mut bytes = build_container(&[(FourCC::FX10, &[0; 4])]);
    bytes[32..36].copy_from_slice(&4u32.to_le_bytes());

    let err = DxbcFile::parse(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::MalformedOffsets { .. }));
}

#[test]
fn signature_chunk_missing_null_terminator_is_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u32.to_le_bytes()); // param_count
    bytes.extend_from_slice(&8u32.to_le_bytes()); // param_offset
    bytes.extend_from_slice(&32u32.to_le_bytes()); // semantic name offset
    bytes.extend_from_slice(&[0u8; 20]);
    bytes.extend_from_slice(b"POSITION");

    let err = parse_signature_chunk(&bytes).unwrap_err();
    assert!(matches!(err, DxbcError::InvalidChunk { .. }));
    assert!(err.context().contains("null terminator"));
}
