use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::rdef::{parse_rdef_chunk, RdefChunk};
use crate::signature::{parse_signature_chunk, SignatureChunk};
use core::fmt;

/// Size of the fixed container header: magic + checksum + version + total_size + chunk_count.
pub const DXBC_HEADER_LEN: usize = 4 + 16 + 4 + 4 + 4;
/// The only container version this parser accepts.
pub const DXBC_VERSION: u32 = 1;
// Real containers hold a handful of chunks; cap the offset table so hostile input can't make us
// walk millions of entries.
const MAX_DXBC_CHUNK_COUNT: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Must be [`FourCC::DXBC`].
    pub magic: FourCC,
    /// The checksum stored in the container header. Never verified.
    pub checksum: [u8; 16],
    /// Container version, always [`DXBC_VERSION`].
    pub version: u32,
    /// Declared total size, in bytes, of this container.
    pub total_size: u32,
    /// Number of chunk offsets following the header.
    pub chunk_count: u32,
}

/// A single chunk within a `DXBC` container.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// The chunk identifier (e.g. `FX10`, `RDEF`).
    pub fourcc: FourCC,
    /// Byte offset of the chunk header within the container.
    pub offset: u32,
    /// Raw chunk payload bytes.
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DxbcChunk")
            .field("fourcc", &self.fourcc)
            .field("offset", &self.offset)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// A parsed `DXBC` container.
///
/// Parsing is strict: the version must be [`DXBC_VERSION`], the declared
/// `total_size` must equal the input length exactly, and every chunk header and
/// payload must lie within the container.
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    bytes: &'a [u8],
    header: DxbcHeader,
    chunk_offsets: &'a [u8],
}

impl<'a> DxbcFile<'a> {
    /// Parses and validates a `DXBC` container from `bytes`.
    ///
    /// The input is treated as untrusted: this function validates all
    /// offsets/sizes and never panics on malformed data.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        if bytes.len() < DXBC_HEADER_LEN {
            return Err(DxbcError::malformed_header(format!(
                "need at least {DXBC_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let magic = read_fourcc(bytes, 0)?;
        if magic != FourCC::DXBC {
            return Err(DxbcError::malformed_header(format!(
                "bad magic {:?}, expected {:?}",
                magic,
                FourCC::DXBC
            )));
        }

        let mut checksum = [0u8; 16];
        checksum.copy_from_slice(&bytes[4..20]);

        let version = read_u32_le(bytes, 20)?;
        if version != DXBC_VERSION {
            return Err(DxbcError::UnsupportedVersion { version });
        }

        let total_size = read_u32_le(bytes, 24)?;
        if total_size as usize != bytes.len() {
            return Err(DxbcError::SizeMismatch {
                declared: total_size,
                actual: bytes.len(),
            });
        }

        let chunk_count = read_u32_le(bytes, 28)?;
        if chunk_count > MAX_DXBC_CHUNK_COUNT {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk_count {chunk_count} exceeds maximum {MAX_DXBC_CHUNK_COUNT}"
            )));
        }

        let offset_table_end = (chunk_count as usize)
            .checked_mul(4)
            .and_then(|len| DXBC_HEADER_LEN.checked_add(len))
            .ok_or_else(|| DxbcError::malformed_offsets("chunk offset table size overflows"))?;
        if offset_table_end > bytes.len() {
            return Err(DxbcError::malformed_offsets(format!(
                "chunk offset table ends at {offset_table_end}, but total_size is {}",
                bytes.len()
            )));
        }

        let chunk_offsets = &bytes[DXBC_HEADER_LEN..offset_table_end];
        for i in 0..chunk_count as usize {
            let chunk_offset = read_u32_le(chunk_offsets, i * 4)? as usize;
            if chunk_offset < offset_table_end {
                return Err(DxbcError::malformed_offsets(format!(
                    "chunk {i} offset {chunk_offset} points into the container header (need >= {offset_table_end})"
                )));
            }
            chunk_at(bytes, chunk_offset).map_err(|e| match e {
                DxbcError::OutOfBounds { context } => {
                    DxbcError::out_of_bounds(format!("chunk {i}: {context}"))
                }
                other => other,
            })?;
        }

        let header = DxbcHeader {
            magic,
            checksum,
            version,
            total_size,
            chunk_count,
        };
        tracing::trace!(total_size, chunk_count, "parsed DXBC container");

        Ok(DxbcFile {
            bytes,
            header,
            chunk_offsets,
        })
    }

    /// Returns the parsed header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// Returns the raw container bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterates over all chunks in file order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        DxbcChunksIter {
            bytes: self.bytes,
            chunk_offsets: self.chunk_offsets,
            index: 0,
        }
    }

    /// Visits every chunk once, in file order, stopping at the first handler error.
    ///
    /// Handlers receive every chunk; tags they do not recognize should simply be
    /// ignored.
    pub fn for_each_chunk<E>(
        &self,
        mut handler: impl FnMut(DxbcChunk<'a>) -> Result<(), E>,
    ) -> Result<(), E> {
        for chunk in self.chunks() {
            handler(chunk)?;
        }
        Ok(())
    }

    /// Returns the first chunk matching `fourcc`, if any.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.chunks().find(|chunk| chunk.fourcc == fourcc)
    }

    /// Returns and parses the first signature chunk with the given tag, if any.
    pub fn get_signature(&self, kind: FourCC) -> Option<Result<SignatureChunk, DxbcError>> {
        let chunk = self.get_chunk(kind)?;
        Some(parse_signature_chunk(chunk.data).map_err(|e| {
            DxbcError::invalid_chunk(format!("{} signature chunk: {}", chunk.fourcc, e.context()))
        }))
    }

    /// Returns and parses the `RDEF` chunk, if any.
    pub fn get_rdef(&self) -> Option<Result<RdefChunk, DxbcError>> {
        let chunk = self.get_chunk(FourCC::RDEF)?;
        Some(parse_rdef_chunk(chunk.data))
    }

    /// Returns a human-readable summary of the container and its chunks.
    pub fn debug_summary(&self) -> String {
        use core::fmt::Write as _;

        let mut out = String::new();
        let _ = write!(
            &mut out,
            "{} total_size={} chunk_count={}",
            self.header.magic, self.header.total_size, self.header.chunk_count
        );
        for (idx, chunk) in self.chunks().enumerate() {
            let _ = write!(
                &mut out,
                "\n  [{idx:02}] {} @{} {} bytes",
                chunk.fourcc,
                chunk.offset,
                chunk.data.len()
            );
        }
        out
    }
}

/// Serializes `chunks` into a new `DXBC` container.
///
/// The checksum is left zeroed. The result always parses with [`DxbcFile::parse`].
pub fn write_container(chunks: &[(FourCC, &[u8])]) -> Result<Vec<u8>, DxbcError> {
    let header_size = DXBC_HEADER_LEN + 4 * chunks.len();
    let chunk_bytes = chunks.iter().map(|(_, data)| 8 + data.len()).sum::<usize>();
    let total = header_size + chunk_bytes;
    let total_size = u32::try_from(total)
        .map_err(|_| DxbcError::out_of_bounds(format!("container of {total} bytes exceeds 4 GiB")))?;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&FourCC::DXBC.0);
    out.extend_from_slice(&[0u8; 16]); // checksum
    out.extend_from_slice(&DXBC_VERSION.to_le_bytes());
    out.extend_from_slice(&total_size.to_le_bytes());
    out.extend_from_slice(&(chunks.len() as u32).to_le_bytes());

    let offsets_pos = out.len();
    out.resize(header_size, 0);
    for (i, (fourcc, data)) in chunks.iter().enumerate() {
        // Both fit: `total` was checked above.
        let offset = out.len() as u32;
        out[offsets_pos + i * 4..offsets_pos + i * 4 + 4].copy_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    Ok(out)
}

struct DxbcChunksIter<'a> {
    bytes: &'a [u8],
    chunk_offsets: &'a [u8],
    index: usize,
}

impl<'a> Iterator for DxbcChunksIter<'a> {
    type Item = DxbcChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.index.checked_mul(4)?;
        let chunk_offset = read_u32_le(self.chunk_offsets, start).ok()? as usize;
        let chunk = chunk_at(self.bytes, chunk_offset).ok()?;
        self.index += 1;
        Some(chunk)
    }
}

fn chunk_at(bytes: &[u8], chunk_offset: usize) -> Result<DxbcChunk<'_>, DxbcError> {
    let header_end = chunk_offset
        .checked_add(8)
        .ok_or_else(|| DxbcError::malformed_offsets("chunk offset overflows"))?;
    if header_end > bytes.len() {
        return Err(DxbcError::out_of_bounds(format!(
            "header at {chunk_offset}..{header_end} is outside total_size {}",
            bytes.len()
        )));
    }

    let fourcc = read_fourcc(bytes, chunk_offset)?;
    let size = read_u32_le(bytes, chunk_offset + 4)? as usize;
    let data_end = header_end
        .checked_add(size)
        .ok_or_else(|| DxbcError::malformed_offsets("chunk size overflows"))?;
    let data = bytes.get(header_end..data_end).ok_or_else(|| {
        DxbcError::out_of_bounds(format!(
            "{fourcc} data at {header_end}..{data_end} is outside total_size {}",
            bytes.len()
        ))
    })?;

    Ok(DxbcChunk {
        fourcc,
        offset: chunk_offset as u32,
        data,
    })
}

fn read_fourcc(bytes: &[u8], offset: usize) -> Result<FourCC, DxbcError> {
    bytes
        .get(offset..)
        .and_then(FourCC::from_slice)
        .ok_or_else(|| {
            DxbcError::malformed_header(format!(
                "need 4 bytes at {offset}, but buffer length is {}",
                bytes.len()
            ))
        })
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    let end = offset
        .checked_add(4)
        .ok_or_else(|| DxbcError::malformed_header("offset overflows when reading u32"))?;
    let slice = bytes.get(offset..end).ok_or_else(|| {
        DxbcError::malformed_header(format!(
            "need 4 bytes at {offset}..{end}, but buffer length is {}",
            bytes.len()
        ))
    })?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
