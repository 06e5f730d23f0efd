//! Bounds-checked access to the effect body.
//!
//! Every offset stored in an effect is relative to the start of the body (the
//! unstructured data region that follows the header). Structured records are
//! read sequentially through a [`Cursor`]; everything else is addressed
//! randomly through [`Body`].

use crate::error::EffectError;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Body<'a> {
    bytes: &'a [u8],
}

impl<'a> Body<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Fails unless `count` items of `size` bytes fit at `offset`.
    pub(crate) fn require(&self, offset: u32, count: u32, size: u32, what: &str) -> Result<(), EffectError> {
        let remaining = self.bytes.len().checked_sub(offset as usize).ok_or_else(|| {
            EffectError::malformed(format!(
                "{what} offset {offset:#x} is outside the body ({} bytes)",
                self.bytes.len()
            ))
        })?;
        require_space(remaining, count, size, what)
    }

    pub(crate) fn u32_at(&self, offset: u32, what: &str) -> Result<u32, EffectError> {
        self.require(offset, 1, 4, what)?;
        Ok(read_u32(self.bytes, offset as usize))
    }

    pub(crate) fn words_at(&self, offset: u32, count: u32, what: &str) -> Result<Vec<u32>, EffectError> {
        self.require(offset, count, 4, what)?;
        Ok((0..count as usize)
            .map(|i| read_u32(self.bytes, offset as usize + i * 4))
            .collect())
    }

    pub(crate) fn slice_at(&self, offset: u32, len: u32, what: &str) -> Result<&'a [u8], EffectError> {
        self.require(offset, 1, len, what)?;
        let start = offset as usize;
        Ok(&self.bytes[start..start + len as usize])
    }

    /// Reads a NUL-terminated string; offset zero means "no string".
    pub(crate) fn string_at(&self, offset: u32, what: &str) -> Result<Option<&'a str>, EffectError> {
        if offset == 0 {
            return Ok(None);
        }
        let tail = self.bytes.get(offset as usize..).ok_or_else(|| {
            EffectError::malformed(format!(
                "{what} string offset {offset:#x} is outside the body ({} bytes)",
                self.bytes.len()
            ))
        })?;
        let nul = tail.iter().position(|&b| b == 0).ok_or_else(|| {
            EffectError::malformed(format!("{what} string at {offset:#x} is not terminated"))
        })?;
        let s = core::str::from_utf8(&tail[..nul])
            .map_err(|_| EffectError::malformed(format!("{what} string at {offset:#x} is not UTF-8")))?;
        Ok(Some(s))
    }

    pub(crate) fn owned_string_at(&self, offset: u32, what: &str) -> Result<Option<String>, EffectError> {
        Ok(self.string_at(offset, what)?.map(str::to_owned))
    }

    pub(crate) fn cursor(&self, offset: u32) -> Result<Cursor<'a>, EffectError> {
        if offset as usize > self.bytes.len() {
            return Err(EffectError::malformed(format!(
                "index region offset {offset:#x} is outside the body ({} bytes)",
                self.bytes.len()
            )));
        }
        Ok(Cursor {
            bytes: self.bytes,
            pos: offset as usize,
        })
    }
}

/// Sequential reader over the structured index region.
#[derive(Debug)]
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fails unless `count` records of `size` bytes remain.
    pub(crate) fn require(&self, count: u32, size: u32, what: &str) -> Result<(), EffectError> {
        require_space(self.remaining(), count, size, what)
    }

    pub(crate) fn read_u32(&mut self, what: &str) -> Result<u32, EffectError> {
        self.require(1, 4, what)?;
        let v = read_u32(self.bytes, self.pos);
        self.pos += 4;
        Ok(v)
    }

    /// Reads `N` words after a single capacity check.
    pub(crate) fn read_words<const N: usize>(&mut self, what: &str) -> Result<[u32; N], EffectError> {
        self.require(N as u32, 4, what)?;
        let mut out = [0u32; N];
        for word in &mut out {
            *word = read_u32(self.bytes, self.pos);
            self.pos += 4;
        }
        Ok(out)
    }
}

/// `remaining / count >= size`, the check that precedes every multi-word read.
pub(crate) fn require_space(remaining: usize, count: u32, size: u32, what: &str) -> Result<(), EffectError> {
    if count == 0 || remaining / count as usize >= size as usize {
        return Ok(());
    }
    Err(EffectError::malformed(format!(
        "{what}: {count} x {size} bytes do not fit in the {remaining} remaining bytes"
    )))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
