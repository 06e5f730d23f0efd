//! Constant buffer layout.
//!
//! Members are packed in declaration order. A member never straddles a
//! 16-byte register unless its offset was given explicitly, and structs always
//! start on a register boundary. Default values are stored packed in the
//! effect and are expanded here into the padded buffer layout.

use crate::error::EffectError;
use crate::types::{EffectType, TypeClass, TypeId, TypeRegistry};

/// Size of one constant register.
pub const REGISTER_SIZE: u32 = 16;

fn align_register(v: u32) -> u32 {
    v.saturating_add(REGISTER_SIZE - 1) & !(REGISTER_SIZE - 1)
}

/// Accumulates the running size of a constant buffer as members are added.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConstantBufferPacker {
    stride: u32,
}

impl ConstantBufferPacker {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a member after the previous ones and returns its offset.
    pub fn push(&mut self, size_unpacked: u32, is_struct: bool) -> u32 {
        if is_struct {
            self.stride = align_register(self.stride);
        }
        if (self.stride & (REGISTER_SIZE - 1)).saturating_add(size_unpacked) > REGISTER_SIZE {
            self.stride = align_register(self.stride);
        }
        let offset = self.stride;
        self.stride = self.stride.saturating_add(size_unpacked);
        offset
    }

    /// Accounts for a member whose offset was given explicitly.
    pub fn push_explicit(&mut self, size_unpacked: u32, buffer_offset: u32) -> u32 {
        self.stride = self.stride.max(size_unpacked.saturating_add(buffer_offset));
        buffer_offset
    }

    /// Bytes used so far, before final alignment.
    pub fn current(&self) -> u32 {
        self.stride
    }

    /// The buffer size: the running size rounded up to a whole register.
    pub fn finish(self) -> u32 {
        align_register(self.stride)
    }
}

/// `(registers, components per register)` of a numeric element as it is laid out in a buffer.
pub(crate) fn storage_shape(ty: &EffectType) -> (u32, u32) {
    match ty.class {
        TypeClass::MatrixColumns => (ty.columns, ty.rows),
        TypeClass::MatrixRows => (ty.rows, ty.columns),
        _ => (1, ty.columns.max(1)),
    }
}

/// Expands packed default values for a value of type `ty` into `dst` at `dst_offset`.
///
/// Element `i`, register `j`, component `k` lands at
/// `dst_offset + i * stride + j * 16 + k * 4`; structs recurse per member.
pub(crate) fn unpack_values(
    types: &TypeRegistry,
    ty: TypeId,
    packed: &[u32],
    dst: &mut [u8],
    dst_offset: u32,
) -> Result<(), EffectError> {
    let mut next = 0;
    unpack_into(types, ty, packed, &mut next, dst, u64::from(dst_offset))
}

fn unpack_into(
    types: &TypeRegistry,
    ty: TypeId,
    packed: &[u32],
    next: &mut usize,
    dst: &mut [u8],
    dst_offset: u64,
) -> Result<(), EffectError> {
    let t = types.get(ty);
    let element = types.get(types.element_of(ty));
    for i in 0..u64::from(t.element_count.max(1)) {
        let base = dst_offset + i * u64::from(t.stride);
        match t.class {
            TypeClass::Struct => {
                for member in &element.members {
                    unpack_into(types, member.ty, packed, next, dst, base + u64::from(member.offset))?;
                }
            }
            TypeClass::Object => {
                return Err(EffectError::malformed("default value for an object type"));
            }
            _ => {
                let (registers, components) = storage_shape(element);
                for j in 0..u64::from(registers) {
                    for k in 0..u64::from(components) {
                        let word = *packed.get(*next).ok_or_else(|| {
                            EffectError::malformed("default value is shorter than its type")
                        })?;
                        *next += 1;
                        write_word(dst, base + j * 16 + k * 4, word)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn write_word(dst: &mut [u8], offset: u64, word: u32) -> Result<(), EffectError> {
    let len = dst.len();
    let slot = usize::try_from(offset)
        .ok()
        .and_then(|start| dst.get_mut(start..start.checked_add(4)?))
        .ok_or_else(|| {
            EffectError::malformed(format!(
                "value at byte {offset} lies outside its {}-byte store",
                len
            ))
        })?;
    slot.copy_from_slice(&word.to_le_bytes());
    Ok(())
}
