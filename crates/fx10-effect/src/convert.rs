//! Conversions between the numeric representations a value can be stored in.
//!
//! Values travel as raw 32-bit words. Conversion follows C cast semantics for
//! float/int, treats int, uint and bool as the same bits, and canonicalizes
//! any nonzero value stored into a bool to all ones.

/// How a 32-bit word is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    /// IEEE-754 single.
    Float,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    Uint,
    /// Zero is false, anything else is true.
    Bool,
}

impl NumericType {
    /// Decodes a value type tag from a constant value list (1 float, 2 int, 3 uint, 4 bool).
    pub(crate) fn from_value_tag(tag: u32) -> Option<Self> {
        match tag {
            1 => Some(Self::Float),
            2 => Some(Self::Int),
            3 => Some(Self::Uint),
            4 => Some(Self::Bool),
            _ => None,
        }
    }
}

/// Canonical `true`.
pub const BOOL_TRUE: u32 = 0xffff_ffff;

/// Converts one word from `from` to `to`.
pub fn convert_word(value: u32, from: NumericType, to: NumericType) -> u32 {
    use NumericType::*;

    match (from, to) {
        (Float, Float) => value,
        (Float, Int | Uint) => (f32::from_bits(value) as i32) as u32,
        (Int | Uint | Bool, Int | Uint) => value,
        (Int | Uint, Float) => (value as i32 as f32).to_bits(),
        (Bool, Float) => {
            if value != 0 {
                1.0f32.to_bits()
            } else {
                0.0f32.to_bits()
            }
        }
        (_, Bool) => {
            if value != 0 {
                BOOL_TRUE
            } else {
                0
            }
        }
    }
}

/// Converts `src` words into `dst` words in place, component by component.
pub(crate) fn convert_words(dst: &mut [u32], src: &[u32], from: NumericType, to: NumericType) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = convert_word(s, from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NumericType::*;

    #[test]
    fn float_roundtrips_through_float_storage() {
        for v in [0.0f32, -1.5, 3.25, f32::MAX, f32::MIN_POSITIVE] {
            let stored = convert_word(v.to_bits(), Float, Float);
            assert_eq!(f32::from_bits(convert_word(stored, Float, Float)), v);
        }
    }

    #[test]
    fn float_to_int_truncates_toward_zero() {
        assert_eq!(convert_word(3.9f32.to_bits(), Float, Int) as i32, 3);
        assert_eq!(convert_word((-3.9f32).to_bits(), Float, Int) as i32, -3);
        assert_eq!(convert_word(0.5f32.to_bits(), Float, Uint), 0);
    }

    #[test]
    fn int_to_float_casts_the_signed_value() {
        assert_eq!(f32::from_bits(convert_word(-7i32 as u32, Int, Float)), -7.0);
        assert_eq!(f32::from_bits(convert_word(42, Uint, Float)), 42.0);
    }

    #[test]
    fn bool_to_float_is_zero_or_one() {
        assert_eq!(f32::from_bits(convert_word(BOOL_TRUE, Bool, Float)), 1.0);
        assert_eq!(f32::from_bits(convert_word(5, Bool, Float)), 1.0);
        assert_eq!(f32::from_bits(convert_word(0, Bool, Float)), 0.0);
    }

    #[test]
    fn storing_into_bool_canonicalizes_true() {
        assert_eq!(convert_word(2, Int, Bool), BOOL_TRUE);
        assert_eq!(convert_word(0.25f32.to_bits(), Float, Bool), BOOL_TRUE);
        assert_eq!(convert_word((-0.0f32).to_bits(), Float, Bool), BOOL_TRUE);
        assert_eq!(convert_word(1, Bool, Bool), BOOL_TRUE);
        assert_eq!(convert_word(0, Uint, Bool), 0);
    }

    #[test]
    fn integers_are_bit_identical() {
        assert_eq!(convert_word(0x8000_0001, Int, Uint), 0x8000_0001);
        assert_eq!(convert_word(0x8000_0001, Uint, Int), 0x8000_0001);
        assert_eq!(convert_word(BOOL_TRUE, Bool, Int) as i32, -1);
    }

    #[test]
    fn value_tags_map_to_types() {
        assert_eq!(NumericType::from_value_tag(1), Some(Float));
        assert_eq!(NumericType::from_value_tag(4), Some(Bool));
        assert_eq!(NumericType::from_value_tag(0), None);
    }
}
