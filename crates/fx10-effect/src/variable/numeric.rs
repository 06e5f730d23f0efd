//! Scalar, vector and matrix handles.
//!
//! Values cross the API as `f32`, `i32`, `u32` or `bool` and are converted to
//! the variable's stored base type on write and back on read (see
//! [`crate::convert`]). Array elements sit `stride` bytes apart; within an
//! element, vector components are packed and matrices use one 16-byte register
//! per row (or per column for column-major matrices).

use tracing::warn;

use crate::convert::{convert_word, NumericType, BOOL_TRUE};
use crate::error::EffectError;
use crate::types::TypeClass;

use super::handle::{load_word, store_word};
use super::EffectVariable;

/// A 4x4 matrix, indexed `[row][column]`.
pub type Matrix4 = [[f32; 4]; 4];

/// A value type numeric variables can be read and written as.
pub trait Component: Copy + Default {
    /// How the value's word is interpreted.
    const TYPE: NumericType;

    /// The value as a 32-bit word.
    fn to_word(self) -> u32;

    /// The value held in a word of type [`Self::TYPE`].
    fn from_word(word: u32) -> Self;
}

impl Component for f32 {
    const TYPE: NumericType = NumericType::Float;

    fn to_word(self) -> u32 {
        bytemuck::cast(self)
    }

    fn from_word(word: u32) -> Self {
        bytemuck::cast(word)
    }
}

impl Component for i32 {
    const TYPE: NumericType = NumericType::Int;

    fn to_word(self) -> u32 {
        bytemuck::cast(self)
    }

    fn from_word(word: u32) -> Self {
        bytemuck::cast(word)
    }
}

impl Component for u32 {
    const TYPE: NumericType = NumericType::Uint;

    fn to_word(self) -> u32 {
        self
    }

    fn from_word(word: u32) -> Self {
        word
    }
}

impl Component for bool {
    const TYPE: NumericType = NumericType::Bool;

    fn to_word(self) -> u32 {
        if self {
            BOOL_TRUE
        } else {
            0
        }
    }

    fn from_word(word: u32) -> Self {
        word != 0
    }
}

/// Shape of a numeric variable, taken from its (element) type.
#[derive(Debug, Clone, Copy)]
struct Shape {
    base: NumericType,
    column_major: bool,
    rows: usize,
    columns: usize,
    /// `1` for non-arrays.
    elements: u32,
    stride: usize,
}

impl Shape {
    fn of(variable: &EffectVariable<'_>) -> Result<Self, EffectError> {
        let (effect, node) = variable.require("numeric access on an invalid variable")?;
        let ty = effect.graph.types.get(node.ty);
        let element = ty.element_type.map_or(ty, |id| effect.graph.types.get(id));
        let base = element
            .base_type
            .numeric()
            .ok_or(EffectError::InvalidUsage("variable is not numeric"))?;
        Ok(Self {
            base,
            column_major: element.class == TypeClass::MatrixColumns,
            rows: element.rows.clamp(1, 4) as usize,
            columns: element.columns.clamp(1, 4) as usize,
            elements: ty.element_count.max(1),
            stride: ty.stride as usize,
        })
    }

    /// Clamps `[offset, offset + count)` to the array; `None` when nothing is left.
    fn clamp(&self, offset: u32, count: usize) -> Option<usize> {
        if offset >= self.elements {
            warn!(offset, elements = self.elements, "array access starts past the end, ignored");
            return None;
        }
        let available = (self.elements - offset) as usize;
        if count > available {
            warn!(offset, count, elements = self.elements, "array access clamped to the array length");
        }
        Some(count.min(available))
    }

    fn element_start(&self, start: usize, offset: u32, index: usize) -> usize {
        start + (offset as usize + index) * self.stride
    }

    /// Word index of `(row, column)` inside one element.
    fn matrix_slot(&self, row: usize, column: usize) -> usize {
        if self.column_major {
            column * 4 + row
        } else {
            row * 4 + column
        }
    }
}

fn store<T: Component>(bytes: &mut [u8], at: usize, value: T, base: NumericType) -> Result<(), EffectError> {
    store_word(bytes, at, convert_word(value.to_word(), T::TYPE, base))
}

fn load<T: Component>(bytes: &[u8], at: usize, base: NumericType) -> Result<T, EffectError> {
    Ok(T::from_word(convert_word(load_word(bytes, at)?, base, T::TYPE)))
}

/// Writes `values[i][..width]` to consecutive elements starting at `offset`.
fn write_packed<T: Component, const N: usize>(
    variable: EffectVariable<'_>,
    values: &[[T; N]],
    offset: u32,
    width: impl Fn(&Shape) -> usize,
) -> Result<(), EffectError> {
    let shape = Shape::of(&variable)?;
    let Some(count) = shape.clamp(offset, values.len()) else {
        return Ok(());
    };
    let width = width(&shape).min(N);
    variable.with_store_mut(|bytes, start| {
        for (i, value) in values[..count].iter().enumerate() {
            let at = shape.element_start(start, offset, i);
            for (j, &component) in value[..width].iter().enumerate() {
                store(bytes, at + j * 4, component, shape.base)?;
            }
        }
        Ok(())
    })
}

fn read_packed<T: Component, const N: usize>(
    variable: EffectVariable<'_>,
    values: &mut [[T; N]],
    offset: u32,
    width: impl Fn(&Shape) -> usize,
) -> Result<(), EffectError> {
    let shape = Shape::of(&variable)?;
    let Some(count) = shape.clamp(offset, values.len()) else {
        return Ok(());
    };
    let width = width(&shape).min(N);
    variable.with_store(|bytes, start| {
        for (i, value) in values[..count].iter_mut().enumerate() {
            let at = shape.element_start(start, offset, i);
            for (j, component) in value[..width].iter_mut().enumerate() {
                *component = load(bytes, at + j * 4, shape.base)?;
            }
        }
        Ok(())
    })
}

typed_variable!(
    /// A scalar or an array of scalars.
    ScalarVariable,
    Scalar
);

impl<'a> ScalarVariable<'a> {
    /// Writes `values` to elements `offset..`, clamped to the array length.
    pub fn set_array<T: Component>(&self, values: &[T], offset: u32) -> Result<(), EffectError> {
        let rows: Vec<[T; 1]> = values.iter().map(|&v| [v]).collect();
        write_packed(self.0, &rows, offset, |_| 1)
    }

    /// Reads elements `offset..` into `values`, clamped to the array length.
    pub fn get_array<T: Component>(&self, values: &mut [T], offset: u32) -> Result<(), EffectError> {
        let mut rows = vec![[T::default(); 1]; values.len()];
        read_packed(self.0, &mut rows, offset, |_| 1)?;
        for (value, [read]) in values.iter_mut().zip(rows) {
            *value = read;
        }
        Ok(())
    }

    fn set<T: Component>(&self, value: T) -> Result<(), EffectError> {
        write_packed(self.0, &[[value]], 0, |_| 1)
    }

    fn get<T: Component>(&self) -> Result<T, EffectError> {
        let mut out = [[T::default()]];
        read_packed(self.0, &mut out, 0, |_| 1)?;
        Ok(out[0][0])
    }

    /// Stores a float.
    pub fn set_float(&self, value: f32) -> Result<(), EffectError> {
        self.set(value)
    }

    /// Reads the value as a float.
    pub fn get_float(&self) -> Result<f32, EffectError> {
        self.get()
    }

    /// Stores an int.
    pub fn set_int(&self, value: i32) -> Result<(), EffectError> {
        self.set(value)
    }

    /// Reads the value as an int; floats truncate toward zero.
    pub fn get_int(&self) -> Result<i32, EffectError> {
        self.get()
    }

    /// Stores a bool.
    pub fn set_bool(&self, value: bool) -> Result<(), EffectError> {
        self.set(value)
    }

    /// Reads the value as a bool.
    pub fn get_bool(&self) -> Result<bool, EffectError> {
        self.get()
    }
}

typed_variable!(
    /// A vector or an array of vectors.
    VectorVariable,
    Vector
);

impl<'a> VectorVariable<'a> {
    /// Writes whole vectors to elements `offset..`; components past the
    /// vector's width are ignored.
    pub fn set_array<T: Component>(&self, values: &[[T; 4]], offset: u32) -> Result<(), EffectError> {
        write_packed(self.0, values, offset, |s| s.columns)
    }

    /// Reads whole vectors from elements `offset..`; components past the
    /// vector's width are left untouched.
    pub fn get_array<T: Component>(&self, values: &mut [[T; 4]], offset: u32) -> Result<(), EffectError> {
        read_packed(self.0, values, offset, |s| s.columns)
    }

    fn get<T: Component>(&self) -> Result<[T; 4], EffectError> {
        let mut out = [[T::default(); 4]];
        self.get_array(&mut out, 0)?;
        Ok(out[0])
    }

    /// Writes the first `columns` components.
    pub fn set_float_vector(&self, value: &[f32; 4]) -> Result<(), EffectError> {
        self.set_array(core::slice::from_ref(value), 0)
    }

    /// Reads the vector; unused components are zero.
    pub fn get_float_vector(&self) -> Result<[f32; 4], EffectError> {
        self.get()
    }

    /// Writes the first `columns` components as ints.
    pub fn set_int_vector(&self, value: &[i32; 4]) -> Result<(), EffectError> {
        self.set_array(core::slice::from_ref(value), 0)
    }

    /// Reads the vector as ints; floats truncate toward zero.
    pub fn get_int_vector(&self) -> Result<[i32; 4], EffectError> {
        self.get()
    }

    /// Writes the first `columns` components as bools.
    pub fn set_bool_vector(&self, value: &[bool; 4]) -> Result<(), EffectError> {
        self.set_array(core::slice::from_ref(value), 0)
    }

    /// Reads the vector as bools.
    pub fn get_bool_vector(&self) -> Result<[bool; 4], EffectError> {
        self.get()
    }
}

typed_variable!(
    /// A matrix or an array of matrices, row- or column-major.
    MatrixVariable,
    Matrix
);

impl<'a> MatrixVariable<'a> {
    fn write(&self, values: &[Matrix4], offset: u32, transpose: bool) -> Result<(), EffectError> {
        let shape = Shape::of(&self.0)?;
        let Some(count) = shape.clamp(offset, values.len()) else {
            return Ok(());
        };
        self.0.with_store_mut(|bytes, start| {
            for (i, m) in values[..count].iter().enumerate() {
                let at = shape.element_start(start, offset, i);
                for row in 0..shape.rows {
                    for column in 0..shape.columns {
                        let value = if transpose { m[column][row] } else { m[row][column] };
                        store(bytes, at + shape.matrix_slot(row, column) * 4, value, shape.base)?;
                    }
                }
            }
            Ok(())
        })
    }

    fn read(&self, values: &mut [Matrix4], offset: u32, transpose: bool) -> Result<(), EffectError> {
        let shape = Shape::of(&self.0)?;
        let Some(count) = shape.clamp(offset, values.len()) else {
            return Ok(());
        };
        self.0.with_store(|bytes, start| {
            for (i, m) in values[..count].iter_mut().enumerate() {
                *m = Matrix4::default();
                let at = shape.element_start(start, offset, i);
                for row in 0..shape.rows {
                    for column in 0..shape.columns {
                        let value = load(bytes, at + shape.matrix_slot(row, column) * 4, shape.base)?;
                        if transpose {
                            m[column][row] = value;
                        } else {
                            m[row][column] = value;
                        }
                    }
                }
            }
            Ok(())
        })
    }

    /// Stores `m`; only the top-left `rows x columns` block is used.
    pub fn set_matrix(&self, m: &Matrix4) -> Result<(), EffectError> {
        self.write(core::slice::from_ref(m), 0, false)
    }

    /// Reads the matrix in row-major order.
    pub fn get_matrix(&self) -> Result<Matrix4, EffectError> {
        let mut out = [Matrix4::default()];
        self.read(&mut out, 0, false)?;
        Ok(out[0])
    }

    /// Writes matrices to elements `offset..`, clamped to the array length.
    pub fn set_matrix_array(&self, values: &[Matrix4], offset: u32) -> Result<(), EffectError> {
        self.write(values, offset, false)
    }

    /// Reads matrices from elements `offset..`, clamped to the array length.
    pub fn get_matrix_array(&self, values: &mut [Matrix4], offset: u32) -> Result<(), EffectError> {
        self.read(values, offset, false)
    }

    /// Stores the transpose of `m`.
    pub fn set_matrix_transpose(&self, m: &Matrix4) -> Result<(), EffectError> {
        self.write(core::slice::from_ref(m), 0, true)
    }

    /// Reads the transpose of the stored matrix.
    pub fn get_matrix_transpose(&self) -> Result<Matrix4, EffectError> {
        let mut out = [Matrix4::default()];
        self.read(&mut out, 0, true)?;
        Ok(out[0])
    }

    /// Like [`Self::set_matrix_array`] with rows and columns swapped.
    pub fn set_matrix_transpose_array(&self, values: &[Matrix4], offset: u32) -> Result<(), EffectError> {
        self.write(values, offset, true)
    }

    /// Like [`Self::get_matrix_array`] with rows and columns swapped.
    pub fn get_matrix_transpose_array(&self, values: &mut [Matrix4], offset: u32) -> Result<(), EffectError> {
        self.read(values, offset, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_map_to_words() {
        assert_eq!(1.5f32.to_word(), 1.5f32.to_bits());
        assert_eq!((-2i32).to_word(), 0xffff_fffe);
        assert_eq!(true.to_word(), BOOL_TRUE);
        assert!(bool::from_word(2));
        assert_eq!(f32::from_word(0x3f80_0000), 1.0);
    }

    fn shape(column_major: bool, elements: u32) -> Shape {
        Shape {
            base: NumericType::Float,
            column_major,
            rows: 3,
            columns: 2,
            elements,
            stride: 48,
        }
    }

    #[test]
    fn matrix_slots_follow_major_order() {
        assert_eq!(shape(false, 1).matrix_slot(2, 1), 9);
        assert_eq!(shape(true, 1).matrix_slot(2, 1), 6);
    }

    #[test]
    fn array_ranges_are_clamped() {
        let s = shape(false, 4);
        assert_eq!(s.clamp(1, 10), Some(3));
        assert_eq!(s.clamp(0, 2), Some(2));
        assert_eq!(s.clamp(4, 1), None);
        assert_eq!(s.element_start(16, 2, 1), 16 + 3 * 48);
    }
}
