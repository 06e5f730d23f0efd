//! Effect types and the per-effect type registry.
//!
//! Types are identified by the offset of their record in the effect body: the
//! registry decodes each record once and hands out the same [`TypeId`] for
//! every later reference to that offset. Arrays get exactly one synthesized
//! element type, shared by all of their elements.

use std::collections::HashMap;

use crate::convert::NumericType;
use crate::error::EffectError;
use crate::reader::Body;

const TYPE_KIND_NUMERIC: u32 = 1;
const TYPE_KIND_OBJECT: u32 = 2;
const TYPE_KIND_STRUCT: u32 = 3;

const NUMERIC_CLASS_MASK: u32 = 0x7;
const NUMERIC_BASE_SHIFT: u32 = 3;
const NUMERIC_BASE_MASK: u32 = 0x1f;
const NUMERIC_ROWS_SHIFT: u32 = 8;
const NUMERIC_COLUMNS_SHIFT: u32 = 11;
const NUMERIC_DIM_MASK: u32 = 0x7;
const NUMERIC_COLUMN_MAJOR: u32 = 0x4000;

// Struct types nest through member type offsets; anything deeper than this is a cycle.
const MAX_TYPE_DEPTH: u32 = 32;

// Larger than any array a 4096-register buffer or a 128-slot stage can hold.
const MAX_ARRAY_ELEMENTS: u32 = 65536;

/// Index of a type in its effect's [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// `D3D10_SHADER_VARIABLE_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// One component.
    Scalar,
    /// One row of components.
    Vector,
    /// Matrix stored one row per register.
    MatrixRows,
    /// Matrix stored one column per register.
    MatrixColumns,
    /// Texture, shader, state object, string or view.
    Object,
    /// User-defined structure.
    Struct,
}

/// `D3D10_SHADER_VARIABLE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BaseType {
    Void,
    Bool,
    Int,
    Uint,
    Float,
    String,
    Texture,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMS,
    Texture2DMSArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Buffer,
    Sampler,
    PixelShader,
    VertexShader,
    GeometryShader,
    Rasterizer,
    DepthStencil,
    Blend,
    ConstantBuffer,
    TextureBuffer,
    RenderTargetView,
    DepthStencilView,
}

impl BaseType {
    /// Any shader-resource type: textures of every dimension and typed buffers.
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Self::Texture
                | Self::Texture1D
                | Self::Texture1DArray
                | Self::Texture2D
                | Self::Texture2DArray
                | Self::Texture2DMS
                | Self::Texture2DMSArray
                | Self::Texture3D
                | Self::TextureCube
                | Self::TextureCubeArray
                | Self::Buffer
        )
    }

    /// Vertex, geometry or pixel shader.
    pub fn is_shader(self) -> bool {
        matches!(
            self,
            Self::VertexShader | Self::GeometryShader | Self::PixelShader
        )
    }

    /// The numeric interpretation of a numeric base type.
    pub fn numeric(self) -> Option<NumericType> {
        match self {
            Self::Float => Some(NumericType::Float),
            Self::Int => Some(NumericType::Int),
            Self::Uint => Some(NumericType::Uint),
            Self::Bool => Some(NumericType::Bool),
            _ => None,
        }
    }

    /// Decodes an object type enumerant; the flag is set for stream-output geometry shaders.
    pub(crate) fn from_object_enum(raw: u32) -> Option<(Self, bool)> {
        let base = match raw {
            1 => Self::String,
            2 => Self::Blend,
            3 => Self::DepthStencil,
            4 => Self::Rasterizer,
            5 => Self::PixelShader,
            6 => Self::VertexShader,
            7 => Self::GeometryShader,
            8 => return Some((Self::GeometryShader, true)),
            9 => Self::Texture,
            10 => Self::Texture1D,
            11 => Self::Texture1DArray,
            12 => Self::Texture2D,
            13 => Self::Texture2DArray,
            14 => Self::Texture2DMS,
            15 => Self::Texture2DMSArray,
            16 => Self::Texture3D,
            17 => Self::TextureCube,
            19 => Self::RenderTargetView,
            20 => Self::DepthStencilView,
            21 => Self::Sampler,
            22 => Self::Buffer,
            23 => Self::TextureCubeArray,
            _ => return None,
        };
        Some((base, false))
    }

    fn from_numeric_bits(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Float),
            2 => Some(Self::Int),
            3 => Some(Self::Uint),
            4 => Some(Self::Bool),
            _ => None,
        }
    }
}

/// One member of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StructMember {
    pub(crate) name: Option<String>,
    pub(crate) semantic: Option<String>,
    /// Byte offset within the struct.
    pub(crate) offset: u32,
    pub(crate) ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EffectType {
    pub(crate) name: Option<String>,
    pub(crate) class: TypeClass,
    pub(crate) base_type: BaseType,
    pub(crate) element_count: u32,
    pub(crate) size_unpacked: u32,
    pub(crate) size_packed: u32,
    pub(crate) stride: u32,
    pub(crate) rows: u32,
    pub(crate) columns: u32,
    pub(crate) members: Vec<StructMember>,
    pub(crate) element_type: Option<TypeId>,
    /// Geometry shader declared with a stream-output declaration.
    pub(crate) stream_output: bool,
}

impl EffectType {
    /// A zero-sized object type, used for buffers and inline shaders.
    pub(crate) fn object(name: &str, base_type: BaseType) -> Self {
        Self {
            name: Some(name.to_owned()),
            class: TypeClass::Object,
            base_type,
            element_count: 0,
            size_unpacked: 0,
            size_packed: 0,
            stride: 0,
            rows: 0,
            columns: 0,
            members: Vec::new(),
            element_type: None,
            stream_output: false,
        }
    }

    pub(crate) fn is_array(&self) -> bool {
        self.element_count > 0
    }

    pub(crate) fn desc(&self) -> EffectTypeDesc {
        EffectTypeDesc {
            type_name: self.name.clone(),
            class: self.class,
            base_type: self.base_type,
            elements: self.element_count,
            members: self.members.len() as u32,
            rows: self.rows,
            columns: self.columns,
            packed_size: self.size_packed,
            unpacked_size: self.size_unpacked,
            stride: self.stride,
        }
    }
}

/// `D3D10_EFFECT_TYPE_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectTypeDesc {
    /// Type name as declared in HLSL.
    pub type_name: Option<String>,
    /// Class.
    pub class: TypeClass,
    /// Base type.
    pub base_type: BaseType,
    /// Array element count, `0` when not an array.
    pub elements: u32,
    /// Struct member count.
    pub members: u32,
    /// Row count for numeric types.
    pub rows: u32,
    /// Column count for numeric types.
    pub columns: u32,
    /// Size with no padding.
    pub packed_size: u32,
    /// Size with constant buffer padding.
    pub unpacked_size: u32,
    /// Distance between array elements in a constant buffer.
    pub stride: u32,
}

/// Deduplicating store of every type an effect references.
#[derive(Debug, Default)]
pub(crate) struct TypeRegistry {
    types: Vec<EffectType>,
    by_offset: HashMap<u32, TypeId>,
}

impl TypeRegistry {
    pub(crate) fn get(&self, id: TypeId) -> &EffectType {
        &self.types[id.0 as usize]
    }

    /// Adds a type that has no record of its own in the effect body.
    pub(crate) fn insert(&mut self, ty: EffectType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// The shared element type of an array, or `id` itself.
    pub(crate) fn element_of(&self, id: TypeId) -> TypeId {
        self.get(id).element_type.unwrap_or(id)
    }

    /// Returns the type recorded at `offset`, decoding it on first use.
    pub(crate) fn get_or_create(&mut self, body: Body<'_>, offset: u32) -> Result<TypeId, EffectError> {
        self.get_or_create_at(body, offset, 0)
    }

    fn get_or_create_at(&mut self, body: Body<'_>, offset: u32, depth: u32) -> Result<TypeId, EffectError> {
        if let Some(&id) = self.by_offset.get(&offset) {
            return Ok(id);
        }
        if depth > MAX_TYPE_DEPTH {
            return Err(EffectError::malformed(format!(
                "type at {offset:#x} nests deeper than {MAX_TYPE_DEPTH} levels"
            )));
        }

        let [name, kind, element_count, size_unpacked, stride, size_packed] =
            word_array::<6>(&body.words_at(offset, 6, "type record")?);
        let name = body.owned_string_at(name, "type name")?;
        let info_offset = offset + 24;

        let mut ty = EffectType {
            name,
            class: TypeClass::Object,
            base_type: BaseType::Void,
            element_count,
            size_unpacked,
            size_packed,
            stride,
            rows: 0,
            columns: 0,
            members: Vec::new(),
            element_type: None,
            stream_output: false,
        };

        match kind {
            TYPE_KIND_NUMERIC => {
                let info = body.u32_at(info_offset, "numeric type info")?;
                let column_major = info & NUMERIC_COLUMN_MAJOR != 0;
                ty.class = match info & NUMERIC_CLASS_MASK {
                    1 => TypeClass::Scalar,
                    2 => TypeClass::Vector,
                    3 if column_major => TypeClass::MatrixColumns,
                    3 => TypeClass::MatrixRows,
                    other => {
                        return Err(EffectError::malformed(format!(
                            "type at {offset:#x} has unknown numeric class {other}"
                        )))
                    }
                };
                let base = (info >> NUMERIC_BASE_SHIFT) & NUMERIC_BASE_MASK;
                ty.base_type = BaseType::from_numeric_bits(base).ok_or_else(|| {
                    EffectError::malformed(format!(
                        "type at {offset:#x} has unknown numeric base type {base}"
                    ))
                })?;
                ty.rows = (info >> NUMERIC_ROWS_SHIFT) & NUMERIC_DIM_MASK;
                ty.columns = (info >> NUMERIC_COLUMNS_SHIFT) & NUMERIC_DIM_MASK;
                if !(1..=4).contains(&ty.rows) || !(1..=4).contains(&ty.columns) {
                    return Err(EffectError::malformed(format!(
                        "type at {offset:#x} has a {}x{} shape",
                        ty.rows, ty.columns
                    )));
                }
            }
            TYPE_KIND_OBJECT => {
                let raw = body.u32_at(info_offset, "object type")?;
                let (base, stream_output) = BaseType::from_object_enum(raw).ok_or_else(|| {
                    EffectError::malformed(format!(
                        "type at {offset:#x} has unknown object type {raw}"
                    ))
                })?;
                ty.base_type = base;
                ty.stream_output = stream_output;
            }
            TYPE_KIND_STRUCT => {
                ty.class = TypeClass::Struct;
                ty.base_type = BaseType::Void;
                let member_count = body.u32_at(info_offset, "struct member count")?;
                let members_offset = info_offset + 4;
                body.require(members_offset, member_count, 16, "struct members")?;
                ty.members.reserve(member_count as usize);
                for i in 0..member_count {
                    let [name, semantic, member_offset, member_type] = word_array::<4>(
                        &body.words_at(members_offset + i * 16, 4, "struct member")?,
                    );
                    let member_ty = self.get_or_create_at(body, member_type, depth + 1)?;
                    ty.members.push(StructMember {
                        name: body.owned_string_at(name, "member name")?,
                        semantic: body.owned_string_at(semantic, "member semantic")?,
                        offset: member_offset,
                        ty: member_ty,
                    });
                }
            }
            kind => return Err(EffectError::UnknownTypeKind { kind, offset }),
        }

        if ty.element_count > MAX_ARRAY_ELEMENTS {
            return Err(EffectError::malformed(format!(
                "type at {offset:#x} declares {} array elements",
                ty.element_count
            )));
        }
        if ty.element_count > 0 {
            let mut element = ty.clone();
            element.element_count = 0;
            element.size_unpacked /= ty.element_count;
            element.size_packed /= ty.element_count;
            ty.element_type = Some(self.insert(element));
        }

        tracing::trace!(
            offset,
            name = ty.name.as_deref().unwrap_or(""),
            class = ?ty.class,
            base = ?ty.base_type,
            elements = ty.element_count,
            "decoded effect type"
        );
        let id = self.insert(ty);
        self.by_offset.insert(offset, id);
        Ok(id)
    }

    /// Structural comparison of a type here against a type in another registry.
    ///
    /// Only used to check shared symbols against the pool's declarations.
    pub(crate) fn types_match(&self, a: TypeId, other: &TypeRegistry, b: TypeId) -> bool {
        let (x, y) = (self.get(a), other.get(b));
        x.name == y.name
            && x.class == y.class
            && x.base_type == y.base_type
            && x.element_count == y.element_count
            && x.size_unpacked == y.size_unpacked
            && x.size_packed == y.size_packed
            && x.stride == y.stride
            && x.rows == y.rows
            && x.columns == y.columns
            && x.stream_output == y.stream_output
            && x.members.len() == y.members.len()
            && x.members.iter().zip(&y.members).all(|(m, n)| {
                m.name == n.name
                    && m.semantic == n.semantic
                    && m.offset == n.offset
                    && self.types_match(m.ty, other, n.ty)
            })
    }
}

fn word_array<const N: usize>(words: &[u32]) -> [u32; N] {
    let mut out = [0u32; N];
    out.copy_from_slice(&words[..N]);
    out
}

/// A type handle; invalid handles come from failed lookups.
#[derive(Clone, Copy)]
pub struct EffectTypeRef<'a> {
    inner: Option<(&'a TypeRegistry, TypeId)>,
}

impl core::fmt::Debug for EffectTypeRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.get() {
            Some(ty) => f
                .debug_struct("EffectTypeRef")
                .field("name", &ty.name)
                .field("class", &ty.class)
                .field("base_type", &ty.base_type)
                .finish(),
            None => f.write_str("EffectTypeRef(invalid)"),
        }
    }
}

impl<'a> EffectTypeRef<'a> {
    pub(crate) fn new(registry: &'a TypeRegistry, id: TypeId) -> Self {
        Self {
            inner: Some((registry, id)),
        }
    }

    pub(crate) fn invalid() -> Self {
        Self { inner: None }
    }

    fn get(&self) -> Option<&'a EffectType> {
        self.inner.map(|(registry, id)| registry.get(id))
    }

    /// `false` for the sentinel returned by failed lookups.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Describes the type.
    pub fn desc(&self) -> Result<EffectTypeDesc, EffectError> {
        self.get()
            .map(EffectType::desc)
            .ok_or(EffectError::InvalidUsage("desc on an invalid type"))
    }

    fn member(&self, index: usize) -> Option<(&'a TypeRegistry, &'a StructMember)> {
        let (registry, id) = self.inner?;
        registry.get(id).members.get(index).map(|m| (registry, m))
    }

    /// Type of the member at `index`.
    pub fn member_type_by_index(&self, index: u32) -> EffectTypeRef<'a> {
        self.member(index as usize)
            .map_or_else(Self::invalid, |(registry, m)| Self::new(registry, m.ty))
    }

    /// Type of the member called `name`.
    pub fn member_type_by_name(&self, name: &str) -> EffectTypeRef<'a> {
        self.find_member(|m| m.name.as_deref() == Some(name))
    }

    /// Type of the member whose semantic matches `semantic`, ignoring case.
    pub fn member_type_by_semantic(&self, semantic: &str) -> EffectTypeRef<'a> {
        self.find_member(|m| {
            m.semantic
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(semantic))
        })
    }

    fn find_member(&self, pred: impl Fn(&StructMember) -> bool) -> EffectTypeRef<'a> {
        let Some((registry, id)) = self.inner else {
            return Self::invalid();
        };
        registry
            .get(id)
            .members
            .iter()
            .find(|m| pred(m))
            .map_or_else(Self::invalid, |m| Self::new(registry, m.ty))
    }

    /// Name of the member at `index`.
    pub fn member_name(&self, index: u32) -> Option<&'a str> {
        self.member(index as usize)?.1.name.as_deref()
    }

    /// Semantic of the member at `index`.
    pub fn member_semantic(&self, index: u32) -> Option<&'a str> {
        self.member(index as usize)?.1.semantic.as_deref()
    }
}
