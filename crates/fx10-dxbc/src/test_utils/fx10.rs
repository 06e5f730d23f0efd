//! Builder for synthetic `fx_4_0` effect chunks.
//!
//! The layout matches what the effect runtime reads: a 19-word header, an
//! unstructured data region holding strings, types, values and shader blobs,
//! and a structured index region holding buffer, object, technique and pass
//! records in declaration order. Offsets written by the builder are relative
//! to the start of the unstructured region.

use std::collections::HashMap;

use super::push_u32;
use crate::FourCC;

/// `fx_4_0` version word.
pub const FX_4_0: u32 = 0xfeff_1001;
/// `fx_4_1` version word.
pub const FX_4_1: u32 = 0xfeff_1011;
/// Number of words in the effect header.
pub const HEADER_WORDS: usize = 19;

/// Object type enumerants used in type records.
pub mod object_type {
    #![allow(missing_docs)]
    pub const STRING: u32 = 1;
    pub const BLEND: u32 = 2;
    pub const DEPTH_STENCIL: u32 = 3;
    pub const RASTERIZER: u32 = 4;
    pub const PIXEL_SHADER: u32 = 5;
    pub const VERTEX_SHADER: u32 = 6;
    pub const GEOMETRY_SHADER: u32 = 7;
    pub const GEOMETRY_SHADER_SO: u32 = 8;
    pub const TEXTURE: u32 = 9;
    pub const TEXTURE1D: u32 = 10;
    pub const TEXTURE1DARRAY: u32 = 11;
    pub const TEXTURE2D: u32 = 12;
    pub const TEXTURE2DARRAY: u32 = 13;
    pub const TEXTURE2DMS: u32 = 14;
    pub const TEXTURE2DMSARRAY: u32 = 15;
    pub const TEXTURE3D: u32 = 16;
    pub const TEXTURECUBE: u32 = 17;
    pub const RENDER_TARGET_VIEW: u32 = 19;
    pub const DEPTH_STENCIL_VIEW: u32 = 20;
    pub const SAMPLER: u32 = 21;
    pub const BUFFER: u32 = 22;
    pub const TEXTURECUBEARRAY: u32 = 23;
}

/// Assignment operation discriminants.
pub mod op {
    #![allow(missing_docs)]
    pub const CONSTANT: u32 = 1;
    pub const VARIABLE: u32 = 2;
    pub const CONSTANT_INDEX: u32 = 3;
    pub const VARIABLE_INDEX: u32 = 4;
    pub const EXPRESSION: u32 = 5;
    pub const INDEX_EXPRESSION: u32 = 6;
    pub const ANONYMOUS_SHADER: u32 = 7;
}

/// Value type tags used in constant value lists.
pub mod value_type {
    #![allow(missing_docs)]
    pub const FLOAT: u32 = 1;
    pub const INT: u32 = 2;
    pub const UINT: u32 = 3;
    pub const BOOL: u32 = 4;
}

/// Numeric type class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NumericClass {
    Scalar,
    Vector,
    Matrix,
}

/// Numeric base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NumericBase {
    Float,
    Int,
    Uint,
    Bool,
}

/// A type record written by the builder, with the sizes the builder derived for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRef {
    /// Offset of the type record.
    pub offset: u32,
    /// Unpacked (constant buffer) size.
    pub unpacked: u32,
    /// Packed size.
    pub packed: u32,
    /// Per-element pitch.
    pub stride: u32,
    /// Array element count, `0` when not an array.
    pub elements: u32,
    /// Whether this is a struct type.
    pub is_struct: bool,
    /// Object enumerant for object types.
    pub object: Option<u32>,
}

/// An annotation record.
#[derive(Debug, Clone)]
pub struct Annotation {
    name: u32,
    ty: u32,
    values: Vec<u32>,
}

/// A state or pass assignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    /// Property id.
    pub id: u32,
    /// Property index.
    pub index: u32,
    /// Operation discriminant, see [`op`].
    pub op: u32,
    /// Operand offset.
    pub value_offset: u32,
}

/// A numeric member of a constant or texture buffer.
#[derive(Debug, Clone)]
pub struct NumericMember {
    name: String,
    ty: TypeRef,
    semantic: Option<String>,
    packoffset: Option<u32>,
    recorded_offset: Option<u32>,
    defaults: Option<Vec<u32>>,
    annotations: Vec<Annotation>,
}

impl NumericMember {
    /// A member packed after the previous one.
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            semantic: None,
            packoffset: None,
            recorded_offset: None,
            defaults: None,
            annotations: Vec::new(),
        }
    }

    /// Sets the member semantic.
    pub fn semantic(mut self, semantic: &str) -> Self {
        self.semantic = Some(semantic.to_owned());
        self
    }

    /// Places the member at an explicit byte offset and flags it accordingly.
    pub fn packoffset(mut self, offset: u32) -> Self {
        self.packoffset = Some(offset);
        self
    }

    /// Writes `offset` into the record in place of the packed one, without the explicit flag.
    pub fn recorded_offset(mut self, offset: u32) -> Self {
        self.recorded_offset = Some(offset);
        self
    }

    /// Attaches packed default value words.
    pub fn default_value(mut self, words: &[u32]) -> Self {
        self.defaults = Some(words.to_vec());
        self
    }

    /// Adds an annotation.
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A local or shared buffer record.
#[derive(Debug, Clone)]
pub struct BufferRecord {
    name: String,
    tbuffer: bool,
    bind_point: u32,
    size: Option<u32>,
    members: Vec<NumericMember>,
    annotations: Vec<Annotation>,
}

impl BufferRecord {
    /// A `cbuffer` record.
    pub fn cbuffer(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            tbuffer: false,
            bind_point: u32::MAX,
            size: None,
            members: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// A `tbuffer` record.
    pub fn tbuffer(name: &str) -> Self {
        Self {
            tbuffer: true,
            ..Self::cbuffer(name)
        }
    }

    /// Adds a member.
    pub fn member(mut self, member: NumericMember) -> Self {
        self.members.push(member);
        self
    }

    /// Overrides the size computed from the members.
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the register the buffer is bound to.
    pub fn bind_point(mut self, bind_point: u32) -> Self {
        self.bind_point = bind_point;
        self
    }

    /// Adds an annotation.
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Per-element initializer of an object variable.
#[derive(Debug, Clone)]
pub enum ObjectInit {
    /// Textures, views, buffers.
    None,
    /// One string per element.
    Strings(Vec<String>),
    /// One shader blob offset per element, with an optional stream-output declaration offset.
    Shaders(Vec<(u32, Option<u32>)>),
    /// One assignment list per element.
    States(Vec<Vec<Assignment>>),
}

/// A local object variable record.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    name: String,
    ty: TypeRef,
    semantic: Option<String>,
    bind_point: u32,
    init: ObjectInit,
    annotations: Vec<Annotation>,
}

impl ObjectRecord {
    /// An object variable without initializers.
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_owned(),
            ty,
            semantic: None,
            bind_point: u32::MAX,
            init: ObjectInit::None,
            annotations: Vec::new(),
        }
    }

    /// Sets the semantic.
    pub fn semantic(mut self, semantic: &str) -> Self {
        self.semantic = Some(semantic.to_owned());
        self
    }

    /// Sets the bind point word.
    pub fn bind_point(mut self, bind_point: u32) -> Self {
        self.bind_point = bind_point;
        self
    }

    /// Sets the initializer.
    pub fn init(mut self, init: ObjectInit) -> Self {
        self.init = init;
        self
    }

    /// Adds an annotation.
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A pass record.
#[derive(Debug, Clone)]
pub struct PassRecord {
    name: Option<String>,
    assignments: Vec<Assignment>,
    annotations: Vec<Annotation>,
}

impl PassRecord {
    /// A pass with no assignments.
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            assignments: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Adds an assignment.
    pub fn assign(mut self, assignment: Assignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Adds an annotation.
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A technique record.
#[derive(Debug, Clone)]
pub struct TechniqueRecord {
    name: Option<String>,
    passes: Vec<PassRecord>,
    annotations: Vec<Annotation>,
}

impl TechniqueRecord {
    /// A technique with no passes.
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            passes: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Adds a pass.
    pub fn pass(mut self, pass: PassRecord) -> Self {
        self.passes.push(pass);
        self
    }

    /// Adds an annotation.
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    local_buffers: u32,
    variables: u32,
    local_objects: u32,
    shared_buffers: u32,
    shared_variables: u32,
    shared_objects: u32,
    techniques: u32,
    strings: u32,
    textures: u32,
    depth_stencil_states: u32,
    blend_states: u32,
    rasterizer_states: u32,
    sampler_states: u32,
    render_target_views: u32,
    depth_stencil_views: u32,
    used_shaders: u32,
    anonymous_shaders: u32,
}

/// Incrementally writes an `FX10` chunk.
///
/// Records must be added in the order the runtime reads them: local buffers,
/// local objects, shared buffers, shared objects, then techniques.
#[derive(Debug)]
pub struct Fx10Builder {
    version: u32,
    data: Vec<u8>,
    index: Vec<u8>,
    strings: HashMap<String, u32>,
    counts: Counts,
    anonymous_override: Option<u32>,
}

impl Default for Fx10Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Fx10Builder {
    /// An empty `fx_4_0` effect.
    pub fn new() -> Self {
        Self {
            version: FX_4_0,
            // Offset zero is reserved for "none".
            data: vec![0; 4],
            index: Vec::new(),
            strings: HashMap::new(),
            counts: Counts::default(),
            anonymous_override: None,
        }
    }

    /// Overrides the header version word.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Overrides the declared anonymous shader count.
    pub fn set_anonymous_shader_count(&mut self, count: u32) {
        self.anonymous_override = Some(count);
    }

    fn data_offset(&self) -> u32 {
        self.data.len() as u32
    }

    /// Writes a NUL-terminated string (deduplicated) and returns its offset.
    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.strings.get(s) {
            return offset;
        }
        let offset = self.data_offset();
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.strings.insert(s.to_owned(), offset);
        offset
    }

    fn opt_string(&mut self, s: Option<&str>) -> u32 {
        s.map_or(0, |s| self.string(s))
    }

    /// Writes raw words and returns their offset.
    pub fn words(&mut self, words: &[u32]) -> u32 {
        let offset = self.data_offset();
        for &w in words {
            push_u32(&mut self.data, w);
        }
        offset
    }

    /// Writes a scalar, vector or matrix type record.
    pub fn numeric_type(
        &mut self,
        name: &str,
        class: NumericClass,
        base: NumericBase,
        rows: u32,
        columns: u32,
        elements: u32,
        column_major: bool,
    ) -> TypeRef {
        let (majors, minors) = if class == NumericClass::Matrix && column_major {
            (columns, rows)
        } else {
            (rows, columns)
        };
        let elem_unpacked = (majors - 1) * 16 + minors * 4;
        let elem_packed = rows * columns * 4;
        let stride = align16(elem_unpacked);
        let (unpacked, packed) = if elements > 0 {
            ((elements - 1) * stride + elem_unpacked, elements * elem_packed)
        } else {
            (elem_unpacked, elem_packed)
        };

        let class_bits = match class {
            NumericClass::Scalar => 1,
            NumericClass::Vector => 2,
            NumericClass::Matrix => 3,
        };
        let base_bits = match base {
            NumericBase::Float => 1,
            NumericBase::Int => 2,
            NumericBase::Uint => 3,
            NumericBase::Bool => 4,
        };
        let mut info = class_bits | (base_bits << 3) | (rows << 8) | (columns << 11);
        if column_major {
            info |= 0x4000;
        }

        let name = self.string(name);
        let offset = self.words(&[name, 1, elements, unpacked, stride, packed, info]);
        TypeRef {
            offset,
            unpacked,
            packed,
            stride,
            elements,
            is_struct: false,
            object: None,
        }
    }

    /// `float` scalar.
    pub fn float_type(&mut self) -> TypeRef {
        self.numeric_type("float", NumericClass::Scalar, NumericBase::Float, 1, 1, 0, false)
    }

    /// `floatN` vector.
    pub fn float_vector_type(&mut self, columns: u32) -> TypeRef {
        let name = format!("float{columns}");
        self.numeric_type(&name, NumericClass::Vector, NumericBase::Float, 1, columns, 0, false)
    }

    /// Writes an object type record.
    pub fn object_type(&mut self, name: &str, object: u32, elements: u32) -> TypeRef {
        let name = self.string(name);
        let offset = self.words(&[name, 2, elements, 0, 0, 0, object]);
        TypeRef {
            offset,
            unpacked: 0,
            packed: 0,
            stride: 0,
            elements,
            is_struct: false,
            object: Some(object),
        }
    }

    /// Writes a struct type record, laying out the fields with constant buffer packing.
    pub fn struct_type(&mut self, name: &str, fields: &[(&str, TypeRef)], elements: u32) -> TypeRef {
        let mut running = 0u32;
        let mut packed = 0u32;
        let mut placed = Vec::with_capacity(fields.len());
        for (field_name, ty) in fields {
            let offset = pack_next(&mut running, ty);
            packed += ty.packed;
            placed.push((self.string(field_name), offset, ty.offset));
        }
        let stride = align16(running);
        let (unpacked, packed) = if elements > 0 {
            ((elements - 1) * stride + running, elements * packed)
        } else {
            (running, packed)
        };

        let name = self.string(name);
        let offset = self.words(&[name, 3, elements, unpacked, stride, packed, fields.len() as u32]);
        for (name, member_offset, ty) in placed {
            self.words(&[name, 0, member_offset, ty]);
        }
        TypeRef {
            offset,
            unpacked,
            packed,
            stride,
            elements,
            is_struct: true,
            object: None,
        }
    }

    /// Writes a shader blob (`size` + bytes) and returns its offset.
    pub fn shader(&mut self, bytecode: &[u8]) -> u32 {
        let offset = self.data_offset();
        push_u32(&mut self.data, bytecode.len() as u32);
        self.data.extend_from_slice(bytecode);
        offset
    }

    /// Writes a constant value list: a count followed by `(type, word)` pairs.
    pub fn constant_values(&mut self, values: &[(u32, u32)]) -> u32 {
        let offset = self.words(&[values.len() as u32]);
        for &(ty, word) in values {
            self.words(&[ty, word]);
        }
        offset
    }

    /// A constant assignment.
    pub fn assign_constant(&mut self, id: u32, index: u32, values: &[(u32, u32)]) -> Assignment {
        let value_offset = self.constant_values(values);
        Assignment {
            id,
            index,
            op: op::CONSTANT,
            value_offset,
        }
    }

    /// A named-variable assignment.
    pub fn assign_variable(&mut self, id: u32, index: u32, name: &str) -> Assignment {
        let value_offset = self.string(name);
        Assignment {
            id,
            index,
            op: op::VARIABLE,
            value_offset,
        }
    }

    /// A constant-index assignment (`name[element]`).
    pub fn assign_constant_index(&mut self, id: u32, index: u32, name: &str, element: u32) -> Assignment {
        let name = self.string(name);
        let value_offset = self.words(&[name, element]);
        Assignment {
            id,
            index,
            op: op::CONSTANT_INDEX,
            value_offset,
        }
    }

    /// An inline shader assignment. `None` bytecode writes the null shader.
    pub fn assign_anonymous_shader(
        &mut self,
        id: u32,
        bytecode: Option<&[u8]>,
        stream_output: Option<&str>,
    ) -> Assignment {
        let shader = bytecode.map_or(0, |code| self.shader(code));
        let decl = self.opt_string(stream_output);
        let value_offset = self.words(&[shader, decl]);
        self.counts.anonymous_shaders += 1;
        self.counts.used_shaders += 1;
        Assignment {
            id,
            index: 0,
            op: op::ANONYMOUS_SHADER,
            value_offset,
        }
    }

    /// A numeric annotation holding packed value words.
    pub fn annotation_numeric(&mut self, name: &str, ty: TypeRef, words: &[u32]) -> Annotation {
        let name = self.string(name);
        let value = self.words(words);
        Annotation {
            name,
            ty: ty.offset,
            values: vec![value],
        }
    }

    /// A string annotation; more than one value makes a string array.
    pub fn annotation_string(&mut self, name: &str, values: &[&str]) -> Annotation {
        let elements = if values.len() > 1 { values.len() as u32 } else { 0 };
        let ty = self.object_type("String", object_type::STRING, elements);
        let name = self.string(name);
        let values = values.iter().map(|v| self.string(v)).collect();
        Annotation {
            name,
            ty: ty.offset,
            values,
        }
    }

    fn write_annotations(&mut self, annotations: &[Annotation]) {
        push_u32(&mut self.index, annotations.len() as u32);
        for a in annotations {
            push_u32(&mut self.index, a.name);
            push_u32(&mut self.index, a.ty);
            for &v in &a.values {
                push_u32(&mut self.index, v);
            }
        }
    }

    fn write_assignments(&mut self, assignments: &[Assignment]) {
        for a in assignments {
            for w in [a.id, a.index, a.op, a.value_offset] {
                push_u32(&mut self.index, w);
            }
        }
    }

    fn write_buffer(&mut self, buffer: BufferRecord, local: bool) {
        let mut running = 0u32;
        let mut members = Vec::with_capacity(buffer.members.len());
        for member in &buffer.members {
            let (offset, flags) = match member.packoffset {
                Some(offset) => {
                    running = running.max(offset + member.ty.unpacked);
                    (offset, 0x4)
                }
                None => (pack_next(&mut running, &member.ty), 0),
            };
            let offset = member.recorded_offset.unwrap_or(offset);
            members.push((offset, flags));
        }
        let size = buffer.size.unwrap_or_else(|| align16(running));

        let name = self.string(&buffer.name);
        for w in [
            name,
            size,
            buffer.tbuffer as u32,
            buffer.members.len() as u32,
            buffer.bind_point,
        ] {
            push_u32(&mut self.index, w);
        }
        if local {
            self.write_annotations(&buffer.annotations);
        }

        for (member, (offset, flags)) in buffer.members.iter().zip(members) {
            let name = self.string(&member.name);
            let semantic = self.opt_string(member.semantic.as_deref());
            let defaults = match &member.defaults {
                Some(words) => self.words(words),
                None => 0,
            };
            for w in [name, member.ty.offset, semantic, offset, defaults, flags] {
                push_u32(&mut self.index, w);
            }
            if local {
                self.write_annotations(&member.annotations);
                self.counts.variables += 1;
            } else {
                self.counts.shared_variables += 1;
            }
        }
    }

    /// Appends a local buffer.
    pub fn buffer(&mut self, buffer: BufferRecord) -> &mut Self {
        self.write_buffer(buffer, true);
        self.counts.local_buffers += 1;
        self
    }

    /// Appends a shared buffer, which must also be declared by the pool.
    pub fn shared_buffer(&mut self, buffer: BufferRecord) -> &mut Self {
        self.write_buffer(buffer, false);
        self.counts.shared_buffers += 1;
        self
    }

    /// Appends a local object variable.
    pub fn object(&mut self, object: ObjectRecord) -> &mut Self {
        let name = self.string(&object.name);
        let semantic = self.opt_string(object.semantic.as_deref());
        for w in [name, object.ty.offset, semantic, object.bind_point] {
            push_u32(&mut self.index, w);
        }

        let elements = object.ty.elements.max(1);
        match object.init {
            ObjectInit::None => {}
            ObjectInit::Strings(values) => {
                for value in values {
                    let offset = self.string(&value);
                    push_u32(&mut self.index, offset);
                }
            }
            ObjectInit::Shaders(shaders) => {
                for (shader, decl) in shaders {
                    push_u32(&mut self.index, shader);
                    if object.ty.object == Some(object_type::GEOMETRY_SHADER_SO) {
                        push_u32(&mut self.index, decl.unwrap_or(0));
                    }
                }
                self.counts.used_shaders += elements;
            }
            ObjectInit::States(states) => {
                for assignments in states {
                    push_u32(&mut self.index, assignments.len() as u32);
                    self.write_assignments(&assignments);
                }
            }
        }
        self.write_annotations(&object.annotations);

        match object.ty.object {
            Some(object_type::STRING) => self.counts.strings += elements,
            Some(object_type::BLEND) => self.counts.blend_states += elements,
            Some(object_type::DEPTH_STENCIL) => self.counts.depth_stencil_states += elements,
            Some(object_type::RASTERIZER) => self.counts.rasterizer_states += elements,
            Some(object_type::SAMPLER) => self.counts.sampler_states += elements,
            Some(object_type::RENDER_TARGET_VIEW) => self.counts.render_target_views += elements,
            Some(object_type::DEPTH_STENCIL_VIEW) => self.counts.depth_stencil_views += elements,
            Some(object_type::TEXTURE..=object_type::TEXTURECUBE)
            | Some(object_type::BUFFER)
            | Some(object_type::TEXTURECUBEARRAY) => self.counts.textures += elements,
            _ => {}
        }
        self.counts.local_objects += 1;
        self.counts.variables += 1;
        self
    }

    /// Appends a shared object, which must also be declared by the pool.
    pub fn shared_object(&mut self, name: &str, ty: TypeRef) -> &mut Self {
        let name = self.string(name);
        for w in [name, ty.offset, 0, u32::MAX] {
            push_u32(&mut self.index, w);
        }
        self.counts.shared_objects += 1;
        self.counts.shared_variables += 1;
        self
    }

    /// Appends a technique and its passes.
    pub fn technique(&mut self, technique: TechniqueRecord) -> &mut Self {
        let name = self.opt_string(technique.name.as_deref());
        push_u32(&mut self.index, name);
        push_u32(&mut self.index, technique.passes.len() as u32);
        self.write_annotations(&technique.annotations);
        for pass in &technique.passes {
            let name = self.opt_string(pass.name.as_deref());
            push_u32(&mut self.index, name);
            push_u32(&mut self.index, pass.assignments.len() as u32);
            self.write_annotations(&pass.annotations);
            self.write_assignments(&pass.assignments);
        }
        self.counts.techniques += 1;
        self
    }

    /// Returns the `FX10` chunk payload: header, unstructured data, index region.
    pub fn finish_payload(&self) -> Vec<u8> {
        let c = &self.counts;
        let mut out = Vec::with_capacity(HEADER_WORDS * 4 + self.data.len() + self.index.len());
        for w in [
            self.version,
            c.local_buffers,
            c.variables,
            c.local_objects,
            c.shared_buffers,
            c.shared_variables,
            c.shared_objects,
            c.techniques,
            self.data.len() as u32,
            c.strings,
            c.textures,
            c.depth_stencil_states,
            c.blend_states,
            c.rasterizer_states,
            c.sampler_states,
            c.render_target_views,
            c.depth_stencil_views,
            c.used_shaders,
            self.anonymous_override.unwrap_or(c.anonymous_shaders),
        ] {
            push_u32(&mut out, w);
        }
        out.extend_from_slice(&self.data);
        out.extend_from_slice(&self.index);
        out
    }

    /// Returns a complete `DXBC` container holding the effect.
    pub fn finish(&self) -> Vec<u8> {
        let payload = self.finish_payload();
        super::build_container(&[(FourCC::FX10, &payload[..])])
    }
}

fn align16(v: u32) -> u32 {
    (v + 15) & !15
}

fn pack_next(running: &mut u32, ty: &TypeRef) -> u32 {
    if ty.is_struct {
        *running = align16(*running);
    }
    if (*running & 0xf) + ty.unpacked > 16 {
        *running = align16(*running);
    }
    let offset = *running;
    *running += ty.unpacked;
    offset
}
