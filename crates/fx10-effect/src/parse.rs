//! FX10 parser.
//!
//! The `FX10` chunk is a fixed header, an unstructured data region addressed by
//! offset, and a structured index region read front to back: local buffers,
//! local objects, shared buffers, shared objects, techniques. Device objects are
//! created as their records are read; if parsing fails, everything created so
//! far is released when the partial result is dropped.

use std::sync::Arc;

use fx10_dxbc::{DxbcFile, FourCC, ShaderInputType};

use crate::convert::{convert_word, NumericType};
use crate::device::{
    BufferBinding, BufferDesc, BufferHandle, BufferViewDesc, Device, DeviceObject, OwnedObjects,
    ShaderHandle, ShaderResourceViewHandle, ShaderStage,
};
use crate::effect::EffectInner;
use crate::error::EffectError;
use crate::graph::{
    BufferKind, BufferNode, BufferState, EffectGraph, EffectState, ObjectRef, PassState, StateObject,
};
use crate::layout::{unpack_values, ConstantBufferPacker};
use crate::property::{property_info, PropertyType, SamplerBlock, StateBlock};
use crate::reader::{Body, Cursor};
use crate::shader::{
    extract_input_signature, ResourceBinding, ResourceTarget, ShaderPayload, ShaderReflector,
};
use crate::state::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc, StateKind};
use crate::stream_output::parse_stream_output_declaration;
use crate::technique::{PassNode, TechniqueNode};
use crate::types::{BaseType, EffectType, StructMember, TypeClass, TypeId};
use crate::variable::{
    Owner, Payload, Storage, VarLoc, VariableFlags, VariableId, VariableKind, VariableNode,
};

/// `fx_4_0`.
pub const FX10_VERSION_4_0: u32 = 0xfeff_1001;
/// `fx_4_1`.
pub const FX10_VERSION_4_1: u32 = 0xfeff_1011;

const HEADER_SIZE: usize = 19 * 4;

const OP_CONSTANT: u32 = 1;
const OP_VARIABLE: u32 = 2;
const OP_CONSTANT_INDEX: u32 = 3;
const OP_VARIABLE_INDEX: u32 = 4;
const OP_EXPRESSION: u32 = 5;
const OP_INDEX_EXPRESSION: u32 = 6;
const OP_ANONYMOUS_SHADER: u32 = 7;

const BUFFER_KIND_CONSTANT: u32 = 0;
const BUFFER_KIND_TEXTURE: u32 = 1;

const NO_BIND_POINT: u32 = u32::MAX;

/// Upper bound on a buffer's declared size; the CPU copy is allocated up front.
const MAX_BUFFER_SIZE: u32 = 1 << 24;

/// Upper bound on variables (elements and members included) in one effect.
const MAX_VARIABLES: usize = 1 << 20;

/// The fixed-size header at the start of an `FX10` chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Fx10Header {
    pub version: u32,
    pub local_buffers: u32,
    pub local_variables: u32,
    pub local_objects: u32,
    pub shared_buffers: u32,
    pub shared_variables: u32,
    pub shared_objects: u32,
    pub techniques: u32,
    /// Size of the unstructured data region; the index region starts here.
    pub index_offset: u32,
    pub strings: u32,
    pub textures: u32,
    pub depth_stencil_states: u32,
    pub blend_states: u32,
    pub rasterizer_states: u32,
    pub samplers: u32,
    pub render_target_views: u32,
    pub depth_stencil_views: u32,
    pub used_shaders: u32,
    pub anonymous_shaders: u32,
}

impl Fx10Header {
    /// Reads and version-checks the header at the start of `payload`.
    pub fn parse(payload: &[u8]) -> Result<Self, EffectError> {
        if payload.len() < HEADER_SIZE {
            return Err(EffectError::malformed(format!(
                "FX10 payload is {} bytes, shorter than its {HEADER_SIZE}-byte header",
                payload.len()
            )));
        }
        let mut cursor = Body::new(&payload[..HEADER_SIZE]).cursor(0)?;
        let w = cursor.read_words::<19>("FX10 header")?;
        let header = Self {
            version: w[0],
            local_buffers: w[1],
            local_variables: w[2],
            local_objects: w[3],
            shared_buffers: w[4],
            shared_variables: w[5],
            shared_objects: w[6],
            techniques: w[7],
            index_offset: w[8],
            strings: w[9],
            textures: w[10],
            depth_stencil_states: w[11],
            blend_states: w[12],
            rasterizer_states: w[13],
            samplers: w[14],
            render_target_views: w[15],
            depth_stencil_views: w[16],
            used_shaders: w[17],
            anonymous_shaders: w[18],
        };
        match header.version {
            FX10_VERSION_4_0 | FX10_VERSION_4_1 => Ok(header),
            other => Err(EffectError::UnsupportedVersion(other)),
        }
    }
}

/// Returns the `FX10` chunk of a `DXBC` container.
pub(crate) fn effect_chunk(data: &[u8]) -> Result<&[u8], EffectError> {
    let file = DxbcFile::parse(data)?;
    file.get_chunk(FourCC::FX10)
        .map(|chunk| chunk.data)
        .ok_or(EffectError::MissingEffectChunk)
}

/// Everything the parser produces.
pub(crate) struct ParsedEffect {
    pub(crate) graph: EffectGraph,
    pub(crate) state: EffectState,
    pub(crate) objects: OwnedObjects,
}

pub(crate) fn parse_effect(
    data: &[u8],
    device: Arc<dyn Device>,
    pool: Option<&EffectInner>,
    is_pool: bool,
    reflector: &dyn ShaderReflector,
) -> Result<ParsedEffect, EffectError> {
    let payload = effect_chunk(data)?;
    let header = Fx10Header::parse(payload)?;
    tracing::debug!(
        version = format_args!("{:#010x}", header.version),
        local_buffers = header.local_buffers,
        local_objects = header.local_objects,
        shared_buffers = header.shared_buffers,
        shared_objects = header.shared_objects,
        techniques = header.techniques,
        "parsing effect"
    );

    if pool.is_none() && (header.shared_buffers > 0 || header.shared_objects > 0) {
        return Err(EffectError::MissingPool {
            buffers: header.shared_buffers,
            objects: header.shared_objects,
        });
    }

    let mut parser = Parser {
        body: Body::new(&payload[HEADER_SIZE..]),
        header,
        pool,
        pooled: if is_pool {
            VariableFlags::POOLED
        } else {
            VariableFlags::empty()
        },
        reflector,
        graph: EffectGraph::default(),
        state: EffectState::default(),
        objects: OwnedObjects::new(device),
        anonymous_used: 0,
    };
    parser.run()?;

    Ok(ParsedEffect {
        graph: parser.graph,
        state: parser.state,
        objects: parser.objects,
    })
}

struct Parser<'a> {
    body: Body<'a>,
    header: Fx10Header,
    pool: Option<&'a EffectInner>,
    /// Extra flags for every variable this effect declares.
    pooled: VariableFlags,
    reflector: &'a dyn ShaderReflector,
    graph: EffectGraph,
    state: EffectState,
    objects: OwnedObjects,
    anonymous_used: u32,
}

/// A new variable before it is placed in the arena.
struct VariableSpec {
    name: Option<String>,
    semantic: Option<String>,
    ty: TypeId,
    flags: VariableFlags,
    explicit_bind_point: u32,
    parent_buffer: Option<usize>,
    storage: Storage,
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<(), EffectError> {
        let mut cur = self.body.cursor(self.header.index_offset)?;

        cur.require(self.header.local_buffers, 24, "local buffers")?;
        for _ in 0..self.header.local_buffers {
            self.parse_buffer(&mut cur, true)?;
        }

        cur.require(self.header.local_objects, 16, "local objects")?;
        for _ in 0..self.header.local_objects {
            self.parse_object(&mut cur)?;
        }

        cur.require(self.header.shared_buffers, 20, "shared buffers")?;
        for _ in 0..self.header.shared_buffers {
            self.parse_buffer(&mut cur, false)?;
        }

        cur.require(self.header.shared_objects, 16, "shared objects")?;
        for _ in 0..self.header.shared_objects {
            self.parse_shared_object(&mut cur)?;
        }

        cur.require(self.header.techniques, 12, "techniques")?;
        for _ in 0..self.header.techniques {
            let technique = self.parse_technique(&mut cur)?;
            self.graph.techniques.push(technique);
        }

        self.resolve_shader_resources()?;

        let globals = self.graph.global_count();
        if globals != self.header.local_variables as usize {
            tracing::warn!(
                declared = self.header.local_variables,
                found = globals,
                "effect header variable count does not match its records"
            );
        }
        if cur.remaining() != 0 {
            tracing::debug!(trailing = cur.remaining(), "bytes left after the index region");
        }
        Ok(())
    }

    fn string(&self, offset: u32, what: &str) -> Result<Option<String>, EffectError> {
        self.body.owned_string_at(offset, what)
    }

    /// Resolves a name the way shaders and assignments see it: local buffer
    /// members, local objects, then the pool.
    fn resolve_variable(&self, name: &str) -> Option<VarLoc> {
        if let Some(id) = self.graph.find_variable(name) {
            return Some(VarLoc {
                owner: Owner::Local,
                id,
            });
        }
        let pool = self.pool?;
        pool.graph.find_variable(name).map(|id| VarLoc {
            owner: Owner::Pool,
            id,
        })
    }

    fn resolve_buffer(&self, name: &str) -> Option<(Owner, usize)> {
        if let Some(index) = self.graph.find_buffer(name) {
            return Some((Owner::Local, index));
        }
        let pool = self.pool?;
        pool.graph.find_buffer(name).map(|index| (Owner::Pool, index))
    }

    /// Graph holding variables of `owner`.
    fn graph_of(&self, owner: Owner) -> &EffectGraph {
        match (owner, self.pool) {
            (Owner::Pool, Some(pool)) => &pool.graph,
            _ => &self.graph,
        }
    }

    /// Places a variable and, recursively, its elements or members.
    fn instantiate(&mut self, spec: VariableSpec) -> Result<VariableId, EffectError> {
        if self.graph.variables.len() >= MAX_VARIABLES {
            return Err(EffectError::malformed(format!(
                "effect declares more than {MAX_VARIABLES} variables"
            )));
        }
        let ty = self.graph.types.get(spec.ty).clone();
        let id = self.graph.push_variable(VariableNode {
            name: spec.name.clone(),
            semantic: spec.semantic.clone(),
            ty: spec.ty,
            kind: VariableKind::classify(&ty),
            flags: spec.flags,
            explicit_bind_point: spec.explicit_bind_point,
            parent_buffer: spec.parent_buffer,
            storage: spec.storage,
            payload: Payload::None,
            members: Vec::new(),
            elements: Vec::new(),
            annotations: Vec::new(),
        });

        if let Some(element_ty) = ty.element_type {
            let mut elements = Vec::with_capacity(ty.element_count as usize);
            for i in 0..ty.element_count {
                elements.push(self.instantiate(VariableSpec {
                    name: spec.name.clone(),
                    semantic: spec.semantic.clone(),
                    ty: element_ty,
                    storage: spec.storage.offset_by(i.saturating_mul(ty.stride)),
                    ..spec
                })?);
            }
            self.graph.node_mut(id).elements = elements;
        } else if ty.class == TypeClass::Struct {
            let mut members = Vec::with_capacity(ty.members.len());
            for member in &ty.members {
                members.push(self.instantiate(VariableSpec {
                    name: member.name.clone(),
                    semantic: member.semantic.clone(),
                    ty: member.ty,
                    storage: spec.storage.offset_by(member.offset),
                    ..spec
                })?);
            }
            self.graph.node_mut(id).members = members;
        }
        Ok(id)
    }

    /// The variable itself, or its elements when it is an array.
    fn element_ids(&self, id: VariableId) -> Vec<VariableId> {
        let node = self.graph.node(id);
        if node.elements.is_empty() {
            vec![id]
        } else {
            node.elements.clone()
        }
    }

    fn parse_annotations(&mut self, cur: &mut Cursor<'a>) -> Result<Vec<VariableId>, EffectError> {
        let count = cur.read_u32("annotation count")?;
        cur.require(count, 12, "annotations")?;
        let mut annotations = Vec::new();
        for _ in 0..count {
            let [name, type_offset] = cur.read_words::<2>("annotation")?;
            let name = self.string(name, "annotation name")?;
            let ty = self.graph.types.get_or_create(self.body, type_offset)?;
            let t = self.graph.types.get(ty).clone();

            let mut spec = VariableSpec {
                name,
                semantic: None,
                ty,
                flags: VariableFlags::ANNOTATION | self.pooled,
                explicit_bind_point: 0,
                parent_buffer: None,
                storage: Storage::None,
            };
            let id = match (t.class, t.base_type) {
                (TypeClass::Object, BaseType::String) => {
                    let elements = t.element_count.max(1);
                    cur.require(elements, 4, "annotation strings")?;
                    let id = self.instantiate(spec)?;
                    for element in self.element_ids(id) {
                        let value = cur.read_u32("annotation string")?;
                        let value = self.string(value, "annotation string")?;
                        self.graph.node_mut(element).payload = Payload::String(value);
                    }
                    id
                }
                (TypeClass::Object, base) => {
                    return Err(EffectError::malformed(format!(
                        "annotation of object type {base:?}"
                    )))
                }
                _ => {
                    let value_offset = cur.read_u32("annotation value")?;
                    let words = self
                        .body
                        .words_at(value_offset, t.size_packed / 4, "annotation value")?;
                    let mut store = vec![0u8; t.size_unpacked as usize];
                    unpack_values(&self.graph.types, ty, &words, &mut store, 0)?;
                    spec.storage = Storage::Inline {
                        store: self.graph.inline_stores.len(),
                        offset: 0,
                    };
                    self.graph.inline_stores.push(store);
                    self.instantiate(spec)?
                }
            };
            annotations.push(id);
        }
        Ok(annotations)
    }

    fn parse_buffer(&mut self, cur: &mut Cursor<'a>, local: bool) -> Result<(), EffectError> {
        let [name, declared_size, kind, member_count, bind_point] = cur.read_words::<5>("buffer")?;
        let name = self.string(name, "buffer name")?;
        let (kind, base) = match kind {
            BUFFER_KIND_CONSTANT => (BufferKind::Constant, BaseType::ConstantBuffer),
            BUFFER_KIND_TEXTURE => (BufferKind::Texture, BaseType::TextureBuffer),
            other => {
                return Err(EffectError::malformed(format!(
                    "buffer {name:?} has unknown kind {other}"
                )))
            }
        };
        let display_name = name.clone().unwrap_or_default();
        if declared_size > MAX_BUFFER_SIZE {
            return Err(EffectError::malformed(format!(
                "buffer {display_name:?} declares {declared_size} bytes, more than {MAX_BUFFER_SIZE}"
            )));
        }
        let mark = self.graph.variables.len();
        let buffer_index = self.graph.buffers.len();

        let type_name = if kind == BufferKind::Constant { "cbuffer" } else { "tbuffer" };
        let placeholder = self.graph.types.insert(EffectType::object(type_name, base));
        let mut flags = self.pooled;
        if bind_point != NO_BIND_POINT {
            flags |= VariableFlags::EXPLICIT_BIND_POINT;
        }
        let variable = self.instantiate(VariableSpec {
            name: name.clone(),
            semantic: None,
            ty: placeholder,
            flags,
            explicit_bind_point: bind_point,
            parent_buffer: None,
            storage: Storage::None,
        })?;
        if local {
            let annotations = self.parse_annotations(cur)?;
            self.graph.node_mut(variable).annotations = annotations;
        }

        let mut packer = ConstantBufferPacker::new();
        let mut defaults = Vec::new();
        let mut type_members = Vec::new();
        let mut members = Vec::new();
        cur.require(member_count, 24, "buffer members")?;
        for _ in 0..member_count {
            let [member_name, type_offset, semantic, buffer_offset, default_offset, member_flags] =
                cur.read_words::<6>("buffer member")?;
            let member_name = self.string(member_name, "member name")?;
            let semantic = self.string(semantic, "member semantic")?;
            let ty = self.graph.types.get_or_create(self.body, type_offset)?;
            let t = self.graph.types.get(ty).clone();
            if t.class == TypeClass::Object {
                return Err(EffectError::malformed(format!(
                    "buffer {display_name:?} member {member_name:?} has object type {:?}",
                    t.base_type
                )));
            }

            let member_flags = VariableFlags::from_bits_truncate(member_flags);
            let offset = if member_flags.contains(VariableFlags::EXPLICIT_BIND_POINT) {
                packer.push_explicit(t.size_unpacked, buffer_offset)
            } else {
                packer.push(t.size_unpacked, t.class == TypeClass::Struct)
            };
            if offset != buffer_offset {
                tracing::warn!(
                    buffer = %display_name,
                    member = ?member_name,
                    recorded = buffer_offset,
                    packed = offset,
                    "member offset differs from its packed position"
                );
            }

            let member = self.instantiate(VariableSpec {
                name: member_name.clone(),
                semantic: semantic.clone(),
                ty,
                flags: member_flags | self.pooled,
                explicit_bind_point: offset,
                parent_buffer: local.then_some(buffer_index),
                storage: if local {
                    Storage::Buffer {
                        buffer: buffer_index,
                        offset,
                    }
                } else {
                    Storage::None
                },
            })?;
            if local {
                let annotations = self.parse_annotations(cur)?;
                self.graph.node_mut(member).annotations = annotations;
                if default_offset != 0 {
                    defaults.push((ty, default_offset, offset));
                }
            }
            type_members.push(StructMember {
                name: member_name,
                semantic,
                offset,
                ty,
            });
            members.push(member);
        }

        let size = packer.finish();
        if size > MAX_BUFFER_SIZE {
            return Err(EffectError::malformed(format!(
                "buffer {display_name:?} packs to {size} bytes, more than {MAX_BUFFER_SIZE}"
            )));
        }
        if size != declared_size {
            tracing::warn!(
                buffer = %display_name,
                declared = declared_size,
                packed = size,
                "declared buffer size differs from its packed members"
            );
        }
        let mut buffer_type = EffectType::object(type_name, base);
        buffer_type.size_unpacked = size;
        buffer_type.stride = size;
        buffer_type.members = type_members;
        let ty = self.graph.types.insert(buffer_type);
        let node = self.graph.node_mut(variable);
        node.ty = ty;
        node.members = members;

        if !local {
            self.check_shared_buffer(&display_name, ty)?;
            self.graph.variables.truncate(mark);
            return Ok(());
        }

        let mut bytes = vec![0u8; size as usize];
        for (ty, default_offset, offset) in defaults {
            let packed_size = self.graph.types.get(ty).size_packed;
            let words = self.body.words_at(default_offset, packed_size / 4, "default value")?;
            unpack_values(&self.graph.types, ty, &words, &mut bytes, offset)?;
        }
        let (buffer, view) = self.create_buffer(kind, size, &bytes)?;
        self.graph.node_mut(variable).payload = Payload::Buffer(buffer_index);
        self.graph.buffers.push(BufferNode {
            variable,
            kind,
            size,
        });
        self.state.buffers.push(BufferState {
            bytes,
            dirty: false,
            buffer: Some(buffer),
            view,
            buffer_override: None,
            view_override: None,
        });
        tracing::debug!(buffer = %display_name, size, ?kind, "parsed buffer");
        Ok(())
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: u32,
        bytes: &[u8],
    ) -> Result<(BufferHandle, Option<ShaderResourceViewHandle>), EffectError> {
        let binding = match kind {
            BufferKind::Constant => BufferBinding::ConstantBuffer,
            BufferKind::Texture => BufferBinding::ShaderResource,
        };
        let device = Arc::clone(self.objects.device());
        let buffer = device.create_buffer(
            &BufferDesc {
                byte_width: size,
                binding,
            },
            (!bytes.is_empty()).then_some(bytes),
        )?;
        self.objects.track(DeviceObject::Buffer(buffer));

        let view = match kind {
            BufferKind::Constant => None,
            BufferKind::Texture => {
                let view = device.create_buffer_view(
                    buffer,
                    &BufferViewDesc {
                        first_element: 0,
                        element_count: size / 16,
                    },
                )?;
                self.objects.track(DeviceObject::ShaderResourceView(view));
                Some(view)
            }
        };
        Ok((buffer, view))
    }

    fn check_shared_buffer(&self, name: &str, ty: TypeId) -> Result<(), EffectError> {
        let pool = self.pool.ok_or(EffectError::MissingPool {
            buffers: self.header.shared_buffers,
            objects: self.header.shared_objects,
        })?;
        let index = pool
            .graph
            .find_buffer(name)
            .ok_or_else(|| EffectError::UnknownSymbol(name.to_owned()))?;
        let pool_ty = pool.graph.node(pool.graph.buffers[index].variable).ty;
        if !self.graph.types.types_match(ty, &pool.graph.types, pool_ty) {
            return Err(EffectError::SharedSymbolMismatch(name.to_owned()));
        }
        tracing::trace!(buffer = name, "shared buffer matches the pool");
        Ok(())
    }

    fn parse_shared_object(&mut self, cur: &mut Cursor<'a>) -> Result<(), EffectError> {
        let [name, type_offset, _semantic, _bind_point] = cur.read_words::<4>("shared object")?;
        let name = self
            .string(name, "shared object name")?
            .ok_or_else(|| EffectError::malformed("shared object without a name"))?;
        let ty = self.graph.types.get_or_create(self.body, type_offset)?;
        let pool = self.pool.ok_or(EffectError::MissingPool {
            buffers: self.header.shared_buffers,
            objects: self.header.shared_objects,
        })?;
        let id = pool
            .graph
            .find_variable(&name)
            .ok_or_else(|| EffectError::UnknownSymbol(name.clone()))?;
        if !self
            .graph
            .types
            .types_match(ty, &pool.graph.types, pool.graph.node(id).ty)
        {
            return Err(EffectError::SharedSymbolMismatch(name));
        }
        Ok(())
    }

    fn parse_object(&mut self, cur: &mut Cursor<'a>) -> Result<(), EffectError> {
        let [name, type_offset, semantic, bind_point] = cur.read_words::<4>("object variable")?;
        let name = self.string(name, "object name")?;
        let semantic = self.string(semantic, "object semantic")?;
        let ty = self.graph.types.get_or_create(self.body, type_offset)?;
        let t = self.graph.types.get(ty).clone();
        if t.class != TypeClass::Object {
            return Err(EffectError::malformed(format!(
                "numeric variable {name:?} declared outside a buffer"
            )));
        }

        let mut flags = self.pooled;
        if bind_point != NO_BIND_POINT {
            flags |= VariableFlags::EXPLICIT_BIND_POINT;
        }
        let id = self.instantiate(VariableSpec {
            name: name.clone(),
            semantic,
            ty,
            flags,
            explicit_bind_point: bind_point,
            parent_buffer: None,
            storage: Storage::None,
        })?;
        let elements = self.element_ids(id);
        let count = elements.len() as u32;

        match t.base_type {
            BaseType::String => {
                cur.require(count, 4, "string initializers")?;
                for element in elements {
                    let value = cur.read_u32("string initializer")?;
                    let value = self.string(value, "string initializer")?;
                    self.graph.node_mut(element).payload = Payload::String(value);
                }
            }
            base @ (BaseType::VertexShader | BaseType::PixelShader | BaseType::GeometryShader) => {
                let stage = match base {
                    BaseType::VertexShader => ShaderStage::Vertex,
                    BaseType::PixelShader => ShaderStage::Pixel,
                    _ => ShaderStage::Geometry,
                };
                let record = if t.stream_output { 8 } else { 4 };
                cur.require(count, record, "shader initializers")?;
                let mut first = None;
                for element in elements {
                    let shader_offset = cur.read_u32("shader offset")?;
                    let decl = if t.stream_output {
                        let offset = cur.read_u32("stream output declaration")?;
                        self.string(offset, "stream output declaration")?
                    } else {
                        None
                    };
                    let index = self.create_shader(stage, shader_offset, decl, false)?;
                    first.get_or_insert(index);
                    self.graph.node_mut(element).payload = Payload::Shader(index);
                }
                if let Some(first) = first {
                    self.graph.node_mut(id).payload = Payload::Shader(first);
                }
            }
            base @ (BaseType::Rasterizer | BaseType::DepthStencil | BaseType::Blend | BaseType::Sampler) => {
                let kind = match base {
                    BaseType::Rasterizer => StateKind::Rasterizer,
                    BaseType::DepthStencil => StateKind::DepthStencil,
                    BaseType::Blend => StateKind::Blend,
                    _ => StateKind::Sampler,
                };
                let mut first = None;
                for element in elements {
                    let index = self.parse_state(cur, kind)?;
                    first.get_or_insert(index);
                    self.graph.node_mut(element).payload = Payload::State(index);
                }
                if let Some(first) = first {
                    self.graph.node_mut(id).payload = Payload::State(first);
                }
            }
            BaseType::RenderTargetView => {
                let first = self.state.render_targets.len();
                self.state.render_targets.resize(first + count as usize, None);
                self.assign_slots(id, first, Payload::RenderTarget);
            }
            BaseType::DepthStencilView => {
                let first = self.state.depth_stencil_views.len();
                self.state.depth_stencil_views.resize(first + count as usize, None);
                self.assign_slots(id, first, Payload::DepthStencilView);
            }
            base if base.is_texture() => {
                let first = self.state.resources.len();
                self.state.resources.resize(first + count as usize, None);
                self.assign_slots(id, first, Payload::Resource);
            }
            other => {
                return Err(EffectError::malformed(format!(
                    "object variable {name:?} has unsupported type {other:?}"
                )))
            }
        }

        let annotations = self.parse_annotations(cur)?;
        self.graph.node_mut(id).annotations = annotations;
        self.graph.objects.push(id);
        tracing::trace!(name = name.as_deref().unwrap_or(""), base = ?t.base_type, count, "parsed object variable");
        Ok(())
    }

    /// Gives the variable slot `first` and element `i` slot `first + i`.
    fn assign_slots(&mut self, id: VariableId, first: usize, payload: fn(usize) -> Payload) {
        self.graph.node_mut(id).payload = payload(first);
        let elements = self.graph.node(id).elements.clone();
        for (i, element) in elements.into_iter().enumerate() {
            self.graph.node_mut(element).payload = payload(first + i);
        }
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        offset: u32,
        decl: Option<String>,
        is_inline: bool,
    ) -> Result<usize, EffectError> {
        let index = self.graph.shaders.len();
        if offset == 0 {
            self.graph.shaders.push(ShaderPayload::null(stage, is_inline));
            return Ok(index);
        }

        let size = self.body.u32_at(offset, "shader size")?;
        let bytecode = self.body.slice_at(offset.saturating_add(4), size, "shader bytecode")?;
        let reflection = self.reflector.reflect(bytecode)?;
        let input_signature = extract_input_signature(bytecode);

        let decl = decl.filter(|d| !d.is_empty());
        let stream_output = match (stage, decl) {
            (ShaderStage::Geometry, Some(decl)) => {
                let parsed = parse_stream_output_declaration(&decl)?;
                Some((decl, parsed))
            }
            (_, Some(decl)) => {
                tracing::warn!(?stage, decl = %decl, "ignoring stream output declaration on a non-geometry shader");
                None
            }
            (_, None) => None,
        };

        let device = Arc::clone(self.objects.device());
        let handle: ShaderHandle = match (stage, &stream_output) {
            (ShaderStage::Vertex, _) => device.create_vertex_shader(bytecode)?,
            (ShaderStage::Pixel, _) => device.create_pixel_shader(bytecode)?,
            (ShaderStage::Geometry, None) => device.create_geometry_shader(bytecode)?,
            (ShaderStage::Geometry, Some((_, so))) => {
                device.create_geometry_shader_with_stream_output(bytecode, &so.entries, so.stride)?
            }
        };
        self.objects.track(DeviceObject::Shader(handle));
        tracing::trace!(?stage, size, is_inline, "created shader");

        self.graph.shaders.push(ShaderPayload {
            stage,
            shader: Some(handle),
            is_inline,
            bytecode: Some(bytecode.to_vec()),
            reflection: Some(reflection),
            input_signature,
            stream_output,
            resources: Vec::new(),
        });
        Ok(index)
    }

    fn parse_state(&mut self, cur: &mut Cursor<'a>, kind: StateKind) -> Result<usize, EffectError> {
        let count = cur.read_u32("state assignment count")?;
        cur.require(count, 16, "state assignments")?;
        let mut block = match kind {
            StateKind::Rasterizer => StateBlock::Rasterizer(RasterizerDesc::default()),
            StateKind::DepthStencil => StateBlock::DepthStencil(DepthStencilDesc::default()),
            StateKind::Blend => StateBlock::Blend(BlendDesc::default()),
            StateKind::Sampler => StateBlock::Sampler(SamplerBlock {
                desc: SamplerDesc::default(),
                texture: ObjectRef::Unset,
            }),
        };
        for _ in 0..count {
            let [id, index, op, value_offset] = cur.read_words::<4>("state assignment")?;
            self.apply_assignment(&mut block, id, index, op, value_offset)?;
        }

        let device = Arc::clone(self.objects.device());
        let object = match block {
            StateBlock::Rasterizer(desc) => {
                let handle = device.create_rasterizer_state(&desc)?;
                self.objects.track(DeviceObject::RasterizerState(handle));
                StateObject::Rasterizer { desc, handle }
            }
            StateBlock::DepthStencil(desc) => {
                let handle = device.create_depth_stencil_state(&desc)?;
                self.objects.track(DeviceObject::DepthStencilState(handle));
                StateObject::DepthStencil { desc, handle }
            }
            StateBlock::Blend(desc) => {
                let handle = device.create_blend_state(&desc)?;
                self.objects.track(DeviceObject::BlendState(handle));
                StateObject::Blend { desc, handle }
            }
            StateBlock::Sampler(SamplerBlock { desc, texture }) => {
                let handle = device.create_sampler_state(&desc)?;
                self.objects.track(DeviceObject::SamplerState(handle));
                StateObject::Sampler {
                    desc,
                    texture,
                    handle,
                }
            }
            StateBlock::Pass(_) => return Err(EffectError::malformed("pass block used as a state object")),
        };
        let index = self.graph.states.len();
        self.graph.states.push(object);
        Ok(index)
    }

    /// Applies one `(property, index, operation, operand)` assignment to `block`.
    fn apply_assignment(
        &mut self,
        block: &mut StateBlock,
        id: u32,
        index: u32,
        op: u32,
        value_offset: u32,
    ) -> Result<(), EffectError> {
        let info = property_info(id)
            .ok_or_else(|| EffectError::malformed(format!("unknown property id {id:#x}")))?;
        if info.container != block.kind() {
            return Err(EffectError::malformed(format!(
                "property {} assigned in a {:?} block",
                info.name,
                block.kind()
            )));
        }
        let Some(field) = info.field else {
            return Err(EffectError::NotImplemented(format!("{} assignments", info.name)));
        };
        if index >= info.count {
            return Err(EffectError::malformed(format!(
                "{}[{index}] is out of range (count {})",
                info.name, info.count
            )));
        }

        match op {
            OP_CONSTANT => match info.ty.numeric() {
                Some(target) => {
                    let count = self.body.u32_at(value_offset, "constant value count")?;
                    if count != info.size {
                        return Err(EffectError::malformed(format!(
                            "{} takes {} values, got {count}",
                            info.name, info.size
                        )));
                    }
                    let values = self
                        .body
                        .words_at(value_offset.saturating_add(4), count.saturating_mul(2), "constant values")?;
                    for (component, pair) in values.chunks_exact(2).enumerate() {
                        let from = NumericType::from_value_tag(pair[0]).ok_or_else(|| {
                            EffectError::malformed(format!("unknown constant value type {}", pair[0]))
                        })?;
                        let word = convert_word(pair[1], from, target);
                        block.store_numeric(field, index, component as u32, word)?;
                    }
                    Ok(())
                }
                None => block.store_object(field, ObjectRef::Placeholder, 0),
            },
            OP_VARIABLE => {
                let name = self
                    .body
                    .string_at(value_offset, "assigned variable")?
                    .ok_or_else(|| EffectError::malformed("variable assignment without a name"))?;
                if info.ty.numeric().is_some() {
                    return Err(EffectError::NotImplemented(format!(
                        "assigning variable {name:?} to numeric property {}",
                        info.name
                    )));
                }
                let loc = self
                    .resolve_variable(name)
                    .ok_or_else(|| EffectError::UnknownSymbol(name.to_owned()))?;
                let graph = self.graph_of(loc.owner);
                let ty = graph.types.get(graph.node(loc.id).ty);
                if ty.is_array() {
                    return Err(EffectError::SymbolTypeMismatch {
                        name: name.to_owned(),
                        reason: "array variable assigned without an index",
                    });
                }
                if !info.ty.accepts(ty.base_type) {
                    return Err(EffectError::SymbolTypeMismatch {
                        name: name.to_owned(),
                        reason: "variable type does not match the property",
                    });
                }
                block.store_object(field, ObjectRef::Variable(loc), 0)
            }
            OP_CONSTANT_INDEX => {
                let [name, element] = {
                    let w = self.body.words_at(value_offset, 2, "constant index operand")?;
                    [w[0], w[1]]
                };
                let name = self
                    .body
                    .string_at(name, "indexed variable")?
                    .ok_or_else(|| EffectError::malformed("indexed assignment without a name"))?;
                if info.ty.numeric().is_some() {
                    return Err(EffectError::NotImplemented(format!(
                        "assigning {name}[{element}] to numeric property {}",
                        info.name
                    )));
                }
                let loc = self
                    .resolve_variable(name)
                    .ok_or_else(|| EffectError::UnknownSymbol(name.to_owned()))?;
                let graph = self.graph_of(loc.owner);
                let node = graph.node(loc.id);
                let ty = graph.types.get(node.ty);
                if !ty.is_array() || element >= ty.element_count {
                    return Err(EffectError::SymbolTypeMismatch {
                        name: name.to_owned(),
                        reason: "index is out of the variable's range",
                    });
                }
                if !info.ty.accepts(ty.base_type) {
                    return Err(EffectError::SymbolTypeMismatch {
                        name: name.to_owned(),
                        reason: "variable type does not match the property",
                    });
                }
                if ty.base_type.is_shader() {
                    block.store_object(field, ObjectRef::Variable(loc), element)
                } else {
                    let id = node.elements.get(element as usize).copied().ok_or_else(|| {
                        EffectError::malformed(format!("{name}[{element}] has no element variable"))
                    })?;
                    let element = VarLoc { owner: loc.owner, id };
                    block.store_object(field, ObjectRef::Variable(element), 0)
                }
            }
            OP_ANONYMOUS_SHADER => {
                let stage = match info.ty {
                    PropertyType::Object(BaseType::VertexShader) => ShaderStage::Vertex,
                    PropertyType::Object(BaseType::PixelShader) => ShaderStage::Pixel,
                    PropertyType::Object(BaseType::GeometryShader) => ShaderStage::Geometry,
                    _ => {
                        return Err(EffectError::malformed(format!(
                            "inline shader assigned to {}",
                            info.name
                        )))
                    }
                };
                let operand = self.body.words_at(value_offset, 2, "inline shader operand")?;
                let id = self.anonymous_shader(stage, operand[0], operand[1])?;
                block.store_object(
                    field,
                    ObjectRef::Variable(VarLoc {
                        owner: Owner::Local,
                        id,
                    }),
                    0,
                )
            }
            OP_VARIABLE_INDEX | OP_EXPRESSION | OP_INDEX_EXPRESSION => Err(EffectError::NotImplemented(
                format!("operation {op} for {}", info.name),
            )),
            other => Err(EffectError::malformed(format!(
                "unknown assignment operation {other} for {}",
                info.name
            ))),
        }
    }

    fn anonymous_shader(
        &mut self,
        stage: ShaderStage,
        shader_offset: u32,
        decl_offset: u32,
    ) -> Result<VariableId, EffectError> {
        if self.anonymous_used >= self.header.anonymous_shaders {
            return Err(EffectError::malformed(format!(
                "more inline shaders than the {} the header declares",
                self.header.anonymous_shaders
            )));
        }
        self.anonymous_used += 1;

        let (name, base) = match stage {
            ShaderStage::Vertex => ("vertexshader", BaseType::VertexShader),
            ShaderStage::Pixel => ("pixelshader", BaseType::PixelShader),
            ShaderStage::Geometry => ("geometryshader", BaseType::GeometryShader),
        };
        let decl = self.string(decl_offset, "stream output declaration")?;
        let mut ty = EffectType::object(name, base);
        ty.stream_output = stage == ShaderStage::Geometry && decl.as_deref().is_some_and(|d| !d.is_empty());
        let ty = self.graph.types.insert(ty);

        let index = self.create_shader(stage, shader_offset, decl, true)?;
        // Inline shaders report an explicit bind point of zero.
        let id = self.instantiate(VariableSpec {
            name: Some(name.to_owned()),
            semantic: None,
            ty,
            flags: self.pooled,
            explicit_bind_point: 0,
            parent_buffer: None,
            storage: Storage::None,
        })?;
        self.graph.node_mut(id).payload = Payload::Shader(index);
        self.graph.anonymous_shaders.push(id);
        Ok(id)
    }

    fn parse_technique(&mut self, cur: &mut Cursor<'a>) -> Result<TechniqueNode, EffectError> {
        let [name, pass_count] = cur.read_words::<2>("technique")?;
        let name = self.string(name, "technique name")?;
        let annotations = self.parse_annotations(cur)?;
        cur.require(pass_count, 12, "passes")?;

        let mut passes = Vec::new();
        for _ in 0..pass_count {
            let [pass_name, assignment_count] = cur.read_words::<2>("pass")?;
            let pass_name = self.string(pass_name, "pass name")?;
            let pass_annotations = self.parse_annotations(cur)?;
            cur.require(assignment_count, 16, "pass assignments")?;

            let mut block = StateBlock::Pass(PassState::default());
            for _ in 0..assignment_count {
                let [id, index, op, value_offset] = cur.read_words::<4>("pass assignment")?;
                self.apply_assignment(&mut block, id, index, op, value_offset)?;
            }
            let StateBlock::Pass(state) = block else {
                return Err(EffectError::malformed("pass block changed kind"));
            };
            passes.push(PassNode {
                name: pass_name,
                annotations: pass_annotations,
                state,
            });
        }
        tracing::debug!(
            technique = name.as_deref().unwrap_or(""),
            passes = passes.len(),
            "parsed technique"
        );
        Ok(TechniqueNode {
            name,
            annotations,
            passes,
        })
    }

    /// Binds every reflected shader resource to the buffer or variable of the same name.
    fn resolve_shader_resources(&mut self) -> Result<(), EffectError> {
        for index in 0..self.graph.shaders.len() {
            let Some(reflection) = &self.graph.shaders[index].reflection else {
                continue;
            };
            let mut bindings = Vec::with_capacity(reflection.bound_resources.len());
            for resource in &reflection.bound_resources {
                let target = match resource.input_type {
                    ShaderInputType::ConstantBuffer | ShaderInputType::TextureBuffer => self
                        .resolve_buffer(&resource.name)
                        .map(|(owner, buffer)| ResourceTarget::Buffer(owner, buffer)),
                    ShaderInputType::Texture | ShaderInputType::Sampler => self
                        .resolve_variable(&resource.name)
                        .map(ResourceTarget::Variable),
                    ShaderInputType::Other(raw) => {
                        tracing::warn!(name = %resource.name, raw, "ignoring unsupported shader resource type");
                        continue;
                    }
                };
                let target = target.ok_or_else(|| EffectError::UnknownSymbol(resource.name.clone()))?;
                bindings.push(ResourceBinding {
                    input_type: resource.input_type,
                    bind_point: resource.bind_point,
                    bind_count: resource.bind_count,
                    target,
                });
            }
            self.graph.shaders[index].resources = bindings;
        }
        Ok(())
    }
}
