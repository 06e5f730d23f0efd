//! The generic variable handle and the interface every typed handle shares.
//!
//! A handle is a borrowed `(effect, variable)` pair, or nothing: every lookup
//! that fails returns an invalid handle instead of an error, so chains like
//! `effect.variable_by_name("light").member_by_name("color").as_vector()` never
//! fail midway. Operations on an invalid handle return
//! [`EffectError::InvalidUsage`].

use core::fmt;

use crate::effect::EffectInner;
use crate::error::EffectError;
use crate::types::{EffectType, EffectTypeRef};

use super::numeric::{MatrixVariable, ScalarVariable, VectorVariable};
use super::object::{
    BlendVariable, ConstantBufferVariable, DepthStencilVariable, DepthStencilViewVariable,
    RasterizerVariable, RenderTargetViewVariable, SamplerVariable, ShaderResourceVariable,
    ShaderVariable, StringVariable,
};
use super::{EffectVariableDesc, Storage, VariableId, VariableKind, VariableNode};

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A handle to any effect variable.
#[derive(Clone, Copy)]
pub struct EffectVariable<'a> {
    inner: Option<(&'a EffectInner, VariableId)>,
}

impl fmt::Debug for EffectVariable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Some(node) => f
                .debug_struct("EffectVariable")
                .field("name", &node.name)
                .field("kind", &node.kind)
                .finish(),
            None => f.write_str("EffectVariable(invalid)"),
        }
    }
}

impl<'a> EffectVariable<'a> {
    pub(crate) fn new(effect: &'a EffectInner, id: VariableId) -> Self {
        Self {
            inner: Some((effect, id)),
        }
    }

    pub(crate) fn invalid() -> Self {
        Self { inner: None }
    }

    pub(crate) fn effect(&self) -> Option<&'a EffectInner> {
        self.inner.map(|(effect, _)| effect)
    }

    pub(crate) fn node(&self) -> Option<&'a VariableNode> {
        self.inner.map(|(effect, id)| effect.graph.node(id))
    }

    pub(crate) fn ty(&self) -> Option<&'a EffectType> {
        self.inner
            .map(|(effect, id)| effect.graph.types.get(effect.graph.node(id).ty))
    }

    /// Keeps the handle only if it is one of `kinds`.
    pub(crate) fn with_kind(self, kinds: &[VariableKind]) -> Self {
        match self.node() {
            Some(node) if kinds.contains(&node.kind) => self,
            _ => Self::invalid(),
        }
    }

    fn sibling(&self, id: Option<VariableId>) -> Self {
        match (self.effect(), id) {
            (Some(effect), Some(id)) => Self::new(effect, id),
            _ => Self::invalid(),
        }
    }

    pub(crate) fn require(&self, what: &'static str) -> Result<(&'a EffectInner, &'a VariableNode), EffectError> {
        match self.inner {
            Some((effect, id)) => Ok((effect, effect.graph.node(id))),
            None => Err(EffectError::InvalidUsage(what)),
        }
    }

    /// Element `index` of an array, or the variable itself for index zero of a non-array.
    pub(crate) fn element_node(&self, index: u32) -> Result<(&'a EffectInner, &'a VariableNode), EffectError> {
        let (effect, node) = self.require("element of an invalid variable")?;
        if node.elements.is_empty() {
            return if index == 0 {
                Ok((effect, node))
            } else {
                Err(EffectError::InvalidUsage("index on a variable that is not an array"))
            };
        }
        node.elements
            .get(index as usize)
            .map(|&id| (effect, effect.graph.node(id)))
            .ok_or(EffectError::InvalidUsage("array index out of range"))
    }

    /// Runs `f` over the bytes backing this variable and the variable's start offset.
    pub(crate) fn with_store<R>(
        &self,
        f: impl FnOnce(&[u8], usize) -> Result<R, EffectError>,
    ) -> Result<R, EffectError> {
        let (effect, node) = self.require("read from an invalid variable")?;
        match node.storage {
            Storage::Buffer { buffer, offset } => {
                let state = effect.state();
                let buffer = state
                    .buffers
                    .get(buffer)
                    .ok_or(EffectError::InvalidUsage("variable's buffer does not exist"))?;
                f(&buffer.bytes, offset as usize)
            }
            Storage::Inline { store, offset } => f(&effect.graph.inline_stores[store], offset as usize),
            Storage::None => Err(EffectError::InvalidUsage("variable has no value storage")),
        }
    }

    /// Like [`Self::with_store`], for writes; marks the buffer dirty.
    pub(crate) fn with_store_mut<R>(
        &self,
        f: impl FnOnce(&mut [u8], usize) -> Result<R, EffectError>,
    ) -> Result<R, EffectError> {
        let (effect, node) = self.require("write to an invalid variable")?;
        match node.storage {
            Storage::Buffer { buffer, offset } => {
                let mut state = effect.state();
                let buffer = state
                    .buffers
                    .get_mut(buffer)
                    .ok_or(EffectError::InvalidUsage("variable's buffer does not exist"))?;
                let out = f(&mut buffer.bytes, offset as usize)?;
                buffer.dirty = true;
                Ok(out)
            }
            Storage::Inline { .. } => Err(EffectError::InvalidUsage("annotations are read-only")),
            Storage::None => Err(EffectError::InvalidUsage("variable has no value storage")),
        }
    }

    fn raw_range(&self, offset: u32, len: usize) -> Result<(), EffectError> {
        let size = self.ty().map_or(0, |t| u64::from(t.size_unpacked));
        if u64::from(offset) + len as u64 > size {
            return Err(EffectError::InvalidUsage("raw access past the end of the variable"));
        }
        Ok(())
    }
}

pub(crate) fn load_word(bytes: &[u8], offset: usize) -> Result<u32, EffectError> {
    offset
        .checked_add(4)
        .and_then(|end| bytes.get(offset..end))
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(EffectError::InvalidUsage("access outside the variable's buffer"))
}

pub(crate) fn store_word(bytes: &mut [u8], offset: usize, word: u32) -> Result<(), EffectError> {
    offset
        .checked_add(4)
        .and_then(|end| bytes.get_mut(offset..end))
        .map(|b| b.copy_from_slice(&word.to_le_bytes()))
        .ok_or(EffectError::InvalidUsage("access outside the variable's buffer"))
}

/// Operations every variable handle supports, typed or not.
pub trait VariableInterface<'a>: sealed::Sealed + Copy {
    /// The untyped handle.
    fn as_variable(&self) -> EffectVariable<'a>;

    /// `false` for the sentinel returned by failed lookups and downcasts.
    fn is_valid(&self) -> bool {
        self.as_variable().inner.is_some()
    }

    /// The variable's type.
    fn effect_type(&self) -> EffectTypeRef<'a> {
        match self.as_variable().inner {
            Some((effect, id)) => EffectTypeRef::new(&effect.graph.types, effect.graph.node(id).ty),
            None => EffectTypeRef::invalid(),
        }
    }

    /// Describes the variable.
    fn desc(&self) -> Result<EffectVariableDesc, EffectError> {
        let (_, node) = self.as_variable().require("desc on an invalid variable")?;
        Ok(EffectVariableDesc {
            name: node.name.clone(),
            semantic: node.semantic.clone(),
            flags: node.flags,
            annotations: node.annotations.len() as u32,
            buffer_offset: match node.storage {
                Storage::Buffer { offset, .. } => offset,
                _ => 0,
            },
            explicit_bind_point: node.explicit_bind_point,
        })
    }

    /// Annotation at `index`.
    fn annotation_by_index(&self, index: u32) -> EffectVariable<'a> {
        let v = self.as_variable();
        v.sibling(v.node().and_then(|n| n.annotations.get(index as usize).copied()))
    }

    /// Annotation called `name`.
    fn annotation_by_name(&self, name: &str) -> EffectVariable<'a> {
        let v = self.as_variable();
        let found = v.inner.and_then(|(effect, id)| {
            effect
                .graph
                .node(id)
                .annotations
                .iter()
                .copied()
                .find(|&a| effect.graph.node(a).name.as_deref() == Some(name))
        });
        v.sibling(found)
    }

    /// Struct member at `index`.
    fn member_by_index(&self, index: u32) -> EffectVariable<'a> {
        let v = self.as_variable();
        v.sibling(v.node().and_then(|n| n.members.get(index as usize).copied()))
    }

    /// Struct member called `name`.
    fn member_by_name(&self, name: &str) -> EffectVariable<'a> {
        let v = self.as_variable();
        let found = v.inner.and_then(|(effect, id)| {
            effect
                .graph
                .node(id)
                .members
                .iter()
                .copied()
                .find(|&m| effect.graph.node(m).name.as_deref() == Some(name))
        });
        v.sibling(found)
    }

    /// Struct member whose semantic matches `semantic`, ignoring case.
    fn member_by_semantic(&self, semantic: &str) -> EffectVariable<'a> {
        let v = self.as_variable();
        let found = v.inner.and_then(|(effect, id)| {
            effect.graph.node(id).members.iter().copied().find(|&m| {
                effect
                    .graph
                    .node(m)
                    .semantic
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(semantic))
            })
        });
        v.sibling(found)
    }

    /// Array element at `index`.
    fn element(&self, index: u32) -> EffectVariable<'a> {
        let v = self.as_variable();
        v.sibling(v.node().and_then(|n| n.elements.get(index as usize).copied()))
    }

    /// The buffer a numeric variable lives in.
    fn parent_constant_buffer(&self) -> ConstantBufferVariable<'a> {
        let v = self.as_variable();
        let parent = v.inner.and_then(|(effect, id)| {
            let buffer = effect.graph.node(id).parent_buffer?;
            Some(EffectVariable::new(effect, effect.graph.buffers.get(buffer)?.variable))
        });
        ConstantBufferVariable::from_variable(parent.unwrap_or_else(EffectVariable::invalid))
    }

    /// Copies `data` into the variable's storage at byte `offset`.
    fn set_raw_value(&self, data: &[u8], offset: u32) -> Result<(), EffectError> {
        let v = self.as_variable();
        v.raw_range(offset, data.len())?;
        v.with_store_mut(|bytes, start| {
            let start = start + offset as usize;
            bytes
                .get_mut(start..start + data.len())
                .ok_or(EffectError::InvalidUsage("access outside the variable's buffer"))?
                .copy_from_slice(data);
            Ok(())
        })
    }

    /// Copies the variable's storage at byte `offset` into `data`.
    fn get_raw_value(&self, data: &mut [u8], offset: u32) -> Result<(), EffectError> {
        let v = self.as_variable();
        v.raw_range(offset, data.len())?;
        v.with_store(|bytes, start| {
            let start = start + offset as usize;
            data.copy_from_slice(
                bytes
                    .get(start..start + data.len())
                    .ok_or(EffectError::InvalidUsage("access outside the variable's buffer"))?,
            );
            Ok(())
        })
    }

    /// Scalar view; invalid for other kinds.
    fn as_scalar(&self) -> ScalarVariable<'a> {
        ScalarVariable::from_variable(self.as_variable())
    }

    /// Vector view.
    fn as_vector(&self) -> VectorVariable<'a> {
        VectorVariable::from_variable(self.as_variable())
    }

    /// Matrix view.
    fn as_matrix(&self) -> MatrixVariable<'a> {
        MatrixVariable::from_variable(self.as_variable())
    }

    /// String view.
    fn as_string(&self) -> StringVariable<'a> {
        StringVariable::from_variable(self.as_variable())
    }

    /// Shader resource view.
    fn as_shader_resource(&self) -> ShaderResourceVariable<'a> {
        ShaderResourceVariable::from_variable(self.as_variable())
    }

    /// Render target view.
    fn as_render_target_view(&self) -> RenderTargetViewVariable<'a> {
        RenderTargetViewVariable::from_variable(self.as_variable())
    }

    /// Depth-stencil view.
    fn as_depth_stencil_view(&self) -> DepthStencilViewVariable<'a> {
        DepthStencilViewVariable::from_variable(self.as_variable())
    }

    /// Constant or texture buffer.
    fn as_constant_buffer(&self) -> ConstantBufferVariable<'a> {
        ConstantBufferVariable::from_variable(self.as_variable())
    }

    /// Shader.
    fn as_shader(&self) -> ShaderVariable<'a> {
        ShaderVariable::from_variable(self.as_variable())
    }

    /// Blend state.
    fn as_blend(&self) -> BlendVariable<'a> {
        BlendVariable::from_variable(self.as_variable())
    }

    /// Depth-stencil state.
    fn as_depth_stencil(&self) -> DepthStencilVariable<'a> {
        DepthStencilVariable::from_variable(self.as_variable())
    }

    /// Rasterizer state.
    fn as_rasterizer(&self) -> RasterizerVariable<'a> {
        RasterizerVariable::from_variable(self.as_variable())
    }

    /// Sampler state.
    fn as_sampler(&self) -> SamplerVariable<'a> {
        SamplerVariable::from_variable(self.as_variable())
    }
}

impl sealed::Sealed for EffectVariable<'_> {}

impl<'a> VariableInterface<'a> for EffectVariable<'a> {
    fn as_variable(&self) -> EffectVariable<'a> {
        *self
    }
}
