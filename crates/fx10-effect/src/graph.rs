//! The immutable object graph built by the parser, and the mutable state next to it.

use crate::device::{
    BlendStateHandle, BufferHandle, DepthStencilStateHandle, DepthStencilViewHandle,
    RasterizerStateHandle, RenderTargetViewHandle, SamplerStateHandle, ShaderResourceViewHandle,
};
use crate::shader::ShaderPayload;
use crate::state::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc};
use crate::technique::TechniqueNode;
use crate::types::TypeRegistry;
use crate::variable::{VarLoc, VariableId, VariableNode};

/// What an object-valued property or sampler texture refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ObjectRef {
    /// Never assigned; apply leaves the pipeline slot alone.
    #[default]
    Unset,
    /// Assigned the `NULL` constant; apply unbinds the slot.
    Placeholder,
    Variable(VarLoc),
}

/// A shader reference; `index` selects the element of a shader array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ShaderRef {
    pub(crate) object: ObjectRef,
    pub(crate) index: u32,
}

/// Everything a pass sets when applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PassState {
    pub(crate) vs: ShaderRef,
    pub(crate) gs: ShaderRef,
    pub(crate) ps: ShaderRef,
    pub(crate) rasterizer: ObjectRef,
    pub(crate) depth_stencil: ObjectRef,
    pub(crate) blend: ObjectRef,
    pub(crate) stencil_ref: u32,
    pub(crate) blend_factor: [f32; 4],
    pub(crate) sample_mask: u32,
}

impl Default for PassState {
    fn default() -> Self {
        Self {
            vs: ShaderRef::default(),
            gs: ShaderRef::default(),
            ps: ShaderRef::default(),
            rasterizer: ObjectRef::Unset,
            depth_stencil: ObjectRef::Unset,
            blend: ObjectRef::Unset,
            stencil_ref: 0,
            blend_factor: [0.0; 4],
            sample_mask: 0xffff_ffff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferKind {
    Constant,
    Texture,
}

#[derive(Debug, Clone)]
pub(crate) struct BufferNode {
    pub(crate) variable: VariableId,
    pub(crate) kind: BufferKind,
    pub(crate) size: u32,
}

/// A created state object and the description it was created from.
#[derive(Debug, Clone)]
pub(crate) enum StateObject {
    Rasterizer {
        desc: RasterizerDesc,
        handle: RasterizerStateHandle,
    },
    DepthStencil {
        desc: DepthStencilDesc,
        handle: DepthStencilStateHandle,
    },
    Blend {
        desc: BlendDesc,
        handle: BlendStateHandle,
    },
    Sampler {
        desc: SamplerDesc,
        /// Texture bound alongside the sampler when a shader samples through it.
        texture: ObjectRef,
        handle: SamplerStateHandle,
    },
}

#[derive(Debug, Default)]
pub(crate) struct EffectGraph {
    pub(crate) types: TypeRegistry,
    pub(crate) variables: Vec<VariableNode>,
    pub(crate) buffers: Vec<BufferNode>,
    /// Top-level object variables in declaration order.
    pub(crate) objects: Vec<VariableId>,
    pub(crate) techniques: Vec<TechniqueNode>,
    pub(crate) anonymous_shaders: Vec<VariableId>,
    pub(crate) shaders: Vec<ShaderPayload>,
    pub(crate) states: Vec<StateObject>,
    /// Value stores of numeric annotations.
    pub(crate) inline_stores: Vec<Vec<u8>>,
}

impl EffectGraph {
    pub(crate) fn node(&self, id: VariableId) -> &VariableNode {
        &self.variables[id.0 as usize]
    }

    pub(crate) fn node_mut(&mut self, id: VariableId) -> &mut VariableNode {
        &mut self.variables[id.0 as usize]
    }

    pub(crate) fn push_variable(&mut self, node: VariableNode) -> VariableId {
        let id = VariableId(self.variables.len() as u32);
        self.variables.push(node);
        id
    }

    pub(crate) fn find_buffer(&self, name: &str) -> Option<usize> {
        self.buffers
            .iter()
            .position(|b| self.node(b.variable).name.as_deref() == Some(name))
    }

    /// Buffer members, then object variables.
    pub(crate) fn globals(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.buffers
            .iter()
            .flat_map(|b| self.node(b.variable).members.iter().copied())
            .chain(self.objects.iter().copied())
    }

    pub(crate) fn global_count(&self) -> usize {
        self.buffers
            .iter()
            .map(|b| self.node(b.variable).members.len())
            .sum::<usize>()
            + self.objects.len()
    }

    pub(crate) fn find_variable(&self, name: &str) -> Option<VariableId> {
        self.globals()
            .find(|&id| self.node(id).name.as_deref() == Some(name))
    }

    pub(crate) fn find_variable_by_semantic(&self, semantic: &str) -> Option<VariableId> {
        self.globals().find(|&id| {
            self.node(id)
                .semantic
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(semantic))
        })
    }
}

#[derive(Debug)]
pub(crate) struct BufferState {
    /// CPU copy in the padded layout.
    pub(crate) bytes: Vec<u8>,
    /// Set by writes, cleared by the upload in `apply`.
    pub(crate) dirty: bool,
    pub(crate) buffer: Option<BufferHandle>,
    /// Texture buffers only.
    pub(crate) view: Option<ShaderResourceViewHandle>,
    /// Application buffer bound instead of `buffer`; uploads wait while set.
    pub(crate) buffer_override: Option<BufferHandle>,
    /// Application view bound instead of `view`.
    pub(crate) view_override: Option<ShaderResourceViewHandle>,
}

/// Per-effect state written through variable handles.
#[derive(Debug, Default)]
pub(crate) struct EffectState {
    pub(crate) buffers: Vec<BufferState>,
    pub(crate) resources: Vec<Option<ShaderResourceViewHandle>>,
    pub(crate) render_targets: Vec<Option<RenderTargetViewHandle>>,
    pub(crate) depth_stencil_views: Vec<Option<DepthStencilViewHandle>>,
}
