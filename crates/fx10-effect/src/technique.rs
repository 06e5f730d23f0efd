//! Techniques and passes.

use crate::apply::apply_pass;
use crate::effect::EffectInner;
use crate::error::EffectError;
use crate::graph::{ObjectRef, PassState, ShaderRef};
use crate::variable::{EffectVariable, ShaderVariable, VariableId, VariableInterface};

#[derive(Debug)]
pub(crate) struct TechniqueNode {
    /// Cleared by `optimize`.
    pub(crate) name: Option<String>,
    pub(crate) annotations: Vec<VariableId>,
    pub(crate) passes: Vec<PassNode>,
}

#[derive(Debug)]
pub(crate) struct PassNode {
    /// Cleared by `optimize`.
    pub(crate) name: Option<String>,
    pub(crate) annotations: Vec<VariableId>,
    pub(crate) state: PassState,
}

/// `D3D10_TECHNIQUE_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueDesc {
    /// `None` once the effect is optimized.
    pub name: Option<String>,
    /// Number of passes.
    pub passes: u32,
    /// Number of annotations.
    pub annotations: u32,
}

/// `D3D10_PASS_DESC`.
#[derive(Debug, Clone, PartialEq)]
pub struct PassDesc {
    /// `None` once the effect is optimized.
    pub name: Option<String>,
    /// Number of annotations.
    pub annotations: u32,
    /// Input signature of the pass's vertex shader, for input layout creation.
    pub ia_input_signature: Option<Vec<u8>>,
    /// Stencil reference value.
    pub stencil_ref: u32,
    /// Sample mask.
    pub sample_mask: u32,
    /// Blend factor.
    pub blend_factor: [f32; 4],
}

/// `D3D10_PASS_SHADER_DESC`: the shader variable a pass uses and which element of it.
#[derive(Debug, Clone, Copy)]
pub struct PassShaderDesc<'a> {
    /// Invalid when the pass does not set the stage.
    pub shader: ShaderVariable<'a>,
    /// Element of a shader array.
    pub shader_index: u32,
}

fn annotation_at<'e>(effect: &'e EffectInner, ids: &[VariableId], index: u32) -> EffectVariable<'e> {
    match ids.get(index as usize) {
        Some(&id) => EffectVariable::new(effect, id),
        None => EffectVariable::invalid(),
    }
}

fn annotation_named<'e>(effect: &'e EffectInner, ids: &[VariableId], name: &str) -> EffectVariable<'e> {
    ids.iter()
        .copied()
        .find(|&id| effect.graph.node(id).name.as_deref() == Some(name))
        .map_or_else(EffectVariable::invalid, |id| EffectVariable::new(effect, id))
}

/// A technique of an effect; invalid handles come from failed lookups.
#[derive(Clone, Copy)]
pub struct Technique<'a> {
    inner: Option<(&'a EffectInner, usize)>,
}

impl core::fmt::Debug for Technique<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.node() {
            Some(node) => f.debug_struct("Technique").field("name", &node.name).finish(),
            None => f.write_str("Technique(invalid)"),
        }
    }
}

impl<'a> Technique<'a> {
    pub(crate) fn new(effect: &'a EffectInner, index: usize) -> Self {
        Self {
            inner: (index < effect.graph.techniques.len()).then_some((effect, index)),
        }
    }

    pub(crate) fn invalid() -> Self {
        Self { inner: None }
    }

    fn node(&self) -> Option<&'a TechniqueNode> {
        self.inner.map(|(effect, index)| &effect.graph.techniques[index])
    }

    /// `false` for the sentinel returned by failed lookups.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Name and pass and annotation counts.
    pub fn desc(&self) -> Result<TechniqueDesc, EffectError> {
        let node = self.node().ok_or(EffectError::InvalidUsage("desc on an invalid technique"))?;
        Ok(TechniqueDesc {
            name: node.name.clone(),
            passes: node.passes.len() as u32,
            annotations: node.annotations.len() as u32,
        })
    }

    /// Invalid when `index` is out of range.
    pub fn annotation_by_index(&self, index: u32) -> EffectVariable<'a> {
        match self.inner {
            Some((effect, t)) => annotation_at(effect, &effect.graph.techniques[t].annotations, index),
            None => EffectVariable::invalid(),
        }
    }

    /// Invalid when no annotation has that name.
    pub fn annotation_by_name(&self, name: &str) -> EffectVariable<'a> {
        match self.inner {
            Some((effect, t)) => annotation_named(effect, &effect.graph.techniques[t].annotations, name),
            None => EffectVariable::invalid(),
        }
    }

    /// Invalid when `index` is out of range.
    pub fn pass_by_index(&self, index: u32) -> Pass<'a> {
        match self.inner {
            Some((effect, t)) if (index as usize) < effect.graph.techniques[t].passes.len() => Pass {
                inner: Some((effect, t, index as usize)),
            },
            _ => Pass { inner: None },
        }
    }

    /// Finds a pass by name; always invalid after `optimize`.
    pub fn pass_by_name(&self, name: &str) -> Pass<'a> {
        let found = self.inner.and_then(|(effect, t)| {
            effect.graph.techniques[t]
                .passes
                .iter()
                .position(|p| p.name.as_deref() == Some(name))
                .map(|p| (effect, t, p))
        });
        Pass { inner: found }
    }
}

/// A pass of a technique.
#[derive(Clone, Copy)]
pub struct Pass<'a> {
    inner: Option<(&'a EffectInner, usize, usize)>,
}

impl core::fmt::Debug for Pass<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.node() {
            Some(node) => f.debug_struct("Pass").field("name", &node.name).finish(),
            None => f.write_str("Pass(invalid)"),
        }
    }
}

impl<'a> Pass<'a> {
    fn node(&self) -> Option<&'a PassNode> {
        self.inner
            .map(|(effect, t, p)| &effect.graph.techniques[t].passes[p])
    }

    fn require(&self) -> Result<(&'a EffectInner, &'a PassNode), EffectError> {
        match self.inner {
            Some((effect, t, p)) => Ok((effect, &effect.graph.techniques[t].passes[p])),
            None => Err(EffectError::InvalidUsage("invalid pass")),
        }
    }

    /// `false` for the sentinel returned by failed lookups.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Name, annotation count, fixed pass state and the vertex shader's input signature.
    pub fn desc(&self) -> Result<PassDesc, EffectError> {
        let (_, node) = self.require()?;
        let vs = self.vertex_shader_desc()?;
        let ia_input_signature = if vs.shader.is_valid() {
            vs.shader.shader_desc(vs.shader_index)?.input_signature
        } else {
            None
        };
        Ok(PassDesc {
            name: node.name.clone(),
            annotations: node.annotations.len() as u32,
            ia_input_signature,
            stencil_ref: node.state.stencil_ref,
            sample_mask: node.state.sample_mask,
            blend_factor: node.state.blend_factor,
        })
    }

    /// Invalid when `index` is out of range.
    pub fn annotation_by_index(&self, index: u32) -> EffectVariable<'a> {
        match self.require() {
            Ok((effect, node)) => annotation_at(effect, &node.annotations, index),
            Err(_) => EffectVariable::invalid(),
        }
    }

    /// Invalid when no annotation has that name.
    pub fn annotation_by_name(&self, name: &str) -> EffectVariable<'a> {
        match self.require() {
            Ok((effect, node)) => annotation_named(effect, &node.annotations, name),
            Err(_) => EffectVariable::invalid(),
        }
    }

    fn shader_desc(&self, pick: impl FnOnce(&PassState) -> ShaderRef) -> Result<PassShaderDesc<'a>, EffectError> {
        let (effect, node) = self.require()?;
        let shader_ref = pick(&node.state);
        let variable = match shader_ref.object {
            ObjectRef::Variable(loc) => effect
                .resolve(loc)
                .map_or_else(EffectVariable::invalid, |(owner, id)| EffectVariable::new(owner, id)),
            ObjectRef::Unset | ObjectRef::Placeholder => EffectVariable::invalid(),
        };
        let shader = variable.as_shader();
        Ok(PassShaderDesc {
            shader,
            shader_index: if shader.is_valid() { shader_ref.index } else { 0 },
        })
    }

    /// The vertex shader variable and element the pass binds.
    pub fn vertex_shader_desc(&self) -> Result<PassShaderDesc<'a>, EffectError> {
        self.shader_desc(|s| s.vs)
    }

    /// The geometry shader variable and element the pass binds.
    pub fn geometry_shader_desc(&self) -> Result<PassShaderDesc<'a>, EffectError> {
        self.shader_desc(|s| s.gs)
    }

    /// The pixel shader variable and element the pass binds.
    pub fn pixel_shader_desc(&self) -> Result<PassShaderDesc<'a>, EffectError> {
        self.shader_desc(|s| s.ps)
    }

    /// Binds the pass's shaders, their resources and its state objects on the device.
    ///
    /// `flags` is reserved and ignored.
    pub fn apply(&self, flags: u32) -> Result<(), EffectError> {
        let (effect, node) = self.require()?;
        if flags != 0 {
            tracing::warn!(flags, "ignoring nonzero pass apply flags");
        }
        apply_pass(effect, &node.state)
    }
}
