//! Pushing a pass to the device.
//!
//! Stages are bound in the order vertex, geometry, pixel. Each bound shader's
//! reflected resources are looked up in the effect that owns the shader (a
//! pool for shared shaders) and bound to the reported slots. Dirty buffers are
//! uploaded right before they are bound. State objects follow the shaders.

use fx10_dxbc::ShaderInputType;
use tracing::{trace, warn};

use crate::device::{Device, SamplerStateHandle, ShaderResourceViewHandle, ShaderStage};
use crate::effect::EffectInner;
use crate::error::EffectError;
use crate::graph::{BufferKind, ObjectRef, PassState, ShaderRef, StateObject};
use crate::shader::{ResourceBinding, ResourceTarget, ShaderPayload};
use crate::variable::object::{shader_payload, state_object};
use crate::variable::{Payload, VariableKind, VariableNode};

pub(crate) fn apply_pass(effect: &EffectInner, state: &PassState) -> Result<(), EffectError> {
    for (stage, shader) in [
        (ShaderStage::Vertex, state.vs),
        (ShaderStage::Geometry, state.gs),
        (ShaderStage::Pixel, state.ps),
    ] {
        apply_shader(effect, stage, shader)?;
    }

    let device = effect.device();
    if let Some(rasterizer) = state_handle(effect, state.rasterizer, |object| match object {
        StateObject::Rasterizer { handle, .. } => Some(*handle),
        _ => None,
    })? {
        device.set_rasterizer_state(rasterizer);
    }
    if let Some(depth_stencil) = state_handle(effect, state.depth_stencil, |object| match object {
        StateObject::DepthStencil { handle, .. } => Some(*handle),
        _ => None,
    })? {
        device.set_depth_stencil_state(depth_stencil, state.stencil_ref);
    }
    if let Some(blend) = state_handle(effect, state.blend, |object| match object {
        StateObject::Blend { handle, .. } => Some(*handle),
        _ => None,
    })? {
        device.set_blend_state(blend, state.blend_factor, state.sample_mask);
    }
    Ok(())
}

/// Resolves a pass's state reference: `None` leaves the pipeline alone, `Some(None)` unbinds.
fn state_handle<H>(
    effect: &EffectInner,
    object: ObjectRef,
    pick: impl Fn(&StateObject) -> Option<H>,
) -> Result<Option<Option<H>>, EffectError> {
    match object {
        ObjectRef::Unset => Ok(None),
        ObjectRef::Placeholder => Ok(Some(None)),
        ObjectRef::Variable(loc) => {
            let (owner, id) = effect
                .resolve(loc)
                .ok_or(EffectError::InvalidUsage("pass references a missing state variable"))?;
            let object = state_object(owner, owner.graph.node(id))?;
            pick(object)
                .map(|handle| Some(Some(handle)))
                .ok_or(EffectError::InvalidUsage("pass state has the wrong kind"))
        }
    }
}

fn apply_shader(effect: &EffectInner, stage: ShaderStage, shader: ShaderRef) -> Result<(), EffectError> {
    let loc = match shader.object {
        ObjectRef::Unset => return Ok(()),
        ObjectRef::Placeholder => {
            effect.device().set_shader(stage, None);
            return Ok(());
        }
        ObjectRef::Variable(loc) => loc,
    };
    let (owner, id) = effect
        .resolve(loc)
        .ok_or(EffectError::InvalidUsage("pass references a missing shader variable"))?;
    let mut node = owner.graph.node(id);
    if !node.elements.is_empty() {
        let element = node
            .elements
            .get(shader.index as usize)
            .ok_or(EffectError::InvalidUsage("pass shader index is out of range"))?;
        node = owner.graph.node(*element);
    }
    let payload = shader_payload(owner, node)?;
    if payload.stage != stage {
        return Err(EffectError::InvalidUsage("pass binds a shader to the wrong stage"));
    }

    trace!(?stage, shader = ?payload.shader, resources = payload.resources.len(), "binding shader");
    effect.device().set_shader(stage, payload.shader);
    bind_resources(effect, owner, stage, payload)
}

/// Binds `payload`'s resources; references in it are relative to `owner`.
fn bind_resources(
    effect: &EffectInner,
    owner: &EffectInner,
    stage: ShaderStage,
    payload: &ShaderPayload,
) -> Result<(), EffectError> {
    let device = effect.device().as_ref();
    for binding in &payload.resources {
        match binding.target {
            ResourceTarget::Buffer(buffer_owner, index) => {
                let buffer_effect = owner
                    .owner(buffer_owner)
                    .ok_or(EffectError::InvalidUsage("shader references a missing pool"))?;
                let kind = buffer_effect
                    .graph
                    .buffers
                    .get(index)
                    .map(|b| b.kind)
                    .ok_or(EffectError::InvalidUsage("shader references a missing buffer"))?;

                let mut state = buffer_effect.state();
                let buffer = state
                    .buffers
                    .get_mut(index)
                    .ok_or(EffectError::InvalidUsage("shader references a missing buffer"))?;
                if buffer.dirty && buffer.buffer_override.is_none() {
                    if let Some(handle) = buffer.buffer {
                        trace!(buffer = handle.0, size = buffer.bytes.len(), "uploading dirty buffer");
                        buffer_effect.device().update_buffer(handle, &buffer.bytes);
                    }
                    buffer.dirty = false;
                }
                match kind {
                    BufferKind::Constant => device.set_constant_buffers(
                        stage,
                        binding.bind_point,
                        &[buffer.buffer_override.or(buffer.buffer)],
                    ),
                    BufferKind::Texture => device.set_shader_resources(
                        stage,
                        binding.bind_point,
                        &[buffer.view_override.or(buffer.view)],
                    ),
                }
            }
            ResourceTarget::Variable(loc) => {
                let Some((variable_effect, id)) = owner.resolve(loc) else {
                    return Err(EffectError::InvalidUsage("shader references a missing variable"));
                };
                let node = variable_effect.graph.node(id);
                match binding.input_type {
                    ShaderInputType::Sampler => bind_samplers(device, variable_effect, node, stage, binding),
                    _ => bind_textures(device, variable_effect, node, stage, binding),
                }
            }
        }
    }
    Ok(())
}

fn bind_textures(
    device: &dyn Device,
    effect: &EffectInner,
    node: &VariableNode,
    stage: ShaderStage,
    binding: &ResourceBinding,
) {
    let count = binding.bind_count.max(1) as usize;
    let views: Vec<Option<ShaderResourceViewHandle>> = match node.kind {
        VariableKind::ShaderResource => {
            let Payload::Resource(first) = node.payload else {
                return;
            };
            let available = node.elements.len().max(1);
            let state = effect.state();
            (0..count)
                .map(|j| if j < available { state.resources.get(first + j).copied().flatten() } else { None })
                .collect()
        }
        // A texture declared through its sampler binds the sampler's texture.
        VariableKind::Sampler => (0..count)
            .map(|j| sampler_texture(effect, element_or_self(effect, node, j)?))
            .collect(),
        other => {
            warn!(kind = ?other, slot = binding.bind_point, "reflected texture is not a texture variable, skipped");
            return;
        }
    };
    device.set_shader_resources(stage, binding.bind_point, &views);
}

fn element_or_self<'e>(effect: &'e EffectInner, node: &'e VariableNode, index: usize) -> Option<&'e VariableNode> {
    if node.elements.is_empty() {
        (index == 0).then_some(node)
    } else {
        node.elements.get(index).map(|&id| effect.graph.node(id))
    }
}

/// The view bound to the texture a sampler names.
fn sampler_texture(effect: &EffectInner, sampler: &VariableNode) -> Option<ShaderResourceViewHandle> {
    let StateObject::Sampler {
        texture: ObjectRef::Variable(loc),
        ..
    } = state_object(effect, sampler).ok()?
    else {
        return None;
    };
    let (texture_effect, id) = effect.resolve(*loc)?;
    let Payload::Resource(slot) = texture_effect.graph.node(id).payload else {
        return None;
    };
    let state = texture_effect.state();
    state.resources.get(slot).copied().flatten()
}

fn bind_samplers(
    device: &dyn Device,
    effect: &EffectInner,
    node: &VariableNode,
    stage: ShaderStage,
    binding: &ResourceBinding,
) {
    if node.kind != VariableKind::Sampler {
        warn!(kind = ?node.kind, slot = binding.bind_point, "reflected sampler is not a sampler variable, skipped");
        return;
    }
    let sampler = |node: &VariableNode| -> Option<SamplerStateHandle> {
        match state_object(effect, node).ok()? {
            StateObject::Sampler { handle, .. } => Some(*handle),
            _ => None,
        }
    };
    let samplers: Vec<Option<SamplerStateHandle>> = if node.elements.is_empty() {
        vec![sampler(node)]
    } else {
        let count = (binding.bind_count as usize).min(node.elements.len());
        node.elements[..count]
            .iter()
            .map(|&id| sampler(effect.graph.node(id)))
            .collect()
    };
    device.set_samplers(stage, binding.bind_point, &samplers);
}
