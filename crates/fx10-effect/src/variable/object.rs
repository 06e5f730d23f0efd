//! Handles for object variables: strings, views, buffers, shaders and state objects.

use crate::device::{
    BlendStateHandle, BufferHandle, DepthStencilStateHandle, DepthStencilViewHandle,
    RasterizerStateHandle, RenderTargetViewHandle, SamplerStateHandle, ShaderHandle,
    ShaderResourceViewHandle, ShaderStage,
};
use crate::effect::EffectInner;
use crate::error::EffectError;
use crate::graph::{BufferKind, BufferState, EffectState, ObjectRef, StateObject};
use crate::shader::{EffectShaderDesc, ShaderPayload, ShaderReflection, SignatureParameterDesc};
use crate::state::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc};

use super::{EffectVariable, Payload, VariableInterface, VariableNode};

typed_variable!(
    /// A string or array of strings. Strings are read-only.
    StringVariable,
    String
);

impl<'a> StringVariable<'a> {
    /// The string, or `None` for an empty initializer.
    pub fn get_string(&self) -> Result<Option<&'a str>, EffectError> {
        let (_, node) = self.0.element_node(0)?;
        match &node.payload {
            Payload::String(s) => Ok(s.as_deref()),
            _ => Err(EffectError::InvalidUsage("variable holds no string")),
        }
    }

    /// Reads `out.len()` strings starting at element `offset`.
    pub fn get_string_array(&self, out: &mut [Option<&'a str>], offset: u32) -> Result<(), EffectError> {
        for (i, slot) in out.iter_mut().enumerate() {
            let (_, node) = self.0.element_node(offset.saturating_add(i as u32))?;
            *slot = match &node.payload {
                Payload::String(s) => s.as_deref(),
                _ => return Err(EffectError::InvalidUsage("variable holds no string")),
            };
        }
        Ok(())
    }
}

/// Selects one kind of view slot in the effect state.
trait ViewSlots {
    type Handle: Copy;

    fn first(payload: &Payload) -> Option<usize>;

    fn slots(state: &mut EffectState) -> &mut Vec<Option<Self::Handle>>;
}

struct ResourceSlots;
struct RenderTargetSlots;
struct DepthStencilViewSlots;

impl ViewSlots for ResourceSlots {
    type Handle = ShaderResourceViewHandle;

    fn first(payload: &Payload) -> Option<usize> {
        match *payload {
            Payload::Resource(first) => Some(first),
            _ => None,
        }
    }

    fn slots(state: &mut EffectState) -> &mut Vec<Option<Self::Handle>> {
        &mut state.resources
    }
}

impl ViewSlots for RenderTargetSlots {
    type Handle = RenderTargetViewHandle;

    fn first(payload: &Payload) -> Option<usize> {
        match *payload {
            Payload::RenderTarget(first) => Some(first),
            _ => None,
        }
    }

    fn slots(state: &mut EffectState) -> &mut Vec<Option<Self::Handle>> {
        &mut state.render_targets
    }
}

impl ViewSlots for DepthStencilViewSlots {
    type Handle = DepthStencilViewHandle;

    fn first(payload: &Payload) -> Option<usize> {
        match *payload {
            Payload::DepthStencilView(first) => Some(first),
            _ => None,
        }
    }

    fn slots(state: &mut EffectState) -> &mut Vec<Option<Self::Handle>> {
        &mut state.depth_stencil_views
    }
}

/// Locks the owning effect and hands `f` the variable's slots `offset..offset + len`.
fn with_view_slots<S: ViewSlots, R>(
    variable: &EffectVariable<'_>,
    offset: u32,
    len: usize,
    f: impl FnOnce(&mut [Option<S::Handle>]) -> R,
) -> Result<R, EffectError> {
    let (effect, node) = variable.require("view access on an invalid variable")?;
    let first = S::first(&node.payload).ok_or(EffectError::InvalidUsage("variable has no view slots"))?;
    let count = node.elements.len().max(1);
    let start = offset as usize;
    if start.saturating_add(len) > count {
        return Err(EffectError::InvalidUsage("view array range is out of bounds"));
    }
    let mut state = effect.state();
    let slots = S::slots(&mut state)
        .get_mut(first + start..first + start + len)
        .ok_or(EffectError::InvalidUsage("view slots do not exist"))?;
    Ok(f(slots))
}

macro_rules! view_accessors {
    ($slots:ty, $handle:ty, $set:ident, $get:ident, $set_array:ident, $get_array:ident) => {
        /// Binds `view` to the variable (element zero of an array).
        pub fn $set(&self, view: Option<$handle>) -> Result<(), EffectError> {
            with_view_slots::<$slots, _>(&self.0, 0, 1, |slots| slots[0] = view)
        }

        /// The view bound to the variable (element zero of an array).
        pub fn $get(&self) -> Result<Option<$handle>, EffectError> {
            with_view_slots::<$slots, _>(&self.0, 0, 1, |slots| slots[0])
        }

        /// Binds `views` to elements `offset..`.
        pub fn $set_array(&self, views: &[Option<$handle>], offset: u32) -> Result<(), EffectError> {
            with_view_slots::<$slots, _>(&self.0, offset, views.len(), |slots| slots.copy_from_slice(views))
        }

        /// Reads the views bound to elements `offset..`.
        pub fn $get_array(&self, views: &mut [Option<$handle>], offset: u32) -> Result<(), EffectError> {
            with_view_slots::<$slots, _>(&self.0, offset, views.len(), |slots| views.copy_from_slice(slots))
        }
    };
}

typed_variable!(
    /// A texture or typed buffer variable, or an array of them.
    ShaderResourceVariable,
    ShaderResource
);

impl ShaderResourceVariable<'_> {
    view_accessors!(
        ResourceSlots,
        ShaderResourceViewHandle,
        set_resource,
        get_resource,
        set_resource_array,
        get_resource_array
    );
}

typed_variable!(
    /// A render target view variable.
    RenderTargetViewVariable,
    RenderTargetView
);

impl RenderTargetViewVariable<'_> {
    view_accessors!(
        RenderTargetSlots,
        RenderTargetViewHandle,
        set_render_target,
        get_render_target,
        set_render_target_array,
        get_render_target_array
    );
}

typed_variable!(
    /// A depth-stencil view variable.
    DepthStencilViewVariable,
    DepthStencilView
);

impl DepthStencilViewVariable<'_> {
    view_accessors!(
        DepthStencilViewSlots,
        DepthStencilViewHandle,
        set_depth_stencil,
        get_depth_stencil,
        set_depth_stencil_array,
        get_depth_stencil_array
    );
}

typed_variable!(
    /// A `cbuffer` or `tbuffer`.
    ConstantBufferVariable,
    ConstantBuffer
);

impl ConstantBufferVariable<'_> {
    fn with_buffer<R>(
        &self,
        kind: BufferKind,
        f: impl FnOnce(&mut BufferState) -> R,
    ) -> Result<R, EffectError> {
        let (effect, node) = self.0.require("buffer access on an invalid variable")?;
        let Payload::Buffer(index) = node.payload else {
            return Err(EffectError::InvalidUsage("variable is not a buffer"));
        };
        let buffer_kind = effect
            .graph
            .buffers
            .get(index)
            .map(|b| b.kind)
            .ok_or(EffectError::InvalidUsage("buffer does not exist"))?;
        if buffer_kind != kind {
            return Err(EffectError::InvalidUsage(match kind {
                BufferKind::Constant => "texture buffer used as a constant buffer",
                BufferKind::Texture => "constant buffer used as a texture buffer",
            }));
        }
        let mut state = effect.state();
        let buffer = state
            .buffers
            .get_mut(index)
            .ok_or(EffectError::InvalidUsage("buffer does not exist"))?;
        Ok(f(buffer))
    }

    /// Binds `buffer` in place of the effect's own constant buffer; `None`
    /// restores it. The effect stops uploading while an override is set.
    pub fn set_constant_buffer(&self, buffer: Option<BufferHandle>) -> Result<(), EffectError> {
        self.with_buffer(BufferKind::Constant, |state| state.buffer_override = buffer)
    }

    /// The buffer bound for this `cbuffer`.
    pub fn get_constant_buffer(&self) -> Result<Option<BufferHandle>, EffectError> {
        self.with_buffer(BufferKind::Constant, |state| state.buffer_override.or(state.buffer))
    }

    /// Binds `view` in place of the effect's own `tbuffer` view; `None` restores it.
    pub fn set_texture_buffer(&self, view: Option<ShaderResourceViewHandle>) -> Result<(), EffectError> {
        self.with_buffer(BufferKind::Texture, |state| state.view_override = view)
    }

    /// The view bound for this `tbuffer`.
    pub fn get_texture_buffer(&self) -> Result<Option<ShaderResourceViewHandle>, EffectError> {
        self.with_buffer(BufferKind::Texture, |state| state.view_override.or(state.view))
    }
}

typed_variable!(
    /// A vertex, geometry or pixel shader, or an array of them.
    ShaderVariable,
    Shader
);

impl<'a> ShaderVariable<'a> {
    fn payload(&self, index: u32) -> Result<&'a ShaderPayload, EffectError> {
        let (effect, node) = self.0.element_node(index)?;
        shader_payload(effect, node)
    }

    /// Describes shader `index` of the variable.
    pub fn shader_desc(&self, index: u32) -> Result<EffectShaderDesc, EffectError> {
        Ok(self.payload(index)?.desc())
    }

    fn staged(&self, index: u32, stage: ShaderStage) -> Result<Option<ShaderHandle>, EffectError> {
        let payload = self.payload(index)?;
        if payload.stage != stage {
            return Err(EffectError::InvalidUsage("shader belongs to another stage"));
        }
        Ok(payload.shader)
    }

    /// The vertex shader object; `None` for the null shader.
    pub fn vertex_shader(&self, index: u32) -> Result<Option<ShaderHandle>, EffectError> {
        self.staged(index, ShaderStage::Vertex)
    }

    /// The pixel shader object.
    pub fn pixel_shader(&self, index: u32) -> Result<Option<ShaderHandle>, EffectError> {
        self.staged(index, ShaderStage::Pixel)
    }

    /// The geometry shader object.
    pub fn geometry_shader(&self, index: u32) -> Result<Option<ShaderHandle>, EffectError> {
        self.staged(index, ShaderStage::Geometry)
    }

    fn signature_element(
        &self,
        shader_index: u32,
        element: u32,
        pick: impl FnOnce(&'a ShaderReflection) -> &'a [SignatureParameterDesc],
    ) -> Result<SignatureParameterDesc, EffectError> {
        let reflection = self
            .payload(shader_index)?
            .reflection
            .as_ref()
            .ok_or(EffectError::InvalidUsage("shader reflection is not available"))?;
        pick(reflection)
            .get(element as usize)
            .cloned()
            .ok_or(EffectError::InvalidUsage("signature element index out of range"))
    }

    /// Entry `element` of the input signature of shader `shader_index`.
    pub fn input_signature_element_desc(
        &self,
        shader_index: u32,
        element: u32,
    ) -> Result<SignatureParameterDesc, EffectError> {
        self.signature_element(shader_index, element, |r| r.inputs.as_slice())
    }

    /// Entry `element` of the output signature of shader `shader_index`.
    pub fn output_signature_element_desc(
        &self,
        shader_index: u32,
        element: u32,
    ) -> Result<SignatureParameterDesc, EffectError> {
        self.signature_element(shader_index, element, |r| r.outputs.as_slice())
    }
}

pub(crate) fn shader_payload<'a>(
    effect: &'a EffectInner,
    node: &'a VariableNode,
) -> Result<&'a ShaderPayload, EffectError> {
    match node.payload {
        Payload::Shader(index) => effect
            .graph
            .shaders
            .get(index)
            .ok_or(EffectError::InvalidUsage("shader does not exist")),
        _ => Err(EffectError::InvalidUsage("variable holds no shader")),
    }
}

pub(crate) fn state_object<'a>(
    effect: &'a EffectInner,
    node: &'a VariableNode,
) -> Result<&'a StateObject, EffectError> {
    match node.payload {
        Payload::State(index) => effect
            .graph
            .states
            .get(index)
            .ok_or(EffectError::InvalidUsage("state object does not exist")),
        _ => Err(EffectError::InvalidUsage("variable holds no state object")),
    }
}

macro_rules! state_accessors {
    ($name:ident, $variant:ident, $desc:ty, $handle:ty, $getter:ident) => {
        impl<'a> $name<'a> {
            fn object(&self, index: u32) -> Result<(&'a $desc, $handle), EffectError> {
                let (effect, node) = self.0.element_node(index)?;
                match state_object(effect, node)? {
                    StateObject::$variant { desc, handle, .. } => Ok((desc, *handle)),
                    _ => Err(EffectError::InvalidUsage("state object has another kind")),
                }
            }

            /// The description state object `index` was created from.
            pub fn backing_store(&self, index: u32) -> Result<$desc, EffectError> {
                self.object(index).map(|(desc, _)| desc.clone())
            }

            /// The device state object at `index`.
            pub fn $getter(&self, index: u32) -> Result<$handle, EffectError> {
                self.object(index).map(|(_, handle)| handle)
            }
        }
    };
}

typed_variable!(
    /// A blend state variable.
    BlendVariable,
    Blend
);
state_accessors!(BlendVariable, Blend, BlendDesc, BlendStateHandle, blend_state);

typed_variable!(
    /// A depth-stencil state variable.
    DepthStencilVariable,
    DepthStencil
);
state_accessors!(
    DepthStencilVariable,
    DepthStencil,
    DepthStencilDesc,
    DepthStencilStateHandle,
    depth_stencil_state
);

typed_variable!(
    /// A rasterizer state variable.
    RasterizerVariable,
    Rasterizer
);
state_accessors!(
    RasterizerVariable,
    Rasterizer,
    RasterizerDesc,
    RasterizerStateHandle,
    rasterizer_state
);

typed_variable!(
    /// A sampler state variable.
    SamplerVariable,
    Sampler
);
state_accessors!(SamplerVariable, Sampler, SamplerDesc, SamplerStateHandle, sampler);

impl<'a> SamplerVariable<'a> {
    /// The texture the sampler's `Texture` assignment names; invalid when it has none.
    pub fn default_texture(&self, index: u32) -> ShaderResourceVariable<'a> {
        let texture = self.0.element_node(index).ok().and_then(|(effect, node)| {
            match state_object(effect, node).ok()? {
                StateObject::Sampler {
                    texture: ObjectRef::Variable(loc),
                    ..
                } => {
                    let (owner, id) = effect.resolve(*loc)?;
                    Some(EffectVariable::new(owner, id))
                }
                _ => None,
            }
        });
        texture.unwrap_or_else(EffectVariable::invalid).as_shader_resource()
    }
}
