//! The device an effect creates its objects on and applies passes to.
//!
//! The effect never talks to a graphics API directly: it asks a [`Device`] to
//! create buffers, views, shaders and state objects, and to bind them per
//! stage and slot. Every created object is identified by an opaque handle and
//! released through [`Device::release`] when the owning effect is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::state::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc};
use crate::stream_output::StreamOutputEntry;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

device_handle!(
    /// A GPU buffer.
    BufferHandle
);
device_handle!(
    /// A shader resource view (texture or buffer).
    ShaderResourceViewHandle
);
device_handle!(
    /// A render target view.
    RenderTargetViewHandle
);
device_handle!(
    /// A depth-stencil view.
    DepthStencilViewHandle
);
device_handle!(
    /// A vertex, geometry or pixel shader.
    ShaderHandle
);
device_handle!(
    /// Rasterizer state object.
    RasterizerStateHandle
);
device_handle!(
    /// Depth-stencil state object.
    DepthStencilStateHandle
);
device_handle!(
    /// Blend state object.
    BlendStateHandle
);
device_handle!(
    /// Sampler state object.
    SamplerStateHandle
);

/// Any object an effect can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum DeviceObject {
    Buffer(BufferHandle),
    ShaderResourceView(ShaderResourceViewHandle),
    Shader(ShaderHandle),
    RasterizerState(RasterizerStateHandle),
    DepthStencilState(DepthStencilStateHandle),
    BlendState(BlendStateHandle),
    SamplerState(SamplerStateHandle),
}

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage.
    Vertex,
    /// Geometry shader stage.
    Geometry,
    /// Pixel shader stage.
    Pixel,
}

/// How a buffer is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferBinding {
    /// `cbuffer`.
    ConstantBuffer,
    /// `tbuffer`, read through a shader resource view.
    ShaderResource,
}

/// Parameters for [`Device::create_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes.
    pub byte_width: u32,
    /// Bind flags.
    pub binding: BufferBinding,
}

/// Parameters for a view over a buffer of `R32G32B32A32_FLOAT` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferViewDesc {
    /// First element.
    pub first_element: u32,
    /// Number of 16-byte elements.
    pub element_count: u32,
}

/// The device refused an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device error: {message}")]
pub struct DeviceError {
    /// What failed.
    pub message: String,
}

impl DeviceError {
    /// A device error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Object creation and state binding.
///
/// All methods take `&self`; implementations use interior mutability where they
/// need it. Binding calls never fail.
pub trait Device: Send + Sync {
    /// Creates a buffer; `initial_data` is `byte_width` bytes when present.
    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferHandle, DeviceError>;

    /// Creates a shader resource view over `buffer`.
    fn create_buffer_view(
        &self,
        buffer: BufferHandle,
        desc: &BufferViewDesc,
    ) -> Result<ShaderResourceViewHandle, DeviceError>;

    /// Creates a vertex shader.
    fn create_vertex_shader(&self, bytecode: &[u8]) -> Result<ShaderHandle, DeviceError>;

    /// Creates a pixel shader.
    fn create_pixel_shader(&self, bytecode: &[u8]) -> Result<ShaderHandle, DeviceError>;

    /// Creates a geometry shader.
    fn create_geometry_shader(&self, bytecode: &[u8]) -> Result<ShaderHandle, DeviceError>;

    /// Creates a geometry shader that streams its output to buffers.
    fn create_geometry_shader_with_stream_output(
        &self,
        bytecode: &[u8],
        entries: &[StreamOutputEntry],
        stride: u32,
    ) -> Result<ShaderHandle, DeviceError>;

    /// Creates a rasterizer state object.
    fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> Result<RasterizerStateHandle, DeviceError>;

    /// Creates a depth-stencil state object.
    fn create_depth_stencil_state(&self, desc: &DepthStencilDesc)
        -> Result<DepthStencilStateHandle, DeviceError>;

    /// Creates a blend state object.
    fn create_blend_state(&self, desc: &BlendDesc) -> Result<BlendStateHandle, DeviceError>;

    /// Creates a sampler state object.
    fn create_sampler_state(&self, desc: &SamplerDesc) -> Result<SamplerStateHandle, DeviceError>;

    /// Replaces the whole contents of `buffer`.
    fn update_buffer(&self, buffer: BufferHandle, data: &[u8]);

    /// Binds a shader, or unbinds the stage with `None`.
    fn set_shader(&self, stage: ShaderStage, shader: Option<ShaderHandle>);

    /// Binds constant buffers to consecutive slots.
    fn set_constant_buffers(&self, stage: ShaderStage, start_slot: u32, buffers: &[Option<BufferHandle>]);

    /// Binds shader resource views to consecutive slots.
    fn set_shader_resources(
        &self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[Option<ShaderResourceViewHandle>],
    );

    /// Binds samplers to consecutive slots.
    fn set_samplers(&self, stage: ShaderStage, start_slot: u32, samplers: &[Option<SamplerStateHandle>]);

    /// Binds the rasterizer state.
    fn set_rasterizer_state(&self, state: Option<RasterizerStateHandle>);

    /// Binds the depth-stencil state together with the stencil reference value.
    fn set_depth_stencil_state(&self, state: Option<DepthStencilStateHandle>, stencil_ref: u32);

    /// Binds the blend state together with the blend factor and sample mask.
    fn set_blend_state(&self, state: Option<BlendStateHandle>, blend_factor: [f32; 4], sample_mask: u32);

    /// Releases an object the effect created.
    fn release(&self, object: DeviceObject) {
        let _ = object;
    }
}

/// Device that hands out fresh handles and binds nothing.
#[derive(Debug, Default)]
pub struct NullDevice {
    next: AtomicU64,
}

impl NullDevice {
    /// A new device; the first handle is `1`.
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Device for NullDevice {
    fn create_buffer(&self, _desc: &BufferDesc, _initial_data: Option<&[u8]>) -> Result<BufferHandle, DeviceError> {
        Ok(BufferHandle(self.next()))
    }

    fn create_buffer_view(
        &self,
        _buffer: BufferHandle,
        _desc: &BufferViewDesc,
    ) -> Result<ShaderResourceViewHandle, DeviceError> {
        Ok(ShaderResourceViewHandle(self.next()))
    }

    fn create_vertex_shader(&self, _bytecode: &[u8]) -> Result<ShaderHandle, DeviceError> {
        Ok(ShaderHandle(self.next()))
    }

    fn create_pixel_shader(&self, _bytecode: &[u8]) -> Result<ShaderHandle, DeviceError> {
        Ok(ShaderHandle(self.next()))
    }

    fn create_geometry_shader(&self, _bytecode: &[u8]) -> Result<ShaderHandle, DeviceError> {
        Ok(ShaderHandle(self.next()))
    }

    fn create_geometry_shader_with_stream_output(
        &self,
        _bytecode: &[u8],
        _entries: &[StreamOutputEntry],
        _stride: u32,
    ) -> Result<ShaderHandle, DeviceError> {
        Ok(ShaderHandle(self.next()))
    }

    fn create_rasterizer_state(&self, _desc: &RasterizerDesc) -> Result<RasterizerStateHandle, DeviceError> {
        Ok(RasterizerStateHandle(self.next()))
    }

    fn create_depth_stencil_state(
        &self,
        _desc: &DepthStencilDesc,
    ) -> Result<DepthStencilStateHandle, DeviceError> {
        Ok(DepthStencilStateHandle(self.next()))
    }

    fn create_blend_state(&self, _desc: &BlendDesc) -> Result<BlendStateHandle, DeviceError> {
        Ok(BlendStateHandle(self.next()))
    }

    fn create_sampler_state(&self, _desc: &SamplerDesc) -> Result<SamplerStateHandle, DeviceError> {
        Ok(SamplerStateHandle(self.next()))
    }

    fn update_buffer(&self, _buffer: BufferHandle, _data: &[u8]) {}

    fn set_shader(&self, _stage: ShaderStage, _shader: Option<ShaderHandle>) {}

    fn set_constant_buffers(&self, _stage: ShaderStage, _start_slot: u32, _buffers: &[Option<BufferHandle>]) {}

    fn set_shader_resources(
        &self,
        _stage: ShaderStage,
        _start_slot: u32,
        _views: &[Option<ShaderResourceViewHandle>],
    ) {
    }

    fn set_samplers(&self, _stage: ShaderStage, _start_slot: u32, _samplers: &[Option<SamplerStateHandle>]) {}

    fn set_rasterizer_state(&self, _state: Option<RasterizerStateHandle>) {}

    fn set_depth_stencil_state(&self, _state: Option<DepthStencilStateHandle>, _stencil_ref: u32) {}

    fn set_blend_state(&self, _state: Option<BlendStateHandle>, _blend_factor: [f32; 4], _sample_mask: u32) {}
}

/// Device objects owned by one effect, released when dropped.
///
/// Creation goes through here so that a parse that fails halfway still releases
/// everything it created.
pub(crate) struct OwnedObjects {
    device: std::sync::Arc<dyn Device>,
    objects: Vec<DeviceObject>,
}

impl OwnedObjects {
    pub(crate) fn new(device: std::sync::Arc<dyn Device>) -> Self {
        Self {
            device,
            objects: Vec::new(),
        }
    }

    pub(crate) fn device(&self) -> &std::sync::Arc<dyn Device> {
        &self.device
    }

    pub(crate) fn track(&mut self, object: DeviceObject) {
        self.objects.push(object);
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }
}

impl Drop for OwnedObjects {
    fn drop(&mut self) {
        // Reverse creation order: views before the buffers they reference.
        for object in self.objects.drain(..).rev() {
            self.device.release(object);
        }
    }
}

impl core::fmt::Debug for OwnedObjects {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OwnedObjects")
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_device_hands_out_distinct_handles() {
        let device = NullDevice::new();
        let a = device.create_vertex_shader(&[]).unwrap();
        let b = device.create_pixel_shader(&[]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, ShaderHandle(1));
    }
}
