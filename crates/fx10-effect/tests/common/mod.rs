#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use fx10_effect::device::{
    BlendStateHandle, BufferDesc, BufferHandle, BufferViewDesc, DepthStencilStateHandle, DeviceObject,
    RasterizerStateHandle, SamplerStateHandle, ShaderHandle, ShaderResourceViewHandle,
};
use fx10_effect::state::{BlendDesc, DepthStencilDesc, RasterizerDesc, SamplerDesc};
use fx10_effect::stream_output::StreamOutputEntry;
use fx10_effect::{Device, DeviceError, ShaderStage};

/// A binding or upload the effect issued.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UpdateBuffer(BufferHandle, Vec<u8>),
    SetShader(ShaderStage, Option<ShaderHandle>),
    SetConstantBuffers(ShaderStage, u32, Vec<Option<BufferHandle>>),
    SetShaderResources(ShaderStage, u32, Vec<Option<ShaderResourceViewHandle>>),
    SetSamplers(ShaderStage, u32, Vec<Option<SamplerStateHandle>>),
    SetRasterizer(Option<RasterizerStateHandle>),
    SetDepthStencil(Option<DepthStencilStateHandle>, u32),
    SetBlend(Option<BlendStateHandle>, [f32; 4], u32),
}

/// A geometry shader created with a stream-output declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutputShader {
    pub handle: ShaderHandle,
    pub entries: Vec<StreamOutputEntry>,
    pub stride: u32,
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<Call>,
    created: Vec<DeviceObject>,
    released: Vec<DeviceObject>,
    initial_data: Vec<(BufferHandle, Option<Vec<u8>>)>,
    stream_output: Vec<StreamOutputShader>,
    rasterizers: Vec<RasterizerDesc>,
    samplers: Vec<SamplerDesc>,
}

/// Device that records everything it is asked to do.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next: AtomicU64,
    log: Mutex<Log>,
    /// Creation calls left before the device starts refusing; `None` never fails.
    fail_after: Mutex<Option<usize>>,
}

impl RecordingDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A device that refuses the creation call after the first `successes`.
    pub fn failing_after(successes: usize) -> Arc<Self> {
        let device = Self::default();
        *device.fail_after.lock().unwrap() = Some(successes);
        Arc::new(device)
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }

    fn create(&self, wrap: impl FnOnce(u64) -> DeviceObject) -> Result<u64, DeviceError> {
        let mut remaining = self.fail_after.lock().unwrap();
        if let Some(left) = remaining.as_mut() {
            if *left == 0 {
                return Err(DeviceError::new("out of memory"));
            }
            *left -= 1;
        }
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.log().created.push(wrap(id));
        Ok(id)
    }

    fn record(&self, call: Call) {
        self.log().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.log().calls.clear();
    }

    pub fn created(&self) -> Vec<DeviceObject> {
        self.log().created.clone()
    }

    pub fn released(&self) -> Vec<DeviceObject> {
        self.log().released.clone()
    }

    pub fn uploads(&self) -> usize {
        self.log()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::UpdateBuffer(..)))
            .count()
    }

    pub fn initial_data(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.log()
            .initial_data
            .iter()
            .find(|(b, _)| *b == buffer)
            .and_then(|(_, data)| data.clone())
    }

    pub fn stream_output_shaders(&self) -> Vec<StreamOutputShader> {
        self.log().stream_output.clone()
    }

    pub fn rasterizer_descs(&self) -> Vec<RasterizerDesc> {
        self.log().rasterizers.clone()
    }

    pub fn sampler_descs(&self) -> Vec<SamplerDesc> {
        self.log().samplers.clone()
    }
}

impl Device for RecordingDevice {
    fn create_buffer(&self, _desc: &BufferDesc, initial_data: Option<&[u8]>) -> Result<BufferHandle, DeviceError> {
        let handle = BufferHandle(self.create(|id| DeviceObject::Buffer(BufferHandle(id)))?);
        self.log().initial_data.push((handle, initial_data.map(<[u8]>::to_vec)));
        Ok(handle)
    }

    fn create_buffer_view(
        &self,
        _buffer: BufferHandle,
        _desc: &BufferViewDesc,
    ) -> Result<ShaderResourceViewHandle, DeviceError> {
        self.create(|id| DeviceObject::ShaderResourceView(ShaderResourceViewHandle(id)))
            .map(ShaderResourceViewHandle)
    }

    fn create_vertex_shader(&self, _bytecode: &[u8]) -> Result<ShaderHandle, DeviceError> {
        self.create(|id| DeviceObject::Shader(ShaderHandle(id))).map(ShaderHandle)
    }

    fn create_pixel_shader(&self, _bytecode: &[u8]) -> Result<ShaderHandle, DeviceError> {
        self.create(|id| DeviceObject::Shader(ShaderHandle(id))).map(ShaderHandle)
    }

    fn create_geometry_shader(&self, _bytecode: &[u8]) -> Result<ShaderHandle, DeviceError> {
        self.create(|id| DeviceObject::Shader(ShaderHandle(id))).map(ShaderHandle)
    }

    fn create_geometry_shader_with_stream_output(
        &self,
        _bytecode: &[u8],
        entries: &[StreamOutputEntry],
        stride: u32,
    ) -> Result<ShaderHandle, DeviceError> {
        let handle = ShaderHandle(self.create(|id| DeviceObject::Shader(ShaderHandle(id)))?);
        self.log().stream_output.push(StreamOutputShader {
            handle,
            entries: entries.to_vec(),
            stride,
        });
        Ok(handle)
    }

    fn create_rasterizer_state(&self, desc: &RasterizerDesc) -> Result<RasterizerStateHandle, DeviceError> {
        let id = self.create(|id| DeviceObject::RasterizerState(RasterizerStateHandle(id)))?;
        self.log().rasterizers.push(*desc);
        Ok(RasterizerStateHandle(id))
    }

    fn create_depth_stencil_state(
        &self,
        _desc: &DepthStencilDesc,
    ) -> Result<DepthStencilStateHandle, DeviceError> {
        self.create(|id| DeviceObject::DepthStencilState(DepthStencilStateHandle(id)))
            .map(DepthStencilStateHandle)
    }

    fn create_blend_state(&self, _desc: &BlendDesc) -> Result<BlendStateHandle, DeviceError> {
        self.create(|id| DeviceObject::BlendState(BlendStateHandle(id)))
            .map(BlendStateHandle)
    }

    fn create_sampler_state(&self, desc: &SamplerDesc) -> Result<SamplerStateHandle, DeviceError> {
        let id = self.create(|id| DeviceObject::SamplerState(SamplerStateHandle(id)))?;
        self.log().samplers.push(*desc);
        Ok(SamplerStateHandle(id))
    }

    fn update_buffer(&self, buffer: BufferHandle, data: &[u8]) {
        self.record(Call::UpdateBuffer(buffer, data.to_vec()));
    }

    fn set_shader(&self, stage: ShaderStage, shader: Option<ShaderHandle>) {
        self.record(Call::SetShader(stage, shader));
    }

    fn set_constant_buffers(&self, stage: ShaderStage, start_slot: u32, buffers: &[Option<BufferHandle>]) {
        self.record(Call::SetConstantBuffers(stage, start_slot, buffers.to_vec()));
    }

    fn set_shader_resources(
        &self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[Option<ShaderResourceViewHandle>],
    ) {
        self.record(Call::SetShaderResources(stage, start_slot, views.to_vec()));
    }

    fn set_samplers(&self, stage: ShaderStage, start_slot: u32, samplers: &[Option<SamplerStateHandle>]) {
        self.record(Call::SetSamplers(stage, start_slot, samplers.to_vec()));
    }

    fn set_rasterizer_state(&self, state: Option<RasterizerStateHandle>) {
        self.record(Call::SetRasterizer(state));
    }

    fn set_depth_stencil_state(&self, state: Option<DepthStencilStateHandle>, stencil_ref: u32) {
        self.record(Call::SetDepthStencil(state, stencil_ref));
    }

    fn set_blend_state(&self, state: Option<BlendStateHandle>, blend_factor: [f32; 4], sample_mask: u32) {
        self.record(Call::SetBlend(state, blend_factor, sample_mask));
    }

    fn release(&self, object: DeviceObject) {
        self.log().released.push(object);
    }
}

/// Installs a test subscriber so `RUST_LOG` surfaces parser diagnostics.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
