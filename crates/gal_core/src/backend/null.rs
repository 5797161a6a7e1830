//! Headless backend that creates no GPU objects
//!
//! [`NullBackend`] hands out increasing ids for every object and keeps a
//! ledger of what was created and destroyed. A [`NullBackendProbe`] shares
//! that ledger, so callers can inspect it after the backend moved into a
//! device. Creation of any kind can be made to fail, which is how backend
//! failures are exercised without a driver.
//!
//! [`NullEncoder`] records every command it receives in order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    BackendError, BackendResult, CommandEncoder, DeviceCapabilities, FenceResult, GalBackend, NativeObject,
    SharedTextureType, SwapChainObjects,
};
use crate::descriptors::{
    BindGroupLayoutDesc, BlendStateDesc, BufferDesc, ComputePipelineDesc, DepthStencilStateDesc, GraphicsPipelineDesc,
    PipelineLayoutDesc, PresentMode, RasterizerStateDesc, ReadbackBufferDesc, ReadbackTextureDesc, RenderTargetViewDesc,
    ResourceViewDesc, SamplerStateDesc, ShaderDesc, ShaderResourceBinding, SubresourceData, SwapChainDesc, TextureDesc,
    UnorderedAccessViewDesc, VertexDeclarationDesc,
};
use crate::handles::{
    BufferHandle, ComputePipelineHandle, GraphicsPipelineHandle, ObjectKind, ResourceViewHandle, SamplerStateHandle,
    UnorderedAccessViewHandle,
};

#[derive(Default)]
struct Ledger {
    next_id: u64,
    live: HashMap<u64, ObjectKind>,
    created: HashMap<ObjectKind, u32>,
    destroyed: HashMap<ObjectKind, u32>,
    failing: HashSet<ObjectKind>,
    unknown_destroys: u32,
    buffer_updates: u32,
    frames_begun: u64,
    frames_ended: u64,
    flushes: u32,
    fence_signaled: u64,
    fence_completed: u64,
}

impl Ledger {
    fn create(&mut self, kind: ObjectKind) -> BackendResult<NativeObject> {
        if self.failing.contains(&kind) {
            return Err(BackendError::Rejected(format!("{kind} creation disabled on null backend")));
        }
        self.next_id += 1;
        self.live.insert(self.next_id, kind);
        *self.created.entry(kind).or_default() += 1;
        Ok(NativeObject(self.next_id))
    }
}

/// Backend that tracks object ids without touching a GPU
pub struct NullBackend {
    ledger: Arc<Mutex<Ledger>>,
    capabilities: DeviceCapabilities,
}

impl NullBackend {
    /// Create a backend reporting default capabilities
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    /// Create a backend reporting the given capabilities
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            capabilities,
        }
    }

    /// Get a probe sharing this backend's ledger
    pub fn probe(&self) -> NullBackendProbe {
        NullBackendProbe {
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to a [`NullBackend`] ledger
#[derive(Clone)]
pub struct NullBackendProbe {
    ledger: Arc<Mutex<Ledger>>,
}

impl NullBackendProbe {
    /// Number of objects of `kind` created so far
    pub fn created(&self, kind: ObjectKind) -> u32 {
        self.ledger.lock().created.get(&kind).copied().unwrap_or(0)
    }

    /// Number of objects of `kind` destroyed so far
    pub fn destroyed(&self, kind: ObjectKind) -> u32 {
        self.ledger.lock().destroyed.get(&kind).copied().unwrap_or(0)
    }

    /// Number of objects of `kind` currently alive
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.ledger.lock().live.values().filter(|&&k| k == kind).count()
    }

    /// Number of objects of any kind currently alive
    pub fn live_total(&self) -> usize {
        self.ledger.lock().live.len()
    }

    /// Number of destroy calls for ids that were not alive
    pub fn unknown_destroys(&self) -> u32 {
        self.ledger.lock().unknown_destroys
    }

    /// Number of partial buffer updates
    pub fn buffer_updates(&self) -> u32 {
        self.ledger.lock().buffer_updates
    }

    /// Number of completed frames
    pub fn frames_ended(&self) -> u64 {
        self.ledger.lock().frames_ended
    }

    /// Number of flushes outside frame ends
    pub fn flushes(&self) -> u32 {
        self.ledger.lock().flushes
    }

    /// Make creation of `kind` fail until re-enabled
    pub fn set_creation_fails(&self, kind: ObjectKind, fails: bool) {
        let mut ledger = self.ledger.lock();
        if fails {
            ledger.failing.insert(kind);
        } else {
            ledger.failing.remove(&kind);
        }
    }
}

impl GalBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_blend_state_platform(&mut self, _desc: &BlendStateDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::BlendState)
    }

    fn create_depth_stencil_state_platform(&mut self, _desc: &DepthStencilStateDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::DepthStencilState)
    }

    fn create_rasterizer_state_platform(&mut self, _desc: &RasterizerStateDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::RasterizerState)
    }

    fn create_sampler_state_platform(&mut self, _desc: &SamplerStateDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::SamplerState)
    }

    fn create_shader_platform(&mut self, _desc: &ShaderDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::Shader)
    }

    fn create_bind_group_layout_platform(&mut self, _desc: &BindGroupLayoutDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::BindGroupLayout)
    }

    fn create_pipeline_layout_platform(&mut self, _desc: &PipelineLayoutDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::PipelineLayout)
    }

    fn create_vertex_declaration_platform(
        &mut self,
        desc: &VertexDeclarationDesc,
        shader: &ShaderDesc,
    ) -> BackendResult<NativeObject> {
        // Input layouts are matched against the vertex stage signature.
        if let Some(missing) = shader
            .vertex_inputs
            .iter()
            .find(|input| !desc.attributes.iter().any(|attribute| attribute.semantic == **input))
        {
            return Err(BackendError::Rejected(format!(
                "vertex declaration does not provide shader input {missing:?}"
            )));
        }
        self.ledger.lock().create(ObjectKind::VertexDeclaration)
    }

    fn create_graphics_pipeline_platform(&mut self, _desc: &GraphicsPipelineDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::GraphicsPipeline)
    }

    fn create_compute_pipeline_platform(&mut self, _desc: &ComputePipelineDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::ComputePipeline)
    }

    fn create_buffer_platform(&mut self, _desc: &BufferDesc, _initial_data: &[u8]) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::Buffer)
    }

    fn update_buffer_platform(&mut self, buffer: NativeObject, _offset: u32, _data: &[u8]) -> BackendResult<()> {
        let mut ledger = self.ledger.lock();
        if !ledger.live.contains_key(&buffer.0) {
            return Err(BackendError::Rejected(format!("buffer {} is not alive", buffer.0)));
        }
        ledger.buffer_updates += 1;
        Ok(())
    }

    fn create_texture_platform(
        &mut self,
        desc: &TextureDesc,
        _initial_data: &[SubresourceData<'_>],
    ) -> BackendResult<NativeObject> {
        if let Some(native) = desc.existing_native_object {
            return Ok(NativeObject(native));
        }
        self.ledger.lock().create(ObjectKind::Texture)
    }

    fn create_shared_texture_platform(
        &mut self,
        _desc: &TextureDesc,
        _initial_data: &[SubresourceData<'_>],
        share: SharedTextureType,
    ) -> BackendResult<(NativeObject, u64)> {
        if !self.capabilities.supports_shared_textures {
            return Err(BackendError::Unsupported("shared textures".into()));
        }
        let native = self.ledger.lock().create(ObjectKind::Texture)?;
        let shared_handle = match share {
            SharedTextureType::Exported => native.0,
            SharedTextureType::Imported(handle) => handle,
        };
        Ok((native, shared_handle))
    }

    fn create_readback_buffer_platform(&mut self, _desc: &ReadbackBufferDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::ReadbackBuffer)
    }

    fn create_readback_texture_platform(&mut self, _desc: &ReadbackTextureDesc) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::ReadbackTexture)
    }

    fn create_resource_view_platform(
        &mut self,
        _resource: NativeObject,
        _desc: &ResourceViewDesc,
    ) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::ResourceView)
    }

    fn create_unordered_access_view_platform(
        &mut self,
        _resource: NativeObject,
        _desc: &UnorderedAccessViewDesc,
    ) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::UnorderedAccessView)
    }

    fn create_render_target_view_platform(
        &mut self,
        _texture: NativeObject,
        _desc: &RenderTargetViewDesc,
    ) -> BackendResult<NativeObject> {
        self.ledger.lock().create(ObjectKind::RenderTargetView)
    }

    fn create_swap_chain_platform(&mut self, _desc: &SwapChainDesc) -> BackendResult<SwapChainObjects> {
        let mut ledger = self.ledger.lock();
        let swap_chain = ledger.create(ObjectKind::SwapChain)?;
        let back_buffer = ledger.create(ObjectKind::Texture)?;
        Ok(SwapChainObjects { swap_chain, back_buffer })
    }

    fn update_swap_chain_platform(
        &mut self,
        swap_chain: NativeObject,
        _present_mode: PresentMode,
        _size: (u32, u32),
    ) -> BackendResult<NativeObject> {
        let mut ledger = self.ledger.lock();
        if !ledger.live.contains_key(&swap_chain.0) {
            return Err(BackendError::Rejected(format!("swap chain {} is not alive", swap_chain.0)));
        }
        ledger.create(ObjectKind::Texture)
    }

    fn destroy_platform(&mut self, kind: ObjectKind, object: NativeObject) {
        let mut ledger = self.ledger.lock();
        match ledger.live.remove(&object.0) {
            Some(live_kind) => {
                debug_assert_eq!(live_kind, kind, "destroy kind mismatch for object {}", object.0);
                *ledger.destroyed.entry(kind).or_default() += 1;
            }
            None => {
                log::error!("Null backend asked to destroy unknown {} object {}", kind, object.0);
                ledger.unknown_destroys += 1;
            }
        }
    }

    fn begin_frame_platform(&mut self, _app_frame: u64, _swap_chains: &[NativeObject]) {
        self.ledger.lock().frames_begun += 1;
    }

    fn end_frame_platform(&mut self, _swap_chains: &[NativeObject]) {
        let mut ledger = self.ledger.lock();
        ledger.frames_ended += 1;
        ledger.fence_completed = ledger.fence_signaled;
    }

    fn flush_platform(&mut self) {
        self.ledger.lock().flushes += 1;
    }

    fn wait_idle_platform(&mut self) {
        let mut ledger = self.ledger.lock();
        ledger.fence_completed = ledger.fence_signaled;
    }

    fn signal_fence_platform(&mut self) -> u64 {
        let mut ledger = self.ledger.lock();
        ledger.fence_signaled += 1;
        ledger.fence_signaled
    }

    fn fence_result_platform(&mut self, fence: u64, _timeout: Duration) -> FenceResult {
        if fence <= self.ledger.lock().fence_completed {
            FenceResult::Ready
        } else {
            FenceResult::Timeout
        }
    }
}

/// One recorded encoder command
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum EncoderCall {
    SetGraphicsPipeline(GraphicsPipelineHandle),
    SetComputePipeline(ComputePipelineHandle),
    SetVertexBuffer { slot: u32, buffer: BufferHandle, offset: u32 },
    SetIndexBuffer(BufferHandle),
    SetResourceView { name: String, view: ResourceViewHandle },
    SetUnorderedAccessView { name: String, view: UnorderedAccessViewHandle },
    SetSamplerState { name: String, sampler: SamplerStateHandle },
    SetConstantBuffer { name: String, buffer: BufferHandle },
    UpdateBuffer { buffer: BufferHandle, offset: u32, size: usize },
    Draw { vertex_count: u32, first_vertex: u32 },
    DrawIndexed { index_count: u32, first_index: u32 },
    DrawInstanced { vertex_count: u32, instance_count: u32, first_vertex: u32 },
    DrawIndexedInstanced { index_count: u32, instance_count: u32, first_index: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
}

/// Encoder that records commands instead of submitting them
#[derive(Debug, Default)]
pub struct NullEncoder {
    calls: Vec<EncoderCall>,
}

impl NullEncoder {
    /// Create an empty encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command recorded so far
    pub fn calls(&self) -> &[EncoderCall] {
        &self.calls
    }

    /// Forget recorded commands
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&EncoderCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of pipeline binds of either kind
    pub fn pipeline_sets(&self) -> usize {
        self.count(|call| {
            matches!(call, EncoderCall::SetGraphicsPipeline(_) | EncoderCall::SetComputePipeline(_))
        })
    }

    /// Names of all slots that received a resource view, in order
    pub fn resource_view_slots(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EncoderCall::SetResourceView { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl CommandEncoder for NullEncoder {
    fn set_graphics_pipeline(&mut self, pipeline: GraphicsPipelineHandle) {
        self.calls.push(EncoderCall::SetGraphicsPipeline(pipeline));
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.calls.push(EncoderCall::SetComputePipeline(pipeline));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u32) {
        self.calls.push(EncoderCall::SetVertexBuffer { slot, buffer, offset });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.calls.push(EncoderCall::SetIndexBuffer(buffer));
    }

    fn set_resource_view(&mut self, binding: &ShaderResourceBinding, view: ResourceViewHandle) {
        self.calls.push(EncoderCall::SetResourceView {
            name: binding.name.clone(),
            view,
        });
    }

    fn set_unordered_access_view(&mut self, binding: &ShaderResourceBinding, view: UnorderedAccessViewHandle) {
        self.calls.push(EncoderCall::SetUnorderedAccessView {
            name: binding.name.clone(),
            view,
        });
    }

    fn set_sampler_state(&mut self, binding: &ShaderResourceBinding, sampler: SamplerStateHandle) {
        self.calls.push(EncoderCall::SetSamplerState {
            name: binding.name.clone(),
            sampler,
        });
    }

    fn set_constant_buffer(&mut self, binding: &ShaderResourceBinding, buffer: BufferHandle) {
        self.calls.push(EncoderCall::SetConstantBuffer {
            name: binding.name.clone(),
            buffer,
        });
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: u32, data: &[u8]) {
        self.calls.push(EncoderCall::UpdateBuffer {
            buffer,
            offset,
            size: data.len(),
        });
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
        self.calls.push(EncoderCall::Draw { vertex_count, first_vertex });
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        self.calls.push(EncoderCall::DrawIndexed { index_count, first_index });
    }

    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32) {
        self.calls.push(EncoderCall::DrawInstanced {
            vertex_count,
            instance_count,
            first_vertex,
        });
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32, first_index: u32) {
        self.calls.push(EncoderCall::DrawIndexedInstanced {
            index_count,
            instance_count,
            first_index,
        });
    }

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        self.calls.push(EncoderCall::Dispatch {
            x: groups_x,
            y: groups_y,
            z: groups_z,
        });
    }
}
