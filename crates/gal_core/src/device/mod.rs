//! The GAL device
//!
//! [`Device`] owns every GPU object the engine creates and hands out typed,
//! non-owning handles to them. It is created explicitly from a backend and a
//! [`DeviceConfig`] and is shared through an `Arc`; all table mutation runs
//! under one coarse device lock.
//!
//! # Object lifetime
//!
//! - State objects, shaders, layouts, vertex declarations and pipelines are
//!   hashed: identical descriptors share one object and a reference count.
//! - Buffers, textures, readback objects, dynamic buffers and swap chains are
//!   exclusively owned and destroyed exactly once.
//! - Views are cached on the texture or buffer they view.
//!
//! Nothing is released right away. Dead objects wait for [`Device::end_frame`]
//! or [`Device::shutdown`], and a hashed object requested again in between is
//! revived without touching the backend.
//!
//! # Example
//!
//! ```
//! use gal_core::prelude::*;
//!
//! let device = Device::new(Box::new(NullBackend::new()), DeviceConfig::default())?;
//!
//! let blend = device.create_blend_state(&BlendStateDesc::default())?;
//! let again = device.create_blend_state(&BlendStateDesc::default())?;
//! assert_eq!(blend, again);
//!
//! device.destroy_blend_state(blend);
//! device.destroy_blend_state(again);
//! device.shutdown()?;
//! # Ok::<(), GalError>(())
//! ```

mod cache;
mod dead_objects;
mod dynamic_buffer;
mod frame;
mod objects;
mod pipeline_cache;
mod pipelines;
mod resources;
mod states;
mod validation;
mod views;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use log::info;
use parking_lot::{Mutex, MutexGuard};
use slotmap::{Key, KeyData};

use crate::backend::{DeviceCapabilities, GalBackend};
use crate::config::{ConfigError, DeviceConfig};
use crate::descriptors::{
    BindGroupLayoutDesc, BlendStateDesc, ComputePipelineDesc, DepthStencilStateDesc, GraphicsPipelineDesc,
    PipelineLayoutDesc, RasterizerStateDesc, SamplerStateDesc, ShaderResourceBinding, VertexDeclarationDesc,
};
use crate::error::{GalError, GalResult};
use crate::foundation::collections::Arena;
use crate::handles::{
    BindGroupLayoutHandle, BlendStateHandle, BufferHandle, ComputePipelineHandle, DepthStencilStateHandle,
    DynamicBufferHandle, GalHandle, GraphicsPipelineHandle, HandleFamily, ObjectKind, PipelineLayoutHandle,
    RasterizerStateHandle, ReadbackBufferHandle, ReadbackTextureHandle, RenderTargetViewHandle, ResourceViewHandle,
    SamplerStateHandle, ShaderHandle, SwapChainHandle, TextureHandle, UnorderedAccessViewHandle,
    VertexDeclarationHandle,
};

use cache::HashedTable;
use dead_objects::DeadObjectQueue;
use dynamic_buffer::DynamicBufferObject;
use frame::FrameState;
use objects::{
    BufferObject, ReadbackBufferObject, ReadbackTextureObject, ShaderObject, StateObject, SwapChainObject,
    TextureObject,
};
use pipeline_cache::PipelineCache;
use views::{RenderTargetViews, ResourceViews, UnorderedAccessViews, ViewObject};

pub use dynamic_buffer::{DynamicAllocation, DynamicBufferDesc};
pub use frame::DeviceStatistics;
pub use resources::MemoryUsage;

type StateTable<H, D> = HashedTable<H, StateObject<D>>;

/// Everything guarded by the device lock
pub(crate) struct DeviceState {
    pub(crate) backend: Box<dyn GalBackend>,
    pub(crate) capabilities: DeviceCapabilities,
    pub(crate) config: DeviceConfig,
    pub(crate) dead_objects: DeadObjectQueue,

    pub(crate) blend_states: StateTable<BlendStateHandle, BlendStateDesc>,
    pub(crate) depth_stencil_states: StateTable<DepthStencilStateHandle, DepthStencilStateDesc>,
    pub(crate) rasterizer_states: StateTable<RasterizerStateHandle, RasterizerStateDesc>,
    pub(crate) sampler_states: StateTable<SamplerStateHandle, SamplerStateDesc>,
    pub(crate) shaders: HashedTable<ShaderHandle, ShaderObject>,
    pub(crate) bind_group_layouts: StateTable<BindGroupLayoutHandle, BindGroupLayoutDesc>,
    pub(crate) pipeline_layouts: StateTable<PipelineLayoutHandle, PipelineLayoutDesc>,
    pub(crate) vertex_declarations: StateTable<VertexDeclarationHandle, VertexDeclarationDesc>,
    pub(crate) graphics_pipelines: StateTable<GraphicsPipelineHandle, GraphicsPipelineDesc>,
    pub(crate) compute_pipelines: StateTable<ComputePipelineHandle, ComputePipelineDesc>,

    pub(crate) buffers: Arena<BufferHandle, BufferObject>,
    pub(crate) dynamic_buffers: Arena<DynamicBufferHandle, DynamicBufferObject>,
    pub(crate) textures: Arena<TextureHandle, TextureObject>,
    pub(crate) readback_buffers: Arena<ReadbackBufferHandle, ReadbackBufferObject>,
    pub(crate) readback_textures: Arena<ReadbackTextureHandle, ReadbackTextureObject>,
    pub(crate) swap_chains: Arena<SwapChainHandle, SwapChainObject>,
    pub(crate) resource_views: Arena<ResourceViewHandle, ViewObject<ResourceViews>>,
    pub(crate) unordered_access_views: Arena<UnorderedAccessViewHandle, ViewObject<UnorderedAccessViews>>,
    pub(crate) render_target_views: Arena<RenderTargetViewHandle, ViewObject<RenderTargetViews>>,

    pub(crate) pipeline_cache: PipelineCache,
    pub(crate) frame: FrameState,
}

impl DeviceState {
    fn new(backend: Box<dyn GalBackend>, config: DeviceConfig) -> Self {
        let states = config.capacity_limits.for_family(HandleFamily::StateObject);
        let resources = config.capacity_limits.for_family(HandleFamily::Resource);
        let capabilities = backend.capabilities();

        Self {
            backend,
            capabilities,
            config,
            dead_objects: DeadObjectQueue::default(),
            blend_states: HashedTable::new(states),
            depth_stencil_states: HashedTable::new(states),
            rasterizer_states: HashedTable::new(states),
            sampler_states: HashedTable::new(states),
            shaders: HashedTable::new(states),
            bind_group_layouts: HashedTable::new(states),
            pipeline_layouts: HashedTable::new(states),
            vertex_declarations: HashedTable::new(states),
            graphics_pipelines: HashedTable::new(states),
            compute_pipelines: HashedTable::new(states),
            buffers: Arena::with_capacity_limit(resources),
            dynamic_buffers: Arena::with_capacity_limit(resources),
            textures: Arena::with_capacity_limit(resources),
            readback_buffers: Arena::with_capacity_limit(resources),
            readback_textures: Arena::with_capacity_limit(resources),
            swap_chains: Arena::with_capacity_limit(states),
            resource_views: Arena::with_capacity_limit(resources),
            unordered_access_views: Arena::with_capacity_limit(resources),
            render_target_views: Arena::with_capacity_limit(resources),
            pipeline_cache: PipelineCache::default(),
            frame: FrameState::default(),
        }
    }

    /// Number of live objects of `kind`, including those waiting for the flush
    pub(crate) fn object_count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::BlendState => self.blend_states.len(),
            ObjectKind::DepthStencilState => self.depth_stencil_states.len(),
            ObjectKind::RasterizerState => self.rasterizer_states.len(),
            ObjectKind::SamplerState => self.sampler_states.len(),
            ObjectKind::Shader => self.shaders.len(),
            ObjectKind::BindGroupLayout => self.bind_group_layouts.len(),
            ObjectKind::PipelineLayout => self.pipeline_layouts.len(),
            ObjectKind::VertexDeclaration => self.vertex_declarations.len(),
            ObjectKind::GraphicsPipeline => self.graphics_pipelines.len(),
            ObjectKind::ComputePipeline => self.compute_pipelines.len(),
            ObjectKind::SwapChain => self.swap_chains.len(),
            ObjectKind::Buffer => self.buffers.len(),
            ObjectKind::DynamicBuffer => self.dynamic_buffers.len(),
            ObjectKind::Texture => self.textures.len(),
            ObjectKind::ReadbackBuffer => self.readback_buffers.len(),
            ObjectKind::ReadbackTexture => self.readback_textures.len(),
            ObjectKind::ResourceView => self.resource_views.len(),
            ObjectKind::UnorderedAccessView => self.unordered_access_views.len(),
            ObjectKind::RenderTargetView => self.render_target_views.len(),
        }
    }

    /// Reference count of a live object
    ///
    /// Exclusively owned kinds report 1 while alive and 0 once destroyed but
    /// not yet flushed.
    pub(crate) fn ref_count(&self, kind: ObjectKind, key: KeyData) -> Option<u32> {
        let owned = |alive: Option<bool>| alive.map(|pending| u32::from(!pending));
        match kind {
            ObjectKind::BlendState => self.blend_states.ref_count(key.into()),
            ObjectKind::DepthStencilState => self.depth_stencil_states.ref_count(key.into()),
            ObjectKind::RasterizerState => self.rasterizer_states.ref_count(key.into()),
            ObjectKind::SamplerState => self.sampler_states.ref_count(key.into()),
            ObjectKind::Shader => self.shaders.ref_count(key.into()),
            ObjectKind::BindGroupLayout => self.bind_group_layouts.ref_count(key.into()),
            ObjectKind::PipelineLayout => self.pipeline_layouts.ref_count(key.into()),
            ObjectKind::VertexDeclaration => self.vertex_declarations.ref_count(key.into()),
            ObjectKind::GraphicsPipeline => self.graphics_pipelines.ref_count(key.into()),
            ObjectKind::ComputePipeline => self.compute_pipelines.ref_count(key.into()),
            ObjectKind::SwapChain => owned(self.swap_chains.get(key.into()).map(|object| object.pending_destroy)),
            ObjectKind::Buffer => owned(self.buffers.get(key.into()).map(|object| object.pending_destroy)),
            ObjectKind::DynamicBuffer => {
                owned(self.dynamic_buffers.get(key.into()).map(|object| object.pending_destroy))
            }
            ObjectKind::Texture => owned(self.textures.get(key.into()).map(|object| object.pending_destroy)),
            ObjectKind::ReadbackBuffer => {
                owned(self.readback_buffers.get(key.into()).map(|object| object.pending_destroy))
            }
            ObjectKind::ReadbackTexture => {
                owned(self.readback_textures.get(key.into()).map(|object| object.pending_destroy))
            }
            ObjectKind::ResourceView => self.resource_views.get(key.into()).map(|view| view.ref_count),
            ObjectKind::UnorderedAccessView => self.unordered_access_views.get(key.into()).map(|view| view.ref_count),
            ObjectKind::RenderTargetView => self.render_target_views.get(key.into()).map(|view| view.ref_count),
        }
    }

    /// Live objects per kind, skipping empty tables
    pub(crate) fn live_objects(&self) -> Vec<(ObjectKind, usize)> {
        ObjectKind::ALL
            .iter()
            .map(|&kind| (kind, self.object_count(kind)))
            .filter(|&(_, count)| count > 0)
            .collect()
    }
}

/// Platform-independent GPU device
///
/// Every method takes `&self` and locks the device for its duration, so a
/// `Device` can be shared between threads through an `Arc`.
pub struct Device {
    state: Mutex<DeviceState>,
}

impl Device {
    /// Create a device on top of `backend`
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Config`] when `config` fails validation.
    pub fn new(backend: Box<dyn GalBackend>, config: DeviceConfig) -> GalResult<Self> {
        config.validate().map_err(|message| GalError::Config(ConfigError::Invalid(message)))?;

        info!("Creating device '{}' on backend '{}'", config.debug_name, backend.name());
        Ok(Self {
            state: Mutex::new(DeviceState::new(backend, config)),
        })
    }

    /// Create a device and wrap it for sharing with render contexts
    ///
    /// # Errors
    ///
    /// See [`Device::new`].
    pub fn new_shared(backend: Box<dyn GalBackend>, config: DeviceConfig) -> GalResult<Arc<Self>> {
        Self::new(backend, config).map(Arc::new)
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    /// Configuration the device was created with
    pub fn config(&self) -> DeviceConfig {
        self.lock().config.clone()
    }

    /// Features supported by the backend
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.lock().capabilities
    }

    /// Reference count of the object behind `handle`, `None` if it does not exist
    pub fn ref_count<H: GalHandle>(&self, handle: H) -> Option<u32> {
        self.lock().ref_count(H::KIND, handle.data())
    }

    /// Whether `handle` refers to an object that has not been physically destroyed
    pub fn contains<H: GalHandle>(&self, handle: H) -> bool {
        self.ref_count(handle).is_some()
    }

    /// Whether the object behind `handle` waits in the dead object queue
    pub fn is_pending_destruction<H: GalHandle>(&self, handle: H) -> bool {
        self.lock().dead_objects.contains(H::KIND, handle.data())
    }

    /// Number of objects of `kind` in the device tables
    pub fn object_count(&self, kind: ObjectKind) -> usize {
        self.lock().object_count(kind)
    }

    /// Number of objects waiting for the next flush
    pub fn dead_object_count(&self) -> usize {
        self.lock().dead_objects.len()
    }

    /// Reflected binding mapping of a shader
    pub fn shader_binding_mapping(&self, shader: ShaderHandle) -> Option<Arc<[ShaderResourceBinding]>> {
        self.lock().shaders.get(shader).map(|object| Arc::clone(&object.binding_mapping))
    }

    /// Pipeline layout derived from a shader's binding mapping
    pub fn shader_pipeline_layout(&self, shader: ShaderHandle) -> Option<PipelineLayoutHandle> {
        self.lock().shaders.get(shader).map(|object| object.pipeline_layout)
    }
}
