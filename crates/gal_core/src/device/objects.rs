//! Device-side records for every object kind

use std::hash::Hash;
use std::sync::Arc;

use log::warn;

use super::cache::HashedObject;
use super::dead_objects::{DeadObjectQueue, Destroyable};
use super::views::ViewCache;
use super::DeviceState;
use crate::backend::NativeObject;
use crate::descriptors::{
    BindGroupLayoutDesc, BlendStateDesc, BufferDesc, ComputePipelineDesc, DepthStencilStateDesc, GraphicsPipelineDesc,
    PipelineLayoutDesc, RasterizerStateDesc, ReadbackBufferDesc, ReadbackTextureDesc, SamplerStateDesc, ShaderDesc,
    ShaderResourceBinding, SwapChainDesc, TextureDesc, VertexDeclarationDesc, MAX_BIND_GROUPS,
};
use crate::error::{GalError, GalResult};
use crate::foundation::collections::Arena;
use crate::foundation::hashing::DescriptorHash;
use crate::handles::{
    BindGroupLayoutHandle, BlendStateHandle, BufferHandle, ComputePipelineHandle, DepthStencilStateHandle, GalHandle,
    GraphicsPipelineHandle, PipelineLayoutHandle, RasterizerStateHandle, ReadbackBufferHandle, ReadbackTextureHandle,
    RenderTargetViewHandle, ResourceViewHandle, SamplerStateHandle, ShaderHandle, SwapChainHandle, TextureHandle,
    VertexDeclarationHandle,
};

/// Hashed object fully described by its creation descriptor
pub(crate) struct StateObject<D> {
    pub(crate) desc: D,
    pub(crate) native: NativeObject,
}

impl<D: Hash> HashedObject for StateObject<D> {
    fn descriptor_hash(&self) -> u64 {
        self.desc.calculate_hash()
    }
}

macro_rules! leaf_state_objects {
    ($($desc:ty => $handle:ty, $table:ident;)*) => {
        $(
            impl Destroyable for StateObject<$desc> {
                type Handle = $handle;

                fn take(state: &mut DeviceState, handle: $handle) -> Option<Self> {
                    state.$table.take(handle)
                }

                fn native(&self) -> Option<NativeObject> {
                    Some(self.native)
                }
            }
        )*
    };
}

leaf_state_objects! {
    BlendStateDesc => BlendStateHandle, blend_states;
    DepthStencilStateDesc => DepthStencilStateHandle, depth_stencil_states;
    RasterizerStateDesc => RasterizerStateHandle, rasterizer_states;
    SamplerStateDesc => SamplerStateHandle, sampler_states;
    BindGroupLayoutDesc => BindGroupLayoutHandle, bind_group_layouts;
    VertexDeclarationDesc => VertexDeclarationHandle, vertex_declarations;
}

impl Destroyable for StateObject<PipelineLayoutDesc> {
    type Handle = PipelineLayoutHandle;

    fn take(state: &mut DeviceState, handle: PipelineLayoutHandle) -> Option<Self> {
        state.pipeline_layouts.take(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }

    fn release_components(&self, state: &mut DeviceState) {
        for layout in self.desc.bind_groups.iter().filter(|layout| !layout.is_invalid()) {
            state.bind_group_layouts.release(*layout, &mut state.dead_objects);
        }
    }
}

impl Destroyable for StateObject<GraphicsPipelineDesc> {
    type Handle = GraphicsPipelineHandle;

    fn take(state: &mut DeviceState, handle: GraphicsPipelineHandle) -> Option<Self> {
        state.graphics_pipelines.take(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }

    fn release_components(&self, state: &mut DeviceState) {
        let desc = &self.desc;
        state.shaders.release(desc.shader, &mut state.dead_objects);
        state.rasterizer_states.release(desc.rasterizer_state, &mut state.dead_objects);
        state.blend_states.release(desc.blend_state, &mut state.dead_objects);
        state.depth_stencil_states.release(desc.depth_stencil_state, &mut state.dead_objects);
        if !desc.vertex_declaration.is_invalid() {
            state.vertex_declarations.release(desc.vertex_declaration, &mut state.dead_objects);
        }
    }
}

impl Destroyable for StateObject<ComputePipelineDesc> {
    type Handle = ComputePipelineHandle;

    fn take(state: &mut DeviceState, handle: ComputePipelineHandle) -> Option<Self> {
        state.compute_pipelines.take(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }

    fn release_components(&self, state: &mut DeviceState) {
        state.shaders.release(self.desc.shader, &mut state.dead_objects);
    }
}

/// Shader plus the layouts derived from its binding mapping
pub(crate) struct ShaderObject {
    pub(crate) desc: ShaderDesc,
    pub(crate) native: NativeObject,
    pub(crate) binding_mapping: Arc<[ShaderResourceBinding]>,
    pub(crate) bind_group_layouts: [BindGroupLayoutHandle; MAX_BIND_GROUPS],
    pub(crate) pipeline_layout: PipelineLayoutHandle,
}

impl HashedObject for ShaderObject {
    fn descriptor_hash(&self) -> u64 {
        self.desc.calculate_hash()
    }
}

impl Destroyable for ShaderObject {
    type Handle = ShaderHandle;

    fn take(state: &mut DeviceState, handle: ShaderHandle) -> Option<Self> {
        state.shaders.take(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }

    fn release_components(&self, state: &mut DeviceState) {
        state.pipeline_layouts.release(self.pipeline_layout, &mut state.dead_objects);
        for layout in self.bind_group_layouts.iter().filter(|layout| !layout.is_invalid()) {
            state.bind_group_layouts.release(*layout, &mut state.dead_objects);
        }
    }
}

/// Exclusively owned object destroyed exactly once
pub(crate) trait OwnedObject: Destroyable {
    fn is_pending_destroy(&self) -> bool;

    fn mark_pending_destroy(&mut self);
}

macro_rules! owned_objects {
    ($($object:ty),* $(,)?) => {
        $(
            impl OwnedObject for $object {
                fn is_pending_destroy(&self) -> bool {
                    self.pending_destroy
                }

                fn mark_pending_destroy(&mut self) {
                    self.pending_destroy = true;
                }
            }
        )*
    };
}

owned_objects!(
    BufferObject,
    TextureObject,
    ReadbackBufferObject,
    ReadbackTextureObject,
    SwapChainObject,
    super::dynamic_buffer::DynamicBufferObject,
);

/// Queue an owned object for destruction, warning on a second destroy
pub(crate) fn enqueue_owned<O: OwnedObject>(
    objects: &mut Arena<O::Handle, O>,
    dead_objects: &mut DeadObjectQueue,
    handle: O::Handle,
) -> bool {
    match objects.get_mut(handle) {
        Some(object) if !object.is_pending_destroy() => {
            object.mark_pending_destroy();
            dead_objects.push::<O>(handle);
            true
        }
        _ => {
            warn!("Destroy called on invalid {} handle (double free?)", <O::Handle as GalHandle>::KIND);
            false
        }
    }
}

/// Look up an exclusively owned object that has not been destroyed yet
pub(crate) fn live<O: OwnedObject>(objects: &mut Arena<O::Handle, O>, handle: O::Handle) -> GalResult<&mut O> {
    objects
        .get_mut(handle)
        .filter(|object| !object.is_pending_destroy())
        .ok_or(GalError::InvalidHandle(<O::Handle as GalHandle>::KIND))
}

pub(crate) struct BufferObject {
    pub(crate) desc: BufferDesc,
    pub(crate) native: NativeObject,
    pub(crate) views: ViewCache,
    pub(crate) default_resource_view: ResourceViewHandle,
    pub(crate) pending_destroy: bool,
}

impl Destroyable for BufferObject {
    type Handle = BufferHandle;

    fn take(state: &mut DeviceState, handle: BufferHandle) -> Option<Self> {
        state.buffers.remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }

    fn release_components(&self, state: &mut DeviceState) {
        state.destroy_cached_views(&self.views);
    }
}

/// Where a texture's backend object comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextureOrigin {
    /// Allocated by the backend for this texture
    Created,
    /// Wraps a backend object owned by someone else
    Wrapped,
    /// One slice of a parent texture
    Proxy { parent: TextureHandle, slice: u32 },
    /// Shared with another process through `shared_handle`
    Shared { shared_handle: u64 },
    /// Back buffer owned by a swap chain
    BackBuffer { swap_chain: SwapChainHandle },
}

pub(crate) struct TextureObject {
    pub(crate) desc: TextureDesc,
    pub(crate) native: NativeObject,
    pub(crate) origin: TextureOrigin,
    pub(crate) views: ViewCache,
    pub(crate) default_resource_view: ResourceViewHandle,
    pub(crate) default_render_target_view: RenderTargetViewHandle,
    pub(crate) pending_destroy: bool,
}

impl Destroyable for TextureObject {
    type Handle = TextureHandle;

    fn take(state: &mut DeviceState, handle: TextureHandle) -> Option<Self> {
        state.textures.remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        match self.origin {
            TextureOrigin::Created | TextureOrigin::Shared { .. } | TextureOrigin::BackBuffer { .. } => Some(self.native),
            TextureOrigin::Wrapped | TextureOrigin::Proxy { .. } => None,
        }
    }

    fn release_components(&self, state: &mut DeviceState) {
        state.destroy_cached_views(&self.views);
    }
}

pub(crate) struct ReadbackBufferObject {
    pub(crate) desc: ReadbackBufferDesc,
    pub(crate) native: NativeObject,
    pub(crate) pending_destroy: bool,
}

impl Destroyable for ReadbackBufferObject {
    type Handle = ReadbackBufferHandle;

    fn take(state: &mut DeviceState, handle: ReadbackBufferHandle) -> Option<Self> {
        state.readback_buffers.remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }
}

pub(crate) struct ReadbackTextureObject {
    pub(crate) desc: ReadbackTextureDesc,
    pub(crate) native: NativeObject,
    pub(crate) pending_destroy: bool,
}

impl Destroyable for ReadbackTextureObject {
    type Handle = ReadbackTextureHandle;

    fn take(state: &mut DeviceState, handle: ReadbackTextureHandle) -> Option<Self> {
        state.readback_textures.remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }
}

pub(crate) struct SwapChainObject {
    pub(crate) desc: SwapChainDesc,
    pub(crate) native: NativeObject,
    pub(crate) back_buffer: TextureHandle,
    pub(crate) pending_destroy: bool,
}

impl Destroyable for SwapChainObject {
    type Handle = SwapChainHandle;

    fn take(state: &mut DeviceState, handle: SwapChainHandle) -> Option<Self> {
        state.swap_chains.remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }

    fn release_components(&self, state: &mut DeviceState) {
        // The back buffer never went through the queue on its own.
        if !self.back_buffer.is_invalid() {
            super::dead_objects::destroy_now::<TextureObject>(state, self.back_buffer);
        }
    }
}
