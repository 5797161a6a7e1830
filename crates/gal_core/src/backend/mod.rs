//! Backend abstraction traits for the device
//!
//! This module defines what a platform layer (DX11, Vulkan, ...) has to
//! provide so the platform-independent [`Device`](crate::device::Device) can
//! create, destroy and submit work. The device validates every descriptor
//! before any `*_platform` call, so backends only see well-formed input.
//!
//! Recording of draw and dispatch work goes through the separate
//! [`CommandEncoder`] trait, which the render context drives.

pub mod encoder;
pub mod null;

use std::time::Duration;

use thiserror::Error;

use crate::descriptors::{
    BindGroupLayoutDesc, BlendStateDesc, BufferDesc, ComputePipelineDesc, DepthStencilStateDesc, GraphicsPipelineDesc,
    PipelineLayoutDesc, PresentMode, RasterizerStateDesc, ReadbackBufferDesc, ReadbackTextureDesc, RenderTargetViewDesc,
    ResourceViewDesc, SamplerStateDesc, ShaderDesc, SubresourceData, SwapChainDesc, TextureDesc,
    UnorderedAccessViewDesc, VertexDeclarationDesc,
};
use crate::handles::ObjectKind;

pub use encoder::CommandEncoder;
pub use null::{EncoderCall, NullBackend, NullBackendProbe, NullEncoder};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque identifier of a backend-side object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeObject(pub u64);

/// Errors reported by a platform backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend has no implementation for the requested feature
    #[error("Unsupported by backend: {0}")]
    Unsupported(String),

    /// The driver rejected the object
    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

/// Outcome of polling a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceResult {
    /// The GPU reached the fence
    Ready,
    /// The timeout expired before the GPU reached the fence
    Timeout,
}

/// Backend objects making up a swap chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapChainObjects {
    /// The swap chain itself
    pub swap_chain: NativeObject,
    /// Texture presented at the end of a frame
    pub back_buffer: NativeObject,
}

/// Which side of a cross-process texture share this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedTextureType {
    /// The texture is created here and exported
    Exported,
    /// The texture was created elsewhere and is imported through this handle
    Imported(u64),
}

/// Feature support reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Typed buffers read through a format
    pub supports_texel_buffers: bool,
    /// Cross-process shared textures
    pub supports_shared_textures: bool,
    /// Maximum number of vertex buffer bindings
    pub max_vertex_buffers: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            supports_texel_buffers: true,
            supports_shared_textures: true,
            max_vertex_buffers: crate::descriptors::MAX_VERTEX_BUFFERS as u32,
        }
    }
}

/// Platform layer the device delegates object creation and submission to
///
/// Every `create_*_platform` call either returns a new backend object or an
/// error; the device translates errors into a logged warning and a failed
/// creation without touching its tables.
pub trait GalBackend: Send {
    /// Human readable backend name
    fn name(&self) -> &str;

    /// Features supported by this backend
    fn capabilities(&self) -> DeviceCapabilities;

    /// Create a blend state
    fn create_blend_state_platform(&mut self, desc: &BlendStateDesc) -> BackendResult<NativeObject>;

    /// Create a depth-stencil state
    fn create_depth_stencil_state_platform(&mut self, desc: &DepthStencilStateDesc) -> BackendResult<NativeObject>;

    /// Create a rasterizer state
    fn create_rasterizer_state_platform(&mut self, desc: &RasterizerStateDesc) -> BackendResult<NativeObject>;

    /// Create a sampler state
    fn create_sampler_state_platform(&mut self, desc: &SamplerStateDesc) -> BackendResult<NativeObject>;

    /// Create a shader from byte code
    fn create_shader_platform(&mut self, desc: &ShaderDesc) -> BackendResult<NativeObject>;

    /// Create a bind group layout
    fn create_bind_group_layout_platform(&mut self, desc: &BindGroupLayoutDesc) -> BackendResult<NativeObject>;

    /// Create a pipeline layout
    fn create_pipeline_layout_platform(&mut self, desc: &PipelineLayoutDesc) -> BackendResult<NativeObject>;

    /// Create a vertex declaration matching the inputs of `shader`
    fn create_vertex_declaration_platform(
        &mut self,
        desc: &VertexDeclarationDesc,
        shader: &ShaderDesc,
    ) -> BackendResult<NativeObject>;

    /// Create a graphics pipeline
    fn create_graphics_pipeline_platform(&mut self, desc: &GraphicsPipelineDesc) -> BackendResult<NativeObject>;

    /// Create a compute pipeline
    fn create_compute_pipeline_platform(&mut self, desc: &ComputePipelineDesc) -> BackendResult<NativeObject>;

    /// Create a buffer, optionally filled with `initial_data`
    fn create_buffer_platform(&mut self, desc: &BufferDesc, initial_data: &[u8]) -> BackendResult<NativeObject>;

    /// Overwrite part of a buffer for the next frame
    fn update_buffer_platform(&mut self, buffer: NativeObject, offset: u32, data: &[u8]) -> BackendResult<()>;

    /// Create a texture, optionally filled with one entry per subresource
    fn create_texture_platform(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[SubresourceData<'_>],
    ) -> BackendResult<NativeObject>;

    /// Create or import a cross-process shared texture
    ///
    /// # Returns
    ///
    /// The texture object and the platform handle other processes open it by.
    fn create_shared_texture_platform(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[SubresourceData<'_>],
        share: SharedTextureType,
    ) -> BackendResult<(NativeObject, u64)>;

    /// Create a readback buffer
    fn create_readback_buffer_platform(&mut self, desc: &ReadbackBufferDesc) -> BackendResult<NativeObject>;

    /// Create a readback texture
    fn create_readback_texture_platform(&mut self, desc: &ReadbackTextureDesc) -> BackendResult<NativeObject>;

    /// Create a shader resource view of `resource`
    fn create_resource_view_platform(
        &mut self,
        resource: NativeObject,
        desc: &ResourceViewDesc,
    ) -> BackendResult<NativeObject>;

    /// Create an unordered access view of `resource`
    fn create_unordered_access_view_platform(
        &mut self,
        resource: NativeObject,
        desc: &UnorderedAccessViewDesc,
    ) -> BackendResult<NativeObject>;

    /// Create a render target view of `texture`
    fn create_render_target_view_platform(
        &mut self,
        texture: NativeObject,
        desc: &RenderTargetViewDesc,
    ) -> BackendResult<NativeObject>;

    /// Create a swap chain and its back buffer
    fn create_swap_chain_platform(&mut self, desc: &SwapChainDesc) -> BackendResult<SwapChainObjects>;

    /// Change the presentation mode or size of a swap chain
    ///
    /// # Returns
    ///
    /// The back buffer after the update, which may be a new object.
    fn update_swap_chain_platform(
        &mut self,
        swap_chain: NativeObject,
        present_mode: PresentMode,
        size: (u32, u32),
    ) -> BackendResult<NativeObject>;

    /// Release a backend object of the given kind
    fn destroy_platform(&mut self, kind: ObjectKind, object: NativeObject);

    /// Start recording a frame presenting to `swap_chains`
    fn begin_frame_platform(&mut self, app_frame: u64, swap_chains: &[NativeObject]);

    /// Submit everything recorded for the frame and present `swap_chains`
    fn end_frame_platform(&mut self, swap_chains: &[NativeObject]);

    /// Submit recorded work without ending the frame
    fn flush_platform(&mut self);

    /// Block until no GPU work from this device remains in flight
    fn wait_idle_platform(&mut self);

    /// Insert a fence after all submitted work and return its value
    fn signal_fence_platform(&mut self) -> u64;

    /// Poll a fence, blocking for at most `timeout`
    fn fence_result_platform(&mut self, fence: u64, timeout: Duration) -> FenceResult;
}
