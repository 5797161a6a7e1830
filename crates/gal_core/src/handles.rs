//! Typed handles for every device object kind
//!
//! Each handle is a `slotmap` key: a 32-bit slot index plus a 32-bit
//! generation, packed into one `u64` by [`GalHandle::to_raw`]. The default
//! value is the reserved invalid handle. Handles never own anything; the
//! [`Device`](crate::device::Device) owns every object they refer to.
//!
//! # Capacity
//!
//! The bit split is fixed, so instead of encoding table sizes into the handle
//! layout each table enforces a live-object limit per [`HandleFamily`]:
//!
//! | Family        | Default limit | Kinds                                               |
//! |---------------|---------------|-----------------------------------------------------|
//! | `StateObject` | 2^16          | states, shaders, layouts, declarations, pipelines   |
//! | `Resource`    | 2^18          | buffers, textures, readback objects, views          |
//!
//! Both limits can be changed in [`CapacityLimits`](crate::config::CapacityLimits).

use std::fmt;

use slotmap::{Key, KeyData};

/// Table size class a handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleFamily {
    /// Rarely numerous objects that are usually shared through hashing
    StateObject,
    /// Potentially numerous, exclusively owned GPU resources
    Resource,
}

impl HandleFamily {
    /// Default number of live objects a table of this family may hold
    pub const fn default_capacity(self) -> usize {
        match self {
            Self::StateObject => 1 << 16,
            Self::Resource => 1 << 18,
        }
    }
}

/// Behaviour shared by all device handles
pub trait GalHandle: Key {
    /// Size class of the table this handle indexes
    const FAMILY: HandleFamily;

    /// Kind of object this handle refers to
    const KIND: ObjectKind;

    /// The reserved invalid handle
    fn invalid() -> Self {
        Self::null()
    }

    /// Whether this is the reserved invalid handle
    fn is_invalid(&self) -> bool {
        self.is_null()
    }

    /// Pack index and generation into a single integer
    fn to_raw(&self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild a handle from [`GalHandle::to_raw`] output
    fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

macro_rules! gal_handles {
    ($($(#[$meta:meta])* $name:ident => $kind:ident, $family:ident;)*) => {
        slotmap::new_key_type! {
            $($(#[$meta])* pub struct $name;)*
        }

        $(
            impl GalHandle for $name {
                const FAMILY: HandleFamily = HandleFamily::$family;
                const KIND: ObjectKind = ObjectKind::$kind;
            }
        )*
    };
}

gal_handles! {
    /// Handle to a blend state
    BlendStateHandle => BlendState, StateObject;
    /// Handle to a depth-stencil state
    DepthStencilStateHandle => DepthStencilState, StateObject;
    /// Handle to a rasterizer state
    RasterizerStateHandle => RasterizerState, StateObject;
    /// Handle to a sampler state
    SamplerStateHandle => SamplerState, StateObject;
    /// Handle to a shader
    ShaderHandle => Shader, StateObject;
    /// Handle to a bind group layout
    BindGroupLayoutHandle => BindGroupLayout, StateObject;
    /// Handle to a pipeline layout
    PipelineLayoutHandle => PipelineLayout, StateObject;
    /// Handle to a vertex declaration
    VertexDeclarationHandle => VertexDeclaration, StateObject;
    /// Handle to a graphics pipeline
    GraphicsPipelineHandle => GraphicsPipeline, StateObject;
    /// Handle to a compute pipeline
    ComputePipelineHandle => ComputePipeline, StateObject;
    /// Handle to a swap chain
    SwapChainHandle => SwapChain, StateObject;
    /// Handle to a GPU buffer
    BufferHandle => Buffer, Resource;
    /// Handle to a CPU-managed dynamic buffer
    DynamicBufferHandle => DynamicBuffer, Resource;
    /// Handle to a texture
    TextureHandle => Texture, Resource;
    /// Handle to a readback buffer
    ReadbackBufferHandle => ReadbackBuffer, Resource;
    /// Handle to a readback texture
    ReadbackTextureHandle => ReadbackTexture, Resource;
    /// Handle to a shader resource view of a texture or buffer
    ResourceViewHandle => ResourceView, Resource;
    /// Handle to an unordered access view of a texture or buffer
    UnorderedAccessViewHandle => UnorderedAccessView, Resource;
    /// Handle to a render target view
    RenderTargetViewHandle => RenderTargetView, Resource;
}

/// Value returned by a fence signal, later polled for completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceHandle(pub u64);

/// Every object kind the device tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Blend state
    BlendState,
    /// Depth-stencil state
    DepthStencilState,
    /// Rasterizer state
    RasterizerState,
    /// Sampler state
    SamplerState,
    /// Shader
    Shader,
    /// Bind group layout
    BindGroupLayout,
    /// Pipeline layout
    PipelineLayout,
    /// Vertex declaration
    VertexDeclaration,
    /// Graphics pipeline
    GraphicsPipeline,
    /// Compute pipeline
    ComputePipeline,
    /// Swap chain
    SwapChain,
    /// Buffer
    Buffer,
    /// Dynamic buffer
    DynamicBuffer,
    /// Texture
    Texture,
    /// Readback buffer
    ReadbackBuffer,
    /// Readback texture
    ReadbackTexture,
    /// Shader resource view
    ResourceView,
    /// Unordered access view
    UnorderedAccessView,
    /// Render target view
    RenderTargetView,
}

impl ObjectKind {
    /// Every object kind, in table order
    pub const ALL: [Self; 19] = [
        Self::BlendState,
        Self::DepthStencilState,
        Self::RasterizerState,
        Self::SamplerState,
        Self::Shader,
        Self::BindGroupLayout,
        Self::PipelineLayout,
        Self::VertexDeclaration,
        Self::GraphicsPipeline,
        Self::ComputePipeline,
        Self::SwapChain,
        Self::Buffer,
        Self::DynamicBuffer,
        Self::Texture,
        Self::ReadbackBuffer,
        Self::ReadbackTexture,
        Self::ResourceView,
        Self::UnorderedAccessView,
        Self::RenderTargetView,
    ];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_handle_is_invalid() {
        let handle = BufferHandle::default();
        assert!(handle.is_invalid());
        assert_eq!(handle, BufferHandle::invalid());
    }

    #[test]
    fn test_raw_round_trip_preserves_identity() {
        let mut map: slotmap::SlotMap<TextureHandle, ()> = slotmap::SlotMap::with_key();
        let handle = map.insert(());
        let raw = handle.to_raw();

        assert_eq!(TextureHandle::from_raw(raw), handle);
        assert!(!handle.is_invalid());
    }

    #[test]
    fn test_family_capacities() {
        assert_eq!(BlendStateHandle::FAMILY.default_capacity(), 65_536);
        assert_eq!(TextureHandle::FAMILY.default_capacity(), 262_144);
        assert_eq!(TextureHandle::KIND, ObjectKind::Texture);
        assert_eq!(UnorderedAccessViewHandle::KIND, ObjectKind::UnorderedAccessView);
    }
}
