//! Buffer, texture, view and swap chain descriptors
//!
//! Buffers and textures are never de-duplicated, but their descriptors still
//! hash: views are cached per owning resource by descriptor hash.

use super::enums::{BufferUsageFlags, Format, MsaaSampleCount, PresentMode, TextureType};
use crate::handles::{BufferHandle, TextureHandle};

/// Buffer creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferDesc {
    /// Size of the whole buffer in bytes
    pub total_size: u32,
    /// Size of one element for vertex, index and structured buffers
    pub struct_size: u32,
    /// Intended usage
    pub usage: BufferUsageFlags,
    /// Contents never change after creation
    pub immutable: bool,
    /// Element format of texel buffers
    pub format: Format,
}

impl BufferDesc {
    /// Vertex buffer holding `vertex_count` vertices of `vertex_size` bytes
    pub fn vertex(vertex_size: u32, vertex_count: u32, immutable: bool) -> Self {
        Self {
            total_size: vertex_size * vertex_count,
            struct_size: vertex_size,
            usage: BufferUsageFlags::VERTEX_BUFFER,
            immutable,
            format: Format::Unknown,
        }
    }

    /// Index buffer with 16-bit or 32-bit indices
    pub fn index(index_size: u32, index_count: u32, immutable: bool) -> Self {
        Self {
            total_size: index_size * index_count,
            struct_size: index_size,
            usage: BufferUsageFlags::INDEX_BUFFER,
            immutable,
            format: Format::Unknown,
        }
    }

    /// Transient constant buffer rewritten by the CPU
    pub fn constant(size: u32) -> Self {
        Self {
            total_size: size,
            struct_size: 0,
            usage: BufferUsageFlags::CONSTANT_BUFFER | BufferUsageFlags::TRANSIENT,
            immutable: false,
            format: Format::Unknown,
        }
    }

    /// Structured buffer of `count` elements
    pub fn structured(struct_size: u32, count: u32) -> Self {
        Self {
            total_size: struct_size * count,
            struct_size,
            usage: BufferUsageFlags::STRUCTURED_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
            immutable: false,
            format: Format::Unknown,
        }
    }

    /// Whether shader resource views may be created for this buffer
    pub fn allows_shader_resource_view(&self) -> bool {
        self.usage.intersects(
            BufferUsageFlags::SHADER_RESOURCE
                | BufferUsageFlags::TEXEL_BUFFER
                | BufferUsageFlags::STRUCTURED_BUFFER
                | BufferUsageFlags::BYTE_ADDRESS_BUFFER,
        )
    }
}

/// Texture creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth in texels for volume textures
    pub depth: u32,
    /// Number of mip levels
    pub mip_levels: u32,
    /// Number of slices for array types
    pub array_size: u32,
    /// Texel format
    pub format: Format,
    /// Multisample count
    pub sample_count: MsaaSampleCount,
    /// Texture type
    pub texture_type: TextureType,
    /// Create a default shader resource view
    pub allow_shader_resource_view: bool,
    /// Allow unordered access views
    pub allow_unordered_access_view: bool,
    /// Create a default render target view
    pub allow_render_target_view: bool,
    /// Allow mip generation on the GPU
    pub allow_dynamic_mip_generation: bool,
    /// Contents never change after creation
    pub immutable: bool,
    /// Wrap an existing backend object instead of allocating one
    pub existing_native_object: Option<u64>,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            format: Format::Rgba8Unorm,
            sample_count: MsaaSampleCount::None,
            texture_type: TextureType::Texture2D,
            allow_shader_resource_view: true,
            allow_unordered_access_view: false,
            allow_render_target_view: false,
            allow_dynamic_mip_generation: false,
            immutable: true,
            existing_native_object: None,
        }
    }
}

impl TextureDesc {
    /// Sampled 2D texture
    pub fn texture_2d(width: u32, height: u32, format: Format) -> Self {
        Self {
            width,
            height,
            format,
            ..Self::default()
        }
    }

    /// Mutable 2D render target that can also be sampled
    pub fn render_target(width: u32, height: u32, format: Format) -> Self {
        Self {
            width,
            height,
            format,
            allow_render_target_view: true,
            immutable: false,
            ..Self::default()
        }
    }

    /// Builder-style override of the texture type and array size
    pub fn with_type(mut self, texture_type: TextureType, array_size: u32) -> Self {
        self.texture_type = texture_type;
        self.array_size = array_size;
        self
    }

    /// Builder-style override of the mip count
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }
}

/// Initial contents of one texture subresource
#[derive(Debug, Clone, Copy)]
pub struct SubresourceData<'a> {
    /// Texel bytes
    pub data: &'a [u8],
    /// Bytes between rows
    pub row_pitch: u32,
    /// Bytes between depth slices
    pub slice_pitch: u32,
}

/// Readback buffer creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReadbackBufferDesc {
    /// Size in bytes
    pub total_size: u32,
}

/// Readback texture creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadbackTextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth in texels
    pub depth: u32,
    /// Texel format
    pub format: Format,
    /// Multisample count of the source texture
    pub sample_count: MsaaSampleCount,
    /// Texture type
    pub texture_type: TextureType,
}

impl Default for ReadbackTextureDesc {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            depth: 1,
            format: Format::Rgba8Unorm,
            sample_count: MsaaSampleCount::None,
            texture_type: TextureType::Texture2D,
        }
    }
}

/// Shader resource view over a range of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureResourceViewDesc {
    /// Viewed texture
    pub texture: TextureHandle,
    /// Reinterpret the texels with this format, `Unknown` keeps the texture's
    pub override_format: Format,
    /// View the texture as a different type
    pub override_view_type: Option<TextureType>,
    /// First visible mip
    pub most_detailed_mip: u32,
    /// Number of visible mips, `u32::MAX` for all
    pub mip_levels: u32,
    /// First visible slice
    pub first_array_slice: u32,
    /// Number of visible slices
    pub array_size: u32,
}

impl TextureResourceViewDesc {
    /// View of every mip of the first slice
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            override_format: Format::Unknown,
            override_view_type: None,
            most_detailed_mip: 0,
            mip_levels: u32::MAX,
            first_array_slice: 0,
            array_size: 1,
        }
    }
}

/// Shader resource view over a range of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferResourceViewDesc {
    /// Viewed buffer
    pub buffer: BufferHandle,
    /// Element format for texel access
    pub override_format: Format,
    /// First visible element
    pub first_element: u32,
    /// Number of visible elements
    pub element_count: u32,
}

/// Shader resource view creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceViewDesc {
    /// View of a texture
    Texture(TextureResourceViewDesc),
    /// View of a buffer
    Buffer(BufferResourceViewDesc),
}

/// Unordered access view over one mip of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUnorderedAccessViewDesc {
    /// Viewed texture
    pub texture: TextureHandle,
    /// Reinterpret the texels with this format
    pub override_format: Format,
    /// View the texture as a different type
    pub override_view_type: Option<TextureType>,
    /// Writable mip
    pub mip_level: u32,
    /// First writable slice
    pub first_array_slice: u32,
    /// Number of writable slices
    pub array_size: u32,
}

impl TextureUnorderedAccessViewDesc {
    /// Writable view of mip 0 of the first slice
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            override_format: Format::Unknown,
            override_view_type: None,
            mip_level: 0,
            first_array_slice: 0,
            array_size: 1,
        }
    }
}

/// Unordered access view over a range of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferUnorderedAccessViewDesc {
    /// Viewed buffer
    pub buffer: BufferHandle,
    /// Element format for texel access
    pub override_format: Format,
    /// First writable element
    pub first_element: u32,
    /// Number of writable elements
    pub element_count: u32,
    /// Byte-address access
    pub raw: bool,
}

/// Unordered access view creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnorderedAccessViewDesc {
    /// View of a texture
    Texture(TextureUnorderedAccessViewDesc),
    /// View of a buffer
    Buffer(BufferUnorderedAccessViewDesc),
}

/// Render target view creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetViewDesc {
    /// Target texture
    pub texture: TextureHandle,
    /// Reinterpret the texels with this format
    pub override_format: Format,
    /// View the texture as a different type
    pub override_view_type: Option<TextureType>,
    /// Target mip
    pub mip_level: u32,
    /// First target slice
    pub first_slice: u32,
    /// Number of target slices
    pub slice_count: u32,
    /// Bind as read-only depth
    pub read_only: bool,
}

impl RenderTargetViewDesc {
    /// Target mip 0 of the first slice
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            override_format: Format::Unknown,
            override_view_type: None,
            mip_level: 0,
            first_slice: 0,
            slice_count: 1,
            read_only: false,
        }
    }
}

/// Swap chain creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapChainDesc {
    /// Opaque identifier of the presentation surface
    pub window_id: u64,
    /// Back buffer width
    pub width: u32,
    /// Back buffer height
    pub height: u32,
    /// Back buffer format
    pub back_buffer_format: Format,
    /// Presentation mode
    pub present_mode: PresentMode,
    /// Allow the back buffer to be sampled
    pub allow_shader_resource_view: bool,
}

impl SwapChainDesc {
    /// Texture descriptor of the back buffer this swap chain presents
    pub fn back_buffer_desc(&self) -> TextureDesc {
        TextureDesc {
            allow_shader_resource_view: self.allow_shader_resource_view,
            ..TextureDesc::render_target(self.width, self.height, self.back_buffer_format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_helpers() {
        let vertex = BufferDesc::vertex(32, 100, true);
        assert_eq!(vertex.total_size, 3200);
        assert_eq!(vertex.struct_size, 32);
        assert!(vertex.usage.contains(BufferUsageFlags::VERTEX_BUFFER));

        let constant = BufferDesc::constant(256);
        assert!(constant.usage.contains(BufferUsageFlags::CONSTANT_BUFFER | BufferUsageFlags::TRANSIENT));
        assert!(!constant.allows_shader_resource_view());
    }

    #[test]
    fn test_back_buffer_is_render_target() {
        let desc = SwapChainDesc {
            window_id: 1,
            width: 1280,
            height: 720,
            back_buffer_format: Format::Bgra8Unorm,
            present_mode: PresentMode::VSync,
            allow_shader_resource_view: false,
        };
        let texture = desc.back_buffer_desc();
        assert!(texture.allow_render_target_view);
        assert!(!texture.immutable);
        assert_eq!(texture.width, 1280);
    }
}
