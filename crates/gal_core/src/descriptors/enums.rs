//! Enumerations shared by the creation descriptors

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Resource formats understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// No format. Valid for non-texel buffers only.
    #[default]
    Unknown,
    /// 8-bit single channel
    R8Unorm,
    /// 8-bit two channels
    Rg8Unorm,
    /// 8-bit RGBA
    Rgba8Unorm,
    /// 8-bit RGBA in sRGB space
    Rgba8UnormSrgb,
    /// 8-bit BGRA, the usual back buffer format
    Bgra8Unorm,
    /// 16-bit unsigned integer
    R16Uint,
    /// 16-bit float
    R16Float,
    /// Two 16-bit floats
    Rg16Float,
    /// Four 16-bit floats
    Rgba16Float,
    /// 32-bit unsigned integer
    R32Uint,
    /// 32-bit float
    R32Float,
    /// Two 32-bit floats
    Rg32Float,
    /// Three 32-bit floats
    Rgb32Float,
    /// Four 32-bit floats
    Rgba32Float,
    /// 16-bit depth
    D16,
    /// 24-bit depth with 8-bit stencil
    D24S8,
    /// 32-bit float depth
    D32Float,
}

impl Format {
    /// Size of one element in bytes, 0 for [`Format::Unknown`]
    pub const fn size_in_bytes(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::R16Uint | Self::R16Float | Self::D16 => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Rg16Float
            | Self::R32Uint
            | Self::R32Float
            | Self::D24S8
            | Self::D32Float => 4,
            Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgb32Float => 12,
            Self::Rgba32Float => 16,
        }
    }

    /// Whether this is a depth or depth-stencil format
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::D16 | Self::D24S8 | Self::D32Float)
    }
}

/// Dimensionality and sharing mode of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    /// Plain 2D texture
    #[default]
    Texture2D,
    /// Cube map
    TextureCube,
    /// Volume texture
    Texture3D,
    /// Array of 2D slices
    Texture2DArray,
    /// Array of cube maps
    TextureCubeArray,
    /// A single slice of a cube or array parent
    Texture2DProxy,
    /// 2D texture shared across processes
    Texture2DShared,
}

impl TextureType {
    /// Whether textures of this type may have an array size other than 1
    pub const fn is_array(self) -> bool {
        matches!(self, Self::Texture2DArray | Self::TextureCubeArray)
    }

    /// Whether this is a cube or cube array type
    pub const fn is_cube(self) -> bool {
        matches!(self, Self::TextureCube | Self::TextureCubeArray)
    }
}

/// Multisample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MsaaSampleCount {
    /// Single sample
    #[default]
    None,
    /// Two samples
    Two,
    /// Four samples
    Four,
    /// Eight samples
    Eight,
}

impl MsaaSampleCount {
    /// Number of samples per pixel
    pub const fn samples(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

bitflags! {
    /// How a buffer is going to be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsageFlags: u32 {
        /// Bound as a vertex stream
        const VERTEX_BUFFER = 1 << 0;
        /// Bound as an index buffer
        const INDEX_BUFFER = 1 << 1;
        /// Bound as a constant buffer
        const CONSTANT_BUFFER = 1 << 2;
        /// Typed buffer read through a format
        const TEXEL_BUFFER = 1 << 3;
        /// Array of fixed-size structs
        const STRUCTURED_BUFFER = 1 << 4;
        /// Raw byte-addressed buffer
        const BYTE_ADDRESS_BUFFER = 1 << 5;
        /// Readable from shaders through a resource view
        const SHADER_RESOURCE = 1 << 6;
        /// Writable from shaders through an unordered access view
        const UNORDERED_ACCESS = 1 << 7;
        /// Source of indirect draw arguments
        const DRAW_INDIRECT = 1 << 8;
        /// Contents are rewritten every frame and never initialised at creation
        const TRANSIENT = 1 << 9;
    }
}

/// Primitive assembly mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// Point list
    Points,
    /// Line list
    Lines,
    /// Triangle list
    Triangles,
}

impl PrimitiveTopology {
    /// Number of vertices or indices consumed by `primitives` primitives
    ///
    /// `None` when the count does not fit in 32 bits.
    pub const fn index_count(self, primitives: u32) -> Option<u32> {
        match self {
            Self::Points => Some(primitives),
            Self::Lines => primitives.checked_mul(2),
            Self::Triangles => primitives.checked_mul(3),
        }
    }

    /// Value of the `TOPOLOGY` shader permutation variable
    pub const fn permutation_value(self) -> &'static str {
        match self {
            Self::Points => "TOPOLOGY_POINTS",
            Self::Lines => "TOPOLOGY_LINES",
            Self::Triangles => "TOPOLOGY_TRIANGLES",
        }
    }
}

/// Advance rate of a vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexBindingRate {
    /// Advance per vertex
    #[default]
    Vertex,
    /// Advance per instance
    Instance,
}

/// Meaning of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    /// Object-space position
    Position,
    /// Normal vector
    Normal,
    /// Tangent vector
    Tangent,
    /// First vertex color
    Color0,
    /// Second vertex color
    Color1,
    /// First texture coordinate set
    TexCoord0,
    /// Second texture coordinate set
    TexCoord1,
    /// Skinning bone indices
    BoneIndices,
    /// Skinning bone weights
    BoneWeights,
}

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Hull shader
    Hull,
    /// Domain shader
    Domain,
    /// Geometry shader
    Geometry,
    /// Pixel shader
    Pixel,
    /// Compute shader
    Compute,
}

impl ShaderStage {
    /// Number of stages
    pub const COUNT: usize = 6;

    /// All stages in declaration order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
        Self::Compute,
    ];
}

bitflags! {
    /// Set of shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u8 {
        /// Vertex shader
        const VERTEX = 1 << 0;
        /// Hull shader
        const HULL = 1 << 1;
        /// Domain shader
        const DOMAIN = 1 << 2;
        /// Geometry shader
        const GEOMETRY = 1 << 3;
        /// Pixel shader
        const PIXEL = 1 << 4;
        /// Compute shader
        const COMPUTE = 1 << 5;
    }
}

/// Kind of resource a shader binding expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderResourceCategory {
    /// Sampled texture
    Texture,
    /// Sampler state
    Sampler,
    /// Read-only buffer
    Buffer,
    /// Writable texture
    TextureUav,
    /// Writable buffer
    BufferUav,
    /// Constant buffer
    ConstantBuffer,
    /// Push constant block
    PushConstants,
}

/// Comparison used by depth, stencil and shadow sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    /// Never passes
    #[default]
    Never,
    /// Passes if less
    Less,
    /// Passes if equal
    Equal,
    /// Passes if less or equal
    LessEqual,
    /// Passes if greater
    Greater,
    /// Passes if not equal
    NotEqual,
    /// Passes if greater or equal
    GreaterEqual,
    /// Always passes
    Always,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Blend {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSaturated,
    BlendFactor,
    InvBlendFactor,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Stencil buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementSaturated,
    DecrementSaturated,
    Invert,
    Increment,
    Decrement,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TextureFilterMode {
    Point,
    Linear,
    Anisotropic,
}

/// Texture coordinate addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TextureAddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

/// Swap chain presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// Present as soon as possible, may tear
    Immediate,
    /// Wait for vertical blank
    #[default]
    VSync,
}
