//! Fixed-function state descriptors
//!
//! These are the de-duplicated state objects: two descriptors that compare
//! equal always resolve to the same device handle.

use std::hash::{Hash, Hasher};

use super::enums::{Blend, BlendOp, CompareFunc, CullMode, StencilOp, TextureAddressMode, TextureFilterMode};

/// Maximum number of simultaneously bound render targets
pub const MAX_RENDER_TARGETS: usize = 8;

/// Blend configuration of a single render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlendDesc {
    /// Enable blending for this target
    pub blending_enabled: bool,
    /// Color source factor
    pub source_blend: Blend,
    /// Color destination factor
    pub dest_blend: Blend,
    /// Color operation
    pub blend_op: BlendOp,
    /// Alpha source factor
    pub source_blend_alpha: Blend,
    /// Alpha destination factor
    pub dest_blend_alpha: Blend,
    /// Alpha operation
    pub blend_op_alpha: BlendOp,
    /// RGBA channel write mask in the low four bits
    pub write_mask: u8,
}

impl Default for RenderTargetBlendDesc {
    fn default() -> Self {
        Self {
            blending_enabled: false,
            source_blend: Blend::One,
            dest_blend: Blend::One,
            blend_op: BlendOp::Add,
            source_blend_alpha: Blend::One,
            dest_blend_alpha: Blend::One,
            blend_op_alpha: BlendOp::Add,
            write_mask: 0xF,
        }
    }
}

/// Blend state creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlendStateDesc {
    /// Per-target configuration; only the first is used unless `independent_blend` is set
    pub render_targets: [RenderTargetBlendDesc; MAX_RENDER_TARGETS],
    /// Use alpha as a coverage mask
    pub alpha_to_coverage: bool,
    /// Blend every target with its own configuration
    pub independent_blend: bool,
}

impl BlendStateDesc {
    /// Standard premultiplied-alpha style blending on target 0
    pub fn alpha_blended() -> Self {
        let mut desc = Self::default();
        desc.render_targets[0] = RenderTargetBlendDesc {
            blending_enabled: true,
            source_blend: Blend::SrcAlpha,
            dest_blend: Blend::InvSrcAlpha,
            ..RenderTargetBlendDesc::default()
        };
        desc
    }
}

/// Stencil operations for one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilOpDesc {
    /// Operation when the stencil test fails
    pub fail_op: StencilOp,
    /// Operation when stencil passes but depth fails
    pub depth_fail_op: StencilOp,
    /// Operation when both tests pass
    pub pass_op: StencilOp,
    /// Stencil comparison
    pub stencil_func: CompareFunc,
}

impl Default for StencilOpDesc {
    fn default() -> Self {
        Self {
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            stencil_func: CompareFunc::Always,
        }
    }
}

/// Depth-stencil state creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDesc {
    /// Front-face stencil operations
    pub front_face: StencilOpDesc,
    /// Back-face stencil operations, used when `separate_front_and_back` is set
    pub back_face: StencilOpDesc,
    /// Depth comparison
    pub depth_test_func: CompareFunc,
    /// Use different stencil operations per face
    pub separate_front_and_back: bool,
    /// Enable depth testing
    pub depth_test: bool,
    /// Enable depth writes
    pub depth_write: bool,
    /// Enable stencil testing
    pub stencil_test: bool,
    /// Stencil read mask
    pub stencil_read_mask: u8,
    /// Stencil write mask
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self {
            front_face: StencilOpDesc::default(),
            back_face: StencilOpDesc::default(),
            depth_test_func: CompareFunc::Less,
            separate_front_and_back: false,
            depth_test: true,
            depth_write: true,
            stencil_test: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
        }
    }
}

/// Rasterizer state creation descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerStateDesc {
    /// Which faces to cull
    pub cull_mode: CullMode,
    /// Constant depth bias
    pub depth_bias: i32,
    /// Maximum depth bias
    pub depth_bias_clamp: f32,
    /// Slope-scaled depth bias
    pub slope_scaled_depth_bias: f32,
    /// Render wireframe
    pub wireframe: bool,
    /// Counter-clockwise triangles are front facing
    pub front_counter_clockwise: bool,
    /// Enable scissor rectangle
    pub scissor_test: bool,
    /// Enable conservative rasterization
    pub conservative_rasterization: bool,
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            wireframe: false,
            front_counter_clockwise: false,
            scissor_test: false,
            conservative_rasterization: false,
        }
    }
}

impl Hash for RasterizerStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cull_mode.hash(state);
        self.depth_bias.hash(state);
        self.depth_bias_clamp.to_bits().hash(state);
        self.slope_scaled_depth_bias.to_bits().hash(state);
        self.wireframe.hash(state);
        self.front_counter_clockwise.hash(state);
        self.scissor_test.hash(state);
        self.conservative_rasterization.hash(state);
    }
}

/// Sampler state creation descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStateDesc {
    /// Minification filter
    pub min_filter: TextureFilterMode,
    /// Magnification filter
    pub mag_filter: TextureFilterMode,
    /// Mip filter
    pub mip_filter: TextureFilterMode,
    /// Addressing along U
    pub address_u: TextureAddressMode,
    /// Addressing along V
    pub address_v: TextureAddressMode,
    /// Addressing along W
    pub address_w: TextureAddressMode,
    /// Comparison for shadow sampling, `Never` disables it
    pub sample_compare_func: CompareFunc,
    /// Border color for [`TextureAddressMode::Border`]
    pub border_color: [f32; 4],
    /// Mip level bias
    pub mip_lod_bias: f32,
    /// Lowest mip to sample
    pub min_mip: f32,
    /// Highest mip to sample
    pub max_mip: f32,
    /// Anisotropy for [`TextureFilterMode::Anisotropic`]
    pub max_anisotropy: u32,
}

impl Default for SamplerStateDesc {
    fn default() -> Self {
        Self {
            min_filter: TextureFilterMode::Linear,
            mag_filter: TextureFilterMode::Linear,
            mip_filter: TextureFilterMode::Linear,
            address_u: TextureAddressMode::Wrap,
            address_v: TextureAddressMode::Wrap,
            address_w: TextureAddressMode::Wrap,
            sample_compare_func: CompareFunc::Never,
            border_color: [0.0; 4],
            mip_lod_bias: 0.0,
            min_mip: -f32::MAX,
            max_mip: f32::MAX,
            max_anisotropy: 4,
        }
    }
}

impl Hash for SamplerStateDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min_filter.hash(state);
        self.mag_filter.hash(state);
        self.mip_filter.hash(state);
        self.address_u.hash(state);
        self.address_v.hash(state);
        self.address_w.hash(state);
        self.sample_compare_func.hash(state);
        for channel in self.border_color {
            channel.to_bits().hash(state);
        }
        self.mip_lod_bias.to_bits().hash(state);
        self.min_mip.to_bits().hash(state);
        self.max_mip.to_bits().hash(state);
        self.max_anisotropy.hash(state);
    }
}
