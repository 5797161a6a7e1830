//! Shader, layout, vertex declaration and pipeline descriptors

use std::sync::Arc;

use super::enums::{
    Format, PrimitiveTopology, ShaderResourceCategory, ShaderStage, ShaderStageFlags, TextureType,
    VertexBindingRate, VertexSemantic,
};
use crate::handles::{
    BindGroupLayoutHandle, BlendStateHandle, DepthStencilStateHandle, RasterizerStateHandle, ShaderHandle,
    VertexDeclarationHandle,
};

/// Number of bind groups a pipeline layout can reference
pub const MAX_BIND_GROUPS: usize = 4;

/// Number of vertex buffer bindings a vertex declaration may use
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// One entry of a shader's binding mapping, produced by shader reflection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderResourceBinding {
    /// Name the resource is bound by
    pub name: String,
    /// Kind of resource expected
    pub category: ShaderResourceCategory,
    /// Expected texture dimensionality for texture and texture UAV bindings
    pub texture_type: Option<TextureType>,
    /// Bind group the slot lives in
    pub bind_group: u32,
    /// Slot inside the bind group
    pub slot: u32,
    /// Stages reading the resource
    pub stages: ShaderStageFlags,
    /// Size of the block for constant buffers and push constants
    pub block_size: u32,
}

impl ShaderResourceBinding {
    /// Binding visible to the pixel stage in bind group 0
    pub fn new(name: impl Into<String>, category: ShaderResourceCategory, slot: u32) -> Self {
        Self {
            name: name.into(),
            category,
            texture_type: match category {
                ShaderResourceCategory::Texture | ShaderResourceCategory::TextureUav => Some(TextureType::Texture2D),
                _ => None,
            },
            bind_group: 0,
            slot,
            stages: ShaderStageFlags::PIXEL,
            block_size: 0,
        }
    }

    /// Builder-style override of the bind group
    pub fn in_group(mut self, bind_group: u32) -> Self {
        self.bind_group = bind_group;
        self
    }

    /// Builder-style override of the block size
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }
}

/// Shader creation descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderDesc {
    /// Compiled byte code per stage, indexed by [`ShaderStage`]
    pub byte_code: [Option<Arc<[u8]>>; ShaderStage::COUNT],
    /// Reflection data: every resource the shader reads or writes
    pub binding_mapping: Vec<ShaderResourceBinding>,
    /// Vertex attributes the vertex stage consumes
    pub vertex_inputs: Vec<VertexSemantic>,
}

impl ShaderDesc {
    /// Builder-style setter for one stage's byte code
    pub fn with_stage(mut self, stage: ShaderStage, byte_code: &[u8]) -> Self {
        self.byte_code[stage as usize] = Some(Arc::from(byte_code));
        self
    }

    /// Builder-style setter for the binding mapping
    pub fn with_bindings(mut self, bindings: Vec<ShaderResourceBinding>) -> Self {
        self.binding_mapping = bindings;
        self
    }

    /// Builder-style setter for the vertex inputs
    pub fn with_vertex_inputs(mut self, inputs: Vec<VertexSemantic>) -> Self {
        self.vertex_inputs = inputs;
        self
    }

    /// Whether byte code exists for `stage`
    pub fn has_byte_code_for_stage(&self, stage: ShaderStage) -> bool {
        self.byte_code[stage as usize].as_ref().is_some_and(|code| !code.is_empty())
    }

    /// Whether byte code exists for any stage
    pub fn has_any_byte_code(&self) -> bool {
        ShaderStage::ALL.iter().any(|&stage| self.has_byte_code_for_stage(stage))
    }
}

/// Bind group layout creation descriptor, derived from a shader's binding mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindGroupLayoutDesc {
    /// Bindings of one bind group, sorted by slot
    pub resource_bindings: Vec<ShaderResourceBinding>,
}

/// Push constant block of a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PushConstantRange {
    /// Size in bytes, 0 if the shader has no push constants
    pub size: u16,
    /// Offset in bytes
    pub offset: u16,
    /// Stages reading the block
    pub stages: ShaderStageFlags,
}

/// Pipeline layout creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipelineLayoutDesc {
    /// Layout per bind group, invalid for unused groups
    pub bind_groups: [BindGroupLayoutHandle; MAX_BIND_GROUPS],
    /// Push constant block
    pub push_constants: PushConstantRange,
}

/// One vertex attribute inside a vertex declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Attribute meaning
    pub semantic: VertexSemantic,
    /// Attribute format
    pub format: Format,
    /// Byte offset inside the vertex
    pub offset: u32,
    /// Vertex buffer binding the attribute is read from
    pub vertex_buffer_slot: u32,
}

/// Layout of one vertex buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexBinding {
    /// Bytes between consecutive elements
    pub stride: u32,
    /// Per-vertex or per-instance stepping
    pub rate: VertexBindingRate,
}

/// Vertex declaration creation descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexDeclarationDesc {
    /// Shader whose inputs the declaration feeds
    pub shader: ShaderHandle,
    /// Attributes of all streams
    pub attributes: Vec<VertexAttribute>,
    /// One entry per binding up to the highest slot used by `attributes`
    pub bindings: Vec<VertexBinding>,
}

/// Graphics pipeline creation descriptor
///
/// All handles must be valid except `vertex_declaration`, which is optional.
/// Creating a pipeline takes a reference on every valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineDesc {
    /// Shader, also defines the pipeline layout
    pub shader: ShaderHandle,
    /// Optional vertex declaration
    pub vertex_declaration: VertexDeclarationHandle,
    /// Rasterizer state
    pub rasterizer_state: RasterizerStateHandle,
    /// Blend state
    pub blend_state: BlendStateHandle,
    /// Depth-stencil state
    pub depth_stencil_state: DepthStencilStateHandle,
    /// Primitive topology
    pub topology: PrimitiveTopology,
}

/// Compute pipeline creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComputePipelineDesc {
    /// Compute shader
    pub shader: ShaderHandle,
}
