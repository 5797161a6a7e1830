//! Seam between the render context and the resource manager
//!
//! Materials and shader permutations live outside the device. The context
//! only knows them by id and asks a [`ResourceProvider`] to turn those ids
//! into device handles when it applies state.

use std::collections::BTreeMap;

use crate::handles::{
    BlendStateHandle, BufferHandle, DepthStencilStateHandle, RasterizerStateHandle, SamplerStateHandle, ShaderHandle,
    TextureHandle,
};

/// Id of a material owned by the resource manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u64);

/// Id of a shader resource; a shader resource has one GAL shader per permutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u64);

/// Permutation variables, sorted by name
pub type PermutationVars = BTreeMap<String, String>;

/// Everything a material contributes to the context state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialBindings {
    /// Shader the material renders with, `None` while it is not loaded
    pub shader: Option<ShaderId>,
    /// Permutation variables the material selects
    pub permutation_vars: Vec<(String, String)>,
    /// Textures by slot name
    pub textures: Vec<(String, TextureHandle)>,
    /// Samplers by slot name
    pub samplers: Vec<(String, SamplerStateHandle)>,
    /// Read-only buffers by slot name
    pub buffers: Vec<(String, BufferHandle)>,
    /// Constant buffers by slot name, usually the material's parameter block
    pub constant_buffers: Vec<(String, BufferHandle)>,
}

/// Compiled shader permutation with the render states it declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPermutation {
    /// GAL shader of the permutation
    pub shader: ShaderHandle,
    /// Blend state declared by the shader
    pub blend_state: BlendStateHandle,
    /// Rasterizer state declared by the shader
    pub rasterizer_state: RasterizerStateHandle,
    /// Depth-stencil state declared by the shader
    pub depth_stencil_state: DepthStencilStateHandle,
}

/// Resolves materials and shader permutations for a render context
///
/// Both lookups may return `None` while resources are still loading; the
/// context then skips the draw and tries again on the next apply.
pub trait ResourceProvider: Send + Sync {
    /// Shader, permutation variables and bindings of a material
    fn resolve_material(&self, material: MaterialId) -> Option<MaterialBindings>;

    /// GAL shader and render states for `shader` under `vars`
    fn resolve_permutation(&self, shader: ShaderId, vars: &PermutationVars) -> Option<ShaderPermutation>;
}
