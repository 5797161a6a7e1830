//! Command recording interface driven by the render context

use crate::descriptors::ShaderResourceBinding;
use crate::handles::{
    BufferHandle, ComputePipelineHandle, GraphicsPipelineHandle, ResourceViewHandle, SamplerStateHandle,
    UnorderedAccessViewHandle,
};

/// Records GPU commands for one thread
///
/// The render context only calls into the encoder from
/// [`RenderContext::apply_context_states`](crate::context::RenderContext::apply_context_states)
/// and the draw/dispatch wrappers, always with handles that are already resolved.
pub trait CommandEncoder {
    /// Bind a graphics pipeline
    fn set_graphics_pipeline(&mut self, pipeline: GraphicsPipelineHandle);

    /// Bind a compute pipeline
    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle);

    /// Bind a vertex stream
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u32);

    /// Bind the index buffer, invalid to unbind
    fn set_index_buffer(&mut self, buffer: BufferHandle);

    /// Bind a shader resource view to the given reflected slot
    fn set_resource_view(&mut self, binding: &ShaderResourceBinding, view: ResourceViewHandle);

    /// Bind an unordered access view to the given reflected slot
    fn set_unordered_access_view(&mut self, binding: &ShaderResourceBinding, view: UnorderedAccessViewHandle);

    /// Bind a sampler to the given reflected slot
    fn set_sampler_state(&mut self, binding: &ShaderResourceBinding, sampler: SamplerStateHandle);

    /// Bind a constant buffer to the given reflected slot
    fn set_constant_buffer(&mut self, binding: &ShaderResourceBinding, buffer: BufferHandle);

    /// Copy `data` into `buffer` at `offset` as part of the command stream
    fn update_buffer(&mut self, buffer: BufferHandle, offset: u32, data: &[u8]);

    /// Non-indexed draw
    fn draw(&mut self, vertex_count: u32, first_vertex: u32);

    /// Indexed draw
    fn draw_indexed(&mut self, index_count: u32, first_index: u32);

    /// Instanced non-indexed draw
    fn draw_instanced(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32);

    /// Instanced indexed draw
    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32, first_index: u32);

    /// Compute dispatch
    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32);
}
