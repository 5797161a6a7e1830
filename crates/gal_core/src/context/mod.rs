//! Render context
//!
//! A [`RenderContext`] sits between rendering code and one command encoder.
//! Mutators such as [`RenderContext::bind_texture`] only record the desired
//! value and raise a [`StateFlags`] bit when it actually changed. Right before
//! a draw or dispatch, [`RenderContext::apply_context_states`] resolves the
//! dirty parts in a fixed order and issues the resulting handles:
//!
//! 1. material, which may bind a shader, permutation variables and resources
//! 2. shader permutation, which decides the binding layout and render states
//! 3. resource bindings, after uploading modified constant storages
//! 4. vertex and index buffers plus the vertex declaration
//! 5. the pipeline, fetched through the device's pipeline cache
//!
//! The device owns every GPU object; the context only keeps references to
//! the default samplers, vertex declarations and constant buffers it
//! created itself and releases them when dropped.

mod bindings;
mod constant_buffers;
mod provider;
mod samplers;
mod state_flags;
mod vertex_declarations;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use bytemuck::Pod;
use log::{debug, warn};

use crate::backend::CommandEncoder;
use crate::config::RenderContextConfig;
use crate::descriptors::{
    ComputePipelineDesc, GraphicsPipelineDesc, MsaaSampleCount, PrimitiveTopology, ShaderResourceBinding,
    ShaderResourceCategory, VertexBindingRate,
};
use crate::device::Device;
use crate::error::{ApplyError, GalResult};
use crate::handles::{
    BlendStateHandle, BufferHandle, DepthStencilStateHandle, GalHandle, RasterizerStateHandle, SamplerStateHandle,
    ShaderHandle, TextureHandle, UnorderedAccessViewHandle, VertexDeclarationHandle,
};

use bindings::BoundResources;
use constant_buffers::ConstantStoragePool;
use samplers::DefaultSamplers;
use vertex_declarations::VertexDeclarationCache;

pub use bindings::ConstantBinding;
pub use constant_buffers::{ConstantStorageHandle, GlobalConstants, CONSTANT_BUFFER_ALIGNMENT};
pub use provider::{MaterialBindings, MaterialId, PermutationVars, ResourceProvider, ShaderId, ShaderPermutation};
pub use samplers::default_sampler_desc;
pub use state_flags::{DefaultSamplerFlags, ShaderBindFlags, StateFlags};
pub use vertex_declarations::VertexLayout;

/// Vertex buffer slots a render context can bind
pub const MAX_CONTEXT_VERTEX_BUFFERS: usize = 4;

/// Slot name the global constants are bound to
pub const GLOBAL_CONSTANTS_SLOT: &str = "GlobalConstants";

/// Permutation variable set from the bound mesh's topology
pub const TOPOLOGY_PERMUTATION: &str = "TOPOLOGY";

/// Permutation variable set from the rendering scope's sample count
pub const MSAA_PERMUTATION: &str = "MSAA";

const TIME_WRAP_AROUND: f64 = 1000.0;

/// Size of the area rendered to, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

/// Buffers and layout of one mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBufferBinding {
    /// Vertex streams; unused slots stay invalid
    pub vertex_buffers: [BufferHandle; MAX_CONTEXT_VERTEX_BUFFERS],
    /// Index buffer, invalid for non-indexed meshes
    pub index_buffer: BufferHandle,
    /// Attributes of the vertex streams
    pub layout: Option<Arc<VertexLayout>>,
    /// Primitive assembly mode
    pub topology: PrimitiveTopology,
    /// Primitives in the mesh
    pub primitive_count: u32,
}

impl MeshBufferBinding {
    /// Mesh with a single vertex stream
    pub fn new(
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        layout: Arc<VertexLayout>,
        topology: PrimitiveTopology,
        primitive_count: u32,
    ) -> Self {
        let mut vertex_buffers = [BufferHandle::invalid(); MAX_CONTEXT_VERTEX_BUFFERS];
        vertex_buffers[0] = vertex_buffer;
        Self {
            vertex_buffers,
            index_buffer,
            layout: Some(layout),
            topology,
            primitive_count,
        }
    }

    /// Builder-style setter for an additional vertex stream
    pub fn with_vertex_buffer(mut self, slot: usize, buffer: BufferHandle) -> Self {
        if let Some(entry) = self.vertex_buffers.get_mut(slot) {
            *entry = buffer;
        }
        self
    }
}

/// Counters since the last [`RenderContext::reset_statistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStatistics {
    /// Draws and dispatches skipped because state could not be applied
    pub failed_drawcalls: u32,
    /// Shader slots that had nothing bound
    pub missing_bindings: u32,
    /// Pipelines set on the encoder
    pub pipeline_changes: u32,
    /// Constant storages copied to the GPU
    pub constant_uploads: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Idle,
    Rendering,
    Compute,
}

struct GraphicsState {
    shader: ShaderHandle,
    vertex_declaration: VertexDeclarationHandle,
    blend_state: BlendStateHandle,
    rasterizer_state: RasterizerStateHandle,
    depth_stencil_state: DepthStencilStateHandle,
    topology: Option<PrimitiveTopology>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            shader: ShaderHandle::invalid(),
            vertex_declaration: VertexDeclarationHandle::invalid(),
            blend_state: BlendStateHandle::invalid(),
            rasterizer_state: RasterizerStateHandle::invalid(),
            depth_stencil_state: DepthStencilStateHandle::invalid(),
            topology: None,
        }
    }
}

struct MeshState {
    vertex_buffers: [BufferHandle; MAX_CONTEXT_VERTEX_BUFFERS],
    strides: [u32; MAX_CONTEXT_VERTEX_BUFFERS],
    rates: [VertexBindingRate; MAX_CONTEXT_VERTEX_BUFFERS],
    offsets: [u32; MAX_CONTEXT_VERTEX_BUFFERS],
    index_buffer: BufferHandle,
    layout: Option<Arc<VertexLayout>>,
    primitive_count: u32,
}

impl Default for MeshState {
    fn default() -> Self {
        Self {
            vertex_buffers: [BufferHandle::invalid(); MAX_CONTEXT_VERTEX_BUFFERS],
            strides: [0; MAX_CONTEXT_VERTEX_BUFFERS],
            rates: [VertexBindingRate::Vertex; MAX_CONTEXT_VERTEX_BUFFERS],
            offsets: [0; MAX_CONTEXT_VERTEX_BUFFERS],
            index_buffer: BufferHandle::invalid(),
            layout: None,
            primitive_count: 0,
        }
    }
}

impl MeshState {
    fn has_vertex_buffers(&self) -> bool {
        self.vertex_buffers.iter().any(|buffer| !buffer.is_invalid())
    }
}

/// Dirty-state tracker in front of one command encoder
pub struct RenderContext<E: CommandEncoder> {
    device: Arc<Device>,
    provider: Arc<dyn ResourceProvider>,
    encoder: E,
    config: RenderContextConfig,

    flags: StateFlags,
    scope: Scope,
    statistics: ContextStatistics,

    material: Option<MaterialId>,
    new_material: Option<MaterialId>,
    active_shader: Option<ShaderId>,
    shader_bind_flags: ShaderBindFlags,
    permutation_vars: PermutationVars,
    binding_mapping: Option<Arc<[ShaderResourceBinding]>>,

    graphics: GraphicsState,
    mesh: MeshState,
    bound: BoundResources,

    constant_storages: ConstantStoragePool,
    global_constants: ConstantStorageHandle,
    vertex_declarations: VertexDeclarationCache,
    default_samplers: DefaultSamplers,
}

impl<E: CommandEncoder> RenderContext<E> {
    /// Create a context recording into `encoder`
    ///
    /// # Errors
    ///
    /// Fails when the device cannot create the global constant buffer.
    pub fn new(device: Arc<Device>, provider: Arc<dyn ResourceProvider>, encoder: E) -> GalResult<Self> {
        let config = device.config().render_context;
        let mut constant_storages = ConstantStoragePool::default();
        let size = u32::try_from(std::mem::size_of::<GlobalConstants>()).unwrap_or(u32::MAX);
        let global_constants = constant_storages.create(&device, size)?;

        let mut context = Self {
            device,
            provider,
            encoder,
            config,
            flags: StateFlags::ALL_STATES_INVALID,
            scope: Scope::Idle,
            statistics: ContextStatistics::default(),
            material: None,
            new_material: None,
            active_shader: None,
            shader_bind_flags: ShaderBindFlags::empty(),
            permutation_vars: PermutationVars::new(),
            binding_mapping: None,
            graphics: GraphicsState::default(),
            mesh: MeshState::default(),
            bound: BoundResources::default(),
            constant_storages,
            global_constants,
            vertex_declarations: VertexDeclarationCache::default(),
            default_samplers: DefaultSamplers::default(),
        };
        context.reset_context_state();
        debug!("Created render context");
        Ok(context)
    }

    /// Device the context creates its objects on
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Encoder commands are recorded into
    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Mutable access to the encoder, for commands the context does not track
    pub fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    /// Parts of the state that will be resolved by the next apply
    pub fn state_flags(&self) -> StateFlags {
        self.flags
    }

    /// GAL shader of the last successfully resolved permutation
    pub fn active_gal_shader(&self) -> ShaderHandle {
        self.graphics.shader
    }

    /// Counters accumulated since the last reset
    pub fn statistics(&self) -> ContextStatistics {
        self.statistics
    }

    /// Return the counters and start over
    pub fn reset_statistics(&mut self) -> ContextStatistics {
        std::mem::take(&mut self.statistics)
    }

    // Scopes

    /// Start recording draws into render targets of the given size
    pub fn begin_rendering(&mut self, viewport: Viewport, msaa: MsaaSampleCount) {
        if self.scope != Scope::Idle {
            warn!("begin_rendering called inside a {:?} scope", self.scope);
            return;
        }
        self.scope = Scope::Rendering;
        self.flags |= StateFlags::PIPELINE_CHANGED;

        let msaa_value = if msaa == MsaaSampleCount::None { "FALSE" } else { "TRUE" };
        self.set_permutation_variable(MSAA_PERMUTATION, msaa_value);

        let mut constants = self.global_constants();
        constants.viewport_size = [
            viewport.width,
            viewport.height,
            1.0 / viewport.width,
            1.0 / viewport.height,
        ];
        constants.msaa_samples = msaa.samples();
        self.write_global_constants(&constants);
    }

    /// Leave the rendering scope
    pub fn end_rendering(&mut self) {
        if self.scope != Scope::Rendering {
            warn!("end_rendering called outside a rendering scope");
            return;
        }
        self.scope = Scope::Idle;
    }

    /// Start recording dispatches
    pub fn begin_compute(&mut self) {
        if self.scope != Scope::Idle {
            warn!("begin_compute called inside a {:?} scope", self.scope);
            return;
        }
        self.scope = Scope::Compute;
        self.flags |= StateFlags::PIPELINE_CHANGED;
    }

    /// Leave the compute scope
    pub fn end_compute(&mut self) {
        if self.scope != Scope::Compute {
            warn!("end_compute called outside a compute scope");
            return;
        }
        self.scope = Scope::Idle;
        self.flags |= StateFlags::PIPELINE_CHANGED;
    }

    /// Whether a rendering scope is open
    pub fn is_rendering(&self) -> bool {
        self.scope == Scope::Rendering
    }

    /// Whether a compute scope is open
    pub fn is_compute(&self) -> bool {
        self.scope == Scope::Compute
    }

    // Material, shader and render states

    /// Bind a material; its shader and resources are resolved on the next apply
    pub fn bind_material(&mut self, material: MaterialId) {
        if self.new_material != Some(material) {
            self.new_material = Some(material);
            self.flags |= StateFlags::MATERIAL_BINDING_CHANGED;
        }
    }

    /// Bind a shader directly, dropping any bound material
    pub fn bind_shader(&mut self, shader: ShaderId, flags: ShaderBindFlags) {
        self.material = None;
        self.new_material = None;
        self.flags.remove(StateFlags::MATERIAL_BINDING_CHANGED);
        self.bind_shader_internal(Some(shader), flags);
    }

    fn bind_shader_internal(&mut self, shader: Option<ShaderId>, flags: ShaderBindFlags) {
        if flags.contains(ShaderBindFlags::FORCE_REBIND) || self.active_shader != shader {
            self.shader_bind_flags = flags;
            self.active_shader = shader;
            self.flags |= StateFlags::SHADER_STATE_CHANGED;
        }
    }

    /// Set a shader permutation variable
    pub fn set_permutation_variable(&mut self, name: &str, value: &str) {
        if self.permutation_vars.get(name).map(String::as_str) != Some(value) {
            self.permutation_vars.insert(name.to_string(), value.to_string());
            self.flags |= StateFlags::SHADER_STATE_CHANGED;
        }
    }

    /// Current value of a permutation variable
    pub fn permutation_variable(&self, name: &str) -> Option<&str> {
        self.permutation_vars.get(name).map(String::as_str)
    }

    /// Override the blend state; shaders bound without `NO_BLEND_STATE` replace it
    pub fn set_blend_state(&mut self, blend_state: BlendStateHandle) {
        if self.graphics.blend_state != blend_state {
            self.graphics.blend_state = blend_state;
            self.flags |= StateFlags::PIPELINE_CHANGED;
        }
    }

    /// Override the depth-stencil state
    pub fn set_depth_stencil_state(&mut self, depth_stencil_state: DepthStencilStateHandle) {
        if self.graphics.depth_stencil_state != depth_stencil_state {
            self.graphics.depth_stencil_state = depth_stencil_state;
            self.flags |= StateFlags::PIPELINE_CHANGED;
        }
    }

    /// Override the rasterizer state
    pub fn set_rasterizer_state(&mut self, rasterizer_state: RasterizerStateHandle) {
        if self.graphics.rasterizer_state != rasterizer_state {
            self.graphics.rasterizer_state = rasterizer_state;
            self.flags |= StateFlags::PIPELINE_CHANGED;
        }
    }

    // Resource bindings. An invalid handle unbinds the slot.

    /// Bind a texture's default resource view to a slot
    pub fn bind_texture(&mut self, name: &str, texture: TextureHandle) {
        self.flags |= self.bound.bind_texture(name, texture);
    }

    /// Bind a sampler to a slot
    pub fn bind_sampler(&mut self, name: &str, sampler: SamplerStateHandle) {
        self.flags |= self.bound.bind_sampler(name, sampler);
    }

    /// Bind a buffer's default resource view to a slot
    pub fn bind_buffer(&mut self, name: &str, buffer: BufferHandle) {
        self.flags |= self.bound.bind_buffer(name, buffer);
    }

    /// Bind an unordered access view to a slot
    pub fn bind_unordered_access_view(&mut self, name: &str, view: UnorderedAccessViewHandle) {
        self.flags |= self.bound.bind_unordered_access_view(name, view);
    }

    /// Bind a caller-managed constant buffer to a slot
    pub fn bind_constant_buffer(&mut self, name: &str, buffer: BufferHandle) {
        self.flags |= self.bound.bind_constant_buffer(name, Some(ConstantBinding::Buffer(buffer)));
    }

    /// Bind a constant storage to a slot
    pub fn bind_constant_storage(&mut self, name: &str, storage: ConstantStorageHandle) {
        self.flags |= self.bound.bind_constant_buffer(name, Some(ConstantBinding::Storage(storage)));
    }

    /// Remove whatever constant buffer is bound to a slot
    pub fn unbind_constant_buffer(&mut self, name: &str) {
        self.flags |= self.bound.bind_constant_buffer(name, None);
    }

    // Mesh buffers

    /// Bind the vertex and index buffers of a mesh
    ///
    /// A topology change also sets the `TOPOLOGY` permutation variable.
    pub fn bind_mesh_buffer(&mut self, mesh: &MeshBufferBinding) {
        let current = &self.mesh;
        if current.vertex_buffers == mesh.vertex_buffers
            && current.index_buffer == mesh.index_buffer
            && current.layout == mesh.layout
            && current.primitive_count == mesh.primitive_count
            && self.graphics.topology == Some(mesh.topology)
        {
            return;
        }

        if self.graphics.topology != Some(mesh.topology) {
            self.graphics.topology = Some(mesh.topology);
            self.flags |= StateFlags::PIPELINE_CHANGED;
            self.set_permutation_variable(TOPOLOGY_PERMUTATION, mesh.topology.permutation_value());
        }

        for (slot, &buffer) in mesh.vertex_buffers.iter().enumerate() {
            self.mesh.vertex_buffers[slot] = buffer;
            self.mesh.strides[slot] = self.vertex_stride(buffer);
            self.mesh.rates[slot] = VertexBindingRate::Vertex;
            self.mesh.offsets[slot] = 0;
        }
        self.mesh.index_buffer = mesh.index_buffer;
        self.mesh.layout.clone_from(&mesh.layout);
        self.mesh.primitive_count = mesh.primitive_count;

        self.flags |= StateFlags::MESH_BUFFER_BINDING_CHANGED;
    }

    /// Bind a single vertex stream, keeping the rest of the mesh
    pub fn bind_vertex_buffer(&mut self, slot: usize, buffer: BufferHandle, rate: VertexBindingRate, offset: u32) {
        if slot >= MAX_CONTEXT_VERTEX_BUFFERS {
            warn!("Vertex buffer slot {slot} is out of bounds");
            return;
        }
        let mesh = &self.mesh;
        if mesh.vertex_buffers[slot] == buffer && mesh.rates[slot] == rate && mesh.offsets[slot] == offset {
            return;
        }

        self.mesh.vertex_buffers[slot] = buffer;
        self.mesh.strides[slot] = self.vertex_stride(buffer);
        self.mesh.rates[slot] = rate;
        self.mesh.offsets[slot] = offset;
        self.flags |= StateFlags::MESH_BUFFER_BINDING_CHANGED;
    }

    /// Bind the index buffer, invalid for non-indexed draws
    pub fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        if self.mesh.index_buffer != buffer {
            self.mesh.index_buffer = buffer;
            self.flags |= StateFlags::MESH_BUFFER_BINDING_CHANGED;
        }
    }

    fn vertex_stride(&self, buffer: BufferHandle) -> u32 {
        if buffer.is_invalid() {
            return 0;
        }
        self.device.buffer_desc(buffer).map_or(0, |desc| desc.struct_size)
    }

    // Constant storages

    /// Create a zeroed constant storage of `size` bytes
    ///
    /// # Errors
    ///
    /// Fails for sizes that are not a non-zero multiple of
    /// [`CONSTANT_BUFFER_ALIGNMENT`] and when the device cannot create the
    /// buffer.
    pub fn create_constant_storage(&mut self, size: u32) -> GalResult<ConstantStorageHandle> {
        self.constant_storages.create(&self.device, size)
    }

    /// Create a constant storage sized for `T`
    ///
    /// # Errors
    ///
    /// See [`RenderContext::create_constant_storage`].
    pub fn create_constant_storage_for<T: Pod>(&mut self) -> GalResult<ConstantStorageHandle> {
        let size = u32::try_from(std::mem::size_of::<T>()).unwrap_or(u32::MAX);
        self.create_constant_storage(size)
    }

    /// Return a storage to the pool; false if it was already deleted
    pub fn delete_constant_storage(&mut self, storage: ConstantStorageHandle) -> bool {
        if storage == self.global_constants {
            warn!("The global constant storage belongs to the render context");
            return false;
        }
        self.constant_storages.delete(storage)
    }

    /// Overwrite part of a storage; it is uploaded on the next apply
    ///
    /// # Errors
    ///
    /// Fails for deleted storages and writes past the end.
    pub fn write_constant_storage(&mut self, storage: ConstantStorageHandle, offset: u32, bytes: &[u8]) -> GalResult<()> {
        self.constant_storages.write(storage, offset, bytes)
    }

    /// Overwrite a storage with a plain-data value
    ///
    /// # Errors
    ///
    /// See [`RenderContext::write_constant_storage`].
    pub fn write_constants<T: Pod>(&mut self, storage: ConstantStorageHandle, value: &T) -> GalResult<()> {
        self.write_constant_storage(storage, 0, bytemuck::bytes_of(value))
    }

    /// CPU-side contents of a storage
    pub fn constant_storage_data(&self, storage: ConstantStorageHandle) -> Option<&[u8]> {
        self.constant_storages.data(storage)
    }

    /// GPU buffer behind a storage
    pub fn constant_storage_buffer(&self, storage: ConstantStorageHandle) -> Option<BufferHandle> {
        self.constant_storages.buffer(storage)
    }

    /// Deleted storages of `size` bytes waiting for reuse
    pub fn pooled_constant_storages(&self, size: u32) -> usize {
        self.constant_storages.free_count(size)
    }

    /// Storages currently in use, including the global constants
    pub fn live_constant_storages(&self) -> usize {
        self.constant_storages.live_count()
    }

    /// Storage bound to [`GLOBAL_CONSTANTS_SLOT`]
    pub fn global_constants_storage(&self) -> ConstantStorageHandle {
        self.global_constants
    }

    /// Current global constants
    pub fn global_constants(&self) -> GlobalConstants {
        self.constant_storages
            .data(self.global_constants)
            .map(bytemuck::pod_read_unaligned)
            .unwrap_or_default()
    }

    /// Replace the global constants
    pub fn write_global_constants(&mut self, constants: &GlobalConstants) {
        if let Err(err) = self.constant_storages.write(self.global_constants, 0, bytemuck::bytes_of(constants)) {
            warn!("Failed to write global constants: {err}");
        }
    }

    /// Update the time values of the global constants, wrapping long running clocks
    pub fn set_global_and_world_time(&mut self, delta_seconds: f64, global_seconds: f64, world_seconds: f64) {
        let mut constants = self.global_constants();
        constants.delta_time = delta_seconds as f32;
        constants.global_time = global_seconds.rem_euclid(TIME_WRAP_AROUND) as f32;
        constants.world_time = world_seconds.rem_euclid(TIME_WRAP_AROUND) as f32;
        self.write_global_constants(&constants);
    }

    /// Default sampler for `flags`, created on first use
    ///
    /// # Errors
    ///
    /// Fails when the device cannot create the sampler state.
    pub fn default_sampler(&mut self, flags: DefaultSamplerFlags) -> GalResult<SamplerStateHandle> {
        self.default_samplers.get(&self.device, flags, &self.config)
    }

    /// Vertex declarations cached by this context, failed ones included
    pub fn cached_vertex_declarations(&self) -> usize {
        self.vertex_declarations.len()
    }

    /// Vertex declaration lookups served from the cache
    pub fn vertex_declaration_cache_hits(&self) -> u64 {
        self.vertex_declarations.hits()
    }

    // Draws

    /// Draw `primitive_count` primitives of the bound mesh starting at `first_primitive`
    ///
    /// The count is clamped to the primitives left in the mesh. Indexed and
    /// instanced variants are picked from the bound index buffer and
    /// `instance_count`.
    ///
    /// # Errors
    ///
    /// Any [`ApplyError`]; the draw is skipped and counted as failed.
    pub fn draw_mesh_buffer(
        &mut self,
        primitive_count: u32,
        first_primitive: u32,
        instance_count: u32,
    ) -> Result<(), ApplyError> {
        let result = self.try_draw_mesh_buffer(primitive_count, first_primitive, instance_count);
        if result.is_err() {
            self.statistics.failed_drawcalls += 1;
        }
        result
    }

    fn try_draw_mesh_buffer(
        &mut self,
        primitive_count: u32,
        first_primitive: u32,
        instance_count: u32,
    ) -> Result<(), ApplyError> {
        if self.scope != Scope::Rendering {
            return Err(ApplyError::NoScope);
        }
        self.apply_context_states(false)?;

        if primitive_count == 0 || instance_count == 0 {
            return Err(ApplyError::EmptyDraw);
        }
        let available = self.mesh.primitive_count;
        if first_primitive >= available {
            return Err(ApplyError::InvalidDrawRange {
                first: first_primitive,
                available,
            });
        }
        let topology = self.graphics.topology.ok_or(ApplyError::MissingTopology)?;

        let primitive_count = primitive_count.min(available - first_primitive);
        let overflow = ApplyError::IndexRangeOverflow {
            first: first_primitive,
            primitives: primitive_count,
        };
        let (Some(index_count), Some(first_index), Some(_)) = (
            topology.index_count(primitive_count),
            topology.index_count(first_primitive),
            topology.index_count(first_primitive + primitive_count),
        ) else {
            return Err(overflow);
        };
        let indexed = !self.mesh.index_buffer.is_invalid();

        match (indexed, instance_count > 1) {
            (true, true) => self.encoder.draw_indexed_instanced(index_count, instance_count, first_index),
            (true, false) => self.encoder.draw_indexed(index_count, first_index),
            (false, true) => self.encoder.draw_instanced(index_count, instance_count, first_index),
            (false, false) => self.encoder.draw(index_count, first_index),
        }
        Ok(())
    }

    /// Dispatch compute thread groups with the bound compute shader
    ///
    /// # Errors
    ///
    /// Any [`ApplyError`]; the dispatch is skipped and counted as failed.
    pub fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<(), ApplyError> {
        let result = if self.scope == Scope::Compute {
            self.apply_context_states(false)
        } else {
            Err(ApplyError::NoScope)
        };
        match result {
            Ok(()) => {
                self.encoder.dispatch(groups_x, groups_y, groups_z);
                Ok(())
            }
            Err(err) => {
                self.statistics.failed_drawcalls += 1;
                Err(err)
            }
        }
    }

    // State application

    /// Resolve every dirty part of the state and issue it to the encoder
    ///
    /// With `force` every step runs regardless of the dirty flags. Flags of
    /// steps that succeeded are cleared; the first failing step returns its
    /// error and leaves the remaining flags set for the next attempt.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::NoScope`] outside a rendering or compute scope
    /// - [`ApplyError::NoActiveShader`] or [`ApplyError::PermutationNotReady`]
    ///   when no shader permutation can be resolved
    /// - [`ApplyError::VertexDeclarationUnavailable`] when vertex buffers are
    ///   bound but no declaration matches them
    /// - [`ApplyError::MissingTopology`] or [`ApplyError::Pipeline`] when the
    ///   pipeline cannot be built
    pub fn apply_context_states(&mut self, force: bool) -> Result<(), ApplyError> {
        if self.scope == Scope::Idle {
            return Err(ApplyError::NoScope);
        }

        // Material first, it can change every other part of the state.
        if force || self.flags.contains(StateFlags::MATERIAL_BINDING_CHANGED) {
            self.apply_material_state();
            self.flags.remove(StateFlags::MATERIAL_BINDING_CHANGED);
        }

        let rebuild_vertex_declaration = self
            .flags
            .intersects(StateFlags::SHADER_STATE_CHANGED | StateFlags::MESH_BUFFER_BINDING_CHANGED);

        if force || self.flags.contains(StateFlags::SHADER_STATE_CHANGED) {
            self.apply_shader_state()?;
            self.flags.remove(StateFlags::SHADER_STATE_CHANGED);
        }

        self.apply_bindings(force);

        if (force || rebuild_vertex_declaration) && self.scope != Scope::Compute {
            self.apply_mesh_state(force)?;
        }

        if force || self.flags.contains(StateFlags::PIPELINE_CHANGED) {
            self.apply_pipeline()?;
            self.flags.remove(StateFlags::PIPELINE_CHANGED);
        }
        Ok(())
    }

    fn apply_material_state(&mut self) {
        let Some(material) = self.new_material else {
            self.bind_shader_internal(None, ShaderBindFlags::empty());
            return;
        };
        if self.material == Some(material) {
            return;
        }

        let Some(bindings) = self.provider.resolve_material(material) else {
            debug!("Material {material:?} is not available");
            self.bind_shader_internal(None, ShaderBindFlags::empty());
            return;
        };

        self.bind_shader_internal(bindings.shader, ShaderBindFlags::empty());
        for (name, value) in &bindings.permutation_vars {
            self.set_permutation_variable(name, value);
        }
        for (name, texture) in &bindings.textures {
            self.bind_texture(name, *texture);
        }
        for (name, sampler) in &bindings.samplers {
            self.bind_sampler(name, *sampler);
        }
        for (name, buffer) in &bindings.buffers {
            self.bind_buffer(name, *buffer);
        }
        for (name, buffer) in &bindings.constant_buffers {
            self.bind_constant_buffer(name, *buffer);
        }
        self.material = Some(material);
    }

    fn apply_shader_state(&mut self) -> Result<(), ApplyError> {
        self.graphics.shader = ShaderHandle::invalid();
        self.binding_mapping = None;
        self.flags |= StateFlags::PIPELINE_CHANGED;

        let shader = self.active_shader.ok_or(ApplyError::NoActiveShader)?;
        let permutation = self
            .provider
            .resolve_permutation(shader, &self.permutation_vars)
            .ok_or(ApplyError::PermutationNotReady)?;
        let mapping = self
            .device
            .shader_binding_mapping(permutation.shader)
            .ok_or(ApplyError::PermutationNotReady)?;

        self.graphics.shader = permutation.shader;
        self.binding_mapping = Some(mapping);

        if self.scope != Scope::Compute {
            let flags = self.shader_bind_flags;
            if !flags.contains(ShaderBindFlags::NO_BLEND_STATE) {
                self.graphics.blend_state = permutation.blend_state;
            }
            if !flags.contains(ShaderBindFlags::NO_RASTERIZER_STATE) {
                self.graphics.rasterizer_state = permutation.rasterizer_state;
            }
            if !flags.contains(ShaderBindFlags::NO_DEPTH_STENCIL_STATE) {
                self.graphics.depth_stencil_state = permutation.depth_stencil_state;
            }
        }

        self.flags |= StateFlags::ALL_BINDINGS;
        Ok(())
    }

    fn apply_bindings(&mut self, force: bool) {
        let Some(mapping) = self.binding_mapping.clone() else {
            return;
        };

        let uploads = self.constant_storages.upload_dirty(&mut self.encoder);
        self.statistics.constant_uploads += u32::try_from(uploads).unwrap_or(u32::MAX);

        let dirty = if force {
            StateFlags::ALL_BINDINGS
        } else {
            self.flags & StateFlags::ALL_BINDINGS
        };
        if dirty.is_empty() {
            return;
        }

        for binding in mapping.iter() {
            let applied = match binding.category {
                ShaderResourceCategory::Texture if dirty.contains(StateFlags::TEXTURE_BINDING_CHANGED) => {
                    self.apply_texture(binding)
                }
                ShaderResourceCategory::Sampler if dirty.contains(StateFlags::SAMPLER_BINDING_CHANGED) => {
                    self.apply_sampler(binding)
                }
                ShaderResourceCategory::Buffer if dirty.contains(StateFlags::BUFFER_BINDING_CHANGED) => {
                    self.apply_buffer(binding)
                }
                ShaderResourceCategory::TextureUav | ShaderResourceCategory::BufferUav
                    if dirty.contains(StateFlags::UAV_BINDING_CHANGED) =>
                {
                    self.apply_unordered_access_view(binding)
                }
                ShaderResourceCategory::ConstantBuffer if dirty.contains(StateFlags::CONSTANT_BUFFER_BINDING_CHANGED) => {
                    self.apply_constant_buffer(binding)
                }
                _ => true,
            };
            if !applied {
                warn!("No resource bound to {:?} slot '{}'", binding.category, binding.name);
                self.statistics.missing_bindings += 1;
            }
        }
        self.flags.remove(StateFlags::ALL_BINDINGS);
    }

    fn apply_texture(&mut self, binding: &ShaderResourceBinding) -> bool {
        let Some(texture) = self.bound.textures.get(&binding.name) else {
            return false;
        };
        let view = self.device.default_resource_view(texture);
        if view.is_invalid() {
            return false;
        }
        self.encoder.set_resource_view(binding, view);
        true
    }

    fn apply_sampler(&mut self, binding: &ShaderResourceBinding) -> bool {
        let sampler = match self.bound.samplers.get(&binding.name) {
            Some(sampler) => sampler,
            None => match self
                .default_samplers
                .get(&self.device, DefaultSamplerFlags::LINEAR_FILTERING, &self.config)
            {
                Ok(sampler) => sampler,
                Err(err) => {
                    warn!("Failed to create default sampler: {err}");
                    return false;
                }
            },
        };
        self.encoder.set_sampler_state(binding, sampler);
        true
    }

    fn apply_buffer(&mut self, binding: &ShaderResourceBinding) -> bool {
        let Some(buffer) = self.bound.buffers.get(&binding.name) else {
            return false;
        };
        let view = self.device.default_buffer_resource_view(buffer);
        if view.is_invalid() {
            return false;
        }
        self.encoder.set_resource_view(binding, view);
        true
    }

    fn apply_unordered_access_view(&mut self, binding: &ShaderResourceBinding) -> bool {
        let Some(view) = self.bound.unordered_access_views.get(&binding.name) else {
            return false;
        };
        self.encoder.set_unordered_access_view(binding, view);
        true
    }

    fn apply_constant_buffer(&mut self, binding: &ShaderResourceBinding) -> bool {
        let buffer = match self.bound.constant_buffers.get(&binding.name) {
            Some(ConstantBinding::Buffer(buffer)) => Some(buffer),
            Some(ConstantBinding::Storage(storage)) => self.constant_storages.buffer(storage),
            None => None,
        };
        let Some(buffer) = buffer else {
            return false;
        };
        self.encoder.set_constant_buffer(binding, buffer);
        true
    }

    fn apply_mesh_state(&mut self, force: bool) -> Result<(), ApplyError> {
        if self.graphics.shader.is_invalid() {
            return Err(ApplyError::NoActiveShader);
        }

        if force || self.flags.contains(StateFlags::MESH_BUFFER_BINDING_CHANGED) {
            for (slot, (&buffer, &offset)) in self.mesh.vertex_buffers.iter().zip(&self.mesh.offsets).enumerate() {
                self.encoder.set_vertex_buffer(slot as u32, buffer, offset);
            }
            if !self.mesh.index_buffer.is_invalid() {
                self.encoder.set_index_buffer(self.mesh.index_buffer);
            }
        }

        let vertex_declaration = match &self.mesh.layout {
            Some(layout) => {
                let handle = self.vertex_declarations.resolve(
                    &self.device,
                    self.graphics.shader,
                    layout,
                    &self.mesh.strides,
                    &self.mesh.rates,
                );
                if handle.is_invalid() {
                    return Err(ApplyError::VertexDeclarationUnavailable);
                }
                handle
            }
            None => VertexDeclarationHandle::invalid(),
        };
        if self.mesh.has_vertex_buffers() && vertex_declaration.is_invalid() {
            return Err(ApplyError::VertexDeclarationUnavailable);
        }

        self.graphics.vertex_declaration = vertex_declaration;
        self.flags |= StateFlags::PIPELINE_CHANGED;
        self.flags.remove(StateFlags::MESH_BUFFER_BINDING_CHANGED);
        Ok(())
    }

    fn apply_pipeline(&mut self) -> Result<(), ApplyError> {
        match self.scope {
            Scope::Rendering => {
                let topology = self.graphics.topology.ok_or(ApplyError::MissingTopology)?;
                let desc = GraphicsPipelineDesc {
                    shader: self.graphics.shader,
                    vertex_declaration: self.graphics.vertex_declaration,
                    rasterizer_state: self.graphics.rasterizer_state,
                    blend_state: self.graphics.blend_state,
                    depth_stencil_state: self.graphics.depth_stencil_state,
                    topology,
                };
                let pipeline = self.device.cached_graphics_pipeline(&desc)?;
                self.encoder.set_graphics_pipeline(pipeline);
            }
            Scope::Compute => {
                let desc = ComputePipelineDesc {
                    shader: self.graphics.shader,
                };
                let pipeline = self.device.cached_compute_pipeline(&desc)?;
                self.encoder.set_compute_pipeline(pipeline);
            }
            Scope::Idle => return Ok(()),
        }
        self.statistics.pipeline_changes += 1;
        Ok(())
    }

    /// Forget every binding and mark all state dirty
    ///
    /// Render state overrides and context-owned objects survive; the global
    /// constants are bound again.
    pub fn reset_context_state(&mut self) {
        self.flags = StateFlags::ALL_STATES_INVALID;

        self.material = None;
        self.new_material = None;
        self.active_shader = None;
        self.shader_bind_flags = ShaderBindFlags::empty();
        self.permutation_vars.clear();
        self.binding_mapping = None;

        self.graphics.shader = ShaderHandle::invalid();
        self.graphics.vertex_declaration = VertexDeclarationHandle::invalid();
        self.graphics.topology = None;
        self.mesh = MeshState::default();

        self.bound.clear();
        self.bound
            .bind_constant_buffer(GLOBAL_CONSTANTS_SLOT, Some(ConstantBinding::Storage(self.global_constants)));
    }
}

impl<E: CommandEncoder> Drop for RenderContext<E> {
    fn drop(&mut self) {
        self.constant_storages.release_all(&self.device);
        self.vertex_declarations.release_all(&self.device);
        self.default_samplers.release_all(&self.device);
    }
}
