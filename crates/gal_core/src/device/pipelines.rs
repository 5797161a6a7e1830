//! Shaders, layouts, vertex declarations and pipelines
//!
//! These objects are hashed like the fixed-function states, but most of them
//! are composites: they take a reference on every component when they are
//! first created and hand those references back when the flush destroys them.
//! A composite revived before the flush keeps its references untouched.

use std::sync::Arc;

use super::cache::get_or_create;
use super::objects::{ShaderObject, StateObject};
use super::validation::{validate_shader, validate_vertex_declaration};
use super::{Device, DeviceState};
use crate::descriptors::{
    BindGroupLayoutDesc, ComputePipelineDesc, GraphicsPipelineDesc, PipelineLayoutDesc, PushConstantRange, ShaderDesc,
    ShaderResourceCategory, VertexDeclarationDesc, MAX_BIND_GROUPS,
};
use crate::error::{GalError, GalResult};
use crate::foundation::hashing::DescriptorHash;
use crate::handles::{
    BindGroupLayoutHandle, ComputePipelineHandle, GalHandle, GraphicsPipelineHandle, ObjectKind, PipelineLayoutHandle,
    ShaderHandle, VertexDeclarationHandle,
};

type ShaderLayouts = ([BindGroupLayoutHandle; MAX_BIND_GROUPS], PipelineLayoutHandle);

impl DeviceState {
    pub(crate) fn create_bind_group_layout(&mut self, desc: &BindGroupLayoutDesc) -> GalResult<BindGroupLayoutHandle> {
        get_or_create(
            &mut self.bind_group_layouts,
            &mut self.dead_objects,
            self.backend.as_mut(),
            desc.calculate_hash(),
            |backend| {
                Ok(StateObject {
                    desc: desc.clone(),
                    native: backend.create_bind_group_layout_platform(desc)?,
                })
            },
        )
    }

    pub(crate) fn destroy_bind_group_layout(&mut self, handle: BindGroupLayoutHandle) {
        self.bind_group_layouts.release(handle, &mut self.dead_objects);
    }

    pub(crate) fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> GalResult<PipelineLayoutHandle> {
        let hash = desc.calculate_hash();
        if let Some(handle) = self.pipeline_layouts.acquire(hash, &mut self.dead_objects) {
            return Ok(handle);
        }

        let bind_groups = desc.bind_groups.iter().copied().filter(|layout| !layout.is_invalid());
        if bind_groups.clone().any(|layout| !self.bind_group_layouts.contains(layout)) {
            return Err(GalError::InvalidHandle(ObjectKind::BindGroupLayout));
        }

        let native = self
            .backend
            .create_pipeline_layout_platform(desc)
            .map_err(|source| GalError::backend(ObjectKind::PipelineLayout, source))?;
        let handle = self.pipeline_layouts.insert_or_release(
            hash,
            StateObject { desc: *desc, native },
            self.backend.as_mut(),
        )?;

        for layout in bind_groups {
            self.bind_group_layouts.add_ref(layout, &mut self.dead_objects);
        }
        Ok(handle)
    }

    pub(crate) fn destroy_pipeline_layout(&mut self, handle: PipelineLayoutHandle) {
        self.pipeline_layouts.release(handle, &mut self.dead_objects);
    }

    /// Create one bind group layout per used group plus the pipeline layout tying them together
    fn create_shader_layouts(&mut self, desc: &ShaderDesc) -> GalResult<ShaderLayouts> {
        let resources = || {
            desc.binding_mapping
                .iter()
                .filter(|binding| binding.category != ShaderResourceCategory::PushConstants)
        };
        let group_count = resources().map(|binding| binding.bind_group as usize + 1).max().unwrap_or(0).max(1);

        let mut bind_groups = [BindGroupLayoutHandle::invalid(); MAX_BIND_GROUPS];
        for group in 0..group_count {
            let mut resource_bindings: Vec<_> =
                resources().filter(|binding| binding.bind_group as usize == group).cloned().collect();
            resource_bindings.sort_by_key(|binding| binding.slot);

            match self.create_bind_group_layout(&BindGroupLayoutDesc { resource_bindings }) {
                Ok(handle) => bind_groups[group] = handle,
                Err(error) => {
                    self.release_bind_group_layouts(&bind_groups);
                    return Err(error);
                }
            }
        }

        let push_constants = desc
            .binding_mapping
            .iter()
            .find(|binding| binding.category == ShaderResourceCategory::PushConstants)
            .map(|binding| PushConstantRange {
                size: u16::try_from(binding.block_size).unwrap_or(u16::MAX),
                offset: 0,
                stages: binding.stages,
            })
            .unwrap_or_default();

        match self.create_pipeline_layout(&PipelineLayoutDesc {
            bind_groups,
            push_constants,
        }) {
            Ok(pipeline_layout) => Ok((bind_groups, pipeline_layout)),
            Err(error) => {
                self.release_bind_group_layouts(&bind_groups);
                Err(error)
            }
        }
    }

    fn release_bind_group_layouts(&mut self, layouts: &[BindGroupLayoutHandle]) {
        for layout in layouts.iter().filter(|layout| !layout.is_invalid()) {
            self.bind_group_layouts.release(*layout, &mut self.dead_objects);
        }
    }

    fn release_shader_layouts(&mut self, (bind_groups, pipeline_layout): ShaderLayouts) {
        self.pipeline_layouts.release(pipeline_layout, &mut self.dead_objects);
        self.release_bind_group_layouts(&bind_groups);
    }

    pub(crate) fn create_shader(&mut self, desc: &ShaderDesc) -> GalResult<ShaderHandle> {
        validate_shader(desc)?;

        let hash = desc.calculate_hash();
        if let Some(handle) = self.shaders.acquire(hash, &mut self.dead_objects) {
            return Ok(handle);
        }

        let layouts = self.create_shader_layouts(desc)?;
        let native = match self.backend.create_shader_platform(desc) {
            Ok(native) => native,
            Err(source) => {
                self.release_shader_layouts(layouts);
                return Err(GalError::backend(ObjectKind::Shader, source));
            }
        };

        let (bind_group_layouts, pipeline_layout) = layouts;
        let object = ShaderObject {
            desc: desc.clone(),
            native,
            binding_mapping: Arc::from(desc.binding_mapping.as_slice()),
            bind_group_layouts,
            pipeline_layout,
        };
        self.shaders
            .insert_or_release(hash, object, self.backend.as_mut())
            .inspect_err(|_| self.release_shader_layouts(layouts))
    }

    pub(crate) fn destroy_shader(&mut self, handle: ShaderHandle) {
        self.shaders.release(handle, &mut self.dead_objects);
    }

    pub(crate) fn create_vertex_declaration(
        &mut self,
        desc: &VertexDeclarationDesc,
    ) -> GalResult<VertexDeclarationHandle> {
        validate_vertex_declaration(desc, &self.capabilities)?;

        let Self {
            shaders,
            vertex_declarations,
            dead_objects,
            backend,
            ..
        } = self;
        let shader = shaders.get(desc.shader).ok_or(GalError::InvalidHandle(ObjectKind::Shader))?;

        get_or_create(vertex_declarations, dead_objects, backend.as_mut(), desc.calculate_hash(), |backend| {
            Ok(StateObject {
                desc: desc.clone(),
                native: backend.create_vertex_declaration_platform(desc, &shader.desc)?,
            })
        })
    }

    pub(crate) fn destroy_vertex_declaration(&mut self, handle: VertexDeclarationHandle) {
        self.vertex_declarations.release(handle, &mut self.dead_objects);
    }

    fn check_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> GalResult<()> {
        if desc.shader.is_invalid()
            || desc.rasterizer_state.is_invalid()
            || desc.blend_state.is_invalid()
            || desc.depth_stencil_state.is_invalid()
        {
            return Err(GalError::validation(
                "Graphics pipelines need a shader, rasterizer state, blend state and depth-stencil state",
            ));
        }

        let missing = if !self.shaders.contains(desc.shader) {
            Some(ObjectKind::Shader)
        } else if !self.rasterizer_states.contains(desc.rasterizer_state) {
            Some(ObjectKind::RasterizerState)
        } else if !self.blend_states.contains(desc.blend_state) {
            Some(ObjectKind::BlendState)
        } else if !self.depth_stencil_states.contains(desc.depth_stencil_state) {
            Some(ObjectKind::DepthStencilState)
        } else if !desc.vertex_declaration.is_invalid() && !self.vertex_declarations.contains(desc.vertex_declaration) {
            Some(ObjectKind::VertexDeclaration)
        } else {
            None
        };
        missing.map_or(Ok(()), |kind| Err(GalError::InvalidHandle(kind)))
    }

    pub(crate) fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> GalResult<GraphicsPipelineHandle> {
        self.check_graphics_pipeline(desc)?;

        let hash = desc.calculate_hash();
        if let Some(handle) = self.graphics_pipelines.acquire(hash, &mut self.dead_objects) {
            return Ok(handle);
        }

        let native = self
            .backend
            .create_graphics_pipeline_platform(desc)
            .map_err(|source| GalError::backend(ObjectKind::GraphicsPipeline, source))?;
        let handle = self.graphics_pipelines.insert_or_release(
            hash,
            StateObject { desc: *desc, native },
            self.backend.as_mut(),
        )?;

        let dead_objects = &mut self.dead_objects;
        self.shaders.add_ref(desc.shader, dead_objects);
        self.rasterizer_states.add_ref(desc.rasterizer_state, dead_objects);
        self.blend_states.add_ref(desc.blend_state, dead_objects);
        self.depth_stencil_states.add_ref(desc.depth_stencil_state, dead_objects);
        if !desc.vertex_declaration.is_invalid() {
            self.vertex_declarations.add_ref(desc.vertex_declaration, dead_objects);
        }
        Ok(handle)
    }

    pub(crate) fn destroy_graphics_pipeline(&mut self, handle: GraphicsPipelineHandle) {
        self.graphics_pipelines.release(handle, &mut self.dead_objects);
    }

    pub(crate) fn create_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> GalResult<ComputePipelineHandle> {
        if desc.shader.is_invalid() {
            return Err(GalError::validation("Compute pipelines need a shader"));
        }
        if !self.shaders.contains(desc.shader) {
            return Err(GalError::InvalidHandle(ObjectKind::Shader));
        }

        let hash = desc.calculate_hash();
        if let Some(handle) = self.compute_pipelines.acquire(hash, &mut self.dead_objects) {
            return Ok(handle);
        }

        let native = self
            .backend
            .create_compute_pipeline_platform(desc)
            .map_err(|source| GalError::backend(ObjectKind::ComputePipeline, source))?;
        let handle = self.compute_pipelines.insert_or_release(
            hash,
            StateObject { desc: *desc, native },
            self.backend.as_mut(),
        )?;

        self.shaders.add_ref(desc.shader, &mut self.dead_objects);
        Ok(handle)
    }

    pub(crate) fn destroy_compute_pipeline(&mut self, handle: ComputePipelineHandle) {
        self.compute_pipelines.release(handle, &mut self.dead_objects);
    }
}

impl Device {
    /// Get or create a shader and the layouts derived from its binding mapping
    ///
    /// The shader keeps a reference on one bind group layout per used bind
    /// group (at least one) and on the pipeline layout combining them.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] when no stage has byte code or a
    /// binding uses a bind group past [`MAX_BIND_GROUPS`], and
    /// [`GalError::Backend`] when the backend rejects the shader or a layout.
    pub fn create_shader(&self, desc: &ShaderDesc) -> GalResult<ShaderHandle> {
        self.lock().create_shader(desc)
    }

    /// Drop one reference on a shader
    pub fn destroy_shader(&self, handle: ShaderHandle) {
        self.lock().destroy_shader(handle);
    }

    /// Get or create a bind group layout
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Backend`] when the backend rejects the layout.
    pub fn create_bind_group_layout(&self, desc: &BindGroupLayoutDesc) -> GalResult<BindGroupLayoutHandle> {
        self.lock().create_bind_group_layout(desc)
    }

    /// Drop one reference on a bind group layout
    pub fn destroy_bind_group_layout(&self, handle: BindGroupLayoutHandle) {
        self.lock().destroy_bind_group_layout(handle);
    }

    /// Get or create a pipeline layout, referencing its bind group layouts
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] when a bind group layout does not
    /// exist and [`GalError::Backend`] when the backend rejects the layout.
    pub fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> GalResult<PipelineLayoutHandle> {
        self.lock().create_pipeline_layout(desc)
    }

    /// Drop one reference on a pipeline layout
    pub fn destroy_pipeline_layout(&self, handle: PipelineLayoutHandle) {
        self.lock().destroy_pipeline_layout(handle);
    }

    /// Get or create a vertex declaration for the inputs of `desc.shader`
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] when the bindings don't match the
    /// attribute slots, [`GalError::InvalidHandle`] for an unknown shader and
    /// [`GalError::Backend`] when the backend rejects the layout.
    pub fn create_vertex_declaration(&self, desc: &VertexDeclarationDesc) -> GalResult<VertexDeclarationHandle> {
        self.lock().create_vertex_declaration(desc)
    }

    /// Drop one reference on a vertex declaration
    pub fn destroy_vertex_declaration(&self, handle: VertexDeclarationHandle) {
        self.lock().destroy_vertex_declaration(handle);
    }

    /// Get or create a graphics pipeline
    ///
    /// A newly created pipeline references its shader, its three states and
    /// the vertex declaration if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] when a required handle is invalid,
    /// [`GalError::InvalidHandle`] when one does not exist and
    /// [`GalError::Backend`] when the backend rejects the pipeline.
    pub fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> GalResult<GraphicsPipelineHandle> {
        self.lock().create_graphics_pipeline(desc)
    }

    /// Drop one reference on a graphics pipeline
    pub fn destroy_graphics_pipeline(&self, handle: GraphicsPipelineHandle) {
        self.lock().destroy_graphics_pipeline(handle);
    }

    /// Get or create a compute pipeline referencing its shader
    ///
    /// # Errors
    ///
    /// Same as [`Device::create_graphics_pipeline`].
    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> GalResult<ComputePipelineHandle> {
        self.lock().create_compute_pipeline(desc)
    }

    /// Drop one reference on a compute pipeline
    pub fn destroy_compute_pipeline(&self, handle: ComputePipelineHandle) {
        self.lock().destroy_compute_pipeline(handle);
    }
}
