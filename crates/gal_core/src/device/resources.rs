//! Buffers, textures, readback objects and their views
//!
//! Resources are exclusively owned. Every create call allocates a new handle,
//! and destroy queues the object unconditionally; a second destroy before the
//! flush is reported as a double free.

use log::warn;

use super::dead_objects::{destroy_now, Destroyable};
use super::objects::{
    enqueue_owned, live, BufferObject, OwnedObject, ReadbackBufferObject, ReadbackTextureObject, TextureObject, TextureOrigin,
};
use super::validation::{
    buffer_element_count, validate_buffer, validate_buffer_resource_view, validate_buffer_unordered_access_view,
    validate_proxy_parent, validate_render_target_view, validate_shared_texture, validate_texture,
    validate_texture_resource_view, validate_texture_unordered_access_view,
};
use super::views::{RenderTargetViews, ResourceViews, UnorderedAccessViews, ViewCache, ViewOwner};
use super::{Device, DeviceState};
use crate::backend::{GalBackend, NativeObject, SharedTextureType};
use crate::descriptors::{
    BufferDesc, BufferResourceViewDesc, BufferUsageFlags, Format, ReadbackBufferDesc, ReadbackTextureDesc,
    RenderTargetViewDesc, ResourceViewDesc, SubresourceData, TextureDesc, TextureResourceViewDesc, TextureType,
    UnorderedAccessViewDesc,
};
use crate::error::{GalError, GalResult};
use crate::foundation::collections::Arena;
use crate::handles::{
    BufferHandle, GalHandle, ObjectKind, ReadbackBufferHandle, ReadbackTextureHandle, RenderTargetViewHandle,
    ResourceViewHandle, TextureHandle, UnorderedAccessViewHandle,
};

/// Estimated GPU memory held by live resources, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    /// Buffers, sized by their total size
    pub buffers: u64,
    /// Textures the device allocated, including shared textures and back buffers
    pub textures: u64,
}

impl MemoryUsage {
    /// Sum of all resource memory
    pub const fn total(&self) -> u64 {
        self.buffers + self.textures
    }
}

/// Rough memory footprint of a texture
///
/// Multiplies every dimension, the sample count and the texel size, and adds a
/// third for the mip chain when there is more than one level.
pub fn estimate_texture_memory(desc: &TextureDesc) -> u64 {
    let base = u64::from(desc.width)
        * u64::from(desc.height)
        * u64::from(desc.depth.max(1))
        * u64::from(desc.array_size.max(1))
        * u64::from(desc.sample_count.samples())
        * u64::from(desc.format.size_in_bytes());

    if desc.mip_levels > 1 {
        base + base / 3
    } else {
        base
    }
}

impl DeviceState {
    pub(super) fn insert_owned<O: OwnedObject>(
        objects: &mut Arena<O::Handle, O>,
        backend: &mut dyn GalBackend,
        object: O,
    ) -> GalResult<O::Handle> {
        let kind = <O::Handle as GalHandle>::KIND;
        objects.insert(object).map_err(|object| {
            if let Some(native) = object.native() {
                backend.destroy_platform(kind, native);
            }
            GalError::capacity_exceeded(kind, objects.capacity_limit())
        })
    }

    pub(crate) fn create_buffer(&mut self, desc: &BufferDesc, initial_data: &[u8]) -> GalResult<BufferHandle> {
        validate_buffer(desc, initial_data, &self.capabilities)?;

        let native = self
            .backend
            .create_buffer_platform(desc, initial_data)
            .map_err(|source| GalError::backend(ObjectKind::Buffer, source))?;
        let object = BufferObject {
            desc: *desc,
            native,
            views: ViewCache::default(),
            default_resource_view: ResourceViewHandle::invalid(),
            pending_destroy: false,
        };
        let handle = Self::insert_owned(&mut self.buffers, self.backend.as_mut(), object)?;

        if desc.usage.contains(BufferUsageFlags::SHADER_RESOURCE) {
            let view_desc = ResourceViewDesc::Buffer(BufferResourceViewDesc {
                buffer: handle,
                override_format: Format::Unknown,
                first_element: 0,
                element_count: buffer_element_count(desc, Format::Unknown),
            });
            match self.get_or_create_view::<ResourceViews>(ViewOwner::Buffer(handle), native, view_desc) {
                Ok(view) => {
                    if let Some(buffer) = self.buffers.get_mut(handle) {
                        buffer.default_resource_view = view;
                    }
                }
                Err(error) => {
                    destroy_now::<BufferObject>(self, handle);
                    return Err(error);
                }
            }
        }
        Ok(handle)
    }

    pub(crate) fn update_buffer(&mut self, handle: BufferHandle, offset: u32, data: &[u8]) -> GalResult<()> {
        let buffer = live(&mut self.buffers, handle)?;
        if buffer.desc.immutable {
            return Err(GalError::validation("Immutable buffers cannot be updated"));
        }
        let end = u64::from(offset) + data.len() as u64;
        if end > u64::from(buffer.desc.total_size) {
            return Err(GalError::validation(format!(
                "Buffer update of {} bytes at offset {offset} exceeds the buffer size of {}",
                data.len(),
                buffer.desc.total_size
            )));
        }

        let native = buffer.native;
        self.backend
            .update_buffer_platform(native, offset, data)
            .map_err(|source| GalError::backend(ObjectKind::Buffer, source))
    }

    pub(crate) fn destroy_buffer(&mut self, handle: BufferHandle) {
        enqueue_owned(&mut self.buffers, &mut self.dead_objects, handle);
    }

    pub(super) fn insert_texture(&mut self, desc: TextureDesc, native: NativeObject, origin: TextureOrigin) -> GalResult<TextureHandle> {
        let object = TextureObject {
            desc,
            native,
            origin,
            views: ViewCache::default(),
            default_resource_view: ResourceViewHandle::invalid(),
            default_render_target_view: RenderTargetViewHandle::invalid(),
            pending_destroy: false,
        };
        let handle = Self::insert_owned(&mut self.textures, self.backend.as_mut(), object)?;

        if let Err(error) = self.create_default_texture_views(handle) {
            destroy_now::<TextureObject>(self, handle);
            return Err(error);
        }
        Ok(handle)
    }

    fn create_default_texture_views(&mut self, handle: TextureHandle) -> GalResult<()> {
        let texture = self.textures.get(handle).ok_or(GalError::InvalidHandle(ObjectKind::Texture))?;
        let (desc, native, origin) = (texture.desc, texture.native, texture.origin);
        let owner = ViewOwner::Texture(handle);
        let proxy_slice = match origin {
            TextureOrigin::Proxy { slice, .. } => Some(slice),
            _ => None,
        };

        if desc.allow_shader_resource_view {
            let view_desc = match proxy_slice {
                Some(slice) => TextureResourceViewDesc {
                    first_array_slice: slice,
                    array_size: 1,
                    ..TextureResourceViewDesc::new(handle)
                },
                None => TextureResourceViewDesc {
                    array_size: desc.array_size,
                    ..TextureResourceViewDesc::new(handle)
                },
            };
            let view = self.get_or_create_view::<ResourceViews>(owner, native, ResourceViewDesc::Texture(view_desc))?;
            if let Some(texture) = self.textures.get_mut(handle) {
                texture.default_resource_view = view;
            }
        }

        // Proxies always get a render target view of their slice
        let view_desc = match proxy_slice {
            Some(slice) => Some(RenderTargetViewDesc {
                first_slice: slice,
                slice_count: 1,
                ..RenderTargetViewDesc::new(handle)
            }),
            None if desc.allow_render_target_view => Some(RenderTargetViewDesc {
                slice_count: desc.array_size,
                override_view_type: desc.texture_type.is_cube().then_some(TextureType::Texture2DArray),
                ..RenderTargetViewDesc::new(handle)
            }),
            None => None,
        };
        if let Some(view_desc) = view_desc {
            let view = self.get_or_create_view::<RenderTargetViews>(owner, native, view_desc)?;
            if let Some(texture) = self.textures.get_mut(handle) {
                texture.default_render_target_view = view;
            }
        }
        Ok(())
    }

    pub(crate) fn create_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[SubresourceData<'_>],
    ) -> GalResult<TextureHandle> {
        validate_texture(desc, initial_data.len())?;

        let native = self
            .backend
            .create_texture_platform(desc, initial_data)
            .map_err(|source| GalError::backend(ObjectKind::Texture, source))?;
        let origin = if desc.existing_native_object.is_some() {
            TextureOrigin::Wrapped
        } else {
            TextureOrigin::Created
        };
        self.insert_texture(*desc, native, origin)
    }

    pub(crate) fn create_proxy_texture(&mut self, parent: TextureHandle, slice: u32) -> GalResult<TextureHandle> {
        let parent_texture = live(&mut self.textures, parent)?;
        validate_proxy_parent(&parent_texture.desc, slice)?;

        let desc = TextureDesc {
            texture_type: TextureType::Texture2DProxy,
            ..parent_texture.desc
        };
        let native = parent_texture.native;
        self.insert_texture(desc, native, TextureOrigin::Proxy { parent, slice })
    }

    fn create_shared(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[SubresourceData<'_>],
        share: SharedTextureType,
    ) -> GalResult<TextureHandle> {
        let (native, shared_handle) = self
            .backend
            .create_shared_texture_platform(desc, initial_data, share)
            .map_err(|source| GalError::backend(ObjectKind::Texture, source))?;
        self.insert_texture(*desc, native, TextureOrigin::Shared { shared_handle })
    }

    pub(crate) fn create_shared_texture(
        &mut self,
        desc: &TextureDesc,
        initial_data: &[SubresourceData<'_>],
    ) -> GalResult<TextureHandle> {
        validate_shared_texture(desc, Some(initial_data.len()))?;
        self.create_shared(desc, initial_data, SharedTextureType::Exported)
    }

    pub(crate) fn open_shared_texture(&mut self, desc: &TextureDesc, shared_handle: u64) -> GalResult<TextureHandle> {
        validate_shared_texture(desc, None)?;
        self.create_shared(desc, &[], SharedTextureType::Imported(shared_handle))
    }

    pub(crate) fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(TextureObject {
            origin: TextureOrigin::BackBuffer { swap_chain },
            ..
        }) = self.textures.get(handle)
        {
            warn!("Texture {:?} is the back buffer of swap chain {swap_chain:?}, destroy the swap chain instead", handle);
            return;
        }
        enqueue_owned(&mut self.textures, &mut self.dead_objects, handle);
    }

    pub(crate) fn create_readback_buffer(&mut self, desc: &ReadbackBufferDesc) -> GalResult<ReadbackBufferHandle> {
        if desc.total_size == 0 {
            return Err(GalError::validation("Trying to create a readback buffer with size of 0 is not possible"));
        }

        let native = self
            .backend
            .create_readback_buffer_platform(desc)
            .map_err(|source| GalError::backend(ObjectKind::ReadbackBuffer, source))?;
        let object = ReadbackBufferObject {
            desc: *desc,
            native,
            pending_destroy: false,
        };
        Self::insert_owned(&mut self.readback_buffers, self.backend.as_mut(), object)
    }

    pub(crate) fn create_readback_texture(&mut self, desc: &ReadbackTextureDesc) -> GalResult<ReadbackTextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GalError::validation(
                "Trying to create a readback texture with width or height of 0 is not possible",
            ));
        }

        let native = self
            .backend
            .create_readback_texture_platform(desc)
            .map_err(|source| GalError::backend(ObjectKind::ReadbackTexture, source))?;
        let object = ReadbackTextureObject {
            desc: *desc,
            native,
            pending_destroy: false,
        };
        Self::insert_owned(&mut self.readback_textures, self.backend.as_mut(), object)
    }

    pub(crate) fn create_resource_view(&mut self, desc: &ResourceViewDesc) -> GalResult<ResourceViewHandle> {
        let (owner, native) = match desc {
            ResourceViewDesc::Texture(view) => {
                let texture = live(&mut self.textures, view.texture)?;
                validate_texture_resource_view(&texture.desc, view)?;
                (ViewOwner::Texture(view.texture), texture.native)
            }
            ResourceViewDesc::Buffer(view) => {
                let buffer = live(&mut self.buffers, view.buffer)?;
                validate_buffer_resource_view(&buffer.desc, view)?;
                (ViewOwner::Buffer(view.buffer), buffer.native)
            }
        };
        self.get_or_create_view::<ResourceViews>(owner, native, *desc)
    }

    pub(crate) fn create_unordered_access_view(
        &mut self,
        desc: &UnorderedAccessViewDesc,
    ) -> GalResult<UnorderedAccessViewHandle> {
        let (owner, native) = match desc {
            UnorderedAccessViewDesc::Texture(view) => {
                let texture = live(&mut self.textures, view.texture)?;
                if !texture.desc.allow_unordered_access_view {
                    return Err(GalError::validation("Texture does not allow unordered access views"));
                }
                validate_texture_unordered_access_view(&texture.desc, view)?;
                (ViewOwner::Texture(view.texture), texture.native)
            }
            UnorderedAccessViewDesc::Buffer(view) => {
                let buffer = live(&mut self.buffers, view.buffer)?;
                validate_buffer_unordered_access_view(&buffer.desc, view)?;
                (ViewOwner::Buffer(view.buffer), buffer.native)
            }
        };
        self.get_or_create_view::<UnorderedAccessViews>(owner, native, *desc)
    }

    pub(crate) fn create_render_target_view(&mut self, desc: &RenderTargetViewDesc) -> GalResult<RenderTargetViewHandle> {
        let texture = live(&mut self.textures, desc.texture)?;
        if !texture.desc.allow_render_target_view {
            return Err(GalError::validation("Texture does not allow render target views"));
        }
        validate_render_target_view(&texture.desc, desc)?;

        let native = texture.native;
        self.get_or_create_view::<RenderTargetViews>(ViewOwner::Texture(desc.texture), native, *desc)
    }

    pub(crate) fn memory_usage(&self) -> MemoryUsage {
        let buffers = self.buffers.iter().map(|(_, buffer)| u64::from(buffer.desc.total_size)).sum();
        let textures = self
            .textures
            .iter()
            .filter(|(_, texture)| texture.native().is_some())
            .map(|(_, texture)| estimate_texture_memory(&texture.desc))
            .sum();
        MemoryUsage { buffers, textures }
    }
}

impl Device {
    /// Create a buffer, optionally filled with `initial_data`
    ///
    /// A buffer created with [`BufferUsageFlags::SHADER_RESOURCE`] gets a
    /// default resource view over all of its elements.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] when the descriptor is inconsistent
    /// with itself, the data or the backend capabilities, and
    /// [`GalError::Backend`] when the backend fails.
    pub fn create_buffer(&self, desc: &BufferDesc, initial_data: &[u8]) -> GalResult<BufferHandle> {
        self.lock().create_buffer(desc, initial_data)
    }

    /// Create a vertex buffer of `vertex_count` vertices
    ///
    /// The buffer is immutable when `initial_data` is given.
    ///
    /// # Errors
    ///
    /// See [`Device::create_buffer`].
    pub fn create_vertex_buffer(&self, vertex_size: u32, vertex_count: u32, initial_data: &[u8]) -> GalResult<BufferHandle> {
        let desc = BufferDesc::vertex(vertex_size, vertex_count, !initial_data.is_empty());
        self.create_buffer(&desc, initial_data)
    }

    /// Create an index buffer with 16-bit (`index_size == 2`) or 32-bit indices
    ///
    /// The buffer is immutable when `initial_data` is given.
    ///
    /// # Errors
    ///
    /// See [`Device::create_buffer`].
    pub fn create_index_buffer(&self, index_size: u32, index_count: u32, initial_data: &[u8]) -> GalResult<BufferHandle> {
        let desc = BufferDesc::index(index_size, index_count, !initial_data.is_empty());
        self.create_buffer(&desc, initial_data)
    }

    /// Create a transient constant buffer
    ///
    /// # Errors
    ///
    /// See [`Device::create_buffer`].
    pub fn create_constant_buffer(&self, size: u32) -> GalResult<BufferHandle> {
        self.create_buffer(&BufferDesc::constant(size), &[])
    }

    /// Overwrite part of a mutable buffer
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] for a destroyed buffer and
    /// [`GalError::Validation`] for immutable buffers or out of range writes.
    pub fn update_buffer(&self, buffer: BufferHandle, offset: u32, data: &[u8]) -> GalResult<()> {
        self.lock().update_buffer(buffer, offset, data)
    }

    /// Queue a buffer and its views for destruction
    pub fn destroy_buffer(&self, buffer: BufferHandle) {
        self.lock().destroy_buffer(buffer);
    }

    /// Descriptor a buffer was created with
    pub fn buffer_desc(&self, buffer: BufferHandle) -> Option<BufferDesc> {
        self.lock().buffers.get(buffer).map(|object| object.desc)
    }

    /// Resource view over the whole buffer, invalid unless created with `SHADER_RESOURCE`
    pub fn default_buffer_resource_view(&self, buffer: BufferHandle) -> ResourceViewHandle {
        self.lock().buffers.get(buffer).map_or_else(ResourceViewHandle::invalid, |object| object.default_resource_view)
    }

    /// Create a texture, or wrap `desc.existing_native_object` when set
    ///
    /// Default resource and render target views are created as the descriptor
    /// allows. The default render target view of a cube texture views it as a
    /// 2D array.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] for an empty extent, a bad array size
    /// or an immutable texture without data for every mip, and
    /// [`GalError::Backend`] when the backend fails.
    pub fn create_texture(&self, desc: &TextureDesc, initial_data: &[SubresourceData<'_>]) -> GalResult<TextureHandle> {
        self.lock().create_texture(desc, initial_data)
    }

    /// Create a texture viewing one slice of a cube or array texture
    ///
    /// No backend texture is allocated; the proxy's default views address the
    /// slice inside the parent.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] for an unknown parent and
    /// [`GalError::Validation`] for a parent of the wrong type or a slice out
    /// of range.
    pub fn create_proxy_texture(&self, parent: TextureHandle, slice: u32) -> GalResult<TextureHandle> {
        self.lock().create_proxy_texture(parent, slice)
    }

    /// Create a texture other processes can open through [`Device::shared_texture_handle`]
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] unless the descriptor is a
    /// `Texture2DShared` that passes the texture rules, and
    /// [`GalError::Backend`] when the backend cannot share textures.
    pub fn create_shared_texture(
        &self,
        desc: &TextureDesc,
        initial_data: &[SubresourceData<'_>],
    ) -> GalResult<TextureHandle> {
        self.lock().create_shared_texture(desc, initial_data)
    }

    /// Open a texture shared by another process
    ///
    /// # Errors
    ///
    /// See [`Device::create_shared_texture`].
    pub fn open_shared_texture(&self, desc: &TextureDesc, shared_handle: u64) -> GalResult<TextureHandle> {
        self.lock().open_shared_texture(desc, shared_handle)
    }

    /// Platform handle of a shared texture
    pub fn shared_texture_handle(&self, texture: TextureHandle) -> Option<u64> {
        match self.lock().textures.get(texture)?.origin {
            TextureOrigin::Shared { shared_handle } => Some(shared_handle),
            _ => None,
        }
    }

    /// Queue a texture and its views for destruction
    ///
    /// Back buffers belong to their swap chain and are refused with a warning.
    pub fn destroy_texture(&self, texture: TextureHandle) {
        self.lock().destroy_texture(texture);
    }

    /// Descriptor a texture was created with
    pub fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc> {
        self.lock().textures.get(texture).map(|object| object.desc)
    }

    /// Default resource view of a texture, invalid if none was created
    pub fn default_resource_view(&self, texture: TextureHandle) -> ResourceViewHandle {
        self.lock().textures.get(texture).map_or_else(ResourceViewHandle::invalid, |object| object.default_resource_view)
    }

    /// Default render target view of a texture, invalid if none was created
    pub fn default_render_target_view(&self, texture: TextureHandle) -> RenderTargetViewHandle {
        self.lock()
            .textures
            .get(texture)
            .map_or_else(RenderTargetViewHandle::invalid, |object| object.default_render_target_view)
    }

    /// Create a readback buffer
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] for a size of 0 and
    /// [`GalError::Backend`] when the backend fails.
    pub fn create_readback_buffer(&self, desc: &ReadbackBufferDesc) -> GalResult<ReadbackBufferHandle> {
        self.lock().create_readback_buffer(desc)
    }

    /// Queue a readback buffer for destruction
    pub fn destroy_readback_buffer(&self, buffer: ReadbackBufferHandle) {
        let mut state = self.lock();
        let state = &mut *state;
        enqueue_owned(&mut state.readback_buffers, &mut state.dead_objects, buffer);
    }

    /// Descriptor a readback buffer was created with
    pub fn readback_buffer_desc(&self, buffer: ReadbackBufferHandle) -> Option<ReadbackBufferDesc> {
        self.lock().readback_buffers.get(buffer).map(|object| object.desc)
    }

    /// Create a readback texture
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] for an empty extent and
    /// [`GalError::Backend`] when the backend fails.
    pub fn create_readback_texture(&self, desc: &ReadbackTextureDesc) -> GalResult<ReadbackTextureHandle> {
        self.lock().create_readback_texture(desc)
    }

    /// Queue a readback texture for destruction
    pub fn destroy_readback_texture(&self, texture: ReadbackTextureHandle) {
        let mut state = self.lock();
        let state = &mut *state;
        enqueue_owned(&mut state.readback_textures, &mut state.dead_objects, texture);
    }

    /// Descriptor a readback texture was created with
    pub fn readback_texture_desc(&self, texture: ReadbackTextureHandle) -> Option<ReadbackTextureDesc> {
        self.lock().readback_textures.get(texture).map(|object| object.desc)
    }

    /// Get or create a shader resource view of a texture or buffer
    ///
    /// Views are cached per owner by descriptor; asking twice for the same
    /// view returns the same handle with one more reference.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] for a destroyed owner and
    /// [`GalError::Validation`] when the view doesn't fit the owner.
    pub fn create_resource_view(&self, desc: &ResourceViewDesc) -> GalResult<ResourceViewHandle> {
        self.lock().create_resource_view(desc)
    }

    /// Drop one reference on a resource view
    pub fn destroy_resource_view(&self, view: ResourceViewHandle) {
        self.lock().release_view::<ResourceViews>(view);
    }

    /// Get or create an unordered access view of a texture or buffer
    ///
    /// # Errors
    ///
    /// See [`Device::create_resource_view`].
    pub fn create_unordered_access_view(&self, desc: &UnorderedAccessViewDesc) -> GalResult<UnorderedAccessViewHandle> {
        self.lock().create_unordered_access_view(desc)
    }

    /// Drop one reference on an unordered access view
    pub fn destroy_unordered_access_view(&self, view: UnorderedAccessViewHandle) {
        self.lock().release_view::<UnorderedAccessViews>(view);
    }

    /// Get or create a render target view of a texture
    ///
    /// # Errors
    ///
    /// See [`Device::create_resource_view`].
    pub fn create_render_target_view(&self, desc: &RenderTargetViewDesc) -> GalResult<RenderTargetViewHandle> {
        self.lock().create_render_target_view(desc)
    }

    /// Drop one reference on a render target view
    pub fn destroy_render_target_view(&self, view: RenderTargetViewHandle) {
        self.lock().release_view::<RenderTargetViews>(view);
    }

    /// Descriptor a render target view was created with
    pub fn render_target_view_desc(&self, view: RenderTargetViewHandle) -> Option<RenderTargetViewDesc> {
        self.lock().render_target_views.get(view).map(|object| object.desc)
    }

    /// Number of views currently cached on a texture
    pub fn texture_view_count(&self, texture: TextureHandle) -> usize {
        self.lock().textures.get(texture).map_or(0, |object| object.views.len())
    }

    /// Parent texture and slice of a proxy texture
    pub fn proxy_parent(&self, texture: TextureHandle) -> Option<(TextureHandle, u32)> {
        match self.lock().textures.get(texture)?.origin {
            TextureOrigin::Proxy { parent, slice } => Some((parent, slice)),
            _ => None,
        }
    }

    /// Estimated memory of all live buffers and device-allocated textures
    pub fn memory_usage(&self) -> MemoryUsage {
        self.lock().memory_usage()
    }
}
