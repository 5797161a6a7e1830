//! Resource, unordered access and render target views
//!
//! Views are cached per owning texture or buffer by descriptor hash and carry
//! their own reference count. A view whose count drops to zero leaves its
//! owner's cache and is queued for destruction; destroying the owner destroys
//! every view still cached on it.

use std::collections::HashMap;
use std::hash::Hash;

use log::warn;
use super::dead_objects::Destroyable;
use super::DeviceState;
use crate::backend::{BackendResult, GalBackend, NativeObject};
use crate::descriptors::{RenderTargetViewDesc, ResourceViewDesc, UnorderedAccessViewDesc};
use crate::error::{GalError, GalResult};
use crate::foundation::collections::Arena;
use crate::foundation::hashing::DescriptorHash;
use crate::handles::{
    BufferHandle, GalHandle, ObjectKind, RenderTargetViewHandle, ResourceViewHandle, TextureHandle,
    UnorderedAccessViewHandle,
};

/// Texture or buffer a view was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewOwner {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

/// Views cached on one owner, keyed by descriptor hash
#[derive(Default)]
pub(crate) struct ViewCache {
    resource_views: HashMap<u64, ResourceViewHandle>,
    unordered_access_views: HashMap<u64, UnorderedAccessViewHandle>,
    render_target_views: HashMap<u64, RenderTargetViewHandle>,
}

impl ViewCache {
    pub(crate) fn len(&self) -> usize {
        self.resource_views.len() + self.unordered_access_views.len() + self.render_target_views.len()
    }
}

/// One of the three view families
pub(crate) trait ViewKind: Sized + 'static {
    type Handle: GalHandle;
    type Desc: Hash;

    fn table(state: &mut DeviceState) -> &mut Arena<Self::Handle, ViewObject<Self>>;

    fn cache(views: &mut ViewCache) -> &mut HashMap<u64, Self::Handle>;

    fn create_platform(
        backend: &mut dyn GalBackend,
        resource: NativeObject,
        desc: &Self::Desc,
    ) -> BackendResult<NativeObject>;
}

pub(crate) struct ResourceViews;
pub(crate) struct UnorderedAccessViews;
pub(crate) struct RenderTargetViews;

impl ViewKind for ResourceViews {
    type Handle = ResourceViewHandle;
    type Desc = ResourceViewDesc;

    fn table(state: &mut DeviceState) -> &mut Arena<Self::Handle, ViewObject<Self>> {
        &mut state.resource_views
    }

    fn cache(views: &mut ViewCache) -> &mut HashMap<u64, Self::Handle> {
        &mut views.resource_views
    }

    fn create_platform(
        backend: &mut dyn GalBackend,
        resource: NativeObject,
        desc: &ResourceViewDesc,
    ) -> BackendResult<NativeObject> {
        backend.create_resource_view_platform(resource, desc)
    }
}

impl ViewKind for UnorderedAccessViews {
    type Handle = UnorderedAccessViewHandle;
    type Desc = UnorderedAccessViewDesc;

    fn table(state: &mut DeviceState) -> &mut Arena<Self::Handle, ViewObject<Self>> {
        &mut state.unordered_access_views
    }

    fn cache(views: &mut ViewCache) -> &mut HashMap<u64, Self::Handle> {
        &mut views.unordered_access_views
    }

    fn create_platform(
        backend: &mut dyn GalBackend,
        resource: NativeObject,
        desc: &UnorderedAccessViewDesc,
    ) -> BackendResult<NativeObject> {
        backend.create_unordered_access_view_platform(resource, desc)
    }
}

impl ViewKind for RenderTargetViews {
    type Handle = RenderTargetViewHandle;
    type Desc = RenderTargetViewDesc;

    fn table(state: &mut DeviceState) -> &mut Arena<Self::Handle, ViewObject<Self>> {
        &mut state.render_target_views
    }

    fn cache(views: &mut ViewCache) -> &mut HashMap<u64, Self::Handle> {
        &mut views.render_target_views
    }

    fn create_platform(
        backend: &mut dyn GalBackend,
        resource: NativeObject,
        desc: &RenderTargetViewDesc,
    ) -> BackendResult<NativeObject> {
        backend.create_render_target_view_platform(resource, desc)
    }
}

pub(crate) struct ViewObject<V: ViewKind> {
    pub(crate) desc: V::Desc,
    pub(crate) native: NativeObject,
    pub(crate) owner: ViewOwner,
    pub(crate) hash: u64,
    pub(crate) ref_count: u32,
}

impl<V: ViewKind> Destroyable for ViewObject<V> {
    type Handle = V::Handle;

    fn take(state: &mut DeviceState, handle: V::Handle) -> Option<Self> {
        V::table(state).remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        Some(self.native)
    }
}

impl DeviceState {
    fn view_cache_mut(&mut self, owner: ViewOwner) -> Option<&mut ViewCache> {
        match owner {
            ViewOwner::Texture(texture) => self.textures.get_mut(texture).map(|object| &mut object.views),
            ViewOwner::Buffer(buffer) => self.buffers.get_mut(buffer).map(|object| &mut object.views),
        }
    }

    /// Get a cached view of `owner` or create it on `resource`
    pub(crate) fn get_or_create_view<V: ViewKind>(
        &mut self,
        owner: ViewOwner,
        resource: NativeObject,
        desc: V::Desc,
    ) -> GalResult<V::Handle> {
        let kind = <V::Handle as GalHandle>::KIND;
        let hash = desc.calculate_hash();

        let cached = self
            .view_cache_mut(owner)
            .ok_or(GalError::InvalidHandle(owner_kind(owner)))
            .map(|views| V::cache(views).get(&hash).copied())?;
        if let Some(handle) = cached {
            if let Some(view) = V::table(self).get_mut(handle) {
                view.ref_count += 1;
                return Ok(handle);
            }
        }

        let native = V::create_platform(self.backend.as_mut(), resource, &desc)
            .map_err(|source| GalError::backend(kind, source))?;
        let view = ViewObject {
            desc,
            native,
            owner,
            hash,
            ref_count: 1,
        };

        let handle = match V::table(self).insert(view) {
            Ok(handle) => handle,
            Err(view) => {
                let limit = V::table(self).capacity_limit();
                self.backend.destroy_platform(kind, view.native);
                return Err(GalError::capacity_exceeded(kind, limit));
            }
        };

        if let Some(views) = self.view_cache_mut(owner) {
            V::cache(views).insert(hash, handle);
        }
        Ok(handle)
    }

    /// Drop one reference on a view
    pub(crate) fn release_view<V: ViewKind>(&mut self, handle: V::Handle) {
        let kind = <V::Handle as GalHandle>::KIND;
        let Some(view) = V::table(self).get_mut(handle).filter(|view| view.ref_count > 0) else {
            warn!("Destroy called on invalid {kind} handle (double free?)");
            return;
        };

        view.ref_count -= 1;
        if view.ref_count > 0 {
            return;
        }

        let (owner, hash) = (view.owner, view.hash);
        if let Some(views) = self.view_cache_mut(owner) {
            V::cache(views).remove(&hash);
        }
        self.dead_objects.push::<ViewObject<V>>(handle);
    }

    pub(crate) fn view_ref_count<V: ViewKind>(&mut self, handle: V::Handle) -> Option<u32> {
        V::table(self).get(handle).map(|view| view.ref_count)
    }

    /// Destroy every view still cached on an owner that is being destroyed
    pub(crate) fn destroy_cached_views(&mut self, views: &ViewCache) {
        self.destroy_views_of::<ResourceViews>(views.resource_views.values().copied());
        self.destroy_views_of::<UnorderedAccessViews>(views.unordered_access_views.values().copied());
        self.destroy_views_of::<RenderTargetViews>(views.render_target_views.values().copied());
    }

    fn destroy_views_of<V: ViewKind>(&mut self, handles: impl Iterator<Item = V::Handle>) {
        let kind = <V::Handle as GalHandle>::KIND;
        for handle in handles {
            if let Some(view) = V::table(self).remove(handle) {
                self.backend.destroy_platform(kind, view.native);
            }
        }
    }
}

fn owner_kind(owner: ViewOwner) -> ObjectKind {
    match owner {
        ViewOwner::Texture(_) => ObjectKind::Texture,
        ViewOwner::Buffer(_) => ObjectKind::Buffer,
    }
}
