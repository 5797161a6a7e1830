//! Desired resource bindings, keyed by slot name

use std::collections::HashMap;

use super::constant_buffers::ConstantStorageHandle;
use super::state_flags::StateFlags;
use crate::foundation::hashing::hash_name;
use crate::handles::{BufferHandle, GalHandle, SamplerStateHandle, TextureHandle, UnorderedAccessViewHandle};

/// Source of a constant buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantBinding {
    /// A buffer the caller updates
    Buffer(BufferHandle),
    /// A context-owned storage uploaded on every apply
    Storage(ConstantStorageHandle),
}

/// Values bound by slot name hash
#[derive(Debug)]
pub(crate) struct NamedSlots<V> {
    values: HashMap<u64, V>,
}

impl<V> Default for NamedSlots<V> {
    fn default() -> Self {
        Self { values: HashMap::new() }
    }
}

impl<V: Copy + PartialEq> NamedSlots<V> {
    /// Store `value` under `name`, `None` removes the slot; returns whether anything changed
    pub(crate) fn set(&mut self, name: &str, value: Option<V>) -> bool {
        let key = hash_name(name);
        match value {
            Some(value) => self.values.insert(key, value) != Some(value),
            None => self.values.remove(&key).is_some(),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<V> {
        self.values.get(&hash_name(name)).copied()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

/// Every binding the context will push once a shader asks for it
#[derive(Debug, Default)]
pub(crate) struct BoundResources {
    pub(crate) textures: NamedSlots<TextureHandle>,
    pub(crate) samplers: NamedSlots<SamplerStateHandle>,
    pub(crate) buffers: NamedSlots<BufferHandle>,
    pub(crate) unordered_access_views: NamedSlots<UnorderedAccessViewHandle>,
    pub(crate) constant_buffers: NamedSlots<ConstantBinding>,
}

fn some_valid<H: GalHandle>(handle: H) -> Option<H> {
    (!handle.is_invalid()).then_some(handle)
}

impl BoundResources {
    /// Bind a texture; returns the flag to raise when the binding changed
    pub(crate) fn bind_texture(&mut self, name: &str, texture: TextureHandle) -> StateFlags {
        changed(self.textures.set(name, some_valid(texture)), StateFlags::TEXTURE_BINDING_CHANGED)
    }

    pub(crate) fn bind_sampler(&mut self, name: &str, sampler: SamplerStateHandle) -> StateFlags {
        changed(self.samplers.set(name, some_valid(sampler)), StateFlags::SAMPLER_BINDING_CHANGED)
    }

    pub(crate) fn bind_buffer(&mut self, name: &str, buffer: BufferHandle) -> StateFlags {
        changed(self.buffers.set(name, some_valid(buffer)), StateFlags::BUFFER_BINDING_CHANGED)
    }

    pub(crate) fn bind_unordered_access_view(&mut self, name: &str, view: UnorderedAccessViewHandle) -> StateFlags {
        changed(
            self.unordered_access_views.set(name, some_valid(view)),
            StateFlags::UAV_BINDING_CHANGED,
        )
    }

    pub(crate) fn bind_constant_buffer(&mut self, name: &str, binding: Option<ConstantBinding>) -> StateFlags {
        let binding = binding.filter(|binding| match binding {
            ConstantBinding::Buffer(buffer) => !buffer.is_invalid(),
            ConstantBinding::Storage(_) => true,
        });
        changed(
            self.constant_buffers.set(name, binding),
            StateFlags::CONSTANT_BUFFER_BINDING_CHANGED,
        )
    }

    pub(crate) fn clear(&mut self) {
        self.textures.clear();
        self.samplers.clear();
        self.buffers.clear();
        self.unordered_access_views.clear();
        self.constant_buffers.clear();
    }
}

fn changed(did_change: bool, flag: StateFlags) -> StateFlags {
    if did_change {
        flag
    } else {
        StateFlags::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn texture_handles() -> (TextureHandle, TextureHandle) {
        let mut map = SlotMap::<TextureHandle, ()>::with_key();
        (map.insert(()), map.insert(()))
    }

    #[test]
    fn test_rebinding_the_same_value_reports_no_change() {
        let (first, _) = texture_handles();
        let mut bound = BoundResources::default();

        assert_eq!(bound.bind_texture("BaseTexture", first), StateFlags::TEXTURE_BINDING_CHANGED);
        assert_eq!(bound.bind_texture("BaseTexture", first), StateFlags::empty());
        assert_eq!(bound.textures.get("BaseTexture"), Some(first));
    }

    #[test]
    fn test_invalid_handle_unbinds() {
        let (first, second) = texture_handles();
        let mut bound = BoundResources::default();
        bound.bind_texture("BaseTexture", first);
        bound.bind_texture("NormalTexture", second);

        assert_eq!(
            bound.bind_texture("BaseTexture", TextureHandle::invalid()),
            StateFlags::TEXTURE_BINDING_CHANGED
        );
        assert_eq!(bound.bind_texture("BaseTexture", TextureHandle::invalid()), StateFlags::empty());
        assert_eq!(bound.textures.get("BaseTexture"), None);
        assert_eq!(bound.textures.len(), 1);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut bound = BoundResources::default();
        let mut buffers = SlotMap::<BufferHandle, ()>::with_key();
        let buffer = buffers.insert(());

        assert_eq!(bound.bind_buffer("Instances", buffer), StateFlags::BUFFER_BINDING_CHANGED);
        assert_eq!(
            bound.bind_constant_buffer("Instances", Some(ConstantBinding::Buffer(buffer))),
            StateFlags::CONSTANT_BUFFER_BINDING_CHANGED
        );
        assert_eq!(
            bound.bind_constant_buffer("Other", Some(ConstantBinding::Buffer(BufferHandle::invalid()))),
            StateFlags::empty()
        );
    }
}
