//! Vertex layouts and the per-context vertex declaration cache

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use log::warn;

use crate::descriptors::{VertexAttribute, VertexBinding, VertexBindingRate, VertexDeclarationDesc};
use crate::device::Device;
use crate::foundation::hashing::{DescriptorHash, DescriptorHasher};
use crate::handles::{GalHandle, ShaderHandle, VertexDeclarationHandle};

/// Attributes of a mesh's vertex streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    hash: u64,
}

impl VertexLayout {
    /// Layout from its attributes; no semantic may appear twice
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        debug_assert!(
            !has_duplicate_semantics(&attributes),
            "Same semantic cannot be used twice in the same vertex layout"
        );
        let hash = attributes.calculate_hash();
        Self { attributes, hash }
    }

    /// Every attribute of every stream
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Content hash of the attributes
    pub fn layout_hash(&self) -> u64 {
        self.hash
    }

    /// Highest vertex buffer slot any attribute reads from
    pub fn highest_slot(&self) -> Option<u32> {
        self.attributes.iter().map(|attribute| attribute.vertex_buffer_slot).max()
    }
}

fn has_duplicate_semantics(attributes: &[VertexAttribute]) -> bool {
    attributes
        .iter()
        .enumerate()
        .any(|(i, a)| attributes[i + 1..].iter().any(|b| a.semantic == b.semantic))
}

/// Vertex declarations by shader and combined layout hash
///
/// Failed creations are cached as invalid handles; a fallback shader that
/// does not match the mesh keeps failing cheaply until the real one loads.
#[derive(Default)]
pub(crate) struct VertexDeclarationCache {
    entries: HashMap<(ShaderHandle, u64), VertexDeclarationHandle>,
    hits: u64,
}

impl VertexDeclarationCache {
    /// Hash of the layout plus stride and rate of every binding up to the highest used slot
    pub(crate) fn combined_hash(layout: &VertexLayout, strides: &[u32], rates: &[VertexBindingRate]) -> u64 {
        let mut hasher = DescriptorHasher::default();
        layout.layout_hash().hash(&mut hasher);
        if let Some(highest) = layout.highest_slot() {
            for slot in 0..=highest as usize {
                strides.get(slot).hash(&mut hasher);
                rates.get(slot).hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Declaration for `layout` under `shader`, invalid if the device cannot create one
    pub(crate) fn resolve(
        &mut self,
        device: &Device,
        shader: ShaderHandle,
        layout: &VertexLayout,
        strides: &[u32],
        rates: &[VertexBindingRate],
    ) -> VertexDeclarationHandle {
        let Some(highest) = layout.highest_slot() else {
            return VertexDeclarationHandle::invalid();
        };
        let binding_count = highest as usize + 1;
        if binding_count > strides.len() || binding_count > rates.len() {
            warn!("Vertex layout reads slot {highest} but only {} vertex buffers can be bound", strides.len());
            return VertexDeclarationHandle::invalid();
        }

        let key = (shader, Self::combined_hash(layout, strides, rates));
        if let Some(&handle) = self.entries.get(&key) {
            self.hits += 1;
            return handle;
        }

        let desc = VertexDeclarationDesc {
            shader,
            attributes: layout.attributes().to_vec(),
            bindings: strides[..binding_count]
                .iter()
                .zip(&rates[..binding_count])
                .map(|(&stride, &rate)| VertexBinding { stride, rate })
                .collect(),
        };
        let handle = device.create_vertex_declaration(&desc).unwrap_or_else(|err| {
            warn!("Failed to create vertex declaration: {err}");
            VertexDeclarationHandle::invalid()
        });
        self.entries.insert(key, handle);
        handle
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits
    }

    /// Drop the context's reference on every cached declaration
    pub(crate) fn release_all(&mut self, device: &Device) {
        for (_, handle) in self.entries.drain() {
            if !handle.is_invalid() {
                device.destroy_vertex_declaration(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{Format, VertexSemantic};

    fn attribute(semantic: VertexSemantic, offset: u32, slot: u32) -> VertexAttribute {
        VertexAttribute {
            semantic,
            format: Format::Rgb32Float,
            offset,
            vertex_buffer_slot: slot,
        }
    }

    #[test]
    fn test_highest_slot() {
        let layout = VertexLayout::new(vec![
            attribute(VertexSemantic::Position, 0, 0),
            attribute(VertexSemantic::Color0, 0, 2),
        ]);
        assert_eq!(layout.highest_slot(), Some(2));
        assert_eq!(VertexLayout::new(Vec::new()).highest_slot(), None);
    }

    #[test]
    fn test_duplicate_semantics_are_detected() {
        let attributes = [
            attribute(VertexSemantic::Position, 0, 0),
            attribute(VertexSemantic::Position, 12, 0),
        ];
        assert!(has_duplicate_semantics(&attributes));
        assert!(!has_duplicate_semantics(&attributes[..1]));
    }

    #[test]
    fn test_combined_hash_ignores_unused_slots() {
        let layout = VertexLayout::new(vec![attribute(VertexSemantic::Position, 0, 0)]);
        let rates = [VertexBindingRate::Vertex; 4];

        let a = VertexDeclarationCache::combined_hash(&layout, &[12, 0, 0, 0], &rates);
        let b = VertexDeclarationCache::combined_hash(&layout, &[12, 32, 8, 4], &rates);
        let c = VertexDeclarationCache::combined_hash(&layout, &[16, 0, 0, 0], &rates);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
