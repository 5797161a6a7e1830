//! Hashed, reference-counted object tables
//!
//! State objects, shaders, layouts, vertex declarations and pipelines are
//! de-duplicated: creating an object whose descriptor hashes like a live one
//! hands out the existing handle and bumps its reference count.

use std::collections::HashMap;

use log::{debug, error, warn};
use slotmap::Key;

use super::dead_objects::{DeadObjectQueue, Destroyable};
use crate::backend::{BackendResult, GalBackend};
use crate::error::{GalError, GalResult};
use crate::foundation::collections::Arena;
use crate::handles::GalHandle;

/// Object that can recompute the hash it is cached under
pub(crate) trait HashedObject {
    fn descriptor_hash(&self) -> u64;
}

/// Table entry carrying a reference count
pub(crate) struct RefCounted<O> {
    pub(crate) object: O,
    pub(crate) ref_count: u32,
    pub(crate) hash: u64,
}

/// Slot table plus a descriptor hash index
pub(crate) struct HashedTable<H: GalHandle, O> {
    objects: Arena<H, RefCounted<O>>,
    by_hash: HashMap<u64, H>,
}

impl<H: GalHandle, O> HashedTable<H, O> {
    pub(crate) fn new(capacity_limit: usize) -> Self {
        Self {
            objects: Arena::with_capacity_limit(capacity_limit),
            by_hash: HashMap::new(),
        }
    }

    /// Reference the object cached under `hash`, reviving it if it is queued for destruction
    pub(crate) fn acquire(&mut self, hash: u64, dead_objects: &mut DeadObjectQueue) -> Option<H> {
        let handle = *self.by_hash.get(&hash)?;
        self.add_ref(handle, dead_objects).then_some(handle)
    }

    /// Take one more reference on `handle`
    pub(crate) fn add_ref(&mut self, handle: H, dead_objects: &mut DeadObjectQueue) -> bool {
        let Some(entry) = self.objects.get_mut(handle) else {
            return false;
        };

        if entry.ref_count == 0 {
            let revived = dead_objects.revive(H::KIND, handle.data());
            debug_assert!(revived, "unreferenced {} was not queued for destruction", H::KIND);
            debug!("Revived {} {:?} before destruction", H::KIND, handle.data());
        }
        entry.ref_count += 1;
        true
    }

    /// Insert a new object with one reference
    pub(crate) fn insert(&mut self, hash: u64, object: O) -> Result<H, O> {
        let handle = self
            .objects
            .insert(RefCounted {
                object,
                ref_count: 1,
                hash,
            })
            .map_err(|entry| entry.object)?;
        self.by_hash.insert(hash, handle);
        Ok(handle)
    }

    pub(crate) fn get(&self, handle: H) -> Option<&O> {
        self.objects.get(handle).map(|entry| &entry.object)
    }

    pub(crate) fn contains(&self, handle: H) -> bool {
        self.objects.contains(handle)
    }

    pub(crate) fn ref_count(&self, handle: H) -> Option<u32> {
        self.objects.get(handle).map(|entry| entry.ref_count)
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn capacity_limit(&self) -> usize {
        self.objects.capacity_limit()
    }

    pub(crate) fn handles(&self) -> Vec<H> {
        self.objects.keys()
    }
}

impl<H: GalHandle, O: Destroyable<Handle = H> + HashedObject> HashedTable<H, O> {
    /// Drop one reference, queueing the object when it was the last
    pub(crate) fn release(&mut self, handle: H, dead_objects: &mut DeadObjectQueue) {
        match self.objects.get_mut(handle) {
            Some(entry) if entry.ref_count > 0 => {
                entry.ref_count -= 1;
                if entry.ref_count == 0 {
                    dead_objects.push::<O>(handle);
                }
            }
            _ => warn!("Destroy called on invalid {} handle (double free?)", H::KIND),
        }
    }

    /// Remove the object from the slot table and the hash index
    pub(crate) fn take(&mut self, handle: H) -> Option<O> {
        let entry = self.objects.remove(handle)?;
        let hash = entry.object.descriptor_hash();
        debug_assert_eq!(hash, entry.hash, "{} descriptor changed while cached", H::KIND);

        if self.by_hash.remove(&hash) != Some(handle) {
            error!("{} {:?} not found in de-duplication table", H::KIND, handle.data());
            debug_assert!(false, "{} hash index out of sync", H::KIND);
        }
        Some(entry.object)
    }

    /// Insert a freshly created object, releasing its backend object if the table is full
    pub(crate) fn insert_or_release(&mut self, hash: u64, object: O, backend: &mut dyn GalBackend) -> GalResult<H> {
        debug_assert_eq!(object.descriptor_hash(), hash, "{} hash doesn't match", H::KIND);

        self.insert(hash, object).map_err(|object| {
            if let Some(native) = object.native() {
                backend.destroy_platform(H::KIND, native);
            }
            GalError::capacity_exceeded(H::KIND, self.capacity_limit())
        })
    }
}

/// Get the object cached under `hash` or create it through the backend
pub(crate) fn get_or_create<H, O>(
    table: &mut HashedTable<H, O>,
    dead_objects: &mut DeadObjectQueue,
    backend: &mut dyn GalBackend,
    hash: u64,
    create: impl FnOnce(&mut dyn GalBackend) -> BackendResult<O>,
) -> GalResult<H>
where
    H: GalHandle,
    O: Destroyable<Handle = H> + HashedObject,
{
    if let Some(handle) = table.acquire(hash, dead_objects) {
        return Ok(handle);
    }

    let object = create(backend).map_err(|source| GalError::backend(H::KIND, source))?;
    table.insert_or_release(hash, object, backend)
}
