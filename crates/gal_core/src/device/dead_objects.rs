//! Deferred destruction
//!
//! Nothing the GPU might still read is destroyed immediately. Hashed objects
//! whose last reference is released, and exclusively owned objects that are
//! destroyed, wait in the [`DeadObjectQueue`] until the next frame end or
//! shutdown. A hashed object requested again before then is revived and taken
//! back out of the queue.

use std::collections::HashMap;

use log::{debug, error, trace, warn};
use slotmap::{Key, KeyData};

use super::DeviceState;
use crate::backend::NativeObject;
use crate::handles::{GalHandle, ObjectKind};

/// A device object that can be torn down by the flush
pub(crate) trait Destroyable: Sized + 'static {
    /// Handle type of the table the object lives in
    type Handle: GalHandle;

    /// Remove the object from every device table
    fn take(state: &mut DeviceState, handle: Self::Handle) -> Option<Self>;

    /// Backend object to release, `None` when the device does not own one
    fn native(&self) -> Option<NativeObject>;

    /// Drop what this object holds on other device objects
    ///
    /// Runs before the object's own backend object is released.
    fn release_components(&self, _state: &mut DeviceState) {}
}

type ReclaimFn = fn(&mut DeviceState, KeyData);

#[derive(Clone, Copy)]
struct DeadObject {
    kind: ObjectKind,
    key: KeyData,
    reclaim: ReclaimFn,
}

/// Objects waiting for the next flush, in the order they died
///
/// Revived entries leave a hole that the flush skips, so reviving never
/// shifts the queue.
#[derive(Default)]
pub(crate) struct DeadObjectQueue {
    entries: Vec<Option<DeadObject>>,
    positions: HashMap<(ObjectKind, KeyData), usize>,
}

impl DeadObjectQueue {
    pub(crate) fn push<O: Destroyable>(&mut self, handle: O::Handle) {
        let kind = <O::Handle as GalHandle>::KIND;
        let key = handle.data();
        if self.positions.contains_key(&(kind, key)) {
            warn!("{kind} {key:?} is already queued for destruction");
            return;
        }

        trace!("Queued {kind} {key:?} for destruction");
        self.positions.insert((kind, key), self.entries.len());
        self.entries.push(Some(DeadObject {
            kind,
            key,
            reclaim: reclaim::<O>,
        }));
    }

    /// Take an object back out of the queue
    pub(crate) fn revive(&mut self, kind: ObjectKind, key: KeyData) -> bool {
        let Some(index) = self.positions.remove(&(kind, key)) else {
            return false;
        };
        self.entries[index] = None;
        true
    }

    pub(crate) fn contains(&self, kind: ObjectKind, key: KeyData) -> bool {
        self.positions.contains_key(&(kind, key))
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Next entry to destroy at or after `index`, removed from the queue
    fn take_from(&mut self, index: &mut usize) -> Option<DeadObject> {
        while let Some(slot) = self.entries.get_mut(*index) {
            *index += 1;
            if let Some(entry) = slot.take() {
                self.positions.remove(&(entry.kind, entry.key));
                return Some(entry);
            }
        }
        None
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }
}

fn reclaim<O: Destroyable>(state: &mut DeviceState, key: KeyData) {
    let kind = <O::Handle as GalHandle>::KIND;
    let Some(object) = O::take(state, key.into()) else {
        error!("{kind} {key:?} from the dead object queue is missing from its table");
        debug_assert!(false, "dead object queue and {kind} table disagree");
        return;
    };

    object.release_components(state);
    if let Some(native) = object.native() {
        state.backend.destroy_platform(kind, native);
    }
    trace!("Destroyed {kind} {key:?}");
}

/// Tear an object down right away, bypassing the queue
pub(crate) fn destroy_now<O: Destroyable>(state: &mut DeviceState, handle: O::Handle) {
    reclaim::<O>(state, handle.data());
}

impl DeviceState {
    /// Destroy everything in the dead object queue
    ///
    /// Components released by a composite are appended to the queue while it
    /// is walked and are destroyed in the same pass.
    ///
    /// # Returns
    ///
    /// The number of objects destroyed.
    pub(crate) fn destroy_dead_objects(&mut self) -> usize {
        let mut index = 0;
        let mut destroyed = 0;
        while let Some(entry) = self.dead_objects.take_from(&mut index) {
            (entry.reclaim)(self, entry.key);
            destroyed += 1;
        }
        self.dead_objects.clear();

        if destroyed > 0 {
            debug!("Destroyed {destroyed} dead objects");
        }
        destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::BlendStateHandle;

    struct Marker;

    impl Destroyable for Marker {
        type Handle = BlendStateHandle;

        fn take(_state: &mut DeviceState, _handle: BlendStateHandle) -> Option<Self> {
            None
        }

        fn native(&self) -> Option<NativeObject> {
            None
        }
    }

    fn handle(index: u32) -> BlendStateHandle {
        KeyData::from_ffi(u64::from(index) | (1 << 32)).into()
    }

    #[test]
    fn test_revive_leaves_hole_and_keeps_order() {
        let mut queue = DeadObjectQueue::default();
        for index in 0..4 {
            queue.push::<Marker>(handle(index));
        }
        assert_eq!(queue.len(), 4);

        assert!(queue.revive(ObjectKind::BlendState, handle(1).data()));
        assert!(!queue.revive(ObjectKind::BlendState, handle(1).data()));
        assert!(!queue.contains(ObjectKind::BlendState, handle(1).data()));
        assert!(queue.contains(ObjectKind::BlendState, handle(2).data()));
        assert_eq!(queue.len(), 3);

        let mut index = 0;
        let mut order = Vec::new();
        while let Some(entry) = queue.take_from(&mut index) {
            order.push(entry.key);
        }
        assert_eq!(order, vec![handle(0).data(), handle(2).data(), handle(3).data()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_double_push_is_ignored() {
        let mut queue = DeadObjectQueue::default();
        queue.push::<Marker>(handle(7));
        queue.push::<Marker>(handle(7));
        assert_eq!(queue.len(), 1);

        // A revived object can be queued again
        assert!(queue.revive(ObjectKind::BlendState, handle(7).data()));
        queue.push::<Marker>(handle(7));
        assert!(queue.contains(ObjectKind::BlendState, handle(7).data()));
        assert_eq!(queue.len(), 1);
    }
}
