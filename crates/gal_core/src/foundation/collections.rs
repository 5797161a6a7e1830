//! Specialized collection types
//!
//! [`Arena`] is the slot table every device object lives in. It wraps a
//! [`SlotMap`] so that keys carry a generation: a stale key never resolves to
//! a newer object that happens to reuse the same slot.

use std::ops::Index;

pub use slotmap::{Key, KeyData, SlotMap};

/// Slot table with a hard limit on the number of live entries
///
/// The arena never drops a payload on its own. [`Arena::remove`] hands the
/// value back so the caller decides how the object is torn down.
pub struct Arena<K: Key, T> {
    slots: SlotMap<K, T>,
    capacity_limit: usize,
}

impl<K: Key, T> Arena<K, T> {
    /// Create an arena holding at most `capacity_limit` live entries
    pub fn with_capacity_limit(capacity_limit: usize) -> Self {
        Self {
            slots: SlotMap::with_key(),
            capacity_limit,
        }
    }

    /// Insert a value, reusing a previously freed slot when possible
    ///
    /// # Returns
    ///
    /// The new key, or the value itself when the arena is already full.
    pub fn insert(&mut self, value: T) -> Result<K, T> {
        if self.slots.len() >= self.capacity_limit {
            return Err(value);
        }
        Ok(self.slots.insert(value))
    }

    /// Remove the entry behind `key`, returning `None` for stale or unknown keys
    pub fn remove(&mut self, key: K) -> Option<T> {
        self.slots.remove(key)
    }

    /// Get a reference to an entry
    pub fn get(&self, key: K) -> Option<&T> {
        self.slots.get(key)
    }

    /// Get a mutable reference to an entry
    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(key)
    }

    /// Check whether `key` still refers to a live entry
    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds no entries
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of live entries
    pub fn capacity_limit(&self) -> usize {
        self.capacity_limit
    }

    /// Iterate over all live entries
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.slots.iter()
    }

    /// Iterate mutably over all live entries
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        self.slots.iter_mut()
    }

    /// Collect the keys of all live entries
    pub fn keys(&self) -> Vec<K> {
        self.slots.keys().collect()
    }
}

impl<K: Key, T> Index<K> for Arena<K, T> {
    type Output = T;

    /// Unchecked lookup for keys the caller already proved valid.
    ///
    /// Panics on a stale key.
    fn index(&self, key: K) -> &T {
        &self.slots[key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    slotmap::new_key_type! {
        struct TestKey;
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut arena: Arena<TestKey, &str> = Arena::with_capacity_limit(8);
        let key = arena.insert("blend").expect("Should insert");

        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(key), Some(&"blend"));
        assert_eq!(arena[key], "blend");
        assert!(!key.is_null());
    }

    #[test]
    fn test_remove_yields_payload_and_invalidates_key() {
        let mut arena: Arena<TestKey, u32> = Arena::with_capacity_limit(8);
        let key = arena.insert(7).expect("Should insert");

        assert_eq!(arena.remove(key), Some(7));
        assert_eq!(arena.remove(key), None);
        assert!(!arena.contains(key));
    }

    #[test]
    fn test_reused_slot_rejects_stale_key() {
        let mut arena: Arena<TestKey, u32> = Arena::with_capacity_limit(8);
        let old = arena.insert(1).expect("Should insert");
        arena.remove(old);
        let new = arena.insert(2).expect("Should insert");

        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_capacity_limit_boundary() {
        let mut arena: Arena<TestKey, u32> = Arena::with_capacity_limit(3);
        for i in 0..3 {
            arena.insert(i).expect("Should insert below the limit");
        }

        assert_eq!(arena.insert(99), Err(99));
        assert_eq!(arena.len(), 3);

        let first = arena.keys()[0];
        arena.remove(first);
        assert!(arena.insert(100).is_ok());
    }
}
