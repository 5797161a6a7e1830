//! Deterministic hashing for creation descriptors and slot names

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Streaming xxh3 hasher with a fixed seed
///
/// Unlike `std`'s `RandomState`, two hashers always agree on the same input,
/// which the descriptor caches rely on.
pub struct DescriptorHasher(Xxh3);

impl Default for DescriptorHasher {
    fn default() -> Self {
        Self(Xxh3::new())
    }
}

impl Hasher for DescriptorHasher {
    fn finish(&self) -> u64 {
        self.0.digest()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }
}

/// Content hash of a creation descriptor
pub trait DescriptorHash {
    /// Hash every field that influences the created object
    fn calculate_hash(&self) -> u64;
}

impl<T: Hash + ?Sized> DescriptorHash for T {
    fn calculate_hash(&self) -> u64 {
        let mut hasher = DescriptorHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Hash a shader slot name
pub fn hash_name(name: &str) -> u64 {
    xxh3_64(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Hash)]
    struct Sample {
        width: u32,
        label: &'static str,
    }

    #[test]
    fn test_equal_values_hash_equal() {
        let a = Sample { width: 64, label: "a" };
        let b = Sample { width: 64, label: "a" };
        assert_eq!(a.calculate_hash(), b.calculate_hash());
    }

    #[test]
    fn test_different_values_hash_differently() {
        let a = Sample { width: 64, label: "a" };
        let b = Sample { width: 65, label: "a" };
        assert_ne!(a.calculate_hash(), b.calculate_hash());
    }

    #[test]
    fn test_name_hash_is_stable() {
        assert_eq!(hash_name("BaseTexture"), hash_name("BaseTexture"));
        assert_ne!(hash_name("BaseTexture"), hash_name("NormalTexture"));
    }
}
