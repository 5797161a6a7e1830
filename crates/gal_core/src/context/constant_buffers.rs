//! Constant buffer storage
//!
//! A storage is a CPU-side copy of a constant buffer plus the GPU buffer it
//! is uploaded to. Dirty storages are copied through the command encoder the
//! next time the context applies state. Deleted storages go back to a free
//! list per size, so recreating a storage of the same size never touches the
//! device.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use log::trace;
use slotmap::SlotMap;

use crate::backend::CommandEncoder;
use crate::device::Device;
use crate::error::{GalError, GalResult};
use crate::handles::BufferHandle;

/// Constant buffer sizes must be a multiple of this
pub const CONSTANT_BUFFER_ALIGNMENT: u32 = 16;

slotmap::new_key_type! {
    /// Handle to a constant buffer storage owned by a render context
    pub struct ConstantStorageHandle;
}

/// Per-frame values every shader can read from the `GlobalConstants` slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GlobalConstants {
    /// Width, height and their reciprocals
    pub viewport_size: [f32; 4],
    /// Seconds since the previous frame
    pub delta_time: f32,
    /// Application time in seconds, wrapped
    pub global_time: f32,
    /// World simulation time in seconds, wrapped
    pub world_time: f32,
    /// Samples per pixel of the current render targets
    pub msaa_samples: u32,
}

struct ConstantStorage {
    data: Vec<u8>,
    buffer: BufferHandle,
    dirty: bool,
}

#[derive(Default)]
pub(crate) struct ConstantStoragePool {
    storages: SlotMap<ConstantStorageHandle, ConstantStorage>,
    free: HashMap<u32, Vec<ConstantStorage>>,
    dirty: Vec<ConstantStorageHandle>,
}

impl ConstantStoragePool {
    pub(crate) fn create(&mut self, device: &Device, size: u32) -> GalResult<ConstantStorageHandle> {
        if size == 0 || size % CONSTANT_BUFFER_ALIGNMENT != 0 {
            return Err(GalError::validation(format!(
                "Constant buffer storage of {size} bytes is not a non-zero multiple of {CONSTANT_BUFFER_ALIGNMENT}"
            )));
        }

        let storage = match self.free.get_mut(&size).and_then(Vec::pop) {
            Some(mut storage) => {
                storage.data.fill(0);
                storage.dirty = true;
                storage
            }
            None => ConstantStorage {
                data: vec![0; size as usize],
                buffer: device.create_constant_buffer(size)?,
                dirty: true,
            },
        };

        let handle = self.storages.insert(storage);
        self.dirty.push(handle);
        Ok(handle)
    }

    /// Return a storage to the free list; false if it was already deleted
    pub(crate) fn delete(&mut self, handle: ConstantStorageHandle) -> bool {
        let Some(mut storage) = self.storages.remove(handle) else {
            return false;
        };
        storage.dirty = false;
        let size = u32::try_from(storage.data.len()).unwrap_or(u32::MAX);
        self.free.entry(size).or_default().push(storage);
        true
    }

    pub(crate) fn write(&mut self, handle: ConstantStorageHandle, offset: u32, bytes: &[u8]) -> GalResult<()> {
        let storage = self
            .storages
            .get_mut(handle)
            .ok_or_else(|| GalError::validation("Writing to a deleted constant buffer storage"))?;

        let start = offset as usize;
        let end = start + bytes.len();
        if end > storage.data.len() {
            return Err(GalError::validation(format!(
                "Constant write of {} bytes at offset {offset} exceeds the {} byte storage",
                bytes.len(),
                storage.data.len()
            )));
        }

        storage.data[start..end].copy_from_slice(bytes);
        if !storage.dirty {
            storage.dirty = true;
            self.dirty.push(handle);
        }
        Ok(())
    }

    pub(crate) fn data(&self, handle: ConstantStorageHandle) -> Option<&[u8]> {
        self.storages.get(handle).map(|storage| storage.data.as_slice())
    }

    pub(crate) fn buffer(&self, handle: ConstantStorageHandle) -> Option<BufferHandle> {
        self.storages.get(handle).map(|storage| storage.buffer)
    }

    /// Copy every modified storage to its GPU buffer; returns the number of uploads
    pub(crate) fn upload_dirty<E: CommandEncoder>(&mut self, encoder: &mut E) -> usize {
        let mut uploads = 0;
        for handle in self.dirty.drain(..) {
            let Some(storage) = self.storages.get_mut(handle) else {
                continue;
            };
            if storage.dirty {
                encoder.update_buffer(storage.buffer, 0, &storage.data);
                storage.dirty = false;
                uploads += 1;
            }
        }
        if uploads > 0 {
            trace!("Uploaded {uploads} constant buffer storages");
        }
        uploads
    }

    pub(crate) fn live_count(&self) -> usize {
        self.storages.len()
    }

    pub(crate) fn free_count(&self, size: u32) -> usize {
        self.free.get(&size).map_or(0, Vec::len)
    }

    /// Destroy the GPU buffers of live and pooled storages
    pub(crate) fn release_all(&mut self, device: &Device) {
        for (_, storage) in self.storages.drain() {
            device.destroy_buffer(storage.buffer);
        }
        for (_, pooled) in self.free.drain() {
            for storage in pooled {
                device.destroy_buffer(storage.buffer);
            }
        }
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{EncoderCall, NullBackend, NullEncoder};
    use crate::config::DeviceConfig;
    use crate::handles::ObjectKind;

    fn device() -> Device {
        Device::new(Box::new(NullBackend::new()), DeviceConfig::default()).expect("Should create device")
    }

    #[test]
    fn test_global_constants_are_aligned() {
        assert_eq!(std::mem::size_of::<GlobalConstants>() as u32 % CONSTANT_BUFFER_ALIGNMENT, 0);
    }

    #[test]
    fn test_unaligned_size_is_rejected() {
        let device = device();
        let mut pool = ConstantStoragePool::default();

        assert!(pool.create(&device, 0).is_err());
        assert!(pool.create(&device, 24).is_err());
        assert_eq!(device.object_count(ObjectKind::Buffer), 0);
    }

    #[test]
    fn test_deleted_storage_is_reused_by_size() {
        let device = device();
        let mut pool = ConstantStoragePool::default();

        let first = pool.create(&device, 64).expect("Should create storage");
        let buffer = pool.buffer(first).expect("Should have a buffer");
        pool.write(first, 0, &[7; 16]).expect("Should write");

        assert!(pool.delete(first));
        assert!(!pool.delete(first));
        assert_eq!(pool.free_count(64), 1);

        let other_size = pool.create(&device, 32).expect("Should create storage");
        assert_ne!(pool.buffer(other_size), Some(buffer));

        let second = pool.create(&device, 64).expect("Should create storage");
        assert_eq!(pool.buffer(second), Some(buffer));
        assert_eq!(pool.free_count(64), 0);
        assert!(pool.data(second).expect("Should have data").iter().all(|&byte| byte == 0));
        assert_eq!(device.object_count(ObjectKind::Buffer), 2);

        pool.release_all(&device);
    }

    #[test]
    fn test_only_modified_storages_upload() {
        let device = device();
        let mut pool = ConstantStoragePool::default();
        let mut encoder = NullEncoder::new();

        let a = pool.create(&device, 16).expect("Should create storage");
        let b = pool.create(&device, 16).expect("Should create storage");
        assert_eq!(pool.upload_dirty(&mut encoder), 2);
        assert_eq!(pool.upload_dirty(&mut encoder), 0);

        pool.write(b, 4, bytemuck::bytes_of(&1.5f32)).expect("Should write");
        pool.write(b, 8, bytemuck::bytes_of(&2.5f32)).expect("Should write");
        encoder.clear();
        assert_eq!(pool.upload_dirty(&mut encoder), 1);
        assert_eq!(
            encoder.calls(),
            &[EncoderCall::UpdateBuffer {
                buffer: pool.buffer(b).expect("Should have a buffer"),
                offset: 0,
                size: 16
            }]
        );

        pool.write(a, 0, &[1]).expect("Should write");
        pool.delete(a);
        assert_eq!(pool.upload_dirty(&mut encoder), 0);

        assert!(pool.write(b, 12, &[0; 8]).is_err());
        pool.release_all(&device);
        assert_eq!(pool.live_count(), 0);
    }
}
