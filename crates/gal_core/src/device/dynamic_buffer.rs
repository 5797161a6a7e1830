//! CPU-side suballocated buffers uploaded once per frame
//!
//! A dynamic buffer keeps a CPU copy of its contents and hands out element
//! ranges to callers. Writes only touch the CPU copy and widen a dirty range;
//! [`Device::upload_dynamic_buffer`] pushes the dirty part into a GPU buffer.
//! That buffer becomes the one to render with at the next
//! [`Device::begin_frame`].
//!
//! ```text
//! allocate/write ──► CPU copy ──upload──► upload buffer ──begin_frame──► rendering buffer
//! ```

use std::collections::BTreeMap;

use bytemuck::Pod;
use log::trace;

use super::dead_objects::Destroyable;
use super::objects::{enqueue_owned, live, BufferObject, OwnedObject};
use super::{Device, DeviceState};
use crate::backend::NativeObject;
use crate::descriptors::{BufferDesc, BufferUsageFlags, Format};
use crate::error::{GalError, GalResult};
use crate::handles::{BufferHandle, DynamicBufferHandle, GalHandle, ObjectKind};

/// Total sizes below this grow to the next power of two, larger ones in steps of it
const EXPONENTIAL_GROWTH_LIMIT: u32 = 16 * 1024 * 1024;

/// Smallest size a dynamic buffer grows to
const MIN_GROWTH_SIZE: u32 = 256;

/// Dynamic buffer creation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicBufferDesc {
    /// Size of one element in bytes
    pub struct_size: u32,
    /// Initial capacity in bytes, grown on demand
    pub total_size: u32,
    /// Usage of the GPU buffers, `TRANSIENT` is not allowed
    pub usage: BufferUsageFlags,
}

impl DynamicBufferDesc {
    /// Structured buffer readable from shaders with room for `count` elements
    pub fn structured(struct_size: u32, count: u32) -> Self {
        Self {
            struct_size,
            total_size: struct_size.saturating_mul(count),
            usage: BufferUsageFlags::STRUCTURED_BUFFER | BufferUsageFlags::SHADER_RESOURCE,
        }
    }

    fn buffer_desc(&self) -> BufferDesc {
        BufferDesc {
            total_size: self.total_size,
            struct_size: self.struct_size,
            usage: self.usage,
            immutable: false,
            format: Format::Unknown,
        }
    }
}

/// One allocation inside a dynamic buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicAllocation {
    /// Value the caller attached to the allocation
    pub user_data: u64,
    /// Number of elements
    pub count: u32,
}

/// Inclusive element range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElementRange {
    min: u32,
    max: u32,
}

impl ElementRange {
    const fn count(self) -> u32 {
        self.max - self.min + 1
    }

    fn include(range: Option<Self>, min: u32, max: u32) -> Self {
        match range {
            Some(range) => Self {
                min: range.min.min(min),
                max: range.max.max(max),
            },
            None => Self { min, max },
        }
    }
}

/// Element allocator over a growable CPU copy
pub(crate) struct DynamicBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
    allocations: BTreeMap<u32, DynamicAllocation>,
    /// Sorted by size so small holes are filled first
    free_ranges: Vec<ElementRange>,
    next_offset: u32,
    dirty: Option<ElementRange>,
}

impl DynamicBuffer {
    pub(crate) fn new(desc: BufferDesc) -> Self {
        Self {
            desc,
            data: vec![0; desc.total_size as usize],
            allocations: BTreeMap::new(),
            free_ranges: Vec::new(),
            next_offset: 0,
            dirty: None,
        }
    }

    pub(crate) const fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub(crate) fn allocation(&self, offset: u32) -> Option<DynamicAllocation> {
        self.allocations.get(&offset).copied()
    }

    pub(crate) fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    /// Reserve `count` elements
    ///
    /// # Returns
    ///
    /// The element offset of the new allocation.
    pub(crate) fn allocate(&mut self, user_data: u64, count: u32) -> GalResult<u32> {
        if count == 0 {
            return Err(GalError::validation("Dynamic buffer allocations need at least one element"));
        }

        let offset = match self.free_ranges.iter().position(|range| range.count() >= count) {
            Some(index) => {
                let range = &mut self.free_ranges[index];
                let offset = range.min;
                if range.count() == count {
                    self.free_ranges.remove(index);
                } else {
                    range.min += count;
                }
                offset
            }
            None => {
                let offset = self.next_offset;
                let next_offset = offset
                    .checked_add(count)
                    .filter(|&next| next.checked_mul(self.desc.struct_size).is_some())
                    .ok_or_else(|| GalError::validation("Dynamic buffer cannot grow past 4 GiB"))?;

                self.next_offset = next_offset;
                let required = next_offset * self.desc.struct_size;
                if required > self.desc.total_size {
                    self.resize(required);
                }
                offset
            }
        };

        self.allocations.insert(offset, DynamicAllocation { user_data, count });
        Ok(offset)
    }

    /// Release the allocation starting at `offset`
    pub(crate) fn deallocate(&mut self, offset: u32) -> GalResult<()> {
        let Some(allocation) = self.allocations.remove(&offset) else {
            return Err(GalError::validation(format!("No dynamic buffer allocation at offset {offset}")));
        };

        let was_last = self.allocations.range(offset..).next().is_none();
        if was_last {
            self.rewind(offset);
            return Ok(());
        }

        self.free_ranges.push(ElementRange {
            min: offset,
            max: offset + allocation.count - 1,
        });

        self.free_ranges.sort_by_key(|range| range.min);
        let mut merged: Vec<ElementRange> = Vec::with_capacity(self.free_ranges.len());
        for range in self.free_ranges.drain(..) {
            match merged.last_mut() {
                Some(previous) if previous.max + 1 == range.min => previous.max = range.max,
                _ => merged.push(range),
            }
        }
        merged.sort_by_key(|range| range.count());
        self.free_ranges = merged;
        Ok(())
    }

    /// Move the bump pointer back to `offset`, absorbing free ranges that end there
    fn rewind(&mut self, offset: u32) {
        self.next_offset = offset;
        self.free_ranges.retain(|range| range.min < offset);
        while let Some(index) = self.free_ranges.iter().position(|range| range.max + 1 == self.next_offset) {
            self.next_offset = self.free_ranges.remove(index).min;
        }
    }

    /// Copy `bytes` into the allocation at `offset` and mark it dirty
    pub(crate) fn write(&mut self, offset: u32, bytes: &[u8]) -> GalResult<()> {
        let Some(allocation) = self.allocations.get(&offset) else {
            return Err(GalError::validation(format!("No dynamic buffer allocation at offset {offset}")));
        };

        let struct_size = self.desc.struct_size as usize;
        let capacity = allocation.count as usize * struct_size;
        if bytes.len() > capacity {
            return Err(GalError::validation(format!(
                "Writing {} bytes into a dynamic buffer allocation of {capacity} bytes",
                bytes.len()
            )));
        }

        let start = offset as usize * struct_size;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.dirty = Some(ElementRange::include(self.dirty, offset, offset + allocation.count - 1));
        Ok(())
    }

    fn resize(&mut self, required: u32) {
        let size = required.max(MIN_GROWTH_SIZE);
        let size = if size < EXPONENTIAL_GROWTH_LIMIT {
            size.next_power_of_two()
        } else {
            size.div_ceil(EXPONENTIAL_GROWTH_LIMIT).saturating_mul(EXPONENTIAL_GROWTH_LIMIT)
        };
        // Structured buffers must hold a whole number of elements
        let size = size.div_ceil(self.desc.struct_size).saturating_mul(self.desc.struct_size);

        trace!("Dynamic buffer grows from {} to {size} bytes", self.desc.total_size);
        self.desc.total_size = size;
        self.data.resize(size as usize, 0);
        self.dirty = Some(ElementRange {
            min: 0,
            max: size / self.desc.struct_size - 1,
        });
    }

    /// Dirty bytes as `(byte offset, bytes)`, clearing the dirty range
    fn take_dirty_bytes(&mut self) -> Option<(u32, &[u8])> {
        let dirty = self.dirty.take()?;
        let struct_size = self.desc.struct_size;
        let start = dirty.min * struct_size;
        let end = start + dirty.count() * struct_size;
        Some((start, &self.data[start as usize..end as usize]))
    }
}

pub(crate) struct DynamicBufferObject {
    pub(crate) buffer: DynamicBuffer,
    /// Buffer the next upload writes to
    pub(crate) upload: BufferHandle,
    /// Buffer holding the contents uploaded before the current frame began
    pub(crate) rendering: BufferHandle,
    pub(crate) pending_destroy: bool,
}

impl Destroyable for DynamicBufferObject {
    type Handle = DynamicBufferHandle;

    fn take(state: &mut DeviceState, handle: DynamicBufferHandle) -> Option<Self> {
        state.dynamic_buffers.remove(handle)
    }

    fn native(&self) -> Option<NativeObject> {
        None
    }

    fn release_components(&self, state: &mut DeviceState) {
        for buffer in [self.upload, self.rendering] {
            if state.buffers.get(buffer).is_some_and(|object| !object.is_pending_destroy()) {
                enqueue_owned(&mut state.buffers, &mut state.dead_objects, buffer);
            }
        }
    }
}

impl DeviceState {
    pub(crate) fn create_dynamic_buffer(&mut self, desc: &DynamicBufferDesc) -> GalResult<DynamicBufferHandle> {
        if desc.struct_size == 0 {
            return Err(GalError::validation("Dynamic buffers need a struct size greater than 0"));
        }
        if desc.usage.intersects(BufferUsageFlags::TRANSIENT | BufferUsageFlags::TEXEL_BUFFER) {
            return Err(GalError::validation("Dynamic buffers cannot be transient or texel buffers"));
        }
        if desc.total_size % desc.struct_size != 0 {
            return Err(GalError::validation(format!(
                "Dynamic buffer size {} is not a multiple of its struct size {}",
                desc.total_size, desc.struct_size
            )));
        }

        let object = DynamicBufferObject {
            buffer: DynamicBuffer::new(desc.buffer_desc()),
            upload: BufferHandle::invalid(),
            rendering: BufferHandle::invalid(),
            pending_destroy: false,
        };
        self.dynamic_buffers
            .insert(object)
            .map_err(|_| GalError::capacity_exceeded(ObjectKind::DynamicBuffer, self.dynamic_buffers.capacity_limit()))
    }

    pub(crate) fn upload_dynamic_buffer(&mut self, handle: DynamicBufferHandle) -> GalResult<()> {
        let object = live(&mut self.dynamic_buffers, handle)?;
        let desc = *object.buffer.desc();
        let upload_size = self.buffers.get(object.upload).map(|buffer| buffer.desc.total_size);

        if !object.upload.is_invalid() && upload_size != Some(desc.total_size) {
            let stale = std::mem::take(&mut object.upload);
            enqueue_owned(&mut self.buffers, &mut self.dead_objects, stale);
        }

        if object.upload.is_invalid() {
            if object.buffer.take_dirty_bytes().is_none() {
                return Ok(());
            }
            let data = std::mem::take(&mut object.buffer.data);
            let created = self.create_buffer(&desc, &data);

            let object = live(&mut self.dynamic_buffers, handle)?;
            object.buffer.data = data;
            object.upload = created?;
            return Ok(());
        }

        let upload = object.upload;
        let Some((byte_offset, bytes)) = object.buffer.take_dirty_bytes() else {
            return Ok(());
        };
        let native = self
            .buffers
            .get(upload)
            .map(|buffer| buffer.native)
            .ok_or(GalError::InvalidHandle(ObjectKind::Buffer))?;
        self.backend
            .update_buffer_platform(native, byte_offset, bytes)
            .map_err(|source| GalError::backend(ObjectKind::Buffer, source))
    }

    pub(crate) fn swap_dynamic_buffers(&mut self) {
        for (_, object) in self.dynamic_buffers.iter_mut() {
            object.rendering = object.upload;
        }
    }

    pub(crate) fn destroy_dynamic_buffer(&mut self, handle: DynamicBufferHandle) {
        enqueue_owned(&mut self.dynamic_buffers, &mut self.dead_objects, handle);
    }
}

impl Device {
    /// Create a dynamic buffer
    ///
    /// No GPU buffer exists until the first upload with pending changes.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] for a struct size of 0 or a transient
    /// or texel usage.
    pub fn create_dynamic_buffer(&self, desc: &DynamicBufferDesc) -> GalResult<DynamicBufferHandle> {
        self.lock().create_dynamic_buffer(desc)
    }

    /// Reserve `count` elements, growing the buffer when no free range fits
    ///
    /// # Returns
    ///
    /// The element offset of the allocation, used to write and deallocate it.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] for a destroyed buffer and
    /// [`GalError::Validation`] for an empty allocation.
    pub fn allocate_dynamic(&self, buffer: DynamicBufferHandle, user_data: u64, count: u32) -> GalResult<u32> {
        live(&mut self.lock().dynamic_buffers, buffer)?.buffer.allocate(user_data, count)
    }

    /// Release an allocation; neighbouring free ranges are merged
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] when nothing is allocated at `offset`.
    pub fn deallocate_dynamic(&self, buffer: DynamicBufferHandle, offset: u32) -> GalResult<()> {
        live(&mut self.lock().dynamic_buffers, buffer)?.buffer.deallocate(offset)
    }

    /// Copy raw bytes into the allocation at `offset`
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] for an unknown offset or when `bytes`
    /// is larger than the allocation.
    pub fn write_dynamic(&self, buffer: DynamicBufferHandle, offset: u32, bytes: &[u8]) -> GalResult<()> {
        live(&mut self.lock().dynamic_buffers, buffer)?.buffer.write(offset, bytes)
    }

    /// Copy plain-data elements into the allocation at `offset`
    ///
    /// # Errors
    ///
    /// See [`Device::write_dynamic`].
    pub fn write_dynamic_elements<T: Pod>(&self, buffer: DynamicBufferHandle, offset: u32, elements: &[T]) -> GalResult<()> {
        self.write_dynamic(buffer, offset, bytemuck::cast_slice(elements))
    }

    /// Allocation starting at `offset`
    pub fn dynamic_allocation(&self, buffer: DynamicBufferHandle, offset: u32) -> Option<DynamicAllocation> {
        self.lock().dynamic_buffers.get(buffer)?.buffer.allocation(offset)
    }

    /// Number of live allocations in a dynamic buffer
    pub fn dynamic_allocation_count(&self, buffer: DynamicBufferHandle) -> usize {
        self.lock().dynamic_buffers.get(buffer).map_or(0, |object| object.buffer.allocation_count())
    }

    /// Current byte size of a dynamic buffer
    pub fn dynamic_buffer_size(&self, buffer: DynamicBufferHandle) -> Option<u32> {
        self.lock().dynamic_buffers.get(buffer).map(|object| object.buffer.desc().total_size)
    }

    /// Push pending writes to the GPU
    ///
    /// After a resize a new GPU buffer is created from the whole CPU copy and
    /// the old one is queued for destruction. Otherwise only the dirty range is
    /// updated in place.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] for a destroyed buffer and
    /// [`GalError::Backend`] when the backend fails.
    pub fn upload_dynamic_buffer(&self, buffer: DynamicBufferHandle) -> GalResult<()> {
        self.lock().upload_dynamic_buffer(buffer)
    }

    /// GPU buffer to bind for rendering this frame, invalid before the first upload
    pub fn dynamic_rendering_buffer(&self, buffer: DynamicBufferHandle) -> BufferHandle {
        self.lock().dynamic_buffers.get(buffer).map_or_else(BufferHandle::invalid, |object| object.rendering)
    }

    /// Queue a dynamic buffer and its GPU buffers for destruction
    pub fn destroy_dynamic_buffer(&self, buffer: DynamicBufferHandle) {
        self.lock().destroy_dynamic_buffer(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(struct_size: u32, count: u32) -> DynamicBuffer {
        DynamicBuffer::new(DynamicBufferDesc::structured(struct_size, count).buffer_desc())
    }

    #[test]
    fn test_allocations_are_contiguous() {
        let mut dynamic = buffer(16, 64);
        assert_eq!(dynamic.allocate(1, 4).expect("Should allocate"), 0);
        assert_eq!(dynamic.allocate(2, 8).expect("Should allocate"), 4);
        assert_eq!(dynamic.allocate(3, 1).expect("Should allocate"), 12);
        assert_eq!(dynamic.allocation(4), Some(DynamicAllocation { user_data: 2, count: 8 }));
        assert!(dynamic.allocate(4, 0).is_err());
    }

    #[test]
    fn test_free_ranges_merge_and_get_reused() {
        let mut dynamic = buffer(16, 64);
        let a = dynamic.allocate(0, 4).expect("Should allocate");
        let b = dynamic.allocate(0, 4).expect("Should allocate");
        let c = dynamic.allocate(0, 4).expect("Should allocate");
        let _tail = dynamic.allocate(0, 4).expect("Should allocate");

        dynamic.deallocate(a).expect("Should deallocate");
        dynamic.deallocate(c).expect("Should deallocate");
        assert_eq!(dynamic.free_ranges.len(), 2);

        // Freeing the middle joins all three ranges
        dynamic.deallocate(b).expect("Should deallocate");
        assert_eq!(dynamic.free_ranges, vec![ElementRange { min: 0, max: 11 }]);

        assert_eq!(dynamic.allocate(0, 10).expect("Should allocate"), 0);
        assert_eq!(dynamic.free_ranges, vec![ElementRange { min: 10, max: 11 }]);
    }

    #[test]
    fn test_smallest_hole_is_filled_first() {
        let mut dynamic = buffer(4, 64);
        let big = dynamic.allocate(0, 8).expect("Should allocate");
        let _keep = dynamic.allocate(0, 1).expect("Should allocate");
        let small = dynamic.allocate(0, 2).expect("Should allocate");
        let _tail = dynamic.allocate(0, 1).expect("Should allocate");

        dynamic.deallocate(big).expect("Should deallocate");
        dynamic.deallocate(small).expect("Should deallocate");
        assert_eq!(dynamic.allocate(0, 2).expect("Should allocate"), small);
    }

    #[test]
    fn test_freeing_last_allocation_rewinds() {
        let mut dynamic = buffer(8, 16);
        dynamic.allocate(0, 3).expect("Should allocate");
        let last = dynamic.allocate(0, 5).expect("Should allocate");

        dynamic.deallocate(last).expect("Should deallocate");
        assert!(dynamic.free_ranges.is_empty());
        assert_eq!(dynamic.allocate(0, 2).expect("Should allocate"), last);
        assert!(dynamic.deallocate(100).is_err());
    }

    #[test]
    fn test_rewind_absorbs_free_ranges_below_the_tail() {
        let mut dynamic = buffer(4, 16);
        let a = dynamic.allocate(0, 1).expect("Should allocate");
        let b = dynamic.allocate(0, 1).expect("Should allocate");
        let c = dynamic.allocate(0, 1).expect("Should allocate");

        dynamic.deallocate(b).expect("Should deallocate");
        dynamic.deallocate(c).expect("Should deallocate");
        assert!(dynamic.free_ranges.is_empty());
        assert_eq!(dynamic.next_offset, 1);

        dynamic.deallocate(a).expect("Should deallocate");
        assert_eq!(dynamic.next_offset, 0);

        let x = dynamic.allocate(0, 1).expect("Should allocate");
        let y = dynamic.allocate(0, 2).expect("Should allocate");
        assert_eq!((x, y), (0, 1));
        assert!(dynamic.free_ranges.is_empty());
        assert_eq!(dynamic.next_offset, 3);
    }

    #[test]
    fn test_growth_policy() {
        let mut dynamic = buffer(4, 0);
        dynamic.allocate(0, 10).expect("Should allocate");
        assert_eq!(dynamic.desc().total_size, 256);
        assert_eq!(dynamic.dirty, Some(ElementRange { min: 0, max: 63 }));

        dynamic.allocate(0, 100).expect("Should allocate");
        assert_eq!(dynamic.desc().total_size, 512);
        assert_eq!(dynamic.data.len(), 512);

        let mut odd = buffer(12, 0);
        odd.allocate(0, 1).expect("Should allocate");
        assert_eq!(odd.desc().total_size % 12, 0);
        assert!(odd.desc().total_size >= 256);
    }

    #[test]
    fn test_write_marks_dirty_range() {
        let mut dynamic = buffer(4, 16);
        let a = dynamic.allocate(0, 2).expect("Should allocate");
        let b = dynamic.allocate(0, 2).expect("Should allocate");
        assert!(dynamic.dirty.is_none());

        dynamic.write(b, &[1, 2, 3, 4, 5, 6, 7, 8]).expect("Should write");
        assert_eq!(dynamic.dirty, Some(ElementRange { min: 2, max: 3 }));
        dynamic.write(a, &[9; 4]).expect("Should write");
        assert_eq!(dynamic.dirty, Some(ElementRange { min: 0, max: 3 }));

        assert!(dynamic.write(a, &[0; 9]).is_err());

        let (byte_offset, bytes) = dynamic.take_dirty_bytes().expect("Should be dirty");
        assert_eq!(byte_offset, 0);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
        assert!(dynamic.take_dirty_bytes().is_none());
    }
}
