//! Long-lived pipeline lookup for render contexts
//!
//! Render contexts rebuild pipeline descriptors on every state change. The
//! cache keeps one reference per distinct descriptor so that switching back
//! and forth between two states never goes through the dead object queue.

use std::collections::HashMap;

use log::{debug, warn};
use slotmap::Key;

use super::{Device, DeviceState};
use crate::descriptors::{ComputePipelineDesc, GraphicsPipelineDesc};
use crate::error::GalResult;
use crate::foundation::hashing::DescriptorHash;
use crate::handles::{ComputePipelineHandle, GraphicsPipelineHandle};

#[derive(Default)]
pub(crate) struct PipelineCache {
    graphics: HashMap<u64, GraphicsPipelineHandle>,
    compute: HashMap<u64, ComputePipelineHandle>,
}

impl PipelineCache {
    pub(crate) fn len(&self) -> usize {
        self.graphics.len() + self.compute.len()
    }
}

impl DeviceState {
    pub(crate) fn cached_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> GalResult<GraphicsPipelineHandle> {
        let hash = desc.calculate_hash();
        if let Some(&handle) = self.pipeline_cache.graphics.get(&hash) {
            if self.graphics_pipelines.ref_count(handle) == Some(0) {
                warn!("Cached graphics pipeline {:?} was destroyed outside the cache", handle.data());
                self.graphics_pipelines.add_ref(handle, &mut self.dead_objects);
            }
            if self.graphics_pipelines.contains(handle) {
                return Ok(handle);
            }
        }

        let handle = self.create_graphics_pipeline(desc)?;
        self.pipeline_cache.graphics.insert(hash, handle);
        Ok(handle)
    }

    pub(crate) fn cached_compute_pipeline(&mut self, desc: &ComputePipelineDesc) -> GalResult<ComputePipelineHandle> {
        let hash = desc.calculate_hash();
        if let Some(&handle) = self.pipeline_cache.compute.get(&hash) {
            if self.compute_pipelines.ref_count(handle) == Some(0) {
                warn!("Cached compute pipeline {:?} was destroyed outside the cache", handle.data());
                self.compute_pipelines.add_ref(handle, &mut self.dead_objects);
            }
            if self.compute_pipelines.contains(handle) {
                return Ok(handle);
            }
        }

        let handle = self.create_compute_pipeline(desc)?;
        self.pipeline_cache.compute.insert(hash, handle);
        Ok(handle)
    }

    pub(crate) fn clear_pipeline_cache(&mut self) {
        if self.pipeline_cache.len() > 0 {
            debug!("Releasing {} cached pipelines", self.pipeline_cache.len());
        }
        let cache = std::mem::take(&mut self.pipeline_cache);
        for handle in cache.graphics.into_values() {
            self.destroy_graphics_pipeline(handle);
        }
        for handle in cache.compute.into_values() {
            self.destroy_compute_pipeline(handle);
        }
    }
}

impl Device {
    /// Graphics pipeline for `desc`, created on first use and kept until the cache is cleared
    ///
    /// The returned handle is owned by the cache and must not be destroyed by
    /// the caller.
    ///
    /// # Errors
    ///
    /// See [`Device::create_graphics_pipeline`].
    pub fn cached_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> GalResult<GraphicsPipelineHandle> {
        self.lock().cached_graphics_pipeline(desc)
    }

    /// Compute pipeline for `desc`, created on first use and kept until the cache is cleared
    ///
    /// A cached pipeline destroyed by mistake is taken back out of the dead
    /// object queue on the next lookup.
    ///
    /// # Errors
    ///
    /// See [`Device::create_compute_pipeline`].
    pub fn cached_compute_pipeline(&self, desc: &ComputePipelineDesc) -> GalResult<ComputePipelineHandle> {
        self.lock().cached_compute_pipeline(desc)
    }

    /// Release every cached pipeline
    pub fn clear_pipeline_cache(&self) {
        self.lock().clear_pipeline_cache();
    }

    /// Number of pipelines held by the cache
    pub fn pipeline_cache_len(&self) -> usize {
        self.lock().pipeline_cache.len()
    }
}
