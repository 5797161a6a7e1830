//! Frame protocol, swap chains, fences and shutdown

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};

use super::dead_objects::destroy_now;
use super::objects::{enqueue_owned, live, SwapChainObject, TextureOrigin};
use super::resources::MemoryUsage;
use super::{Device, DeviceState};
use crate::backend::{FenceResult, NativeObject};
use crate::descriptors::{PresentMode, SwapChainDesc};
use crate::error::{GalError, GalResult};
use crate::handles::{FenceHandle, GalHandle, ObjectKind, SwapChainHandle, TextureHandle};

/// Frame bookkeeping
#[derive(Debug, Default)]
pub(crate) struct FrameState {
    in_frame: bool,
    app_frame: u64,
    frames_completed: u64,
    /// Swap chains presented by the next frame
    swap_chains: Vec<SwapChainHandle>,
    last_flush_destroyed: usize,
}

/// Snapshot of device bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatistics {
    /// Live objects per kind, empty tables omitted
    pub live_objects: Vec<(ObjectKind, usize)>,
    /// Objects waiting for the next flush
    pub dead_objects: usize,
    /// Objects destroyed by the most recent flush
    pub last_flush_destroyed: usize,
    /// Number of completed `begin_frame`/`end_frame` pairs
    pub frames_completed: u64,
    /// Estimated resource memory
    pub memory: MemoryUsage,
}

impl DeviceStatistics {
    /// Sum of live objects over all kinds
    pub fn total_objects(&self) -> usize {
        self.live_objects.iter().map(|(_, count)| count).sum()
    }
}

impl fmt::Display for DeviceStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frames: {}, live objects: {}, dead objects: {}, last flush: {}, memory: {} bytes",
            self.frames_completed,
            self.total_objects(),
            self.dead_objects,
            self.last_flush_destroyed,
            self.memory.total()
        )?;
        for (kind, count) in &self.live_objects {
            writeln!(f, "  {kind}: {count}")?;
        }
        Ok(())
    }
}

impl DeviceState {
    fn frame_swap_chain_natives(&self) -> Vec<NativeObject> {
        self.frame
            .swap_chains
            .iter()
            .filter_map(|&handle| self.swap_chains.get(handle))
            .filter(|swap_chain| !swap_chain.pending_destroy)
            .map(|swap_chain| swap_chain.native)
            .collect()
    }

    pub(crate) fn enqueue_frame_swap_chain(&mut self, handle: SwapChainHandle) -> GalResult<()> {
        if self.frame.in_frame {
            return Err(GalError::FrameOrder(
                "Swap chains must be enqueued before begin_frame".to_string(),
            ));
        }
        live(&mut self.swap_chains, handle)?;
        if !self.frame.swap_chains.contains(&handle) {
            self.frame.swap_chains.push(handle);
        }
        Ok(())
    }

    pub(crate) fn begin_frame(&mut self, app_frame: u64) -> GalResult<()> {
        if self.frame.in_frame {
            return Err(GalError::FrameOrder(
                "end_frame must be called before begin_frame can be called again".to_string(),
            ));
        }

        let swap_chains = self.frame_swap_chain_natives();
        self.backend.begin_frame_platform(app_frame, &swap_chains);
        self.frame.in_frame = true;
        self.frame.app_frame = app_frame;

        self.swap_dynamic_buffers();
        Ok(())
    }

    pub(crate) fn end_frame(&mut self) -> GalResult<()> {
        if !self.frame.in_frame {
            return Err(GalError::FrameOrder(
                "begin_frame must be called before end_frame".to_string(),
            ));
        }

        self.frame.last_flush_destroyed = self.destroy_dead_objects();

        let swap_chains = self.frame_swap_chain_natives();
        self.backend.end_frame_platform(&swap_chains);
        self.frame.swap_chains.clear();
        self.frame.in_frame = false;
        self.frame.frames_completed += 1;

        debug!("Frame {} ended: {}", self.frame.app_frame, self.statistics());
        Ok(())
    }

    pub(crate) fn statistics(&self) -> DeviceStatistics {
        DeviceStatistics {
            live_objects: self.live_objects(),
            dead_objects: self.dead_objects.len(),
            last_flush_destroyed: self.frame.last_flush_destroyed,
            frames_completed: self.frame.frames_completed,
            memory: self.memory_usage(),
        }
    }

    pub(crate) fn create_swap_chain(&mut self, desc: &SwapChainDesc) -> GalResult<SwapChainHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GalError::validation(format!(
                "Swap chain size {}x{} is not possible",
                desc.width, desc.height
            )));
        }

        let objects = self
            .backend
            .create_swap_chain_platform(desc)
            .map_err(|source| GalError::backend(ObjectKind::SwapChain, source))?;

        let swap_chain = SwapChainObject {
            desc: *desc,
            native: objects.swap_chain,
            back_buffer: TextureHandle::invalid(),
            pending_destroy: false,
        };
        let handle = match Self::insert_owned(&mut self.swap_chains, self.backend.as_mut(), swap_chain) {
            Ok(handle) => handle,
            Err(error) => {
                self.backend.destroy_platform(ObjectKind::Texture, objects.back_buffer);
                return Err(error);
            }
        };

        match self.insert_texture(
            desc.back_buffer_desc(),
            objects.back_buffer,
            TextureOrigin::BackBuffer { swap_chain: handle },
        ) {
            Ok(back_buffer) => {
                if let Some(swap_chain) = self.swap_chains.get_mut(handle) {
                    swap_chain.back_buffer = back_buffer;
                }
                Ok(handle)
            }
            Err(error) => {
                destroy_now::<SwapChainObject>(self, handle);
                Err(error)
            }
        }
    }

    pub(crate) fn update_swap_chain(
        &mut self,
        handle: SwapChainHandle,
        present_mode: PresentMode,
        size: Option<(u32, u32)>,
    ) -> GalResult<()> {
        let swap_chain = live(&mut self.swap_chains, handle)?;
        let (width, height) = size.unwrap_or((swap_chain.desc.width, swap_chain.desc.height));
        if width == 0 || height == 0 {
            return Err(GalError::validation(format!("Swap chain size {width}x{height} is not possible")));
        }

        let native = swap_chain.native;
        let old_back_buffer = swap_chain.back_buffer;
        let back_buffer_native = self
            .backend
            .update_swap_chain_platform(native, present_mode, (width, height))
            .map_err(|source| GalError::backend(ObjectKind::SwapChain, source))?;

        // The old back buffer may still be in flight
        if !old_back_buffer.is_invalid() {
            enqueue_owned(&mut self.textures, &mut self.dead_objects, old_back_buffer);
        }

        let desc = SwapChainDesc {
            width,
            height,
            present_mode,
            ..live(&mut self.swap_chains, handle)?.desc
        };
        let back_buffer = self.insert_texture(
            desc.back_buffer_desc(),
            back_buffer_native,
            TextureOrigin::BackBuffer { swap_chain: handle },
        );

        let swap_chain = live(&mut self.swap_chains, handle)?;
        swap_chain.desc = desc;
        swap_chain.back_buffer = back_buffer.as_ref().copied().unwrap_or_else(|_| TextureHandle::invalid());
        back_buffer.map(|_| ())
    }

    pub(crate) fn destroy_swap_chain(&mut self, handle: SwapChainHandle) {
        if enqueue_owned(&mut self.swap_chains, &mut self.dead_objects, handle) {
            self.frame.swap_chains.retain(|&queued| queued != handle);
        }
    }

    pub(crate) fn fence_result(&mut self, fence: FenceHandle, timeout: Duration) -> FenceResult {
        let timeout = timeout.min(Duration::from_millis(self.config.fence_timeout_ms));
        self.backend.fence_result_platform(fence.0, timeout)
    }

    pub(crate) fn shutdown(&mut self) -> GalResult<()> {
        info!("Shutting down device '{}'", self.config.debug_name);
        if self.frame.in_frame {
            warn!("Device shut down inside frame {}", self.frame.app_frame);
            self.frame.in_frame = false;
        }

        self.backend.wait_idle_platform();
        self.clear_pipeline_cache();
        self.frame.swap_chains.clear();
        self.frame.last_flush_destroyed = self.destroy_dead_objects();

        let live_objects = self.live_objects();
        let count: usize = live_objects.iter().map(|(_, count)| count).sum();
        if count == 0 {
            return Ok(());
        }

        if self.config.report_leaks {
            for (kind, leaked) in &live_objects {
                warn!("{leaked} {kind} objects were not destroyed before shutdown");
            }
        }
        Err(GalError::ResourcesLeaked { count })
    }
}

impl Device {
    /// Present `swap_chain` at the end of the next frame
    ///
    /// # Errors
    ///
    /// Returns [`GalError::FrameOrder`] inside a frame and
    /// [`GalError::InvalidHandle`] for a destroyed swap chain.
    pub fn enqueue_frame_swap_chain(&self, swap_chain: SwapChainHandle) -> GalResult<()> {
        self.lock().enqueue_frame_swap_chain(swap_chain)
    }

    /// Start a frame
    ///
    /// Dynamic buffers switch to the contents uploaded since the last frame.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::FrameOrder`] when the previous frame was not ended.
    pub fn begin_frame(&self, app_frame: u64) -> GalResult<()> {
        self.lock().begin_frame(app_frame)
    }

    /// End the frame: destroy dead objects, then submit and present
    ///
    /// # Errors
    ///
    /// Returns [`GalError::FrameOrder`] when no frame was begun.
    pub fn end_frame(&self) -> GalResult<()> {
        self.lock().end_frame()
    }

    /// Whether a frame is being recorded
    pub fn is_in_frame(&self) -> bool {
        self.lock().frame.in_frame
    }

    /// Submit recorded work without ending the frame
    pub fn flush(&self) {
        self.lock().backend.flush_platform();
    }

    /// Block until the GPU finished all submitted work
    pub fn wait_idle(&self) {
        self.lock().backend.wait_idle_platform();
    }

    /// Signal a fence after all submitted work
    pub fn signal_fence(&self) -> FenceHandle {
        FenceHandle(self.lock().backend.signal_fence_platform())
    }

    /// Poll a fence, blocking for at most `timeout`
    ///
    /// The wait is capped at the configured fence timeout since the device lock
    /// is held while waiting.
    pub fn fence_result(&self, fence: FenceHandle, timeout: Duration) -> FenceResult {
        self.lock().fence_result(fence, timeout)
    }

    /// Snapshot of live objects, queued objects, frames and memory
    pub fn statistics(&self) -> DeviceStatistics {
        self.lock().statistics()
    }

    /// Create a swap chain together with a texture for its back buffer
    ///
    /// # Errors
    ///
    /// Returns [`GalError::Validation`] for an empty size and
    /// [`GalError::Backend`] when the surface cannot be presented to.
    pub fn create_swap_chain(&self, desc: &SwapChainDesc) -> GalResult<SwapChainHandle> {
        self.lock().create_swap_chain(desc)
    }

    /// Change presentation mode or size, keeping the size when `size` is `None`
    ///
    /// The back buffer texture is replaced; the old one is destroyed at the next
    /// flush.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::InvalidHandle`] for a destroyed swap chain and
    /// [`GalError::Backend`] when the backend fails to resize.
    pub fn update_swap_chain(
        &self,
        swap_chain: SwapChainHandle,
        present_mode: PresentMode,
        size: Option<(u32, u32)>,
    ) -> GalResult<()> {
        self.lock().update_swap_chain(swap_chain, present_mode, size)
    }

    /// Queue a swap chain and its back buffer for destruction
    pub fn destroy_swap_chain(&self, swap_chain: SwapChainHandle) {
        self.lock().destroy_swap_chain(swap_chain);
    }

    /// Current back buffer texture of a swap chain
    pub fn back_buffer_texture(&self, swap_chain: SwapChainHandle) -> Option<TextureHandle> {
        self.lock()
            .swap_chains
            .get(swap_chain)
            .map(|object| object.back_buffer)
            .filter(|back_buffer| !back_buffer.is_invalid())
    }

    /// Descriptor a swap chain currently uses
    pub fn swap_chain_desc(&self, swap_chain: SwapChainHandle) -> Option<SwapChainDesc> {
        self.lock().swap_chains.get(swap_chain).map(|object| object.desc)
    }

    /// Tear the device down
    ///
    /// Waits for the GPU, releases the pipeline cache and destroys every dead
    /// object. Whatever is still alive afterwards was leaked by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`GalError::ResourcesLeaked`] with the number of objects left
    /// in the tables. They are logged per kind when leak reporting is enabled.
    pub fn shutdown(&self) -> GalResult<()> {
        self.lock().shutdown()
    }
}
