//! # GAL Core
//!
//! A graphics abstraction layer device and the render context built on it.
//!
//! ## Features
//!
//! - **Device**: Typed handles for every GPU object kind with generation checks
//! - **Resource Caching**: Hashed, reference-counted state objects and pipelines
//! - **Deferred Destruction**: Objects are destroyed at the next frame flush
//! - **Render Context**: Dirty-state tracking that only re-issues what changed
//! - **Null Backend**: Records everything, so the whole stack runs headless
//!
//! ## Quick Start
//!
//! ```rust
//! use gal_core::prelude::*;
//!
//! fn main() -> Result<(), GalError> {
//!     let device = Device::new_shared(Box::new(NullBackend::new()), DeviceConfig::default())?;
//!
//!     let sampler = device.create_sampler_state(&SamplerStateDesc::default())?;
//!     let same = device.create_sampler_state(&SamplerStateDesc::default())?;
//!     assert_eq!(sampler, same);
//!
//!     device.destroy_sampler_state(sampler);
//!     device.destroy_sampler_state(same);
//!     device.begin_frame(0)?;
//!     device.end_frame()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod error;
pub mod handles;
pub mod descriptors;
pub mod backend;
pub mod device;
pub mod context;

pub use error::{ApplyError, GalError, GalResult};

/// Common imports for device and render context users
pub mod prelude {
    pub use crate::{
        backend::{CommandEncoder, NullBackend, NullEncoder},
        config::{DeviceConfig, RenderContextConfig},
        context::{
            ContextStatistics, DefaultSamplerFlags, MaterialBindings, MaterialId, MeshBufferBinding, PermutationVars,
            RenderContext, ResourceProvider, ShaderBindFlags, ShaderId, ShaderPermutation, VertexLayout, Viewport,
        },
        descriptors::*,
        device::{Device, DeviceStatistics},
        handles::*,
        ApplyError, GalError, GalResult,
    };
}
