//! Device error types

use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::handles::ObjectKind;

/// Result type for device operations
pub type GalResult<T> = Result<T, GalError>;

/// Errors returned by [`Device`](crate::device::Device) operations
#[derive(Error, Debug)]
pub enum GalError {
    /// A creation descriptor or argument failed platform-independent checks
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The backend could not create or update an object
    #[error("Backend failed to create {kind}: {source}")]
    Backend {
        /// Kind of object the backend was asked for
        kind: ObjectKind,
        /// Error reported by the backend
        #[source]
        source: BackendError,
    },

    /// The table for this kind already holds its maximum number of objects
    #[error("{kind} table is full ({limit} live objects)")]
    CapacityExceeded {
        /// Kind of the full table
        kind: ObjectKind,
        /// Configured limit
        limit: usize,
    },

    /// A handle did not refer to a live object
    #[error("Invalid {0} handle")]
    InvalidHandle(ObjectKind),

    /// Frame functions were called out of order
    #[error("Frame order violation: {0}")]
    FrameOrder(String),

    /// Objects were still alive at shutdown
    #[error("{count} objects still alive at shutdown")]
    ResourcesLeaked {
        /// Number of live objects over all tables
        count: usize,
    },

    /// Device configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GalError {
    /// Build a validation error and log it
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("{message}");
        Self::Validation(message)
    }

    /// Build a capacity error and log it
    pub(crate) fn capacity_exceeded(kind: ObjectKind, limit: usize) -> Self {
        log::warn!("{kind} table is full ({limit} live objects)");
        Self::CapacityExceeded { kind, limit }
    }

    /// Build a backend error and log it
    pub(crate) fn backend(kind: ObjectKind, source: BackendError) -> Self {
        log::warn!("Backend failed to create {kind}: {source}");
        Self::Backend { kind, source }
    }
}

/// Reasons a render context could not bring the encoder up to date
///
/// None of these are fatal: the draw or dispatch is skipped and counted in
/// [`ContextStatistics::failed_drawcalls`](crate::context::ContextStatistics::failed_drawcalls).
#[derive(Error, Debug)]
pub enum ApplyError {
    /// State was applied outside a rendering or compute scope
    #[error("Not inside a rendering or compute scope")]
    NoScope,

    /// No shader is bound, directly or through a material
    #[error("No shader is bound")]
    NoActiveShader,

    /// The provider could not resolve the shader permutation yet
    #[error("Shader permutation is not ready")]
    PermutationNotReady,

    /// Vertex buffers are bound but no vertex declaration matches them
    #[error("No vertex declaration matches the bound vertex buffers")]
    VertexDeclarationUnavailable,

    /// A rendering scope needs a primitive topology from a mesh buffer
    #[error("No primitive topology is bound")]
    MissingTopology,

    /// Zero primitives or zero instances were requested
    #[error("Draw call without primitives or instances")]
    EmptyDraw,

    /// The first primitive lies past the end of the bound mesh buffer
    #[error("First primitive {first} is out of range, the mesh buffer has {available}")]
    InvalidDrawRange {
        /// Requested first primitive
        first: u32,
        /// Primitives in the bound mesh buffer
        available: u32,
    },

    /// The requested primitives need more indices than fit in 32 bits
    #[error("Drawing {primitives} primitives from primitive {first} overflows the index range")]
    IndexRangeOverflow {
        /// Requested first primitive
        first: u32,
        /// Primitives left after clamping to the mesh buffer
        primitives: u32,
    },

    /// The device could not create the pipeline
    #[error("Pipeline unavailable: {0}")]
    Pipeline(#[from] GalError),
}
