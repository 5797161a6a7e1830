//! Creation descriptors
//!
//! Every device object is created from a plain descriptor value. Descriptors
//! implement `Hash`, which gives them a stable content hash through
//! [`DescriptorHash`](crate::foundation::hashing::DescriptorHash); the device
//! uses it to share identical state objects and views.

pub mod enums;
pub mod pipeline;
pub mod resources;
pub mod states;

pub use enums::*;
pub use pipeline::*;
pub use resources::*;
pub use states::*;
