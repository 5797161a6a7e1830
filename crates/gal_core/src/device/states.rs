//! Blend, depth-stencil, rasterizer and sampler states
//!
//! Fixed-function states are plain hashed leaves: identical descriptors share
//! one backend object, and nothing else is referenced.

use super::cache::get_or_create;
use super::objects::StateObject;
use super::{Device, DeviceState};
use crate::descriptors::{BlendStateDesc, DepthStencilStateDesc, RasterizerStateDesc, SamplerStateDesc};
use crate::error::GalResult;
use crate::foundation::hashing::DescriptorHash;
use crate::handles::{BlendStateHandle, DepthStencilStateHandle, RasterizerStateHandle, SamplerStateHandle};

macro_rules! state_objects {
    ($($(#[$doc:meta])* $desc:ty => $handle:ty, $table:ident, $create:ident, $destroy:ident, $platform:ident;)*) => {
        impl DeviceState {
            $(
                pub(crate) fn $create(&mut self, desc: &$desc) -> GalResult<$handle> {
                    get_or_create(
                        &mut self.$table,
                        &mut self.dead_objects,
                        self.backend.as_mut(),
                        desc.calculate_hash(),
                        |backend| {
                            Ok(StateObject {
                                desc: *desc,
                                native: backend.$platform(desc)?,
                            })
                        },
                    )
                }

                pub(crate) fn $destroy(&mut self, handle: $handle) {
                    self.$table.release(handle, &mut self.dead_objects);
                }
            )*
        }

        impl Device {
            $(
                $(#[$doc])*
                ///
                /// # Errors
                ///
                /// Returns [`GalError::Backend`](crate::GalError::Backend) when the backend
                /// rejects the descriptor and
                /// [`GalError::CapacityExceeded`](crate::GalError::CapacityExceeded) when the
                /// table is full.
                pub fn $create(&self, desc: &$desc) -> GalResult<$handle> {
                    self.lock().$create(desc)
                }

                /// Drop one reference; the object is destroyed at the next flush unless revived
                pub fn $destroy(&self, handle: $handle) {
                    self.lock().$destroy(handle);
                }
            )*
        }
    };
}

state_objects! {
    /// Get or create a blend state
    BlendStateDesc => BlendStateHandle, blend_states, create_blend_state, destroy_blend_state,
        create_blend_state_platform;
    /// Get or create a depth-stencil state
    DepthStencilStateDesc => DepthStencilStateHandle, depth_stencil_states, create_depth_stencil_state,
        destroy_depth_stencil_state, create_depth_stencil_state_platform;
    /// Get or create a rasterizer state
    RasterizerStateDesc => RasterizerStateHandle, rasterizer_states, create_rasterizer_state,
        destroy_rasterizer_state, create_rasterizer_state_platform;
    /// Get or create a sampler state
    SamplerStateDesc => SamplerStateHandle, sampler_states, create_sampler_state, destroy_sampler_state,
        create_sampler_state_platform;
}
