//! Default samplers for unbound sampler slots

use std::collections::HashMap;

use super::state_flags::DefaultSamplerFlags;
use crate::config::RenderContextConfig;
use crate::descriptors::{SamplerStateDesc, TextureAddressMode, TextureFilterMode};
use crate::device::Device;
use crate::error::GalResult;
use crate::handles::SamplerStateHandle;

/// Sampler descriptor the context uses for `flags`
pub fn default_sampler_desc(flags: DefaultSamplerFlags, config: &RenderContextConfig) -> SamplerStateDesc {
    let filter = if flags.contains(DefaultSamplerFlags::LINEAR_FILTERING) {
        match config.default_filter {
            TextureFilterMode::Point => TextureFilterMode::Linear,
            filter => filter,
        }
    } else {
        TextureFilterMode::Point
    };
    let address = if flags.contains(DefaultSamplerFlags::CLAMP) {
        TextureAddressMode::Clamp
    } else {
        TextureAddressMode::Wrap
    };

    SamplerStateDesc {
        min_filter: filter,
        mag_filter: filter,
        mip_filter: if filter == TextureFilterMode::Point {
            TextureFilterMode::Point
        } else {
            TextureFilterMode::Linear
        },
        address_u: address,
        address_v: address,
        address_w: address,
        mip_lod_bias: config.mip_lod_bias,
        max_anisotropy: if filter == TextureFilterMode::Anisotropic {
            config.max_anisotropy
        } else {
            1
        },
        ..SamplerStateDesc::default()
    }
}

/// Lazily created default samplers, one device reference each
#[derive(Default)]
pub(crate) struct DefaultSamplers {
    handles: HashMap<DefaultSamplerFlags, SamplerStateHandle>,
}

impl DefaultSamplers {
    pub(crate) fn get(
        &mut self,
        device: &Device,
        flags: DefaultSamplerFlags,
        config: &RenderContextConfig,
    ) -> GalResult<SamplerStateHandle> {
        if let Some(&handle) = self.handles.get(&flags) {
            return Ok(handle);
        }
        let handle = device.create_sampler_state(&default_sampler_desc(flags, config))?;
        self.handles.insert(flags, handle);
        Ok(handle)
    }

    pub(crate) fn release_all(&mut self, device: &Device) {
        for (_, handle) in self.handles.drain() {
            device.destroy_sampler_state(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_wrap_is_the_empty_flag_set() {
        let desc = default_sampler_desc(DefaultSamplerFlags::empty(), &RenderContextConfig::default());
        assert_eq!(desc.min_filter, TextureFilterMode::Point);
        assert_eq!(desc.mip_filter, TextureFilterMode::Point);
        assert_eq!(desc.address_u, TextureAddressMode::Wrap);
        assert_eq!(desc.max_anisotropy, 1);
    }

    #[test]
    fn test_linear_clamp_follows_config() {
        let config = RenderContextConfig::default()
            .with_default_filter(TextureFilterMode::Anisotropic)
            .with_max_anisotropy(8);
        let desc = default_sampler_desc(
            DefaultSamplerFlags::LINEAR_FILTERING | DefaultSamplerFlags::CLAMP,
            &config,
        );
        assert_eq!(desc.min_filter, TextureFilterMode::Anisotropic);
        assert_eq!(desc.mip_filter, TextureFilterMode::Linear);
        assert_eq!(desc.address_w, TextureAddressMode::Clamp);
        assert_eq!(desc.max_anisotropy, 8);
    }
}
