//! Dirty-state tracking for the render context

use bitflags::bitflags;

bitflags! {
    /// Parts of the context state that changed since the last apply
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        /// A different material was bound
        const MATERIAL_BINDING_CHANGED = 1 << 0;
        /// Shader or permutation variables changed
        const SHADER_STATE_CHANGED = 1 << 1;
        /// Texture bindings changed
        const TEXTURE_BINDING_CHANGED = 1 << 2;
        /// Sampler bindings changed
        const SAMPLER_BINDING_CHANGED = 1 << 3;
        /// Read-only buffer bindings changed
        const BUFFER_BINDING_CHANGED = 1 << 4;
        /// Unordered access view bindings changed
        const UAV_BINDING_CHANGED = 1 << 5;
        /// Constant buffer bindings changed
        const CONSTANT_BUFFER_BINDING_CHANGED = 1 << 6;
        /// Vertex or index buffers, layout or topology changed
        const MESH_BUFFER_BINDING_CHANGED = 1 << 7;
        /// Any field of the pipeline descriptor changed
        const PIPELINE_CHANGED = 1 << 8;

        /// Every binding category
        const ALL_BINDINGS = Self::TEXTURE_BINDING_CHANGED.bits()
            | Self::SAMPLER_BINDING_CHANGED.bits()
            | Self::BUFFER_BINDING_CHANGED.bits()
            | Self::UAV_BINDING_CHANGED.bits()
            | Self::CONSTANT_BUFFER_BINDING_CHANGED.bits();

        /// State after construction and reset; the material flag is only set by binding one
        const ALL_STATES_INVALID = Self::SHADER_STATE_CHANGED.bits()
            | Self::ALL_BINDINGS.bits()
            | Self::MESH_BUFFER_BINDING_CHANGED.bits()
            | Self::PIPELINE_CHANGED.bits();
    }
}

bitflags! {
    /// Controls which render states a shader bind takes from the shader permutation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderBindFlags: u32 {
        /// Rebind even if the shader did not change
        const FORCE_REBIND = 1 << 0;
        /// Keep the rasterizer state set on the context
        const NO_RASTERIZER_STATE = 1 << 1;
        /// Keep the depth-stencil state set on the context
        const NO_DEPTH_STENCIL_STATE = 1 << 2;
        /// Keep the blend state set on the context
        const NO_BLEND_STATE = 1 << 3;
        /// Keep all render states set on the context
        const NO_STATE_BINDING = Self::NO_RASTERIZER_STATE.bits()
            | Self::NO_DEPTH_STENCIL_STATE.bits()
            | Self::NO_BLEND_STATE.bits();
    }
}

bitflags! {
    /// Selects one of the context's default samplers; no flags means point filtering with wrapping
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DefaultSamplerFlags: u32 {
        /// Linear (or anisotropic, per configuration) filtering
        const LINEAR_FILTERING = 1 << 0;
        /// Clamp instead of wrap
        const CLAMP = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_states_invalid_excludes_material() {
        assert!(!StateFlags::ALL_STATES_INVALID.contains(StateFlags::MATERIAL_BINDING_CHANGED));
        assert!(StateFlags::ALL_STATES_INVALID.contains(StateFlags::ALL_BINDINGS));
        assert!(StateFlags::ALL_STATES_INVALID.contains(StateFlags::PIPELINE_CHANGED));
    }

    #[test]
    fn test_no_state_binding_covers_every_state() {
        let flags = ShaderBindFlags::NO_STATE_BINDING;
        assert!(flags.contains(ShaderBindFlags::NO_BLEND_STATE));
        assert!(flags.contains(ShaderBindFlags::NO_RASTERIZER_STATE));
        assert!(flags.contains(ShaderBindFlags::NO_DEPTH_STENCIL_STATE));
        assert!(!flags.contains(ShaderBindFlags::FORCE_REBIND));
    }
}
