//! # Device Configuration
//!
//! Settings read once when a [`Device`](crate::device::Device) or
//! [`RenderContext`](crate::context::RenderContext) is created. Every field has
//! a default, so a config file only needs to name the values it changes.

use serde::{Deserialize, Serialize};

use super::Config;
use crate::descriptors::TextureFilterMode;
use crate::handles::HandleFamily;

/// Live-object limits per handle family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityLimits {
    /// Limit for each state object table
    pub state_objects: usize,
    /// Limit for each resource table
    pub resources: usize,
}

impl CapacityLimits {
    /// Limit that applies to tables of `family`
    pub fn for_family(&self, family: HandleFamily) -> usize {
        match family {
            HandleFamily::StateObject => self.state_objects,
            HandleFamily::Resource => self.resources,
        }
    }
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            state_objects: HandleFamily::StateObject.default_capacity(),
            resources: HandleFamily::Resource.default_capacity(),
        }
    }
}

/// # Render Context Configuration
///
/// Controls the default samplers a render context falls back to when a
/// shader samples through a slot nothing was bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderContextConfig {
    /// Filter used by the linear-filtering default samplers
    pub default_filter: TextureFilterMode,
    /// Anisotropy used when `default_filter` is anisotropic
    pub max_anisotropy: u32,
    /// Mip bias applied by every default sampler
    pub mip_lod_bias: f32,
}

impl RenderContextConfig {
    /// Set the filter of the linear default samplers
    pub fn with_default_filter(mut self, filter: TextureFilterMode) -> Self {
        self.default_filter = filter;
        self
    }

    /// Set the maximum anisotropy
    pub fn with_max_anisotropy(mut self, max_anisotropy: u32) -> Self {
        self.max_anisotropy = max_anisotropy;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=16).contains(&self.max_anisotropy) {
            return Err(format!("max_anisotropy must be within 1..=16, got {}", self.max_anisotropy));
        }
        if !self.mip_lod_bias.is_finite() {
            return Err("mip_lod_bias must be finite".to_string());
        }
        Ok(())
    }
}

impl Default for RenderContextConfig {
    fn default() -> Self {
        Self {
            default_filter: TextureFilterMode::Linear,
            max_anisotropy: 4,
            mip_lod_bias: 0.0,
        }
    }
}

/// # Device Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Name used in log output
    pub debug_name: String,
    /// Table size limits
    pub capacity_limits: CapacityLimits,
    /// Log every object still alive at shutdown
    pub report_leaks: bool,
    /// Longest time a fence poll may block, in milliseconds
    pub fence_timeout_ms: u64,
    /// Settings shared by render contexts created on this device
    pub render_context: RenderContextConfig,
}

impl DeviceConfig {
    /// Create a configuration with default values and the given name
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            ..Self::default()
        }
    }

    /// Override both capacity limits
    pub fn with_capacity_limits(mut self, state_objects: usize, resources: usize) -> Self {
        self.capacity_limits = CapacityLimits {
            state_objects,
            resources,
        };
        self
    }

    /// Enable or disable the leak report
    pub fn with_leak_report(mut self, report_leaks: bool) -> Self {
        self.report_leaks = report_leaks;
        self
    }

    /// Set the fence poll timeout
    pub fn with_fence_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.fence_timeout_ms = timeout_ms;
        self
    }

    /// Replace the render context settings
    pub fn with_render_context(mut self, render_context: RenderContextConfig) -> Self {
        self.render_context = render_context;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity_limits.state_objects == 0 {
            return Err("capacity_limits.state_objects must be greater than 0".to_string());
        }
        if self.capacity_limits.resources == 0 {
            return Err("capacity_limits.resources must be greater than 0".to_string());
        }
        self.render_context.validate()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            debug_name: "gal_device".to_string(),
            capacity_limits: CapacityLimits::default(),
            report_leaks: true,
            fence_timeout_ms: 1000,
            render_context: RenderContextConfig::default(),
        }
    }
}

impl Config for DeviceConfig {}
