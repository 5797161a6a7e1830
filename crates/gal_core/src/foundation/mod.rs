//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Slot tables with generation-checked keys
//! - Deterministic descriptor hashing
//! - Logging utilities

pub mod collections;
pub mod hashing;
pub mod logging;
