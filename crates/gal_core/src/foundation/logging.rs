//! Logging utilities
//!
//! The crate logs through the `log` facade. Binaries pick the sink; these
//! helpers wire up `env_logger` the way the demo application expects.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with an explicit filter such as `"gal_core=debug"`
///
/// Does nothing if a logger is already installed.
pub fn init_with_filter(filter: &str) {
    let _ = env_logger::Builder::new().parse_filters(filter).try_init();
}

/// Route log output through the test harness capture
#[cfg(test)]
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}
