//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// Library code never calls this; applications install the logger once at startup.
pub fn init() {
    env_logger::init();
}
