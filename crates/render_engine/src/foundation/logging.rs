//! Logging setup for applications embedding the renderer
//!
//! The library itself only talks to the `log` facade; binaries call [`init`]
//! once to install the `env_logger` backend.

pub use log::{debug, error, info, trace, warn};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the logging backend
///
/// Honors `RUST_LOG` and falls back to [`DEFAULT_FILTER`]. Calling it twice is
/// harmless; the second installation attempt is ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init();
}
