#![forbid(unsafe_code)]

//! Logging shims.
//!
//! With the `tracing` feature enabled the usual `tracing` macros are
//! re-exported from here. Without it, crate-root no-op macros with the same
//! names are used instead, so call sites look identical either way:
//!
//! ```ignore
//! #[cfg(feature = "tracing")]
//! use crate::logging::trace;
//! #[cfg(not(feature = "tracing"))]
//! use crate::trace;
//! ```
//!
//! The `tracing-json` feature adds [`init_json_logging`], which installs a
//! JSON subscriber filtered by the `RIVULET_LOG` environment variable.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

/// Environment variable consulted by [`init_json_logging`].
pub const LOG_FILTER_ENV: &str = "RIVULET_LOG";

/// No-op replacement for `tracing::trace!`.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{}};
}

/// No-op replacement for `tracing::debug!`.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

/// No-op replacement for `tracing::warn!`.
#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}

/// Install a global JSON subscriber.
///
/// The filter is read from `RIVULET_LOG` (falling back to `warn`). Returns
/// `false` if a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .try_init()
        .is_ok()
}
