//! Configuration Module
//!
//! Detector thresholds, storm window sizes and source endpoints loaded from
//! TOML, with every value falling back to [`defaults`].
//!
//! ## Loading Order
//!
//! 1. `STORM_WATCH_CONFIG` environment variable (path to TOML file)
//! 2. `storm_watch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(StormConfig::load());
//!
//! // Anywhere in the codebase:
//! let window = config::get().detection.confirm_window_minutes;
//! ```
//!
//! Library code never requires `init()`: components take explicit
//! parameters and only consult the global config for their `Default`s.

mod storm_config;
pub mod defaults;
pub mod validation;

pub use storm_config::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static STORM_CONFIG: OnceLock<StormConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: StormConfig) {
    if STORM_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// The global configuration, or the built-in defaults before `init()`.
pub fn get() -> &'static StormConfig {
    static FALLBACK: OnceLock<StormConfig> = OnceLock::new();
    STORM_CONFIG
        .get()
        .unwrap_or_else(|| FALLBACK.get_or_init(StormConfig::default))
}
