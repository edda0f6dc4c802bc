//! Storm Watch: solar-wind retrieval and interplanetary shock detection
//!
//! Pulls 1-minute solar-wind data from ACE, DSCOVR and GOES, reconciles
//! overlapping sources, detects interplanetary shocks and cuts storm windows
//! around them.
//!
//! ## Architecture
//!
//! - **Acquisition**: per-satellite adapters behind the [`DataProvider`] trait
//! - **Reconcile**: left-anchored merge-by-mean of two sources
//! - **Detection**: two-threshold jump detector with rolling-mean confirmation
//! - **Storm**: scan-range fetch, earliest-shock anchoring, window slicing

pub mod acquisition;
pub mod config;
pub mod detection;
pub mod export;
pub mod reconcile;
pub mod storm;
pub mod types;

// Re-export configuration
pub use config::StormConfig;

// Re-export commonly used types
pub use types::{
    CanonicalSeries, Column, Satellite, SeriesError, ShockCandidate, SolarWindSample,
    SourceSelector, StormWindow,
};

// Re-export acquisition
pub use acquisition::{CachedProvider, DataProvider, FetchError, RemoteProvider, TransportError};

// Re-export core operations
pub use detection::{detect_shocks, DetectionError, DetectorParams};
pub use reconcile::{merge_all_by_mean, merge_by_mean};
pub use storm::{extract_storm_window, scan_shocks, ShockThresholds, StormError, StormRequest};
