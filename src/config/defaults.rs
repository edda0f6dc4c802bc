//! System-wide default constants.
//!
//! Every value here is also the serde default of the matching
//! `storm_watch.toml` key. Grouped by subsystem.

// ============================================================================
// Shock Detection
// ============================================================================

/// Minimum absolute jump in `bt` between consecutive samples (nT).
pub const DIFF_THRESHOLD: f64 = 5.0;

/// Minimum relative jump in `bt` between consecutive samples (percent).
pub const PCT_CHANGE_THRESHOLD: f64 = 50.0;

/// Width of the rolling windows used to confirm a candidate (minutes).
pub const CONFIRM_WINDOW_MINUTES: i64 = 30;

/// Expected spacing between samples (seconds).
///
/// All three sources publish 1-minute averaged products.
pub const CADENCE_SECS: i64 = 60;

// ============================================================================
// Storm Window
// ============================================================================

/// Hours of data kept before the shock.
pub const BEFORE_SHOCK_HOURS: i64 = 3;

/// Hours of data kept after the shock.
pub const AFTER_SHOCK_HOURS: i64 = 24;

/// Upper bound on either window size (hours).
///
/// 30 days each side keeps the scan range near two months of daily fetches.
pub const MAX_WINDOW_HOURS: i64 = 720;

/// Longest span `storm-watch shocks` scans in one call (days).
pub const MAX_SCAN_DAYS: i64 = 62;

/// Default source selector (ACE anchored, DSCOVR averaged in).
pub const SATELLITE_SELECTOR: &str = "both";

// ============================================================================
// Remote Sources
// ============================================================================

pub const ACE_BASE_URL: &str = "https://sohoftp.nascom.nasa.gov/sdb/goes/ace";

pub const DSCOVR_BASE_URL: &str = "https://www.ngdc.noaa.gov/dscovr/data";

pub const GOES_BASE_URL: &str =
    "https://data.ngdc.noaa.gov/platforms/solar-space-observing-satellites/goes";

/// GOES spacecraft used when `goes` is selected.
pub const GOES_SATELLITE: &str = "goes16";

/// Spacecraft with a published `magn-l2-avg1m` product.
pub const GOES_SATELLITES: [&str; 3] = ["goes16", "goes17", "goes18"];

pub const KP_URL: &str = "https://www-app3.gfz-potsdam.de/kp_index/Kp_ap_since_1932.txt";

/// Raw values at or below this are instrument fill values.
pub const SENTINEL_FLOOR: f64 = -999.0;

// ============================================================================
// HTTP
// ============================================================================

/// Per-request timeout for remote fetches (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 60;

pub const USER_AGENT: &str = concat!("storm-watch/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Fetch Cache
// ============================================================================

/// Maximum `(day, satellite)` entries held by the fetch cache.
///
/// 64 covers a dozen full scan ranges for two satellites.
pub const CACHE_CAPACITY: usize = 64;
