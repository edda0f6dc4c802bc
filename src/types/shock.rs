//! Shock detection results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CanonicalSeries;

/// A timestamp where the watched column jumped past both thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockCandidate {
    pub timestamp: DateTime<Utc>,
    /// `value[i] - value[i-1]`
    pub difference: f64,
    /// `100 * difference / value[i-1]`
    pub pct_change: f64,
}

/// Data around the earliest confirmed shock in a scan range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormWindow {
    /// `[shock - before, shock + after]` when a shock was found, otherwise
    /// the full scanned range.
    pub series: CanonicalSeries,
    pub shock_time: Option<DateTime<Utc>>,
}
