//! Storm window extraction
//!
//! Given a target day, fetch a few days of data either side, find the
//! earliest confirmed shock and cut `[shock - before, shock + after]` out of
//! the scanned range.
//!
//! ## Flow
//!
//! ```text
//! validate request ──► scan days ──► fetch (per day, concurrent)
//!                                        │  Combined: fetch both, merge by mean
//!                                        ▼
//!                           concat in date order ──► regularise ──► detect
//!                                                                     │
//!                             earliest candidate ──► inclusive slice ◄┘
//! ```
//!
//! Days a source has no data for contribute nothing. Transport failures
//! abort the whole extraction.

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::acquisition::{DataProvider, FetchError, TransportError};
use crate::config::{self, defaults, DetectionConfig};
use crate::detection::{detect_shocks, DetectionError, DetectorParams};
use crate::reconcile::merge_all_by_mean;
use crate::types::{CanonicalSeries, Satellite, ShockCandidate, SourceSelector, StormWindow};

/// Confirmation window used for storm extraction, independent of config.
pub const STORM_CONFIRM_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Error)]
pub enum StormError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Shock detection failed: {0}")]
    Detection(#[from] DetectionError),
}

/// `(diff, pct_change)` pair applied to `bt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockThresholds {
    /// Absolute jump (nT)
    pub diff: f64,
    /// Relative jump (percent)
    pub pct_change: f64,
}

impl Default for ShockThresholds {
    fn default() -> Self {
        let d = &config::get().detection;
        Self {
            diff: d.diff_threshold,
            pct_change: d.pct_change_threshold,
        }
    }
}

impl std::str::FromStr for ShockThresholds {
    type Err = String;

    /// `"5,50"` style pair.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (diff, pct) = s
            .split_once(',')
            .ok_or_else(|| format!("Expected 'diff,pct_change', got '{s}'"))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid threshold '{}'", v.trim()))
        };
        Ok(Self {
            diff: parse(diff)?,
            pct_change: parse(pct)?,
        })
    }
}

/// Inputs of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct StormRequest {
    /// Target day (UTC)
    pub date: NaiveDate,
    pub selector: SourceSelector,
    pub before_shock_hours: i64,
    pub after_shock_hours: i64,
    pub thresholds: ShockThresholds,
}

impl StormRequest {
    /// Request for `date` with window sizes and thresholds from the config.
    ///
    /// An unparseable configured selector falls back to the default here and
    /// is reported by [`crate::config::StormConfig::validate`] instead.
    pub fn new(date: NaiveDate) -> Self {
        let cfg = config::get();
        Self {
            date,
            selector: cfg.selector().unwrap_or_default(),
            before_shock_hours: cfg.window.before_shock_hours,
            after_shock_hours: cfg.window.after_shock_hours,
            thresholds: ShockThresholds::default(),
        }
    }

    /// Request for the UTC day containing `timestamp`.
    pub fn for_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp.date_naive())
    }

    pub fn with_selector(mut self, selector: SourceSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_window(mut self, before_shock_hours: i64, after_shock_hours: i64) -> Self {
        self.before_shock_hours = before_shock_hours;
        self.after_shock_hours = after_shock_hours;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ShockThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn validate(&self) -> Result<(), StormError> {
        self.selector
            .validate()
            .map_err(StormError::InvalidConfiguration)?;
        let in_range = |hours: i64| (1..=defaults::MAX_WINDOW_HOURS).contains(&hours);
        if !in_range(self.before_shock_hours) || !in_range(self.after_shock_hours) {
            return Err(StormError::InvalidConfiguration(format!(
                "Window sizes must be in 1..={}h, got before={}h after={}h",
                defaults::MAX_WINDOW_HOURS,
                self.before_shock_hours,
                self.after_shock_hours
            )));
        }
        if !self.thresholds.diff.is_finite() || !self.thresholds.pct_change.is_finite() {
            return Err(StormError::InvalidConfiguration(format!(
                "Shock thresholds must be finite, got ({}, {})",
                self.thresholds.diff, self.thresholds.pct_change
            )));
        }
        Ok(())
    }

    /// Detector settings for extraction: `bt`, 1-minute cadence, 30-minute
    /// confirmation window.
    pub fn detector_params(&self) -> DetectorParams {
        self.detector_params_from(&config::get().detection)
    }

    /// Like [`Self::detector_params`], with `detection` supplying only the
    /// column defaults. Cadence and confirmation window stay fixed.
    pub fn detector_params_from(&self, detection: &DetectionConfig) -> DetectorParams {
        DetectorParams::from_config(detection)
            .with_thresholds(self.thresholds.diff, self.thresholds.pct_change)
            .with_cadence(Duration::seconds(defaults::CADENCE_SECS))
            .with_confirm_window(Some(Duration::minutes(STORM_CONFIRM_WINDOW_MINUTES)))
    }

    pub fn scan_days(&self) -> Result<Vec<NaiveDate>, StormError> {
        scan_days(self.date, self.before_shock_hours, self.after_shock_hours)
    }
}

/// Days fetched around `date`: `ceil(hours / 24) + 1` on each side.
///
/// Wide enough to hold a full window anchored anywhere inside `date`. Fails
/// when the range runs off the calendar.
pub fn scan_days(date: NaiveDate, before_shock_hours: i64, after_shock_hours: i64) -> Result<Vec<NaiveDate>, StormError> {
    let pad = |hours: i64| {
        let hours = hours.max(0).unsigned_abs();
        Days::new(hours / 24 + u64::from(hours % 24 != 0) + 1)
    };
    let out_of_range = || {
        StormError::InvalidConfiguration(format!(
            "Scan range around {date} (-{before_shock_hours}h/+{after_shock_hours}h) is outside the calendar"
        ))
    };
    let first = date.checked_sub_days(pad(before_shock_hours)).ok_or_else(out_of_range)?;
    let last = date.checked_add_days(pad(after_shock_hours)).ok_or_else(out_of_range)?;
    Ok(first.iter_days().take_while(|d| *d <= last).collect())
}

/// `[shock - before, shock + after]`, or `InvalidConfiguration` on overflow.
fn window_bounds(
    shock_time: DateTime<Utc>,
    before_shock_hours: i64,
    after_shock_hours: i64,
) -> Result<(DateTime<Utc>, DateTime<Utc>), StormError> {
    let offset = |hours: i64| {
        Duration::try_hours(hours).ok_or_else(|| {
            StormError::InvalidConfiguration(format!("Window of {hours}h is out of range"))
        })
    };
    let start = shock_time.checked_sub_signed(offset(before_shock_hours)?);
    let end = shock_time.checked_add_signed(offset(after_shock_hours)?);
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(StormError::InvalidConfiguration(format!(
            "Window around {shock_time} runs outside the representable time range"
        ))),
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Find the earliest shock around `request.date` and cut the storm window.
///
/// Without a shock the whole scanned range comes back with `shock_time`
/// unset.
pub async fn extract_storm_window<P>(provider: &P, request: &StormRequest) -> Result<StormWindow, StormError>
where
    P: DataProvider + ?Sized,
{
    request.validate()?;
    let params = request.detector_params();
    let days = request.scan_days()?;

    info!(
        date = %request.date,
        selector = %request.selector,
        days = days.len(),
        provider = provider.provider_name(),
        "Scanning for shocks"
    );

    let scanned = fetch_days(provider, &days, request.selector).await?;
    let shocks = detect_regularized(&scanned, &params)?;

    let Some(shock) = shocks.first() else {
        info!(rows = scanned.len(), "No shock found, returning full scan range");
        return Ok(StormWindow {
            series: scanned,
            shock_time: None,
        });
    };

    let shock_time = shock.timestamp;
    let (start, end) = window_bounds(shock_time, request.before_shock_hours, request.after_shock_hours)?;
    let series = scanned.slice(start, end);
    info!(
        shock = %shock_time,
        difference = shock.difference,
        pct_change = shock.pct_change,
        later_shocks = shocks.len() - 1,
        rows = series.len(),
        "Storm window extracted"
    );

    Ok(StormWindow {
        series,
        shock_time: Some(shock_time),
    })
}

/// Every confirmed shock in `[start, end]` (whole days).
pub async fn scan_shocks<P>(
    provider: &P,
    start: NaiveDate,
    end: NaiveDate,
    selector: SourceSelector,
    params: &DetectorParams,
) -> Result<Vec<ShockCandidate>, StormError>
where
    P: DataProvider + ?Sized,
{
    selector.validate().map_err(StormError::InvalidConfiguration)?;
    params.validate()?;
    if start > end {
        return Err(StormError::InvalidConfiguration(format!(
            "Scan start {start} is after end {end}"
        )));
    }
    let span_days = (end - start).num_days() + 1;
    if span_days > defaults::MAX_SCAN_DAYS {
        return Err(StormError::InvalidConfiguration(format!(
            "Scan of {span_days} days exceeds the {}-day limit",
            defaults::MAX_SCAN_DAYS
        )));
    }

    let days: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
    let scanned = fetch_days(provider, &days, selector).await?;
    let shocks = detect_regularized(&scanned, params)?;
    info!(start = %start, end = %end, rows = scanned.len(), shocks = shocks.len(), "Shock scan complete");
    Ok(shocks)
}

/// Fetch and concatenate `days`, keeping date order.
pub async fn fetch_days<P>(
    provider: &P,
    days: &[NaiveDate],
    selector: SourceSelector,
) -> Result<CanonicalSeries, StormError>
where
    P: DataProvider + ?Sized,
{
    let parts = try_join_all(days.iter().map(|&day| fetch_selected(provider, day, selector))).await?;
    Ok(CanonicalSeries::concat(parts))
}

async fn fetch_selected<P>(provider: &P, day: NaiveDate, selector: SourceSelector) -> Result<CanonicalSeries, StormError>
where
    P: DataProvider + ?Sized,
{
    match selector {
        SourceSelector::Single(satellite) => fetch_or_empty(provider, day, satellite).await,
        SourceSelector::Combined(anchor, other) => {
            let (a, b) = futures::try_join!(
                fetch_or_empty(provider, day, anchor),
                fetch_or_empty(provider, day, other)
            )?;
            let merged = merge_all_by_mean(&a, &b);
            debug!(
                day = %day,
                anchor = %anchor,
                other = %other,
                anchor_rows = a.len(),
                other_rows = b.len(),
                "Merged day"
            );
            Ok(merged)
        }
    }
}

async fn fetch_or_empty<P>(provider: &P, day: NaiveDate, satellite: Satellite) -> Result<CanonicalSeries, StormError>
where
    P: DataProvider + ?Sized,
{
    match provider.fetch_day(day, satellite).await {
        Ok(series) => {
            debug!(day = %day, satellite = %satellite, rows = series.len(), "Fetched day");
            Ok(series)
        }
        Err(FetchError::DataUnavailable { what }) => {
            warn!(day = %day, satellite = %satellite, what = %what, "No data for day, treating as empty");
            Ok(CanonicalSeries::empty())
        }
        Err(FetchError::Transport(e)) => Err(StormError::Transport(e)),
    }
}

/// Detect on a gap-filled copy, so windows are measured in time rather than
/// rows. Candidates refer to timestamps of the input series.
pub fn detect_regularized(scanned: &CanonicalSeries, params: &DetectorParams) -> Result<Vec<ShockCandidate>, DetectionError> {
    let regular = scanned.regularized(params.cadence)?;
    detect_shocks(&regular, params)
}
