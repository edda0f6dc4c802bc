//! Interplanetary shock detection
//!
//! A shock shows up as an abrupt, sustained rise in field magnitude. Detection
//! runs in two stages:
//!
//! 1. **Raw candidates**: rows where the step from the previous sample exceeds
//!    both an absolute (`diff_threshold`, nT) and a relative
//!    (`pct_change_threshold`, percent) threshold. Only increases qualify.
//! 2. **Confirmation**: the mean over the confirmation window after the jump
//!    must exceed the mean over the same width before it, by the same two
//!    thresholds. Single-sample spikes average out and are dropped.
//!
//! The detector requires uniform sampling at `cadence`. Window widths are
//! converted to sample counts, so a gap would silently stretch a window;
//! irregular series are rejected instead. Use
//! [`CanonicalSeries::regularized`] to pad gaps with missing rows first.
//!
//! ## Window bounds
//!
//! For a candidate at `t` with window `W`:
//! - prior = mean over `[t - W, t)`, excluding the candidate sample itself
//! - after = mean over `(t, t + W]`
//!
//! A candidate with no row at `t + W` is excluded. Missing values are skipped
//! inside a window; an all-missing window fails confirmation.

use chrono::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::types::{CanonicalSeries, Column, SeriesError, ShockCandidate};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Series violates the cadence precondition: {0}")]
    IrregularCadence(#[from] SeriesError),

    #[error("Confirmation window must be a positive multiple of the {cadence_secs}s cadence, got {window_secs}s")]
    InvalidWindow { window_secs: i64, cadence_secs: i64 },

    #[error("Threshold {name} must be finite, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Shock detector parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    /// Column scanned for jumps (normally `bt`).
    pub column: Column,
    pub diff_threshold: f64,
    pub pct_change_threshold: f64,
    /// `None` disables confirmation and returns raw candidates verbatim.
    pub confirm_window: Option<Duration>,
    /// Expected spacing between consecutive samples.
    pub cadence: Duration,
}

impl Default for DetectorParams {
    /// Thresholds from the global config when initialised, else built-ins.
    fn default() -> Self {
        Self::from_config(&crate::config::get().detection)
    }
}

impl DetectorParams {
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self {
            column: Column::Bt,
            diff_threshold: config.diff_threshold,
            pct_change_threshold: config.pct_change_threshold,
            confirm_window: Some(Duration::minutes(config.confirm_window_minutes)),
            cadence: Duration::seconds(config.cadence_seconds),
        }
    }

    pub fn with_thresholds(mut self, diff_threshold: f64, pct_change_threshold: f64) -> Self {
        self.diff_threshold = diff_threshold;
        self.pct_change_threshold = pct_change_threshold;
        self
    }

    pub fn with_confirm_window(mut self, window: Option<Duration>) -> Self {
        self.confirm_window = window;
        self
    }

    pub fn with_cadence(mut self, cadence: Duration) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.column = column;
        self
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        for (name, value) in [
            ("diff_threshold", self.diff_threshold),
            ("pct_change_threshold", self.pct_change_threshold),
        ] {
            if !value.is_finite() {
                return Err(DetectionError::InvalidThreshold { name, value });
            }
        }

        let cadence_secs = self.cadence.num_seconds();
        if cadence_secs <= 0 {
            return Err(SeriesError::NonPositiveCadence(cadence_secs).into());
        }
        if let Some(window) = self.confirm_window {
            let window_secs = window.num_seconds();
            if window_secs <= 0 || window_secs % cadence_secs != 0 {
                return Err(DetectionError::InvalidWindow {
                    window_secs,
                    cadence_secs,
                });
            }
        }
        Ok(())
    }

    /// Confirmation window as a number of samples.
    fn window_samples(&self) -> Option<usize> {
        let cadence_secs = self.cadence.num_seconds();
        self.confirm_window
            .and_then(|w| usize::try_from(w.num_seconds() / cadence_secs).ok())
    }
}

/// Scan `series` for shocks, returning confirmed candidates in time order.
pub fn detect_shocks(
    series: &CanonicalSeries,
    params: &DetectorParams,
) -> Result<Vec<ShockCandidate>, DetectionError> {
    params.validate()?;
    if series.len() < 2 {
        return Ok(Vec::new());
    }
    series.check_cadence(params.cadence)?;

    let values = series.column_values(params.column);
    let raw = raw_candidates(series, &values, params);
    debug!(
        column = %params.column,
        rows = values.len(),
        raw = raw.len(),
        "Raw shock candidates"
    );

    let Some(k) = params.window_samples() else {
        return Ok(raw.into_iter().map(|(_, c)| c).collect());
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let confirmed: Vec<ShockCandidate> = raw
        .into_iter()
        .filter(|(i, _)| is_confirmed(&values, *i, k, params))
        .map(|(_, c)| c)
        .collect();
    debug!(confirmed = confirmed.len(), window_samples = k, "Confirmed shock candidates");

    Ok(confirmed)
}

/// Rows passing both step thresholds, with their row index.
fn raw_candidates(
    series: &CanonicalSeries,
    values: &[Option<f64>],
    params: &DetectorParams,
) -> Vec<(usize, ShockCandidate)> {
    series
        .samples()
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, sample)| {
            let (Some(prev), Some(curr)) = (values[i - 1], values[i]) else {
                return None;
            };
            let difference = curr - prev;
            let pct_change = 100.0 * difference / prev;
            (pct_change > params.pct_change_threshold && difference > params.diff_threshold).then(|| {
                (
                    i,
                    ShockCandidate {
                        timestamp: sample.timestamp,
                        difference,
                        pct_change,
                    },
                )
            })
        })
        .collect()
}

fn is_confirmed(values: &[Option<f64>], i: usize, k: usize, params: &DetectorParams) -> bool {
    // no extrapolation past the end of the series
    if i + k >= values.len() {
        return false;
    }
    let prior = mean_present(&values[i.saturating_sub(k)..i]);
    let after = mean_present(&values[i + 1..=i + k]);
    match (prior, after) {
        (Some(prior), Some(after)) => {
            after > prior + params.diff_threshold
                && after > prior * params.pct_change_threshold / 100.0
        }
        _ => false,
    }
}

/// Mean of the present values, `None` when all are missing.
fn mean_present(window: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = window
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SolarWindSample;
    use chrono::{DateTime, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 24, 0, 0, 0).unwrap()
    }

    fn series_from(bt: &[Option<f64>]) -> CanonicalSeries {
        CanonicalSeries::from_samples(
            bt.iter()
                .enumerate()
                .map(|(i, v)| SolarWindSample {
                    bt: *v,
                    ..SolarWindSample::missing(start() + Duration::minutes(i as i64))
                })
                .collect(),
        )
    }

    fn params() -> DetectorParams {
        DetectorParams::from_config(&DetectionConfig::default())
    }

    #[test]
    fn test_mean_present_skips_missing() {
        assert_eq!(mean_present(&[Some(2.0), None, Some(4.0)]), Some(3.0));
        assert_eq!(mean_present(&[None, None]), None);
        assert_eq!(mean_present(&[]), None);
    }

    #[test]
    fn test_decrease_is_never_a_candidate() {
        let series = series_from(&[Some(20.0), Some(5.0), Some(5.0)]);
        let shocks = detect_shocks(&series, &params().with_confirm_window(None)).unwrap();
        assert!(shocks.is_empty());
    }

    #[test]
    fn test_both_thresholds_required() {
        // +6 nT but only +20%
        let big_base = series_from(&[Some(30.0), Some(36.0)]);
        // +200% but only +2 nT
        let small_base = series_from(&[Some(1.0), Some(3.0)]);
        let p = params().with_confirm_window(None);
        assert!(detect_shocks(&big_base, &p).unwrap().is_empty());
        assert!(detect_shocks(&small_base, &p).unwrap().is_empty());
    }

    #[test]
    fn test_raw_candidate_reports_step() {
        let series = series_from(&[Some(5.0), Some(15.0)]);
        let shocks = detect_shocks(&series, &params().with_confirm_window(None)).unwrap();
        assert_eq!(shocks.len(), 1);
        assert!((shocks[0].difference - 10.0).abs() < 1e-12);
        assert!((shocks[0].pct_change - 200.0).abs() < 1e-9);
        assert_eq!(shocks[0].timestamp, start() + Duration::minutes(1));
    }

    #[test]
    fn test_missing_neighbour_blocks_candidate() {
        let series = series_from(&[Some(5.0), None, Some(15.0)]);
        let shocks = detect_shocks(&series, &params().with_confirm_window(None)).unwrap();
        assert!(shocks.is_empty());
    }

    #[test]
    fn test_candidate_too_close_to_end_is_excluded() {
        let mut bt = vec![Some(5.0); 10];
        bt.extend(vec![Some(20.0); 30]);
        // last row is t + 29min
        let shocks = detect_shocks(&series_from(&bt), &params()).unwrap();
        assert!(shocks.is_empty());

        bt.push(Some(20.0));
        let shocks = detect_shocks(&series_from(&bt), &params()).unwrap();
        assert_eq!(shocks.len(), 1);
    }

    #[test]
    fn test_irregular_series_rejected() {
        let series = CanonicalSeries::from_samples(vec![
            SolarWindSample::missing(start()),
            SolarWindSample::missing(start() + Duration::minutes(2)),
        ]);
        assert!(matches!(
            detect_shocks(&series, &params()),
            Err(DetectionError::IrregularCadence(_))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let series = series_from(&[Some(1.0), Some(2.0)]);
        let nan = params().with_thresholds(f64::NAN, 50.0);
        assert!(matches!(
            detect_shocks(&series, &nan),
            Err(DetectionError::InvalidThreshold { .. })
        ));
        let odd_window = params().with_confirm_window(Some(Duration::seconds(90)));
        assert!(matches!(
            detect_shocks(&series, &odd_window),
            Err(DetectionError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_short_series_has_no_shocks() {
        assert!(detect_shocks(&CanonicalSeries::empty(), &params()).unwrap().is_empty());
        assert!(detect_shocks(&series_from(&[Some(5.0)]), &params()).unwrap().is_empty());
    }
}
