//! Canonical time series types
//!
//! `CanonicalSeries` is the source-independent, minute-indexed table every
//! adapter produces and every core component consumes. Missing values are
//! `None`, never a sentinel number.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Column;

/// Series shape errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("Cadence must be positive, got {0}s")]
    NonPositiveCadence(i64),

    #[error("Irregular sampling at {at}: gap of {gap_secs}s, expected {cadence_secs}s")]
    Irregular {
        at: DateTime<Utc>,
        gap_secs: i64,
        cadence_secs: i64,
    },

    #[error("Sample at {at} is off the {cadence_secs}s grid anchored at {anchor}")]
    OffGrid {
        at: DateTime<Utc>,
        anchor: DateTime<Utc>,
        cadence_secs: i64,
    },
}

/// One minute of solar-wind measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarWindSample {
    pub timestamp: DateTime<Utc>,

    // === Magnetic field (nT) ===
    pub bt: Option<f64>,
    pub bx: Option<f64>,
    pub by: Option<f64>,
    pub bz: Option<f64>,

    // === Plasma ===
    /// Proton density (p/cc)
    pub density: Option<f64>,
    /// Bulk speed (km/s)
    pub speed: Option<f64>,
    /// Ion temperature (K)
    pub temperature: Option<f64>,
}

impl SolarWindSample {
    /// A sample with every column missing.
    pub fn missing(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            bt: None,
            bx: None,
            by: None,
            bz: None,
            density: None,
            speed: None,
            temperature: None,
        }
    }

    pub fn is_all_missing(&self) -> bool {
        Column::ALL.iter().all(|c| c.get(self).is_none())
    }
}

/// Ordered, duplicate-free, time-indexed table of solar-wind samples.
///
/// Instances are immutable once built: every operation that changes shape
/// returns a new series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalSeries {
    samples: Vec<SolarWindSample>,
}

impl CanonicalSeries {
    /// Zero rows. Still a valid, mergeable value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a series, sorting by timestamp and dropping duplicate
    /// timestamps (the first occurrence wins).
    pub fn from_samples(mut samples: Vec<SolarWindSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        samples.dedup_by_key(|s| s.timestamp);
        Self { samples }
    }

    /// Concatenate several series into one ordered series.
    pub fn concat<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let samples = parts.into_iter().flat_map(|p| p.samples).collect();
        Self::from_samples(samples)
    }

    pub fn samples(&self) -> &[SolarWindSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<SolarWindSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|s| s.timestamp)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.samples.iter().map(|s| s.timestamp)
    }

    /// Row index of an exact timestamp.
    pub fn position(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.samples
            .binary_search_by_key(&timestamp, |s| s.timestamp)
            .ok()
    }

    /// Sample at an exact timestamp.
    pub fn at(&self, timestamp: DateTime<Utc>) -> Option<&SolarWindSample> {
        self.position(timestamp).map(|i| &self.samples[i])
    }

    /// All values of one column, in time order.
    pub fn column_values(&self, column: Column) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| column.get(s)).collect()
    }

    /// Rows with `start <= timestamp <= end` (both bounds inclusive).
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start > end {
            return Self::empty();
        }
        let lo = self.samples.partition_point(|s| s.timestamp < start);
        let hi = self.samples.partition_point(|s| s.timestamp <= end);
        Self {
            samples: self.samples[lo..hi].to_vec(),
        }
    }

    /// Check that consecutive samples are exactly `cadence` apart.
    pub fn check_cadence(&self, cadence: Duration) -> Result<(), SeriesError> {
        let cadence_secs = positive_cadence(cadence)?;
        for pair in self.samples.windows(2) {
            let gap = pair[1].timestamp - pair[0].timestamp;
            if gap != cadence {
                return Err(SeriesError::Irregular {
                    at: pair[1].timestamp,
                    gap_secs: gap.num_seconds(),
                    cadence_secs,
                });
            }
        }
        Ok(())
    }

    /// Fill gaps with all-missing rows so the result has uniform `cadence`.
    ///
    /// The grid is anchored at the first sample; any sample that does not
    /// fall on it is rejected rather than shifted.
    pub fn regularized(&self, cadence: Duration) -> Result<Self, SeriesError> {
        let cadence_secs = positive_cadence(cadence)?;
        let Some(anchor) = self.first_timestamp() else {
            return Ok(Self::empty());
        };

        let mut out = Vec::with_capacity(self.samples.len());
        let mut expected = anchor;
        for sample in &self.samples {
            let offset = (sample.timestamp - anchor).num_seconds();
            if offset % cadence_secs != 0 {
                return Err(SeriesError::OffGrid {
                    at: sample.timestamp,
                    anchor,
                    cadence_secs,
                });
            }
            while expected < sample.timestamp {
                out.push(SolarWindSample::missing(expected));
                expected += cadence;
            }
            out.push(sample.clone());
            expected = sample.timestamp + cadence;
        }

        Ok(Self { samples: out })
    }
}

fn positive_cadence(cadence: Duration) -> Result<i64, SeriesError> {
    let secs = cadence.num_seconds();
    if secs <= 0 {
        return Err(SeriesError::NonPositiveCadence(secs));
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn sample(minute: i64, bt: f64) -> SolarWindSample {
        SolarWindSample {
            bt: Some(bt),
            ..SolarWindSample::missing(ts(minute))
        }
    }

    #[test]
    fn test_from_samples_sorts_and_dedups_first_wins() {
        let series = CanonicalSeries::from_samples(vec![
            sample(2, 3.0),
            sample(0, 1.0),
            sample(2, 99.0),
            sample(1, 2.0),
        ]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.column_values(Column::Bt), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_slice_is_inclusive_on_both_ends() {
        let series = CanonicalSeries::from_samples((0..10).map(|m| sample(m, m as f64)).collect());
        let window = series.slice(ts(2), ts(5));
        assert_eq!(window.first_timestamp(), Some(ts(2)));
        assert_eq!(window.last_timestamp(), Some(ts(5)));
        assert_eq!(window.len(), 4);
        assert!(series.slice(ts(5), ts(2)).is_empty());
    }

    #[test]
    fn test_regularized_fills_gaps_with_missing_rows() {
        let series = CanonicalSeries::from_samples(vec![sample(0, 1.0), sample(3, 4.0)]);
        let regular = series.regularized(Duration::minutes(1)).unwrap();
        assert_eq!(regular.len(), 4);
        assert!(regular.samples()[1].is_all_missing());
        assert!(regular.samples()[2].is_all_missing());
        assert!(regular.check_cadence(Duration::minutes(1)).is_ok());
    }

    #[test]
    fn test_regularized_rejects_off_grid_sample() {
        let mut odd = sample(1, 2.0);
        odd.timestamp += Duration::seconds(30);
        let series = CanonicalSeries::from_samples(vec![sample(0, 1.0), odd]);
        assert!(matches!(
            series.regularized(Duration::minutes(1)),
            Err(SeriesError::OffGrid { .. })
        ));
    }

    #[test]
    fn test_check_cadence_reports_gap() {
        let series = CanonicalSeries::from_samples(vec![sample(0, 1.0), sample(5, 1.0)]);
        match series.check_cadence(Duration::minutes(1)) {
            Err(SeriesError::Irregular { gap_secs, .. }) => assert_eq!(gap_secs, 300),
            other => panic!("expected irregular cadence, got {other:?}"),
        }
    }

    #[test]
    fn test_concat_orders_parts() {
        let late = CanonicalSeries::from_samples(vec![sample(5, 5.0)]);
        let early = CanonicalSeries::from_samples(vec![sample(1, 1.0)]);
        let joined = CanonicalSeries::concat([late, CanonicalSeries::empty(), early]);
        assert_eq!(joined.first_timestamp(), Some(ts(1)));
        assert_eq!(joined.len(), 2);
    }
}
