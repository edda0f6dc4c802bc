//! Storm window extraction against an in-memory provider.
//!
//! Every day is a full 1-minute grid (1440 rows). `bt` comes from a closure
//! so each test can place its own shocks.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

use storm_watch::acquisition::{DataProvider, FetchError, TransportError};
use storm_watch::storm::{scan_days, ShockThresholds};
use storm_watch::{
    extract_storm_window, scan_shocks, CachedProvider, CanonicalSeries, DetectorParams, Satellite,
    SolarWindSample, SourceSelector, StormError, StormRequest,
};

type BtFn = Box<dyn Fn(Satellite, DateTime<Utc>) -> Option<f64> + Send + Sync>;

struct SyntheticProvider {
    bt: BtFn,
    unavailable: Vec<(NaiveDate, Satellite)>,
    broken: Vec<NaiveDate>,
    calls: AtomicUsize,
}

impl SyntheticProvider {
    fn new(bt: impl Fn(Satellite, DateTime<Utc>) -> Option<f64> + Send + Sync + 'static) -> Self {
        Self {
            bt: Box::new(bt),
            unavailable: Vec::new(),
            broken: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for SyntheticProvider {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        satellite: Satellite,
    ) -> Result<CanonicalSeries, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(&date) {
            return Err(TransportError::parse("synthetic", format!("corrupt file for {date}")).into());
        }
        if self.unavailable.contains(&(date, satellite)) {
            return Err(FetchError::unavailable(format!("{satellite} {date}")));
        }

        let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
        let samples = (0..1440)
            .map(|m| {
                let ts = start + Duration::minutes(m);
                SolarWindSample {
                    bt: (self.bt)(satellite, ts),
                    speed: Some(400.0),
                    ..SolarWindSample::missing(ts)
                }
            })
            .collect();
        Ok(CanonicalSeries::from_samples(samples))
    }

    fn provider_name(&self) -> &str {
        "synthetic"
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, d, h, m, 0).unwrap()
}

fn ace_request(d: u32) -> StormRequest {
    StormRequest::new(day(d))
        .with_selector(SourceSelector::Single(Satellite::Ace))
        .with_window(3, 24)
        .with_thresholds(ShockThresholds { diff: 5.0, pct_change: 50.0 })
}

/// 5 nT, then 16, 17 and 18 nT held from `shock` on.
fn step_at(shock: DateTime<Utc>) -> impl Fn(Satellite, DateTime<Utc>) -> Option<f64> + Send + Sync {
    move |_, ts| {
        let v = if ts < shock {
            5.0
        } else if ts == shock {
            16.0
        } else if ts == shock + Duration::minutes(1) {
            17.0
        } else {
            18.0
        };
        Some(v)
    }
}

// ============================================================================
// Core scenarios
// ============================================================================

#[tokio::test]
async fn quiet_range_returns_full_scan_without_shock() {
    let provider = SyntheticProvider::new(|_, _| Some(5.0));
    let window = extract_storm_window(&provider, &ace_request(10)).await.unwrap();

    assert_eq!(window.shock_time, None);
    // 2024-05-08 through 2024-05-12
    assert_eq!(window.series.len(), 5 * 1440);
    assert_eq!(window.series.first_timestamp(), Some(at(8, 0, 0)));
    assert_eq!(window.series.last_timestamp(), Some(at(12, 23, 59)));
    assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn step_scenario_slices_inclusive_window() {
    let shock = at(10, 12, 0);
    let provider = SyntheticProvider::new(step_at(shock));
    let window = extract_storm_window(&provider, &ace_request(10)).await.unwrap();

    assert_eq!(window.shock_time, Some(shock));
    assert_eq!(window.series.first_timestamp(), Some(shock - Duration::hours(3)));
    assert_eq!(window.series.last_timestamp(), Some(shock + Duration::hours(24)));
    assert_eq!(window.series.len(), 27 * 60 + 1);
    assert_eq!(window.series.at(shock).and_then(|s| s.bt), Some(16.0));
}

#[tokio::test]
async fn earliest_of_two_shocks_anchors_window() {
    let t1 = at(10, 6, 0);
    let t2 = at(11, 0, 0);
    let provider = SyntheticProvider::new(move |_, ts| {
        let high = (ts >= t1 && ts < t1 + Duration::hours(6)) || ts >= t2;
        Some(if high { 15.0 } else { 5.0 })
    });

    let window = extract_storm_window(&provider, &ace_request(10)).await.unwrap();
    assert_eq!(window.shock_time, Some(t1));
    assert_eq!(window.series.first_timestamp(), Some(t1 - Duration::hours(3)));

    let shocks = scan_shocks(
        &provider,
        day(10),
        day(11),
        SourceSelector::Single(Satellite::Ace),
        &DetectorParams::default(),
    )
    .await
    .unwrap();
    let times: Vec<_> = shocks.iter().map(|s| s.timestamp).collect();
    assert_eq!(times, vec![t1, t2]);
}

#[tokio::test]
async fn single_sample_spike_is_not_a_shock() {
    let spike = at(10, 12, 0);
    let provider = SyntheticProvider::new(move |_, ts| Some(if ts == spike { 20.0 } else { 5.0 }));
    let window = extract_storm_window(&provider, &ace_request(10)).await.unwrap();
    assert_eq!(window.shock_time, None);
}

// ============================================================================
// Sources
// ============================================================================

#[tokio::test]
async fn combined_selector_averages_each_day() {
    let mut provider = SyntheticProvider::new(|sat, _| match sat {
        Satellite::Ace => Some(10.0),
        _ => Some(20.0),
    });
    provider.unavailable.push((day(9), Satellite::Dscovr));

    let request = ace_request(10).with_selector(SourceSelector::BOTH);
    let window = extract_storm_window(&provider, &request).await.unwrap();

    assert_eq!(window.shock_time, None);
    assert_eq!(provider.calls(), 10);
    // DSCOVR missing on the 9th: ACE alone
    assert_eq!(window.series.at(at(9, 12, 0)).and_then(|s| s.bt), Some(10.0));
    assert_eq!(window.series.at(at(10, 12, 0)).and_then(|s| s.bt), Some(15.0));
    assert_eq!(window.series.at(at(10, 12, 0)).and_then(|s| s.speed), Some(400.0));
}

#[tokio::test]
async fn unavailable_day_contributes_nothing() {
    let shock = at(10, 12, 0);
    let mut provider = SyntheticProvider::new(step_at(shock));
    provider.unavailable.push((day(8), Satellite::Ace));

    let window = extract_storm_window(&provider, &ace_request(10)).await.unwrap();
    assert_eq!(window.shock_time, Some(shock));

    let quiet = SyntheticProvider {
        unavailable: vec![(day(8), Satellite::Ace), (day(11), Satellite::Ace)],
        ..SyntheticProvider::new(|_, _| Some(5.0))
    };
    let window = extract_storm_window(&quiet, &ace_request(10)).await.unwrap();
    assert_eq!(window.series.len(), 3 * 1440);
    assert!(window.series.at(at(11, 0, 0)).is_none());
}

#[tokio::test]
async fn transport_error_propagates_unchanged() {
    let mut provider = SyntheticProvider::new(|_, _| Some(5.0));
    provider.broken.push(day(11));

    let err = extract_storm_window(&provider, &ace_request(10)).await.unwrap_err();
    match err {
        StormError::Transport(TransportError::Parse { message, .. }) => {
            assert!(message.contains("2024-05-11"), "{message}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

#[tokio::test]
async fn invalid_requests_fail_before_any_fetch() {
    let provider = SyntheticProvider::new(|_, _| Some(5.0));

    let bad = [
        ace_request(10).with_window(0, 24),
        ace_request(10).with_window(3, -1),
        ace_request(10).with_window(10_000_000_000, 24),
        ace_request(10).with_window(3, i64::MAX),
        ace_request(10).with_window(1_000_000, 24),
        ace_request(10).with_selector(SourceSelector::Combined(Satellite::Dscovr, Satellite::Dscovr)),
        ace_request(10).with_thresholds(ShockThresholds { diff: f64::NAN, pct_change: 50.0 }),
    ];
    for request in &bad {
        let err = extract_storm_window(&provider, request).await.unwrap_err();
        assert!(matches!(err, StormError::InvalidConfiguration(_)), "{err:?}");
    }
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn overlong_shock_scan_fails_before_any_fetch() {
    let provider = SyntheticProvider::new(|_, _| Some(5.0));
    let end = NaiveDate::from_ymd_opt(2124, 5, 10).unwrap();

    let err = scan_shocks(
        &provider,
        day(10),
        end,
        SourceSelector::Single(Satellite::Ace),
        &DetectorParams::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StormError::InvalidConfiguration(_)), "{err:?}");
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn request_for_timestamp_scans_its_utc_day() {
    let late = StormRequest::for_timestamp(at(10, 23, 59));
    let early = StormRequest::for_timestamp(at(10, 0, 0));
    assert_eq!(late.date, day(10));
    assert_eq!(late, early);
    assert_eq!(late.scan_days().unwrap(), StormRequest::new(day(10)).scan_days().unwrap());
}

#[tokio::test]
async fn scan_range_matches_request() {
    assert_eq!(ace_request(10).scan_days().unwrap(), scan_days(day(10), 3, 24).unwrap());
    assert_eq!(scan_days(day(10), 48, 24).unwrap().first(), Some(&day(7)));
}

// ============================================================================
// Fetch cache
// ============================================================================

#[tokio::test]
async fn cached_provider_serves_repeat_extractions() {
    let cached = CachedProvider::new(SyntheticProvider::new(|_, _| Some(5.0)), 16);

    let first = extract_storm_window(&cached, &ace_request(10)).await.unwrap();
    let second = extract_storm_window(&cached, &ace_request(10)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(cached.inner().calls(), 5);
    assert_eq!(cached.hits(), 5);
}
