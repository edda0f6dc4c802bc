//! DSCOVR 1-minute products from the NOAA NCEI archive.
//!
//! Files live in monthly directories whose listing must be scraped, since the
//! file names carry a processing timestamp:
//!
//! ```text
//! {base}/{YYYY}/{MM}/oe_m1m_dscovr_s20240510000000_e20240510235959_p..._pub.nc.gz
//! ```
//!
//! - `m1m`: magnetometer (`bt`, `bx_gsm`, `by_gsm`, `bz_gsm`)
//! - `f1m`: Faraday cup plasma (`proton_density`, `proton_speed`,
//!   `proton_temperature`)
//!
//! `time` is milliseconds since the Unix epoch. Plasma is left-joined onto
//! the magnetometer timestamps.
//!
//! Monthly listings are kept per adapter, so a scan range inside one month
//! downloads its listing once.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use lru::LruCache;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::debug;

use super::netcdf::decode_gzip_variables;
use super::{clean_value, get_bytes, get_text, truncate_to_minute, FetchError, TransportError};
use crate::types::{CanonicalSeries, SolarWindSample};

const MAG_PRODUCT: &str = "m1m";
const PLASMA_PRODUCT: &str = "f1m";

const MAG_VARIABLES: &[&str] = &["time", "bt", "bx_gsm", "by_gsm", "bz_gsm"];
const PLASMA_VARIABLES: &[&str] = &["time", "proton_density", "proton_speed", "proton_temperature"];

/// Monthly listings held per adapter. A scan range spans at most three months.
const LISTING_CACHE_MONTHS: usize = 4;

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href="([^"]+)""#).expect("href pattern is valid"))
}

// ============================================================================
// Listing Cache
// ============================================================================

/// Listing pages keyed by `(year, month)`.
///
/// The lock is held while a page downloads, so concurrent days of the same
/// month wait for one request. Failed downloads are not stored.
struct ListingCache {
    pages: Mutex<LruCache<(i32, u32), Arc<str>>>,
}

impl ListingCache {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            pages: Mutex::new(LruCache::new(capacity)),
        }
    }

    async fn get_or_fetch<F, Fut>(&self, date: NaiveDate, fetch: F) -> Result<Arc<str>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let key = (date.year(), date.month());
        let mut pages = self.pages.lock().await;
        if let Some(page) = pages.get(&key) {
            debug!(year = key.0, month = key.1, "DSCOVR listing cache hit");
            return Ok(Arc::clone(page));
        }
        let page: Arc<str> = fetch().await?.into();
        pages.put(key, Arc::clone(&page));
        Ok(page)
    }
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Clone)]
pub struct DscovrAdapter {
    client: reqwest::Client,
    base_url: String,
    listings: Arc<ListingCache>,
}

impl DscovrAdapter {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            listings: Arc::new(ListingCache::new(LISTING_CACHE_MONTHS)),
        }
    }

    pub fn listing_url(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.base_url, date.format("%Y/%m"))
    }

    pub async fn fetch_day(&self, date: NaiveDate) -> Result<CanonicalSeries, FetchError> {
        let listing_url = self.listing_url(date);
        let listing = self
            .listings
            .get_or_fetch(date, || get_text(&self.client, &listing_url))
            .await?;
        let listing = listing.as_ref();

        let mag_url = find_dataset_link(listing, &listing_url, MAG_PRODUCT, date)
            .ok_or_else(|| FetchError::unavailable(format!("DSCOVR {MAG_PRODUCT} file for {date}")))?;
        let plasma_url = find_dataset_link(listing, &listing_url, PLASMA_PRODUCT, date).ok_or_else(
            || FetchError::unavailable(format!("DSCOVR {PLASMA_PRODUCT} file for {date}")),
        )?;

        let (mag_gz, plasma_gz) = tokio::try_join!(
            get_bytes(&self.client, &mag_url),
            get_bytes(&self.client, &plasma_url)
        )?;

        let (mag, plasma) = tokio::try_join!(
            decode_gzip_variables(mag_gz, MAG_VARIABLES, mag_url.clone()),
            decode_gzip_variables(plasma_gz, PLASMA_VARIABLES, plasma_url.clone())
        )?;

        let series = assemble(&mag, &plasma, &mag_url)?;
        debug!(date = %date, rows = series.len(), "DSCOVR day decoded");
        Ok(series)
    }
}

/// Find the archive link for `product` covering `date`.
///
/// Relative links are resolved against the listing URL.
pub fn find_dataset_link(
    listing: &str,
    listing_url: &str,
    product: &str,
    date: NaiveDate,
) -> Option<String> {
    let product_tag = format!("{product}_dscovr");
    let day = date.format("%Y%m%d").to_string();
    let start_tag = format!("s{day}");
    let end_tag = format!("e{day}");

    href_regex()
        .captures_iter(listing)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .find(|href| href.contains(&product_tag) && href.contains(&start_tag) && href.contains(&end_tag))
        .map(|href| {
            if href.starts_with("http://") || href.starts_with("https://") {
                href.to_string()
            } else {
                format!(
                    "{}/{}",
                    listing_url.trim_end_matches('/'),
                    href.trim_start_matches("./")
                )
            }
        })
}

/// Build the canonical series from decoded variable columns.
///
/// `mag` follows `MAG_VARIABLES` order, `plasma` follows `PLASMA_VARIABLES`.
fn assemble(mag: &[Vec<f64>], plasma: &[Vec<f64>], what: &str) -> Result<CanonicalSeries, TransportError> {
    check_lengths(mag, what)?;
    check_lengths(plasma, what)?;

    let mut plasma_by_time: HashMap<DateTime<Utc>, usize> = HashMap::new();
    for (i, &ms) in plasma[0].iter().enumerate() {
        if let Some(ts) = epoch_millis(ms) {
            plasma_by_time.entry(ts).or_insert(i);
        }
    }

    let mut samples = Vec::with_capacity(mag[0].len());
    for (i, &ms) in mag[0].iter().enumerate() {
        let Some(timestamp) = epoch_millis(ms) else {
            continue;
        };
        let plasma_row = plasma_by_time.get(&timestamp).copied();
        let plasma_value = |col: usize| plasma_row.and_then(|j| clean_value(plasma[col][j]));
        samples.push(SolarWindSample {
            timestamp,
            bt: clean_value(mag[1][i]),
            bx: clean_value(mag[2][i]),
            by: clean_value(mag[3][i]),
            bz: clean_value(mag[4][i]),
            density: plasma_value(1),
            speed: plasma_value(2),
            temperature: plasma_value(3),
        });
    }
    Ok(CanonicalSeries::from_samples(samples))
}

fn check_lengths(columns: &[Vec<f64>], what: &str) -> Result<(), TransportError> {
    let n = columns.first().map_or(0, Vec::len);
    if columns.iter().any(|c| c.len() != n) {
        return Err(TransportError::parse(what, "variables differ in length"));
    }
    Ok(())
}

fn epoch_millis(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = ms as i64;
    DateTime::from_timestamp_millis(millis).map(truncate_to_minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LISTING: &str = r#"<html><body>
<a href="oe_f1m_dscovr_s20240509000000_e20240509235959_p20240510022253_pub.nc.gz">f1m 09</a>
<a href="oe_m1m_dscovr_s20240510000000_e20240510235959_p20240511022107_pub.nc.gz">m1m 10</a>
<a href="https://mirror.example.org/oe_f1m_dscovr_s20240510000000_e20240510235959_p20240511022215_pub.nc.gz">f1m 10</a>
</body></html>"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn test_relative_link_resolved_against_listing() {
        let link = find_dataset_link(LISTING, "https://data.example.org/dscovr/2024/05", "m1m", date());
        assert_eq!(
            link.as_deref(),
            Some("https://data.example.org/dscovr/2024/05/oe_m1m_dscovr_s20240510000000_e20240510235959_p20240511022107_pub.nc.gz")
        );
    }

    #[test]
    fn test_absolute_link_kept() {
        let link = find_dataset_link(LISTING, "https://data.example.org/dscovr/2024/05", "f1m", date()).unwrap();
        assert!(link.starts_with("https://mirror.example.org/"));
    }

    #[test]
    fn test_missing_product_day_is_none() {
        let other_day = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();
        assert!(find_dataset_link(LISTING, "https://x", "m1m", other_day).is_none());
    }

    #[test]
    fn test_listing_url_layout() {
        let adapter = DscovrAdapter::new(reqwest::Client::new(), "https://data.example.org/dscovr/");
        assert_eq!(adapter.listing_url(date()), "https://data.example.org/dscovr/2024/05");
    }

    #[test]
    fn test_listing_fetched_once_per_month() {
        let cache = ListingCache::new(LISTING_CACHE_MONTHS);
        let fetches = std::cell::Cell::new(0);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            async { Ok(LISTING.to_string()) }
        };

        tokio_test::block_on(async {
            for day in [9, 10, 11, 12] {
                let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
                let page = cache.get_or_fetch(date, fetch).await.unwrap();
                assert_eq!(page.as_ref(), LISTING);
            }
            let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
            cache.get_or_fetch(june, fetch).await.unwrap();
        });
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_failed_listing_not_cached() {
        let cache = ListingCache::new(LISTING_CACHE_MONTHS);
        tokio_test::block_on(async {
            let err = cache
                .get_or_fetch(date(), || async { Err(FetchError::unavailable("listing")) })
                .await;
            assert!(matches!(err, Err(FetchError::DataUnavailable { .. })));

            let page = cache
                .get_or_fetch(date(), || async { Ok(LISTING.to_string()) })
                .await
                .unwrap();
            assert_eq!(page.as_ref(), LISTING);
        });
    }

    #[test]
    fn test_assemble_left_joins_plasma() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap().timestamp_millis() as f64;
        let minute = 60_000.0;
        let mag = vec![
            vec![t0, t0 + minute, t0 + 2.0 * minute],
            vec![5.0, 6.0, -99999.0],
            vec![1.0, 1.0, 1.0],
            vec![2.0, 2.0, 2.0],
            vec![3.0, 3.0, 3.0],
        ];
        let plasma = vec![
            vec![t0 + minute, t0 + 5.0 * minute],
            vec![4.0, 9.0],
            vec![420.0, 500.0],
            vec![1.0e5, 2.0e5],
        ];

        let series = assemble(&mag, &plasma, "test").unwrap();
        assert_eq!(series.len(), 3);
        let s = series.samples();
        assert_eq!(s[0].density, None);
        assert_eq!(s[1].density, Some(4.0));
        assert_eq!(s[1].speed, Some(420.0));
        assert_eq!(s[2].bt, None);
        assert_eq!(s[2].bx, Some(1.0));
    }

    #[test]
    fn test_assemble_rejects_ragged_columns() {
        let mag = vec![vec![0.0, 60_000.0], vec![1.0], vec![], vec![], vec![]];
        let plasma = vec![vec![], vec![], vec![], vec![]];
        assert!(assemble(&mag, &plasma, "test").is_err());
    }

    #[test]
    fn test_epoch_millis_truncates_seconds() {
        let ts = epoch_millis(1_715_299_205_500.0).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap());
    }
}
