//! GOES-R magnetometer 1-minute averages (`magn-l2-avg1m`).
//!
//! ```text
//! {base}/{sat}/l2/data/magn-l2-avg1m/{YYYY}/{MM}/dn_magn-l2-avg1m_{gNN}_d{YYYYMMDD}_v2-0-2.nc
//! ```
//!
//! GOES sits inside the magnetosphere, so only field components are
//! available. `b_epn` (EPN frame) maps to `bx`/`by`/`bz`, `bt` is the vector
//! magnitude and plasma columns stay missing. `time` is seconds since
//! 2000-01-01 12:00:00 UTC.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::debug;

use super::netcdf::{gunzip, read_variables};
use super::{clean_value, get_bytes, truncate_to_minute, FetchError, TransportError};
use crate::config::defaults::GOES_SATELLITES;
use crate::types::{CanonicalSeries, SolarWindSample};

const VARIABLES: &[&str] = &["time", "b_epn"];

#[derive(Clone)]
pub struct GoesAdapter {
    client: reqwest::Client,
    base_url: String,
    satellite: String,
}

impl GoesAdapter {
    /// Fails for spacecraft without a published 1-minute product.
    pub fn new(client: reqwest::Client, base_url: &str, satellite: &str) -> anyhow::Result<Self> {
        if !GOES_SATELLITES.contains(&satellite) {
            anyhow::bail!(
                "Unsupported GOES satellite '{satellite}', expected one of {}",
                GOES_SATELLITES.join(", ")
            );
        }
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            satellite: satellite.to_string(),
        })
    }

    pub fn file_url(&self, date: NaiveDate) -> String {
        // goes16 -> g16
        let short = self.satellite.replacen("goes", "g", 1);
        format!(
            "{base}/{sat}/l2/data/magn-l2-avg1m/{ym}/dn_magn-l2-avg1m_{short}_d{day}_v2-0-2.nc",
            base = self.base_url,
            sat = self.satellite,
            ym = date.format("%Y/%m"),
            day = date.format("%Y%m%d"),
        )
    }

    pub async fn fetch_day(&self, date: NaiveDate) -> Result<CanonicalSeries, FetchError> {
        let url = self.file_url(date);
        let payload = get_bytes(&self.client, &url).await?;

        let what = url.clone();
        let columns = tokio::task::spawn_blocking(move || {
            // some mirrors serve the file gzipped
            let image = if payload.starts_with(&[0x1f, 0x8b]) {
                gunzip(&payload, &what)?
            } else {
                payload
            };
            read_variables(&image, VARIABLES, &what)
        })
        .await
        .map_err(|e| TransportError::Task(e.to_string()))??;

        let series = assemble(&columns[0], &columns[1], &url)?;
        debug!(date = %date, satellite = %self.satellite, rows = series.len(), "GOES day decoded");
        Ok(series)
    }
}

fn j2000() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn j2000_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (secs * 1000.0).round() as i64;
    j2000()
        .checked_add_signed(Duration::milliseconds(millis))
        .map(truncate_to_minute)
}

/// `b_epn` is `time x 3`, flattened row-major.
fn assemble(time: &[f64], b_epn: &[f64], what: &str) -> Result<CanonicalSeries, TransportError> {
    if b_epn.len() != time.len() * 3 {
        return Err(TransportError::parse(
            what,
            format!("b_epn has {} values for {} timestamps", b_epn.len(), time.len()),
        ));
    }

    let samples = time
        .iter()
        .zip(b_epn.chunks_exact(3))
        .filter_map(|(&t, b)| {
            let timestamp = j2000_seconds(t)?;
            let (bx, by, bz) = (clean_value(b[0]), clean_value(b[1]), clean_value(b[2]));
            let bt = match (bx, by, bz) {
                (Some(x), Some(y), Some(z)) => Some((x * x + y * y + z * z).sqrt()),
                _ => None,
            };
            Some(SolarWindSample {
                bt,
                bx,
                by,
                bz,
                ..SolarWindSample::missing(timestamp)
            })
        })
        .collect();
    Ok(CanonicalSeries::from_samples(samples))
}
