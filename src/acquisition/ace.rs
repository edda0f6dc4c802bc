//! ACE real-time daily text lists (MAG and SWEPAM, 1-minute averages).
//!
//! One file per instrument per day:
//!
//! ```text
//! {base}/daily/{YYYYMMDD}_ace_mag_1m.txt
//! {base}/daily/{YYYYMMDD}_ace_swepam_1m.txt
//! ```
//!
//! Header lines start with `:` or `#`. Data rows are whitespace separated:
//!
//! ```text
//! YR MO DA HHMM  MJD  SEC   S  Bx   By   Bz   Bt   Lat  Long     (mag)
//! YR MO DA HHMM  MJD  SEC   S  Np   Vp   Tp                      (swepam)
//! ```
//!
//! Rows are joined on timestamp; only minutes present in both files are
//! kept.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use tracing::debug;

use super::{clean_value, get_text, FetchError, TransportError};
use crate::types::{CanonicalSeries, SolarWindSample};

/// First value column after the date/time/status prefix.
const VALUE_OFFSET: usize = 7;

/// One parsed MAG row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagRecord {
    pub timestamp: DateTime<Utc>,
    pub bx: Option<f64>,
    pub by: Option<f64>,
    pub bz: Option<f64>,
    pub bt: Option<f64>,
}

/// One parsed SWEPAM row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlasmaRecord {
    pub timestamp: DateTime<Utc>,
    pub density: Option<f64>,
    pub speed: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Clone)]
pub struct AceAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl AceAdapter {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn file_url(&self, date: NaiveDate, instrument: &str) -> String {
        format!(
            "{}/daily/{}_ace_{}_1m.txt",
            self.base_url,
            date.format("%Y%m%d"),
            instrument
        )
    }

    pub async fn fetch_day(&self, date: NaiveDate) -> Result<CanonicalSeries, FetchError> {
        let mag_url = self.file_url(date, "mag");
        let swepam_url = self.file_url(date, "swepam");

        let (mag_text, swepam_text) = tokio::try_join!(
            get_text(&self.client, &mag_url),
            get_text(&self.client, &swepam_url)
        )?;

        let mag = parse_mag(&mag_text)?;
        let plasma = parse_swepam(&swepam_text)?;
        let series = join_records(&mag, &plasma);
        debug!(
            date = %date,
            mag_rows = mag.len(),
            swepam_rows = plasma.len(),
            rows = series.len(),
            "ACE day parsed"
        );
        Ok(series)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a MAG daily list.
pub fn parse_mag(text: &str) -> Result<Vec<MagRecord>, TransportError> {
    data_rows(text)
        .map(|(line_no, tokens)| {
            let timestamp = row_timestamp(&tokens, line_no, "ACE mag")?;
            let v = row_values(&tokens, 4, line_no, "ACE mag")?;
            Ok(MagRecord {
                timestamp,
                bx: v[0],
                by: v[1],
                bz: v[2],
                bt: v[3],
            })
        })
        .collect()
}

/// Parse a SWEPAM daily list.
pub fn parse_swepam(text: &str) -> Result<Vec<PlasmaRecord>, TransportError> {
    data_rows(text)
        .map(|(line_no, tokens)| {
            let timestamp = row_timestamp(&tokens, line_no, "ACE swepam")?;
            let v = row_values(&tokens, 3, line_no, "ACE swepam")?;
            Ok(PlasmaRecord {
                timestamp,
                density: v[0],
                speed: v[1],
                temperature: v[2],
            })
        })
        .collect()
}

/// Inner join on timestamp, ordered by the MAG rows.
pub fn join_records(mag: &[MagRecord], plasma: &[PlasmaRecord]) -> CanonicalSeries {
    let by_time: HashMap<DateTime<Utc>, &PlasmaRecord> =
        plasma.iter().map(|p| (p.timestamp, p)).collect();

    let samples = mag
        .iter()
        .filter_map(|m| {
            by_time.get(&m.timestamp).map(|p| SolarWindSample {
                timestamp: m.timestamp,
                bt: m.bt,
                bx: m.bx,
                by: m.by,
                bz: m.bz,
                density: p.density,
                speed: p.speed,
                temperature: p.temperature,
            })
        })
        .collect();
    CanonicalSeries::from_samples(samples)
}

/// Non-header rows, tokenised, with 1-based line numbers.
fn data_rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#') && !line.starts_with(':'))
        .map(|(n, line)| (n, line.split_whitespace().collect()))
}

fn row_timestamp(tokens: &[&str], line_no: usize, what: &str) -> Result<DateTime<Utc>, TransportError> {
    let bad = |msg: &str| TransportError::parse(what, format!("line {line_no}: {msg}"));
    if tokens.len() < 4 {
        return Err(bad("too few columns"));
    }

    let field = |idx: usize| -> Result<u32, TransportError> {
        tokens[idx]
            .parse::<u32>()
            .map_err(|_| bad(&format!("invalid integer '{}'", tokens[idx])))
    };
    let year = i32::try_from(field(0)?).map_err(|_| bad("year out of range"))?;
    let month = field(1)?;
    let day = field(2)?;

    let hhmm = tokens[3];
    let (hour, minute) = match (hhmm.len(), hhmm.get(..2), hhmm.get(2..)) {
        (4, Some(h), Some(m)) => (h.parse::<u32>().ok(), m.parse::<u32>().ok()),
        _ => (None, None),
    };
    let (Some(hour), Some(minute)) = (hour, minute) else {
        return Err(bad(&format!("invalid HHMM '{hhmm}'")));
    };

    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| bad("invalid date/time"))
}

fn row_values(
    tokens: &[&str],
    count: usize,
    line_no: usize,
    what: &str,
) -> Result<Vec<Option<f64>>, TransportError> {
    let end = VALUE_OFFSET + count;
    if tokens.len() < end {
        return Err(TransportError::parse(
            what,
            format!("line {line_no}: expected {end} columns, found {}", tokens.len()),
        ));
    }
    tokens[VALUE_OFFSET..end]
        .iter()
        .map(|t| {
            t.parse::<f64>().map(clean_value).map_err(|_| {
                TransportError::parse(what, format!("line {line_no}: invalid number '{t}'"))
            })
        })
        .collect()
}
