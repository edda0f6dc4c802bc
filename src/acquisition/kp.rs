//! Planetary Kp index (GFZ Potsdam, 3-hourly since 1932).
//!
//! Used to grade a storm window: the largest Kp inside the window is a quick
//! severity check on a detected shock.
//!
//! Row layout (whitespace separated, `#` comments):
//!
//! ```text
//! YYYY MM DD hh.h hh._m        days      days_m    Kp   ap  D
//! 2024 05 10 18.0 19.50 33732.75000 33732.81250 8.667  300  0
//! ```
//!
//! `hh.h` is the start of the 3-hour bin. Kp of `-1` marks a missing value.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use tracing::info;

use super::{get_text, FetchError, TransportError};

/// Width of one Kp bin.
pub const KP_BIN_HOURS: i64 = 3;

const COLUMNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpIndex {
    /// Start of the 3-hour bin.
    pub timestamp: DateTime<Utc>,
    pub kp: f64,
    pub ap: f64,
    /// Definitive (true) or nowcast (false) value.
    pub definitive: bool,
}

impl KpIndex {
    pub fn bin_end(&self) -> DateTime<Utc> {
        self.timestamp + Duration::hours(KP_BIN_HOURS)
    }
}

pub async fn fetch_kp_indices(client: &reqwest::Client, url: &str) -> Result<Vec<KpIndex>, FetchError> {
    let text = get_text(client, url).await?;
    let indices = parse_kp_table(&text)?;
    info!(
        rows = indices.len(),
        last = ?indices.last().map(|k| k.timestamp),
        "Loaded Kp table"
    );
    Ok(indices)
}

/// Parse the GFZ table. Rows with a missing Kp are skipped.
pub fn parse_kp_table(text: &str) -> Result<Vec<KpIndex>, TransportError> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let bad = |msg: String| TransportError::parse("Kp table", format!("line {}: {msg}", i + 1));

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < COLUMNS {
            return Err(bad(format!("expected {COLUMNS} columns, found {}", tokens.len())));
        }
        let num = |idx: usize| -> Result<f64, TransportError> {
            tokens[idx]
                .parse::<f64>()
                .map_err(|_| bad(format!("invalid number '{}'", tokens[idx])))
        };

        let kp = num(7)?;
        if kp < 0.0 {
            continue;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (year, month, day, hour) = (num(0)? as i32, num(1)? as u32, num(2)? as u32, num(3)? as u32);
        let timestamp = Utc
            .with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .ok_or_else(|| bad("invalid date/time".to_string()))?;

        out.push(KpIndex {
            timestamp,
            kp,
            ap: num(8)?,
            definitive: tokens[9] == "1",
        });
    }
    Ok(out)
}

/// Highest Kp among bins overlapping `[start, end]`.
///
/// Ties keep the earliest bin.
pub fn max_kp_between(indices: &[KpIndex], start: DateTime<Utc>, end: DateTime<Utc>) -> Option<KpIndex> {
    indices
        .iter()
        .filter(|k| k.timestamp <= end && k.bin_end() > start)
        .fold(None, |best: Option<KpIndex>, k| match best {
            Some(b) if b.kp >= k.kp => Some(b),
            _ => Some(*k),
        })
}
