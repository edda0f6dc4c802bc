//! Solar-wind data acquisition
//!
//! Source adapters fetch one UTC day from one satellite and hand back a
//! [`CanonicalSeries`]. The core only sees the [`DataProvider`] trait, so
//! tests and callers can swap in their own providers.
//!
//! Error contract:
//! - [`FetchError::DataUnavailable`]: the source has nothing for that day
//!   (HTTP 404, no matching file in a listing). The extractor treats it as an
//!   empty series.
//! - [`FetchError::Transport`]: anything else (network, unexpected status,
//!   malformed payload). Propagated unchanged to the caller.

pub mod ace;
pub mod cache;
pub mod dscovr;
pub mod goes;
pub mod kp;
mod netcdf;

pub use ace::AceAdapter;
pub use cache::CachedProvider;
pub use dscovr::DscovrAdapter;
pub use goes::GoesAdapter;
pub use kp::{fetch_kp_indices, max_kp_between, parse_kp_table, KpIndex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::config::{defaults, HttpConfig, StormConfig};
use crate::types::{CanonicalSeries, Satellite};

// ============================================================================
// Errors
// ============================================================================

/// Failure reaching or decoding a remote source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Server returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("Unsupported format for {what}: {format} (only NetCDF classic and 64-bit offset are read)")]
    UnsupportedFormat { what: String, format: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode task failed: {0}")]
    Task(String),
}

impl TransportError {
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

/// Outcome of a failed `fetch_day`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No data available: {what}")]
    DataUnavailable { what: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FetchError {
    pub fn unavailable(what: impl Into<String>) -> Self {
        Self::DataUnavailable { what: what.into() }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Anything that can produce one day of canonical data for a satellite.
///
/// Implementations must return one row per available minute of the UTC day,
/// all canonical columns present with missing values as `None`.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        satellite: Satellite,
    ) -> Result<CanonicalSeries, FetchError>;

    /// Human-readable name for logging.
    fn provider_name(&self) -> &str {
        "provider"
    }
}

#[async_trait]
impl<P: DataProvider + ?Sized> DataProvider for std::sync::Arc<P> {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        satellite: Satellite,
    ) -> Result<CanonicalSeries, FetchError> {
        (**self).fetch_day(date, satellite).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

// ============================================================================
// Remote Provider (NOAA / NASA endpoints)
// ============================================================================

/// Dispatches each satellite to its HTTP adapter.
#[derive(Clone)]
pub struct RemoteProvider {
    ace: AceAdapter,
    dscovr: DscovrAdapter,
    goes: GoesAdapter,
}

impl RemoteProvider {
    pub fn from_config(config: &StormConfig) -> anyhow::Result<Self> {
        let client = build_http_client(&config.http)?;
        let sources = &config.sources;
        Ok(Self {
            ace: AceAdapter::new(client.clone(), &sources.ace_base_url),
            dscovr: DscovrAdapter::new(client.clone(), &sources.dscovr_base_url),
            goes: GoesAdapter::new(client, &sources.goes_base_url, &sources.goes_satellite)?,
        })
    }
}

#[async_trait]
impl DataProvider for RemoteProvider {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        satellite: Satellite,
    ) -> Result<CanonicalSeries, FetchError> {
        match satellite {
            Satellite::Ace => self.ace.fetch_day(date).await,
            Satellite::Dscovr => self.dscovr.fetch_day(date).await,
            Satellite::Goes => self.goes.fetch_day(date).await,
        }
    }

    fn provider_name(&self) -> &str {
        "remote"
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

pub fn build_http_client(config: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// GET a URL, mapping 404 to `DataUnavailable`.
pub(crate) async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    tracing::debug!(url = %url, "GET");
    let resp = client.get(url).send().await.map_err(|source| TransportError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::unavailable(url));
    }
    if !status.is_success() {
        return Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let body = resp.bytes().await.map_err(|source| TransportError::Http {
        url: url.to_string(),
        source,
    })?;
    Ok(body.to_vec())
}

pub(crate) async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let bytes = get_bytes(client, url).await?;
    String::from_utf8(bytes)
        .map_err(|e| TransportError::parse(url, format!("response is not UTF-8: {e}")).into())
}

/// Instrument fill values and non-finite numbers become missing.
pub fn clean_value(raw: f64) -> Option<f64> {
    (raw.is_finite() && raw > defaults::SENTINEL_FLOOR).then_some(raw)
}

/// Drop seconds and sub-second parts.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clean_value_masks_sentinels() {
        assert_eq!(clean_value(4.5), Some(4.5));
        assert_eq!(clean_value(-12.0), Some(-12.0));
        assert_eq!(clean_value(-999.9), None);
        assert_eq!(clean_value(-999.0), None);
        assert_eq!(clean_value(-1.0e5), None);
        assert_eq!(clean_value(f64::NAN), None);
    }

    #[test]
    fn test_truncate_to_minute() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 10, 17, 5, 42).unwrap();
        assert_eq!(
            truncate_to_minute(ts),
            Utc.with_ymd_and_hms(2024, 5, 10, 17, 5, 0).unwrap()
        );
    }
}
