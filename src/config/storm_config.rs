//! Storm Watch configuration - detector thresholds, window sizes and source
//! endpoints as operator-tunable TOML values.
//!
//! Each struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a missing key behaves exactly like the built-ins.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::SourceSelector;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "STORM_WATCH_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "storm_watch.toml";

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `StormConfig::load()` which searches:
/// 1. `$STORM_WATCH_CONFIG`
/// 2. `./storm_watch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StormConfig {
    /// Shock detector thresholds
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Storm window extent and source selection
    #[serde(default)]
    pub window: WindowConfig,

    /// Remote data endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Fetch cache sizing
    #[serde(default)]
    pub cache: CacheConfig,
}

impl StormConfig {
    /// Load configuration using the standard search order, falling back to
    /// defaults when a file is missing or broken.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./storm_watch.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings with a suggested correction; they
    /// never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Parsed `window.satellite`.
    pub fn selector(&self) -> Result<SourceSelector, ConfigError> {
        self.window
            .satellite
            .parse()
            .map_err(|e: String| ConfigError::Validation(vec![format!("window.satellite: {e}")]))
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Thresholds must be finite
    /// - Window sizes, cadence and confirmation window must be positive
    /// - Window sizes are capped at `MAX_WINDOW_HOURS`
    /// - The confirmation window must be a whole number of samples
    /// - The satellite selector and GOES spacecraft must be known
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let d = &self.detection;
        if !d.diff_threshold.is_finite() {
            errors.push(format!("detection.diff_threshold must be finite, got {}", d.diff_threshold));
        }
        if !d.pct_change_threshold.is_finite() {
            errors.push(format!(
                "detection.pct_change_threshold must be finite, got {}",
                d.pct_change_threshold
            ));
        }
        if d.cadence_seconds <= 0 {
            errors.push(format!("detection.cadence_seconds must be > 0, got {}", d.cadence_seconds));
        }
        if d.confirm_window_minutes <= 0 {
            errors.push(format!(
                "detection.confirm_window_minutes must be > 0, got {}",
                d.confirm_window_minutes
            ));
        } else if d.cadence_seconds > 0 && (d.confirm_window_minutes * 60) % d.cadence_seconds != 0 {
            errors.push(format!(
                "detection.confirm_window_minutes ({}) must be a multiple of cadence_seconds ({}s)",
                d.confirm_window_minutes, d.cadence_seconds
            ));
        }

        let w = &self.window;
        for (key, hours) in [
            ("window.before_shock_hours", w.before_shock_hours),
            ("window.after_shock_hours", w.after_shock_hours),
        ] {
            if hours <= 0 || hours > defaults::MAX_WINDOW_HOURS {
                errors.push(format!(
                    "{key} must be in 1..={}, got {hours}",
                    defaults::MAX_WINDOW_HOURS
                ));
            }
        }
        if let Err(e) = w.satellite.parse::<SourceSelector>() {
            errors.push(format!("window.satellite: {e}"));
        }

        let s = &self.sources;
        if !defaults::GOES_SATELLITES.contains(&s.goes_satellite.as_str()) {
            errors.push(format!(
                "sources.goes_satellite '{}' must be one of {:?}",
                s.goes_satellite,
                defaults::GOES_SATELLITES
            ));
        }
        for (key, url) in [
            ("sources.ace_base_url", &s.ace_base_url),
            ("sources.dscovr_base_url", &s.dscovr_base_url),
            ("sources.goes_base_url", &s.goes_base_url),
            ("sources.kp_url", &s.kp_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{key} must be an http(s) URL, got '{url}'"));
            }
        }

        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs must be > 0".to_string());
        }
        if self.cache.capacity == 0 {
            errors.push("cache.capacity must be > 0".to_string());
        }

        for w in super::validation::validate_suspicious_values(self) {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Detection Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum `bt` increase between consecutive samples (nT).
    #[serde(default = "default_diff_threshold")]
    pub diff_threshold: f64,

    /// Minimum `bt` increase relative to the previous sample (percent).
    #[serde(default = "default_pct_change_threshold")]
    pub pct_change_threshold: f64,

    /// Rolling-mean width used to confirm a candidate (minutes).
    #[serde(default = "default_confirm_window")]
    pub confirm_window_minutes: i64,

    /// Expected sample spacing (seconds).
    #[serde(default = "default_cadence")]
    pub cadence_seconds: i64,
}

fn default_diff_threshold() -> f64 { defaults::DIFF_THRESHOLD }
fn default_pct_change_threshold() -> f64 { defaults::PCT_CHANGE_THRESHOLD }
fn default_confirm_window() -> i64 { defaults::CONFIRM_WINDOW_MINUTES }
fn default_cadence() -> i64 { defaults::CADENCE_SECS }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            diff_threshold: default_diff_threshold(),
            pct_change_threshold: default_pct_change_threshold(),
            confirm_window_minutes: default_confirm_window(),
            cadence_seconds: default_cadence(),
        }
    }
}

// ============================================================================
// Window Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_before_shock")]
    pub before_shock_hours: i64,

    #[serde(default = "default_after_shock")]
    pub after_shock_hours: i64,

    /// `ace`, `dscovr`, `goes`, `both` or `a+b`
    #[serde(default = "default_satellite")]
    pub satellite: String,
}

fn default_before_shock() -> i64 { defaults::BEFORE_SHOCK_HOURS }
fn default_after_shock() -> i64 { defaults::AFTER_SHOCK_HOURS }
fn default_satellite() -> String { defaults::SATELLITE_SELECTOR.to_string() }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            before_shock_hours: default_before_shock(),
            after_shock_hours: default_after_shock(),
            satellite: default_satellite(),
        }
    }
}

// ============================================================================
// Sources Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_ace_url")]
    pub ace_base_url: String,

    #[serde(default = "default_dscovr_url")]
    pub dscovr_base_url: String,

    #[serde(default = "default_goes_url")]
    pub goes_base_url: String,

    /// `goes16`, `goes17` or `goes18`
    #[serde(default = "default_goes_satellite")]
    pub goes_satellite: String,

    #[serde(default = "default_kp_url")]
    pub kp_url: String,
}

fn default_ace_url() -> String { defaults::ACE_BASE_URL.to_string() }
fn default_dscovr_url() -> String { defaults::DSCOVR_BASE_URL.to_string() }
fn default_goes_url() -> String { defaults::GOES_BASE_URL.to_string() }
fn default_goes_satellite() -> String { defaults::GOES_SATELLITE.to_string() }
fn default_kp_url() -> String { defaults::KP_URL.to_string() }

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ace_base_url: default_ace_url(),
            dscovr_base_url: default_dscovr_url(),
            goes_base_url: default_goes_url(),
            goes_satellite: default_goes_satellite(),
            kp_url: default_kp_url(),
        }
    }
}

// ============================================================================
// HTTP Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 { defaults::HTTP_TIMEOUT_SECS }
fn default_user_agent() -> String { defaults::USER_AGENT.to_string() }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

// ============================================================================
// Cache Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached `(day, satellite)` fetches.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize { defaults::CACHE_CAPACITY }

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}
