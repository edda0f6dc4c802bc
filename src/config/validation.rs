//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `StormConfig`.
///
/// Any new field added to `StormConfig` must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [detection]
        "detection",
        "detection.diff_threshold",
        "detection.pct_change_threshold",
        "detection.confirm_window_minutes",
        "detection.cadence_seconds",
        // [window]
        "window",
        "window.before_shock_hours",
        "window.after_shock_hours",
        "window.satellite",
        // [sources]
        "sources",
        "sources.ace_base_url",
        "sources.dscovr_base_url",
        "sources.goes_base_url",
        "sources.goes_satellite",
        "sources.kp_url",
        // [http]
        "http",
        "http.timeout_secs",
        "http.user_agent",
        // [cache]
        "cache",
        "cache.capacity",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        // tie-break on the key so the suggestion is stable across runs
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys. Parse errors are left to serde.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Plausibility Checks
// ============================================================================

/// Values that are legal but unlikely to be what the operator meant.
pub fn validate_suspicious_values(config: &super::StormConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let d = &config.detection;

    if d.diff_threshold <= 0.0 {
        warnings.push(ValidationWarning {
            field: "detection.diff_threshold".to_string(),
            message: format!(
                "diff_threshold = {:.2} nT accepts every increase as a candidate",
                d.diff_threshold
            ),
            suggestion: None,
        });
    }
    if d.pct_change_threshold > 1000.0 {
        warnings.push(ValidationWarning {
            field: "detection.pct_change_threshold".to_string(),
            message: format!(
                "pct_change_threshold = {:.0}% is far above typical shock jumps (50-200%)",
                d.pct_change_threshold
            ),
            suggestion: None,
        });
    }
    if d.confirm_window_minutes > 180 {
        warnings.push(ValidationWarning {
            field: "detection.confirm_window_minutes".to_string(),
            message: format!(
                "confirm_window_minutes = {} smooths over several hours",
                d.confirm_window_minutes
            ),
            suggestion: None,
        });
    }

    let w = &config.window;
    if w.before_shock_hours > 72 || w.after_shock_hours > 168 {
        warnings.push(ValidationWarning {
            field: "window".to_string(),
            message: format!(
                "window of -{}h/+{}h fetches a large scan range",
                w.before_shock_hours, w.after_shock_hours
            ),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
