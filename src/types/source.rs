//! Satellite sources and source selection

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Satellite a canonical series can be fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Satellite {
    Ace,
    Dscovr,
    Goes,
}

impl Satellite {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ace => "ace",
            Self::Dscovr => "dscovr",
            Self::Goes => "goes",
        }
    }
}

impl std::fmt::Display for Satellite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Satellite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ace" => Ok(Self::Ace),
            "dscovr" => Ok(Self::Dscovr),
            "goes" => Ok(Self::Goes),
            other => Err(format!("Invalid satellite: '{other}'")),
        }
    }
}

/// Which source(s) feed one day of the scanned series.
///
/// `Combined` fetches both satellites for each day and reconciles them with
/// the first one as the anchor (its timestamps define the output rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceSelector {
    Single(Satellite),
    Combined(Satellite, Satellite),
}

impl SourceSelector {
    /// ACE anchored, DSCOVR averaged in.
    pub const BOTH: Self = Self::Combined(Satellite::Ace, Satellite::Dscovr);

    /// Reject selectors that cannot be served.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Self::Combined(a, b) if a == b => Err(format!(
                "Combined source selector needs two different satellites, got {a}+{b}"
            )),
            _ => Ok(()),
        }
    }
}

impl Default for SourceSelector {
    fn default() -> Self {
        Self::BOTH
    }
}

impl std::fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(s) => write!(f, "{s}"),
            Self::Combined(a, b) => write!(f, "{a}+{b}"),
        }
    }
}

impl FromStr for SourceSelector {
    type Err = String;

    /// Accepts `ace`, `dscovr`, `goes`, `both` (ACE + DSCOVR) or `a+b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "both" {
            return Ok(Self::BOTH);
        }
        let selector = match s.split_once('+') {
            Some((a, b)) => Self::Combined(a.parse()?, b.parse()?),
            None => Self::Single(s.parse()?),
        };
        selector.validate()?;
        Ok(selector)
    }
}
