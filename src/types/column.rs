//! Canonical solar-wind columns

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::SolarWindSample;

/// One of the seven canonical measurement columns.
///
/// Every source adapter maps its native variable names onto these, so the
/// reconciler and shock detector never see source-specific naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    /// Total field magnitude (nT)
    Bt,
    /// Field X component (nT, GSM for ACE and DSCOVR, EPN for GOES)
    Bx,
    /// Field Y component (nT)
    By,
    /// Field Z component (nT)
    Bz,
    /// Proton density (p/cc)
    Density,
    /// Bulk speed (km/s)
    Speed,
    /// Ion temperature (K)
    Temperature,
}

impl Column {
    /// All canonical columns, in output order.
    pub const ALL: [Self; 7] = [
        Self::Bt,
        Self::Bx,
        Self::By,
        Self::Bz,
        Self::Density,
        Self::Speed,
        Self::Temperature,
    ];

    /// Magnetometer columns only.
    pub const MAGNETIC: [Self; 4] = [Self::Bt, Self::Bx, Self::By, Self::Bz];

    /// Plasma columns only.
    pub const PLASMA: [Self; 3] = [Self::Density, Self::Speed, Self::Temperature];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bt => "bt",
            Self::Bx => "bx",
            Self::By => "by",
            Self::Bz => "bz",
            Self::Density => "density",
            Self::Speed => "speed",
            Self::Temperature => "temperature",
        }
    }

    /// Read this column from a sample.
    pub fn get(self, sample: &SolarWindSample) -> Option<f64> {
        match self {
            Self::Bt => sample.bt,
            Self::Bx => sample.bx,
            Self::By => sample.by,
            Self::Bz => sample.bz,
            Self::Density => sample.density,
            Self::Speed => sample.speed,
            Self::Temperature => sample.temperature,
        }
    }

    /// Write this column on a sample.
    pub fn set(self, sample: &mut SolarWindSample, value: Option<f64>) {
        let slot = match self {
            Self::Bt => &mut sample.bt,
            Self::Bx => &mut sample.bx,
            Self::By => &mut sample.by,
            Self::Bz => &mut sample.bz,
            Self::Density => &mut sample.density,
            Self::Speed => &mut sample.speed,
            Self::Temperature => &mut sample.temperature,
        };
        *slot = value;
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown column: '{s}'"))
    }
}
