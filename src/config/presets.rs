// src/config/presets.rs
//
// Named frequency-band sets.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::params::FrequencyBand;
use crate::error::{ElecPhysError, Result};

/// Preset band sets for common analyses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandPreset {
    /// delta, theta, alpha, beta, gamma
    #[default]
    Canonical,
    /// Slow rhythms split finer (slow oscillations through sigma)
    LowFrequency,
    /// Gamma split into low, high and ripple ranges
    HighGamma,
}

impl BandPreset {
    pub fn all() -> Vec<Self> {
        vec![Self::Canonical, Self::LowFrequency, Self::HighGamma]
    }

    pub fn bands(&self) -> Vec<FrequencyBand> {
        let table: &[(&str, f64, f64)] = match self {
            Self::Canonical => &[
                ("delta", 0.5, 4.0),
                ("theta", 4.0, 8.0),
                ("alpha", 8.0, 13.0),
                ("beta", 13.0, 30.0),
                ("gamma", 30.0, 80.0),
            ],
            Self::LowFrequency => &[
                ("slow", 0.1, 1.0),
                ("delta", 1.0, 4.0),
                ("theta", 4.0, 8.0),
                ("alpha", 8.0, 12.0),
                ("sigma", 12.0, 16.0),
            ],
            Self::HighGamma => &[
                ("low-gamma", 30.0, 60.0),
                ("high-gamma", 60.0, 150.0),
                ("ripple", 150.0, 250.0),
            ],
        };
        table
            .iter()
            .map(|&(label, low, high)| FrequencyBand {
                label: label.to_string(),
                low,
                high,
            })
            .collect()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Canonical => "Canonical EEG bands (0.5-80 Hz)",
            Self::LowFrequency => "Slow-wave and spindle ranges (0.1-16 Hz)",
            Self::HighGamma => "Gamma and ripple ranges (30-250 Hz)",
        }
    }
}

impl FromStr for BandPreset {
    type Err = ElecPhysError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "canonical" | "eeg" => Ok(Self::Canonical),
            "low-frequency" | "low" | "slow" => Ok(Self::LowFrequency),
            "high-gamma" | "gamma" => Ok(Self::HighGamma),
            other => Err(ElecPhysError::validation(format!("unknown band preset '{}'", other))),
        }
    }
}
