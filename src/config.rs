//! Reconciliation parameters.
//!
//! All tolerances used by the pipeline and the parameters forwarded to the
//! external tools live in [`ReconcileConfig`]. The struct deserializes from
//! the `[reconcile]` table of a run manifest; missing keys take defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::tools::{DechargeSettings, DetectionSettings, LinkingSettings};

/// Lowest accepted mass tolerance in ppm
pub const MIN_MASS_TOLERANCE_PPM: f64 = 0.2;
/// Highest accepted mass tolerance in ppm
pub const MAX_MASS_TOLERANCE_PPM: f64 = 100.0;

/// Errors raised by configuration validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric parameter is outside its accepted range
    #[error("{name} = {value} is out of range ({expected})")]
    OutOfRange {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: f64,
        /// Accepted range
        expected: &'static str,
    },

    /// An adduct candidate could not be parsed
    #[error("Invalid adduct candidate '{0}', expected Element:Charge:Probability")]
    InvalidAdduct(String),
}

/// Candidate adduct for the decharger, written as `Element:Charge:Probability`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AdductCandidate {
    /// Sum formula added (or removed) by the adduct
    pub formula: String,
    /// Charge carried by the adduct
    pub charge: i32,
    /// Prior probability
    pub probability: f64,
}

impl FromStr for AdductCandidate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAdduct(s.to_string());
        let mut parts = s.split(':').map(str::trim);
        let (Some(formula), Some(charge), Some(probability), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if formula.is_empty() {
            return Err(invalid());
        }

        let charge = if !charge.is_empty() && charge.chars().all(|c| c == '+') {
            charge.len() as i32
        } else if !charge.is_empty() && charge.chars().all(|c| c == '-') {
            -(charge.len() as i32)
        } else {
            charge.parse::<i32>().map_err(|_| invalid())?
        };

        let probability: f64 = probability.parse().map_err(|_| invalid())?;
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(invalid());
        }

        Ok(Self {
            formula: formula.to_string(),
            charge,
            probability,
        })
    }
}

impl fmt::Display for AdductCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let charge = match self.charge {
            0 => "0".to_string(),
            c if c > 0 => "+".repeat(c as usize),
            c => "-".repeat(c.unsigned_abs() as usize),
        };
        write!(f, "{}:{}:{}", self.formula, charge, self.probability)
    }
}

impl TryFrom<String> for AdductCandidate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AdductCandidate> for String {
    fn from(value: AdductCandidate) -> Self {
        value.to_string()
    }
}

fn default_adducts() -> Vec<AdductCandidate> {
    [
        ("H", 1, 0.6),
        ("Na", 1, 0.2),
        ("NH4", 1, 0.1),
        ("K", 1, 0.1),
    ]
    .into_iter()
    .map(|(formula, charge, probability)| AdductCandidate {
        formula: formula.to_string(),
        charge,
        probability,
    })
    .collect()
}

/// Parameters of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Mass tolerance in ppm for XIC windows and precursor matching
    pub mass_tolerance_ppm: f64,
    /// Intensity threshold forwarded to the detector
    pub noise_threshold: f64,
    /// Whether the linker aligns maps before linking
    pub map_alignment: bool,
    /// Retention time linking tolerance in minutes
    pub rt_threshold: f64,
    /// m/z linking tolerance in ppm
    pub mz_threshold_ppm: f64,
    /// Minimum number of distinct files a group must link to be decharged
    pub min_linked_samples: usize,
    /// Highest charge bound of the decharging schedule
    pub max_charge: u32,
    /// Adduct candidates with priors
    pub adducts: Vec<AdductCandidate>,
    /// Maximum mass difference in Th for an adduct match
    pub mass_max_diff: f64,
    /// Maximum retention time difference in minutes between adducts
    pub rt_max_diff: f64,
    /// Spectra per retrieval batch
    pub spectrum_batch_size: usize,
    /// Maximum sample / control area ratio, 0 disables the check
    pub max_sample_to_control: f64,
    /// Maximum control / sample area ratio, 0 disables the check
    pub max_control_to_sample: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            mass_tolerance_ppm: 5.0,
            noise_threshold: 1000.0,
            map_alignment: true,
            rt_threshold: 0.33,
            mz_threshold_ppm: 10.0,
            min_linked_samples: 3,
            max_charge: 3,
            adducts: default_adducts(),
            mass_max_diff: 0.05,
            rt_max_diff: 1.0,
            spectrum_batch_size: 1000,
            max_sample_to_control: 0.0,
            max_control_to_sample: 0.0,
        }
    }
}

impl ReconcileConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_MASS_TOLERANCE_PPM..=MAX_MASS_TOLERANCE_PPM).contains(&self.mass_tolerance_ppm) {
            return Err(ConfigError::OutOfRange {
                name: "mass_tolerance_ppm",
                value: self.mass_tolerance_ppm,
                expected: "0.2 to 100 ppm",
            });
        }
        let non_negative = [
            ("noise_threshold", self.noise_threshold),
            ("rt_threshold", self.rt_threshold),
            ("mz_threshold_ppm", self.mz_threshold_ppm),
            ("mass_max_diff", self.mass_max_diff),
            ("rt_max_diff", self.rt_max_diff),
            ("max_sample_to_control", self.max_sample_to_control),
            ("max_control_to_sample", self.max_control_to_sample),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value,
                    expected: ">= 0",
                });
            }
        }
        if self.max_charge == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_charge",
                value: 0.0,
                expected: ">= 1",
            });
        }
        if self.spectrum_batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                name: "spectrum_batch_size",
                value: 0.0,
                expected: ">= 1",
            });
        }
        Ok(())
    }

    /// Detector parameters
    pub fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings {
            mass_tolerance_ppm: self.mass_tolerance_ppm,
            noise_threshold: self.noise_threshold,
        }
    }

    /// Linker parameters
    pub fn linking_settings(&self) -> LinkingSettings {
        LinkingSettings {
            map_alignment: self.map_alignment,
            rt_threshold: self.rt_threshold,
            mz_threshold_ppm: self.mz_threshold_ppm,
        }
    }

    /// Decharger parameters
    pub fn decharge_settings(&self) -> DechargeSettings {
        DechargeSettings {
            adducts: self.adducts.clone(),
            mass_max_diff: self.mass_max_diff,
            rt_max_diff: self.rt_max_diff,
        }
    }
}
