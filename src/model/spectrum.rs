use serde::{Deserialize, Serialize};

use super::{FileId, Polarity, SpectrumId};

/// Acquisition settings of a scan, shared by all scans of the same event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// MS level (1, 2, ...)
    pub ms_level: u8,
    /// Scan polarity
    pub polarity: Polarity,
    /// Ionization source, e.g. "electrospray ionization"
    pub ionization_source: Option<String>,
    /// Mass analyzer, e.g. "orbitrap"
    pub mass_analyzer: Option<String>,
    /// Scan type or filter string
    pub scan_type: Option<String>,
    /// Scan window lower / upper m/z
    pub mass_range: Option<(f64, f64)>,
    /// Resolution at m/z 200
    pub resolution_at_200: Option<f64>,
    /// Activation type (MS2+)
    pub activation: Option<String>,
    /// Activation energy (MS2+)
    pub activation_energy: Option<f64>,
    /// Isolation window width (MS2+)
    pub isolation_width: Option<f64>,
}

/// Precursor selected for an MSn scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Precursor {
    /// Selected ion m/z
    pub mz: f64,
    /// Selected ion charge, if reported
    pub charge: Option<i32>,
}

/// Spectrum metadata without peak data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumHeader {
    /// Spectrum identifier
    pub id: SpectrumId,
    /// Owning file
    pub file: FileId,
    /// Retention time in minutes
    pub retention_time: f64,
    /// Scan event settings
    pub scan_event: ScanEvent,
    /// Precursor for MSn scans
    pub precursor: Option<Precursor>,
}

impl SpectrumHeader {
    /// Whether this is a survey (MS1) scan
    pub fn is_ms1(&self) -> bool {
        self.scan_event.ms_level == 1
    }
}

/// Spectrum with centroid data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Header
    pub header: SpectrumHeader,
    /// m/z values
    pub mz: Vec<f64>,
    /// Intensities, parallel to `mz`
    pub intensity: Vec<f32>,
}

impl Spectrum {
    /// Summed intensity of all centroids with `low <= mz <= high`
    pub fn intensity_in_window(&self, low: f64, high: f64) -> f64 {
        self.mz
            .iter()
            .zip(&self.intensity)
            .filter(|(&mz, _)| mz >= low && mz <= high)
            .fold(0.0, |acc, (_, &i)| acc + i as f64)
    }
}
