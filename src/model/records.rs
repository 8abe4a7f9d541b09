//! Output records with stable identifiers for persistence by a host.

use serde::{Deserialize, Serialize};

use super::{
    CompoundId, CompoundKey, ConsensusId, FeatureRef, FileId, IonId, PeakId, RasterId,
    ScanEvent, SpectrumId, TraceId,
};

/// Adduct description of an ion whose adduct was not resolved
pub const UNKNOWN_ADDUCT: &str = "unknown";

/// Resolved ion, one per raw feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureIon {
    /// Ion identifier
    pub id: IonId,
    /// Owning file
    pub file: FileId,
    /// Source raw feature
    pub feature: FeatureRef,
    /// Consensus group of the source feature
    pub consensus: ConsensusId,
    /// Feature mass
    pub mass: f64,
    /// Retention time in minutes
    pub retention_time: f64,
    /// Final charge after the cascade (may be 0)
    pub charge: i32,
    /// Final adduct description, `unknown` if unresolved
    pub adduct: String,
    /// Sum of isotope peak intensities
    pub area: f64,
    /// Number of isotope peaks
    pub isotope_count: usize,
    /// Isotope peaks in isotope order
    pub peaks: Vec<PeakId>,
}

/// Chromatographic peak of one isotope trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromatogramPeak {
    /// Peak identifier
    pub id: PeakId,
    /// Owning ion
    pub ion: IonId,
    /// Owning file
    pub file: FileId,
    /// Isotope index, 0 = monoisotopic
    pub isotope: usize,
    /// Centroid mass
    pub mass: f64,
    /// Apex retention time (minutes)
    pub apex_rt: f64,
    /// Left retention time bound (minutes)
    pub left_rt: f64,
    /// Right retention time bound (minutes)
    pub right_rt: f64,
    /// Summed intensity
    pub area: f64,
}

/// Ions of one neutral compound across samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    /// Compound identifier
    pub id: CompoundId,
    /// Decharger label the compound was built from
    pub key: CompoundKey,
    /// Area-weighted mass of the member ions
    pub mass: f64,
    /// Area-weighted retention time of the member ions (minutes)
    pub retention_time: f64,
    /// Total area of the member ions
    pub area: f64,
    /// Number of distinct adduct relationships recorded for the compound
    pub adduct_count: usize,
    /// Consensus groups assigned to the compound
    pub groups: Vec<ConsensusId>,
    /// Member ions
    pub ions: Vec<IonId>,
}

/// One sample of a trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// Spectrum the point was taken from
    pub spectrum: SpectrumId,
    /// Retention time in minutes
    pub time: f64,
    /// Intensity within the mass window
    pub intensity: f64,
}

/// Extracted ion chromatogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XicTrace {
    /// Trace identifier
    pub id: TraceId,
    /// Owning file
    pub file: FileId,
    /// Ion the trace belongs to
    pub ion: IonId,
    /// Isotope peak, `None` for the summed ion trace
    pub peak: Option<PeakId>,
    /// Isotope index, `None` for the summed ion trace
    pub isotope: Option<usize>,
    /// Raster the trace was sampled on
    pub raster: RasterId,
    /// Points in retention time order
    pub points: Vec<TracePoint>,
}

/// Ordered MS1 retention times of one file plus acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionTimeRaster {
    /// Raster identifier
    pub id: RasterId,
    /// Owning file
    pub file: FileId,
    /// Settings of the first qualifying MS1 scan event
    pub scan_event: ScanEvent,
    /// MS1 retention times in minutes
    pub times: Vec<f64>,
    /// MS1 spectra the times were taken from
    pub spectra: Vec<SpectrumId>,
}

impl RetentionTimeRaster {
    /// Number of MS1 scans in the raster
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the raster holds no scans
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// MS1 scan with its matching MS2 scans
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectralTree {
    /// Survey scan closest to the peak apex
    pub ms1: Option<SpectrumId>,
    /// Data dependent scans matching the peak
    pub ms2: Vec<SpectrumId>,
}

impl SpectralTree {
    /// Tree without any node
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.ms1.is_none() && self.ms2.is_empty()
    }

    /// All spectra of the tree, MS1 first
    pub fn spectra(&self) -> impl Iterator<Item = SpectrumId> + '_ {
        self.ms1.iter().copied().chain(self.ms2.iter().copied())
    }
}

/// Spectral tree attached to a chromatogram peak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectralTreeAssignment {
    /// Peak the tree belongs to
    pub peak: PeakId,
    /// The tree
    pub tree: SpectralTree,
}
