//! Run summary written next to the result records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cascade::EvidenceTier;
use crate::ions::MalformedFeatureError;
use crate::model::FileId;

/// A detector feature dropped during import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedFeature {
    /// Owning file
    pub file: FileId,
    /// Detector-assigned id
    pub feature: u64,
    /// Reason the feature was dropped
    pub reason: String,
}

impl From<&MalformedFeatureError> for RejectedFeature {
    fn from(e: &MalformedFeatureError) -> Self {
        let feature = e.feature();
        Self {
            file: feature.file,
            feature: feature.local_id,
            reason: e.to_string(),
        }
    }
}

/// Counts and problems of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Start of the run
    pub started_at: DateTime<Utc>,
    /// End of the run
    pub finished_at: DateTime<Utc>,
    /// Input sample files
    pub files: usize,
    /// Valid raw features over all files
    pub raw_features: usize,
    /// Features dropped as malformed
    pub rejected_features: Vec<RejectedFeature>,
    /// Consensus groups reported by the linker
    pub consensus_groups: usize,
    /// Singleton groups created for unlinked features
    pub synthetic_groups: usize,
    /// Groups locked by the decharger
    pub decharged_groups: usize,
    /// Decharger invocations
    pub decharge_iterations: u32,
    /// Features per deciding evidence tier
    pub resolution_tiers: BTreeMap<EvidenceTier, usize>,
    /// Feature ions
    pub ions: usize,
    /// Chromatogram peaks
    pub peaks: usize,
    /// Compounds
    pub compounds: usize,
    /// Retention time rasters
    pub rasters: usize,
    /// XIC traces
    pub traces: usize,
    /// Peaks with a spectral tree assignment
    pub spectral_trees: usize,
    /// Distinct spectra referenced by spectral trees
    pub assigned_spectra: usize,
    /// Files whose spectral tree stage failed for lack of MS1 scans
    pub missing_ms1: Vec<FileId>,
}

impl RunSummary {
    /// Empty summary for a run starting now
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            files: 0,
            raw_features: 0,
            rejected_features: Vec::new(),
            consensus_groups: 0,
            synthetic_groups: 0,
            decharged_groups: 0,
            decharge_iterations: 0,
            resolution_tiers: BTreeMap::new(),
            ions: 0,
            peaks: 0,
            compounds: 0,
            rasters: 0,
            traces: 0,
            spectral_trees: 0,
            assigned_spectra: 0,
            missing_ms1: Vec::new(),
        }
    }

    /// Stamp the end time
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Wall clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run {}: {} files, {} ions ({} rejected features), {} compounds, {} traces, {} spectral trees",
            self.run_id,
            self.files,
            self.ions,
            self.rejected_features.len(),
            self.compounds,
            self.traces,
            self.spectral_trees
        )
    }
}
