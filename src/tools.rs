//! # External Tools
//!
//! Feature detection, linking and decharging run outside this crate. They are
//! modelled as synchronous calls behind three traits; a failure is surfaced
//! as [`ToolExecutionError`] and never retried.
//!
//! The file-backed implementations replay results that were produced ahead of
//! time (featureXML per sample, one consensusXML, one decharge document per
//! charge bound).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::AdductCandidate;
use crate::io::{read_consensus_xml, read_decharge_outcome, read_feature_xml, XmlReadError};
use crate::model::{ConsensusMap, DechargeOutcome, FeatureMap, FileId, SampleFile};

/// Errors raised by external tool invocations
#[derive(Debug, thiserror::Error)]
pub enum ToolExecutionError {
    /// The tool reported a failure
    #[error("{tool} failed: {message}")]
    Failed {
        /// Tool name
        tool: &'static str,
        /// Failure description
        message: String,
    },

    /// No result is available for the requested input
    #[error("{tool} has no result for {input}")]
    MissingResult {
        /// Tool name
        tool: &'static str,
        /// Input description
        input: String,
    },

    /// The result file could not be read
    #[error("{tool} result could not be read: {source}")]
    UnreadableResult {
        /// Tool name
        tool: &'static str,
        /// Reader error
        #[source]
        source: XmlReadError,
    },
}

/// Parameters handed to the feature detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    /// Mass tolerance in ppm
    pub mass_tolerance_ppm: f64,
    /// Intensity below which centroids are ignored
    pub noise_threshold: f64,
}

/// Parameters handed to the feature linker
#[derive(Debug, Clone, PartialEq)]
pub struct LinkingSettings {
    /// Whether maps are aligned before linking
    pub map_alignment: bool,
    /// Maximum retention time difference in minutes
    pub rt_threshold: f64,
    /// Maximum m/z difference in ppm
    pub mz_threshold_ppm: f64,
}

/// Parameters handed to the decharger for every iteration
#[derive(Debug, Clone, PartialEq)]
pub struct DechargeSettings {
    /// Candidate adducts with priors
    pub adducts: Vec<AdductCandidate>,
    /// Maximum mass difference in Th for an adduct match
    pub mass_max_diff: f64,
    /// Maximum retention time difference in minutes for an adduct pair
    pub rt_max_diff: f64,
}

/// Produces the raw features of one sample
pub trait FeatureDetector {
    /// Detect features in `sample`
    fn detect(
        &mut self,
        sample: &SampleFile,
        settings: &DetectionSettings,
    ) -> Result<FeatureMap, ToolExecutionError>;
}

/// Groups equivalent features across samples
pub trait FeatureLinker {
    /// Link the feature maps; the map list of the result is positional
    fn link(
        &mut self,
        maps: &[FeatureMap],
        settings: &LinkingSettings,
    ) -> Result<ConsensusMap, ToolExecutionError>;
}

/// Assigns charges and adducts to consensus groups.
///
/// Implementations must keep compound labels stable when a group is fed back
/// in a later iteration.
pub trait Decharger {
    /// Decharge `consensus` allowing charges up to `max_charge`
    fn decharge(
        &mut self,
        consensus: &ConsensusMap,
        max_charge: u32,
        settings: &DechargeSettings,
    ) -> Result<DechargeOutcome, ToolExecutionError>;
}

/// Detector replaying one featureXML result per sample
#[derive(Debug, Default, Clone)]
pub struct FeatureXmlDetector {
    results: HashMap<FileId, PathBuf>,
}

impl FeatureXmlDetector {
    /// Create an empty detector
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the featureXML result of a sample
    pub fn with_result(mut self, file: FileId, path: impl Into<PathBuf>) -> Self {
        self.results.insert(file, path.into());
        self
    }

    /// Register a result in place
    pub fn insert(&mut self, file: FileId, path: impl Into<PathBuf>) {
        self.results.insert(file, path.into());
    }
}

impl FeatureDetector for FeatureXmlDetector {
    fn detect(
        &mut self,
        sample: &SampleFile,
        settings: &DetectionSettings,
    ) -> Result<FeatureMap, ToolExecutionError> {
        let path = self
            .results
            .get(&sample.id)
            .ok_or_else(|| ToolExecutionError::MissingResult {
                tool: "feature detector",
                input: sample.display_name(),
            })?;
        debug!(
            "Replaying detection for {} from {} (noise threshold {})",
            sample.display_name(),
            path.display(),
            settings.noise_threshold
        );
        read_feature_xml(path).map_err(|source| ToolExecutionError::UnreadableResult {
            tool: "feature detector",
            source,
        })
    }
}

/// Linker replaying a consensusXML result
#[derive(Debug, Clone)]
pub struct ConsensusXmlLinker {
    path: PathBuf,
}

impl ConsensusXmlLinker {
    /// Create a linker reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the recorded result
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureLinker for ConsensusXmlLinker {
    fn link(
        &mut self,
        maps: &[FeatureMap],
        settings: &LinkingSettings,
    ) -> Result<ConsensusMap, ToolExecutionError> {
        debug!(
            "Replaying linking of {} maps from {} (alignment {}, rt {} min, mz {} ppm)",
            maps.len(),
            self.path.display(),
            settings.map_alignment,
            settings.rt_threshold,
            settings.mz_threshold_ppm
        );
        read_consensus_xml(&self.path).map_err(|source| ToolExecutionError::UnreadableResult {
            tool: "feature linker",
            source,
        })
    }
}

/// Decharger replaying one recorded result per charge bound
#[derive(Debug, Default, Clone)]
pub struct RecordedDecharger {
    files: BTreeMap<u32, PathBuf>,
    outcomes: BTreeMap<u32, DechargeOutcome>,
}

impl RecordedDecharger {
    /// Create a decharger without recorded results
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the result document of one charge bound
    pub fn with_file(mut self, max_charge: u32, path: impl Into<PathBuf>) -> Self {
        self.files.insert(max_charge, path.into());
        self
    }

    /// Register an in-memory result of one charge bound
    pub fn with_outcome(mut self, max_charge: u32, outcome: DechargeOutcome) -> Self {
        self.outcomes.insert(max_charge, outcome);
        self
    }

    /// Whether any result is recorded
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.outcomes.is_empty()
    }
}

impl Decharger for RecordedDecharger {
    fn decharge(
        &mut self,
        consensus: &ConsensusMap,
        max_charge: u32,
        settings: &DechargeSettings,
    ) -> Result<DechargeOutcome, ToolExecutionError> {
        debug!(
            "Replaying decharging of {} groups at charge bound {} ({} adducts)",
            consensus.groups.len(),
            max_charge,
            settings.adducts.len()
        );

        if let Some(outcome) = self.outcomes.get(&max_charge) {
            return Ok(outcome.clone());
        }

        match self.files.get(&max_charge) {
            Some(path) => {
                info!("Reading decharge result {}", path.display());
                read_decharge_outcome(path).map_err(|source| {
                    ToolExecutionError::UnreadableResult {
                        tool: "decharger",
                        source,
                    }
                })
            }
            None => {
                warn!(
                    "No decharge result recorded for charge bound {}, groups pass through",
                    max_charge
                );
                Ok(DechargeOutcome {
                    consensus: consensus.clone(),
                    pairs: Vec::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Polarity;

    fn decharge_settings() -> DechargeSettings {
        DechargeSettings {
            adducts: Vec::new(),
            mass_max_diff: 0.001,
            rt_max_diff: 1.0,
        }
    }

    #[test]
    fn test_detector_without_result() {
        let mut detector = FeatureXmlDetector::new();
        let sample = SampleFile::new(FileId(1), "a.raw", Polarity::Positive);
        let settings = DetectionSettings {
            mass_tolerance_ppm: 5.0,
            noise_threshold: 1000.0,
        };
        assert!(matches!(
            detector.detect(&sample, &settings),
            Err(ToolExecutionError::MissingResult { .. })
        ));
    }

    #[test]
    fn test_detector_reads_feature_xml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.featureXML");
        std::fs::write(
            &path,
            r#"<featureMap><featureList count="1"><feature id="f_5"><position dim="0">60</position><position dim="1">100</position></feature></featureList></featureMap>"#,
        )
        .unwrap();

        let mut detector = FeatureXmlDetector::new().with_result(FileId(1), &path);
        let sample = SampleFile::new(FileId(1), "a.raw", Polarity::Positive);
        let settings = DetectionSettings {
            mass_tolerance_ppm: 5.0,
            noise_threshold: 1000.0,
        };
        let map = detector.detect(&sample, &settings).unwrap();
        assert_eq!(map.features.len(), 1);
        assert_eq!(map.features[0].id, 5);
    }

    #[test]
    fn test_unreadable_result_surfaces_as_tool_error() {
        let mut linker = ConsensusXmlLinker::new("/nonexistent/result.consensusXML");
        let settings = LinkingSettings {
            map_alignment: true,
            rt_threshold: 0.33,
            mz_threshold_ppm: 10.0,
        };
        assert!(matches!(
            linker.link(&[], &settings),
            Err(ToolExecutionError::UnreadableResult { .. })
        ));
    }

    #[test]
    fn test_recorded_decharger_passes_through_missing_bound() {
        let mut decharger = RecordedDecharger::new();
        let input = ConsensusMap::default();
        let outcome = decharger.decharge(&input, 2, &decharge_settings()).unwrap();
        assert_eq!(outcome.consensus, input);
        assert!(outcome.pairs.is_empty());
    }
}
