//! Component peaks and control-file comparison.
//!
//! Every feature ion becomes one component peak positioned at the centroid
//! of its consensus group. Ions of files that name a reference (control) file
//! are compared against the control ion of the same group.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::model::{ConsensusId, ConsensusMap, FeatureIon, FileId, IonId, SampleFile};

/// Outcome of comparing an ion against its control file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlStatus {
    /// The ion belongs to a control file and has area
    InControlSelf,
    /// The ion belongs to a control file but has no area
    NotInControlSelf,
    /// The ion's file has no control file
    NoControlAssigned,
    /// No matching control ion with area was found
    NotInControl,
    /// Area ratio within the configured fold limits
    InControl,
    /// Area ratio outside the configured fold limits
    Outside,
}

/// Consolidated view of one feature ion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPeak {
    /// Source ion
    pub ion: IonId,
    /// Owning file
    pub file: FileId,
    /// Consensus group of the ion
    pub consensus: ConsensusId,
    /// Consensus centroid mass
    pub mass: f64,
    /// Consensus centroid retention time (minutes)
    pub retention_time: f64,
    /// Ion area
    pub area: f64,
    /// Resolved adduct of the ion
    pub description: String,
    /// Control comparison status
    pub control: ControlStatus,
    /// Sample / control area ratio, when a control ion was matched
    pub ratio: Option<f64>,
}

/// Builds component peaks and evaluates the control comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Consolidator {
    /// Mass tolerance in ppm for matching the control ion
    pub tolerance_ppm: f64,
    /// Maximum sample / control ratio, 0 disables the check
    pub max_sample_to_control: f64,
    /// Maximum control / sample ratio, 0 disables the check
    pub max_control_to_sample: f64,
}

impl Consolidator {
    /// Create a consolidator
    pub fn new(tolerance_ppm: f64, max_sample_to_control: f64, max_control_to_sample: f64) -> Self {
        Self {
            tolerance_ppm,
            max_sample_to_control,
            max_control_to_sample,
        }
    }

    /// One component peak per ion, in ion order
    pub fn consolidate(
        &self,
        ions: &[FeatureIon],
        consensus: &ConsensusMap,
        samples: &[SampleFile],
    ) -> Vec<ComponentPeak> {
        let samples: HashMap<FileId, &SampleFile> = samples.iter().map(|s| (s.id, s)).collect();
        let centroids: HashMap<ConsensusId, (f64, f64)> = consensus
            .groups
            .iter()
            .map(|g| (g.id, (g.centroid_mz, g.centroid_rt)))
            .collect();

        let mut by_group: HashMap<ConsensusId, Vec<&FeatureIon>> = HashMap::new();
        for ion in ions {
            by_group.entry(ion.consensus).or_default().push(ion);
        }

        let peaks: Vec<ComponentPeak> = ions
            .iter()
            .map(|ion| {
                let (mass, retention_time) = centroids
                    .get(&ion.consensus)
                    .copied()
                    .unwrap_or((ion.mass, ion.retention_time));
                let group = by_group.get(&ion.consensus).map(Vec::as_slice).unwrap_or(&[]);
                let (control, ratio) = self.compare(ion, group, &samples);

                ComponentPeak {
                    ion: ion.id,
                    file: ion.file,
                    consensus: ion.consensus,
                    mass,
                    retention_time,
                    area: ion.area,
                    description: ion.adduct.clone(),
                    control,
                    ratio,
                }
            })
            .collect();

        info!(
            "Consolidated {} component peaks from {} consensus groups",
            peaks.len(),
            by_group.len()
        );
        peaks
    }

    /// Compare `ion` against the control ion among the members of its group
    fn compare(
        &self,
        ion: &FeatureIon,
        group: &[&FeatureIon],
        samples: &HashMap<FileId, &SampleFile>,
    ) -> (ControlStatus, Option<f64>) {
        let Some(sample) = samples.get(&ion.file) else {
            debug!("Ion {} belongs to unregistered file {}", ion.id, ion.file);
            return (ControlStatus::NoControlAssigned, None);
        };

        if sample.is_reference {
            let status = if ion.area == 0.0 {
                ControlStatus::NotInControlSelf
            } else {
                ControlStatus::InControlSelf
            };
            return (status, None);
        }

        let Some(reference) = sample.reference else {
            return (ControlStatus::NoControlAssigned, None);
        };

        let max_delta = ion.mass * self.tolerance_ppm * 1e-6;
        let control = group
            .iter()
            .filter(|other| other.file == reference)
            .filter(|other| samples.get(&other.file).is_some_and(|s| s.is_reference))
            .filter(|other| (other.mass - ion.mass).abs() <= max_delta)
            .min_by(|a, b| {
                (a.mass - ion.mass)
                    .abs()
                    .total_cmp(&(b.mass - ion.mass).abs())
                    .then(a.id.cmp(&b.id))
            });

        let Some(control) = control.filter(|c| c.area != 0.0) else {
            return (ControlStatus::NotInControl, None);
        };

        let ratio = ion.area / control.area;
        let in_control = (self.max_sample_to_control == 0.0 || ratio <= self.max_sample_to_control)
            && (self.max_control_to_sample == 0.0 || 1.0 / ratio <= self.max_control_to_sample);

        let status = if in_control {
            ControlStatus::InControl
        } else {
            ControlStatus::Outside
        };
        (status, Some(ratio))
    }
}
