//! # Feature Ions
//!
//! Turns detector records into validated [`RawFeature`]s and then into one
//! persisted [`FeatureIon`] with its [`ChromatogramPeak`]s per raw feature.
//!
//! Each convex hull of a detector feature is one isotope trace. Its isotope
//! index comes from the hull `nr` attribute and its summed intensity from the
//! `masstrace_intensity_<nr>` user parameter. A feature with a hull lacking
//! either is malformed and dropped on its own; the rest of the file goes on.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::cascade::{FeatureGroups, ResolvedCharges};
use crate::model::{
    ChromatogramPeak, FeatureIon, FeatureMap, FeatureRecord, FeatureRef, FileId, IonId,
    IsotopePeak, PeakId, RawFeature,
};
use crate::table::{IdSequence, TableError, WriteOnceMap};

const SECONDS_PER_MINUTE: f64 = 60.0;

/// A detector feature that cannot be turned into a raw feature
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedFeatureError {
    /// A hull carries no isotope index
    #[error("Feature {feature}: hull {position} has no isotope index")]
    MissingHullIndex {
        /// Offending feature
        feature: FeatureRef,
        /// Position of the hull in file order
        position: usize,
    },

    /// No summed intensity is recorded for an isotope index
    #[error("Feature {feature}: no intensity for isotope {isotope}")]
    MissingIntensity {
        /// Offending feature
        feature: FeatureRef,
        /// Isotope index
        isotope: usize,
    },

    /// The recorded intensity is not a number
    #[error("Feature {feature}: intensity '{value}' of isotope {isotope} is not a number")]
    InvalidIntensity {
        /// Offending feature
        feature: FeatureRef,
        /// Isotope index
        isotope: usize,
        /// Raw value
        value: String,
    },

    /// A hull has no points
    #[error("Feature {feature}: hull of isotope {isotope} is empty")]
    EmptyHull {
        /// Offending feature
        feature: FeatureRef,
        /// Isotope index
        isotope: usize,
    },

    /// The id was already used by another feature of the same file
    #[error("Feature {0}: duplicate feature id")]
    DuplicateId(FeatureRef),
}

impl MalformedFeatureError {
    /// The dropped feature
    pub fn feature(&self) -> FeatureRef {
        match self {
            Self::MissingHullIndex { feature, .. }
            | Self::MissingIntensity { feature, .. }
            | Self::InvalidIntensity { feature, .. }
            | Self::EmptyHull { feature, .. }
            | Self::DuplicateId(feature) => *feature,
        }
    }
}

/// Result of importing one detector map
#[derive(Debug, Clone, Default)]
pub struct ImportedFeatures {
    /// Valid features in file order
    pub features: Vec<RawFeature>,
    /// Dropped features
    pub rejected: Vec<MalformedFeatureError>,
}

/// Persisted ions and peaks of a run
#[derive(Debug, Clone, Default)]
pub struct IonSet {
    /// One ion per raw feature
    pub ions: Vec<FeatureIon>,
    /// Isotope peaks of all ions
    pub peaks: Vec<ChromatogramPeak>,
    by_feature: HashMap<FeatureRef, usize>,
    peak_index: HashMap<PeakId, usize>,
}

impl IonSet {
    /// Ion built from `feature`
    pub fn ion_for(&self, feature: FeatureRef) -> Option<&FeatureIon> {
        self.by_feature.get(&feature).map(|&i| &self.ions[i])
    }

    /// Peak by id
    pub fn peak(&self, id: PeakId) -> Option<&ChromatogramPeak> {
        self.peak_index.get(&id).map(|&i| &self.peaks[i])
    }

    /// Peaks of an ion in isotope order
    pub fn peaks_of<'a>(&'a self, ion: &'a FeatureIon) -> impl Iterator<Item = &'a ChromatogramPeak> {
        ion.peaks.iter().filter_map(|id| self.peak(*id))
    }

    /// Ions of one file
    pub fn ions_of_file(&self, file: FileId) -> impl Iterator<Item = &FeatureIon> {
        self.ions.iter().filter(move |ion| ion.file == file)
    }

    /// Whether no ion was built
    pub fn is_empty(&self) -> bool {
        self.ions.is_empty()
    }
}

/// Builds raw features and feature ions
#[derive(Debug, Clone)]
pub struct FeatureIonBuilder {
    ion_ids: IdSequence<IonId>,
    peak_ids: IdSequence<PeakId>,
}

impl Default for FeatureIonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureIonBuilder {
    /// Create a builder with fresh id sequences
    pub fn new() -> Self {
        Self {
            ion_ids: IdSequence::new("feature ions"),
            peak_ids: IdSequence::new("chromatogram peaks"),
        }
    }

    /// Validate the records of one detector map owned by `file`
    pub fn import(&self, file: FileId, map: &FeatureMap) -> ImportedFeatures {
        let mut imported = ImportedFeatures::default();
        let mut seen = HashSet::new();

        for record in &map.features {
            let feature = FeatureRef::new(file, record.id);
            if !seen.insert(record.id) {
                warn!("Dropping feature: {}", MalformedFeatureError::DuplicateId(feature));
                imported.rejected.push(MalformedFeatureError::DuplicateId(feature));
                continue;
            }
            match raw_feature(feature, record) {
                Ok(raw) => imported.features.push(raw),
                Err(e) => {
                    warn!("Dropping feature: {}", e);
                    imported.rejected.push(e);
                }
            }
        }

        debug!(
            "File {}: imported {} features, dropped {}",
            file,
            imported.features.len(),
            imported.rejected.len()
        );
        imported
    }

    /// Build one ion per raw feature using the resolved charges
    pub fn build(
        &mut self,
        features: &[RawFeature],
        groups: &FeatureGroups,
        resolved: &ResolvedCharges,
    ) -> Result<IonSet, TableError> {
        let mut set = IonSet::default();
        let mut built = WriteOnceMap::new("feature ions");

        for feature in features {
            let id = self.ion_ids.next_id()?;
            built.insert(feature.feature, id)?;
            let consensus =
                groups
                    .group_of(feature.feature)
                    .ok_or_else(|| TableError::MissingKey {
                        table: "feature groups",
                        key: feature.feature.to_string(),
                    })?;

            let resolution =
                resolved
                    .get(feature.feature)
                    .ok_or_else(|| TableError::MissingKey {
                        table: "charge resolutions",
                        key: feature.feature.to_string(),
                    })?;

            let mut peak_ids = Vec::with_capacity(feature.isotopes.len());
            for isotope in &feature.isotopes {
                let peak_id = self.peak_ids.next_id()?;
                peak_ids.push(peak_id);
                set.peak_index.insert(peak_id, set.peaks.len());
                set.peaks.push(ChromatogramPeak {
                    id: peak_id,
                    ion: id,
                    file: feature.feature.file,
                    isotope: isotope.isotope,
                    mass: isotope.mass,
                    apex_rt: isotope.apex_rt,
                    left_rt: isotope.left_rt,
                    right_rt: isotope.right_rt,
                    area: isotope.intensity,
                });
            }

            set.by_feature.insert(feature.feature, set.ions.len());
            set.ions.push(FeatureIon {
                id,
                file: feature.feature.file,
                feature: feature.feature,
                consensus,
                mass: feature.mass,
                retention_time: feature.retention_time,
                charge: resolution.charge,
                adduct: resolution.adduct.clone(),
                area: feature.area(),
                isotope_count: feature.isotopes.len(),
                peaks: peak_ids,
            });
        }

        Ok(set)
    }
}

/// Validate one detector record
pub fn raw_feature(
    feature: FeatureRef,
    record: &FeatureRecord,
) -> Result<RawFeature, MalformedFeatureError> {
    let apex_rt = record.rt_seconds / SECONDS_PER_MINUTE;
    let mut isotopes = Vec::with_capacity(record.hulls.len());

    for (position, hull) in record.hulls.iter().enumerate() {
        let isotope = hull
            .index
            .ok_or(MalformedFeatureError::MissingHullIndex { feature, position })?;
        let raw = record
            .masstrace_intensity(isotope)
            .ok_or(MalformedFeatureError::MissingIntensity { feature, isotope })?;
        let intensity: f64 =
            raw.trim()
                .parse()
                .map_err(|_| MalformedFeatureError::InvalidIntensity {
                    feature,
                    isotope,
                    value: raw.to_string(),
                })?;

        if hull.points.is_empty() {
            return Err(MalformedFeatureError::EmptyHull { feature, isotope });
        }

        let n = hull.points.len() as f64;
        let mass = hull.points.iter().map(|p| p.mz).sum::<f64>() / n;
        let (left, right) = hull
            .points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.rt_seconds), hi.max(p.rt_seconds))
            });

        isotopes.push(IsotopePeak {
            isotope,
            intensity,
            mass,
            left_rt: left / SECONDS_PER_MINUTE,
            right_rt: right / SECONDS_PER_MINUTE,
            apex_rt,
        });
    }

    Ok(RawFeature {
        feature,
        mass: record.mz,
        retention_time: apex_rt,
        reported_charge: record.charge,
        isotopes,
    })
}
