use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{CompoundKey, ConsensusId, FeatureMap, MapIndex};

/// Entry of the linker's map list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDescriptor {
    /// Positional index referenced by grouped elements
    pub index: MapIndex,
    /// Display name; carries the `[FileID_<n>]` token in multi-file runs
    pub name: String,
}

/// Reference from a consensus group to a raw feature of one map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupMember {
    /// Positional map index
    pub map: MapIndex,
    /// Detector-assigned feature id
    pub feature_id: u64,
}

/// Adduct assignment made by the decharging stage for one consensus group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdductAnnotation {
    /// Assigned charge (>= 0 as reported by the decharger)
    pub charge: i32,
    /// Adduct description, e.g. `H+` or `Na+`
    pub adduct: String,
    /// Neutral compound the group was assigned to
    pub compound: CompoundKey,
}

/// Cross-file group of equivalent features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusGroup {
    /// Linker-assigned id
    pub id: ConsensusId,
    /// Centroid m/z across members
    pub centroid_mz: f64,
    /// Centroid retention time in minutes
    pub centroid_rt: f64,
    /// Majority charge reported by the linker, if any
    pub charge: Option<i32>,
    /// Linked features
    pub members: Vec<GroupMember>,
    /// Decharger annotation, present only in decharge results
    #[serde(default)]
    pub annotation: Option<AdductAnnotation>,
}

impl ConsensusGroup {
    /// Number of distinct maps (files) contributing a member
    pub fn linked_file_count(&self) -> usize {
        self.members
            .iter()
            .map(|m| m.map)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Majority charge, treating a reported 0 as "no dominant charge"
    pub fn majority_charge(&self) -> Option<i32> {
        self.charge.filter(|&c| c != 0)
    }
}

/// Linker output: map list plus consensus groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMap {
    /// Map list in positional order
    pub maps: Vec<MapDescriptor>,
    /// Consensus groups
    pub groups: Vec<ConsensusGroup>,
}

impl ConsensusMap {
    /// Convert a single feature map into singleton groups, one per feature.
    ///
    /// This is the single-file path where no linking takes place. A repeated
    /// feature id keeps only its first record, the one import keeps.
    pub fn from_single_feature_map(map: &FeatureMap) -> Self {
        let mut seen = HashSet::new();
        let groups = map
            .features
            .iter()
            .filter(|f| seen.insert(f.id))
            .map(|f| ConsensusGroup {
                id: ConsensusId(f.id),
                centroid_mz: f.mz,
                centroid_rt: f.rt_seconds / 60.0,
                charge: Some(f.charge),
                members: vec![GroupMember {
                    map: MapIndex(0),
                    feature_id: f.id,
                }],
                annotation: None,
            })
            .collect();

        Self {
            maps: vec![MapDescriptor {
                index: MapIndex(0),
                name: map.name.clone(),
            }],
            groups,
        }
    }

    /// Index groups by id
    pub fn group_index(&self) -> HashMap<ConsensusId, usize> {
        self.groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.id, i))
            .collect()
    }

    /// Keep only groups linking at least `min_files` distinct files
    pub fn filter_min_linked_files(&self, min_files: usize) -> Self {
        Self {
            maps: self.maps.clone(),
            groups: self
                .groups
                .iter()
                .filter(|g| g.linked_file_count() >= min_files)
                .cloned()
                .collect(),
        }
    }
}

/// Pairwise adduct relationship found by the decharger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdductPair {
    /// Compound both groups belong to
    pub compound: CompoundKey,
    /// First group of the pair
    pub first: ConsensusId,
    /// Second group of the pair
    pub second: ConsensusId,
    /// Adduct assigned to the first group
    pub first_adduct: String,
    /// Adduct assigned to the second group
    pub second_adduct: String,
}

impl AdductPair {
    /// Order-independent identity of the relationship
    pub fn relation_key(&self) -> (ConsensusId, ConsensusId) {
        if self.first <= self.second {
            (self.first, self.second)
        } else {
            (self.second, self.first)
        }
    }
}

/// Result of one decharging iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DechargeOutcome {
    /// Refined groups; resolved groups carry an annotation
    pub consensus: ConsensusMap,
    /// Pairwise adduct relationships
    #[serde(default)]
    pub pairs: Vec<AdductPair>,
}
