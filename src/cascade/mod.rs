//! # Charge Resolution Cascade
//!
//! Every raw feature ends up with exactly one `(charge, adduct)` pair. Three
//! tiers of evidence are merged in a fixed order, see [`evidence`]:
//!
//! 1. the charge the detector reported for the feature (may be 0)
//! 2. the majority charge of the feature's consensus group
//! 3. the charge and adduct assigned to the group by the decharger
//!
//! A stored charge of 0 is kept as 0. Consumers that need a sign call
//! [`Resolution::effective_charge`] with the acquisition polarity.

pub mod decharge;
pub mod evidence;

use std::collections::HashMap;

use log::{debug, info};

use crate::identity::{IdentityMappingError, IdentityTable};
use crate::model::{
    ConsensusGroup, ConsensusId, ConsensusMap, FeatureRef, GroupMember, RawFeature,
};
use crate::table::{TableError, WriteOnceMap};
use crate::tools::ToolExecutionError;

pub use decharge::{DechargeResult, DechargeSchedule, LockedAnnotation};
pub use evidence::{ChargeEvidence, Evidence, EvidenceTier, Resolution};

/// Errors raised while resolving charges
#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    /// A group member could not be mapped to a file
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityMappingError),

    /// A per-run table was written twice
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// The decharger failed
    #[error("Tool error: {0}")]
    Tool(#[from] ToolExecutionError),
}

/// Consensus group membership of every imported feature.
///
/// Features the linker did not place in any group get a synthetic singleton
/// group so every feature maps to exactly one group.
#[derive(Debug, Clone)]
pub struct FeatureGroups {
    by_feature: WriteOnceMap<FeatureRef, ConsensusId>,
    groups: HashMap<ConsensusId, ConsensusGroup>,
    synthetic: usize,
}

impl FeatureGroups {
    /// Index `consensus` for the imported `features`.
    ///
    /// Members referring to features that were not imported (e.g. dropped
    /// as malformed) are ignored. A feature listed in two groups is rejected.
    pub fn build(
        consensus: &ConsensusMap,
        identity: &IdentityTable,
        features: &[RawFeature],
    ) -> Result<Self, CascadeError> {
        let imported: HashMap<FeatureRef, &RawFeature> =
            features.iter().map(|f| (f.feature, f)).collect();

        let mut by_feature = WriteOnceMap::new("feature groups");
        let mut groups = HashMap::with_capacity(consensus.groups.len());

        for group in &consensus.groups {
            for member in &group.members {
                let feature = identity.resolve(member)?;
                if !imported.contains_key(&feature) {
                    debug!("Group {} refers to unknown feature {}", group.id, feature);
                    continue;
                }
                by_feature.insert(feature, group.id)?;
            }
            groups.insert(group.id, group.clone());
        }

        let mut next_id = consensus
            .groups
            .iter()
            .map(|g| g.id.0)
            .max()
            .map_or(0, |max| max + 1);
        let mut synthetic = 0;

        for feature in features {
            if by_feature.contains_key(&feature.feature) {
                continue;
            }
            let id = ConsensusId(next_id);
            next_id += 1;
            synthetic += 1;

            let map = identity
                .index_for(feature.feature.file)
                .ok_or(IdentityMappingError::UnmappedFile(feature.feature.file))?;
            groups.insert(
                id,
                ConsensusGroup {
                    id,
                    centroid_mz: feature.mass,
                    centroid_rt: feature.retention_time,
                    charge: None,
                    members: vec![GroupMember {
                        map,
                        feature_id: feature.feature.local_id,
                    }],
                    annotation: None,
                },
            );
            by_feature.insert(feature.feature, id)?;
        }

        if synthetic > 0 {
            debug!("{} unlinked features got singleton groups", synthetic);
        }

        Ok(Self {
            by_feature,
            groups,
            synthetic,
        })
    }

    /// Group of a feature
    pub fn group_of(&self, feature: FeatureRef) -> Option<ConsensusId> {
        self.by_feature.get(&feature).copied()
    }

    /// Group by id
    pub fn group(&self, id: ConsensusId) -> Option<&ConsensusGroup> {
        self.groups.get(&id)
    }

    /// Number of singleton groups created for unlinked features
    pub fn synthetic_count(&self) -> usize {
        self.synthetic
    }
}

/// Final `(charge, adduct)` of every feature
#[derive(Debug, Clone)]
pub struct ResolvedCharges {
    resolutions: WriteOnceMap<FeatureRef, Resolution>,
}

impl ResolvedCharges {
    /// Resolution of a feature
    pub fn get(&self, feature: FeatureRef) -> Option<&Resolution> {
        self.resolutions.get(&feature)
    }

    /// Number of resolved features
    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    /// Whether nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    /// Count of resolutions per deciding tier
    pub fn tier_counts(&self) -> HashMap<EvidenceTier, usize> {
        let mut counts = HashMap::new();
        for (_, resolution) in self.resolutions.iter() {
            *counts.entry(resolution.tier).or_insert(0) += 1;
        }
        counts
    }
}

/// Applies the three evidence tiers to every feature
#[derive(Debug, Default, Clone, Copy)]
pub struct ChargeResolutionCascade;

impl ChargeResolutionCascade {
    /// Create a cascade
    pub fn new() -> Self {
        Self
    }

    /// Evidence available for one feature
    pub fn evidence(
        &self,
        feature: &RawFeature,
        groups: &FeatureGroups,
        decharged: &DechargeResult,
    ) -> ChargeEvidence {
        let group = groups.group_of(feature.feature);
        ChargeEvidence {
            reported: feature.reported_charge,
            consensus: group
                .and_then(|id| groups.group(id))
                .and_then(ConsensusGroup::majority_charge),
            decharged: group
                .and_then(|id| decharged.annotation(id))
                .map(|a| (a.charge, a.adduct.clone())),
        }
    }

    /// Resolve every feature. Pure: the same inputs give the same output.
    pub fn resolve(
        &self,
        features: &[RawFeature],
        groups: &FeatureGroups,
        decharged: &DechargeResult,
    ) -> Result<ResolvedCharges, CascadeError> {
        let mut resolutions = WriteOnceMap::new("charge resolutions");
        for feature in features {
            let resolution = self.evidence(feature, groups, decharged).resolve();
            resolutions.insert(feature.feature, resolution)?;
        }

        let resolved = ResolvedCharges { resolutions };
        let counts = resolved.tier_counts();
        info!(
            "Resolved {} features: {} decharged, {} by consensus, {} as reported",
            resolved.len(),
            counts.get(&EvidenceTier::Decharged).unwrap_or(&0),
            counts.get(&EvidenceTier::Consensus).unwrap_or(&0),
            counts.get(&EvidenceTier::Reported).unwrap_or(&0)
        );
        Ok(resolved)
    }
}
