//! Iterative decharging schedule.
//!
//! Decharging runs once per charge bound, from 1 up to the configured
//! maximum. Every iteration is fed the groups returned by the previous one,
//! so low-charge assignments are settled before higher charges are tried.
//! An annotation is locked the first time a group receives one. Groups and
//! relations the decharger returns outside the candidate set are ignored.

use std::collections::HashSet;

use log::{debug, info, warn};

use crate::model::{AdductAnnotation, AdductPair, CompoundKey, ConsensusId, ConsensusMap};
use crate::table::WriteOnceMap;
use crate::tools::{DechargeSettings, Decharger};

use super::CascadeError;

/// Locked decharger assignments of a run
#[derive(Debug, Clone)]
pub struct DechargeResult {
    annotations: WriteOnceMap<ConsensusId, LockedAnnotation>,
    pairs: Vec<AdductPair>,
    iterations: u32,
}

/// An annotation with the charge bound of the iteration that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedAnnotation {
    /// Assignment
    pub annotation: AdductAnnotation,
    /// Charge bound of the locking iteration
    pub bound: u32,
}

impl DechargeResult {
    /// Result without any decharged group
    pub fn empty() -> Self {
        Self {
            annotations: WriteOnceMap::new("decharge annotations"),
            pairs: Vec::new(),
            iterations: 0,
        }
    }

    /// Annotation of a consensus group, if it was decharged
    pub fn annotation(&self, group: ConsensusId) -> Option<&AdductAnnotation> {
        self.annotations.get(&group).map(|locked| &locked.annotation)
    }

    /// Annotation including the locking bound
    pub fn locked(&self, group: ConsensusId) -> Option<&LockedAnnotation> {
        self.annotations.get(&group)
    }

    /// Compound of a decharged group
    pub fn compound_of(&self, group: ConsensusId) -> Option<CompoundKey> {
        self.annotation(group).map(|a| a.compound)
    }

    /// All decharged groups with their annotation
    pub fn annotations(&self) -> impl Iterator<Item = (ConsensusId, &AdductAnnotation)> {
        self.annotations
            .iter()
            .map(|(id, locked)| (*id, &locked.annotation))
    }

    /// Distinct adduct relations collected over all iterations
    pub fn pairs(&self) -> &[AdductPair] {
        &self.pairs
    }

    /// Number of decharged groups
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Whether no group was decharged
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Number of decharger calls made
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// Charge-bound schedule for the decharger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DechargeSchedule {
    /// Highest charge bound
    pub max_charge: u32,
    /// Configured minimum of linked files per candidate group
    pub min_linked_samples: usize,
}

impl DechargeSchedule {
    /// Create a schedule
    pub fn new(max_charge: u32, min_linked_samples: usize) -> Self {
        Self {
            max_charge,
            min_linked_samples,
        }
    }

    /// Linked-file threshold for a run over `total_files` files
    pub fn effective_threshold(&self, total_files: usize) -> usize {
        self.min_linked_samples.min(total_files)
    }

    /// Groups offered to the first iteration
    pub fn candidates(&self, consensus: &ConsensusMap, total_files: usize) -> ConsensusMap {
        consensus.filter_min_linked_files(self.effective_threshold(total_files))
    }

    /// Run all iterations and lock the assignments
    pub fn run<D: Decharger + ?Sized>(
        &self,
        decharger: &mut D,
        consensus: &ConsensusMap,
        total_files: usize,
        settings: &DechargeSettings,
    ) -> Result<DechargeResult, CascadeError> {
        let mut result = DechargeResult::empty();
        let mut current = self.candidates(consensus, total_files);

        info!(
            "{} of {} consensus groups link at least {} files and are decharge candidates",
            current.groups.len(),
            consensus.groups.len(),
            self.effective_threshold(total_files)
        );
        if current.groups.is_empty() {
            return Ok(result);
        }

        let candidates: HashSet<ConsensusId> = current.groups.iter().map(|g| g.id).collect();
        let mut seen_pairs = HashSet::new();
        for bound in 1..=self.max_charge {
            let mut outcome = decharger.decharge(&current, bound, settings)?;
            result.iterations += 1;

            outcome.consensus.groups.retain(|group| {
                let offered = candidates.contains(&group.id);
                if !offered {
                    warn!(
                        "Decharger returned group {} at bound {} which was not a candidate, ignoring it",
                        group.id, bound
                    );
                }
                offered
            });

            let mut locked_now = 0;
            for group in &outcome.consensus.groups {
                let Some(annotation) = &group.annotation else {
                    continue;
                };
                match result.annotations.get(&group.id) {
                    Some(existing) if existing.annotation != *annotation => {
                        warn!(
                            "Group {} reassigned to {} at bound {}, keeping {} from bound {}",
                            group.id,
                            annotation.adduct,
                            bound,
                            existing.annotation.adduct,
                            existing.bound
                        );
                    }
                    Some(_) => {}
                    None => {
                        result.annotations.insert(
                            group.id,
                            LockedAnnotation {
                                annotation: annotation.clone(),
                                bound,
                            },
                        )?;
                        locked_now += 1;
                    }
                }
            }

            for pair in outcome.pairs {
                if !(candidates.contains(&pair.first) && candidates.contains(&pair.second)) {
                    warn!(
                        "Ignoring adduct relation {} - {} outside the candidate groups",
                        pair.first, pair.second
                    );
                    continue;
                }
                if seen_pairs.insert((pair.compound, pair.relation_key())) {
                    result.pairs.push(pair);
                }
            }

            debug!(
                "Decharge bound {}: {} groups locked, {} total",
                bound,
                locked_now,
                result.len()
            );
            current = outcome.consensus;
        }

        Ok(result)
    }
}
