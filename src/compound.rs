//! Compound grouping.
//!
//! Ions join a compound only through a decharged consensus group: every
//! group annotated with the same compound label contributes its ions to one
//! [`Compound`]. Ions of undecharged groups stay standalone.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::info;

use crate::cascade::DechargeResult;
use crate::model::{Compound, CompoundId, CompoundKey, ConsensusId, FeatureIon};
use crate::table::{IdSequence, TableError};

/// Groups feature ions into compounds
#[derive(Debug, Clone)]
pub struct CompoundGrouper {
    ids: IdSequence<CompoundId>,
}

impl Default for CompoundGrouper {
    fn default() -> Self {
        Self::new()
    }
}

impl CompoundGrouper {
    /// Create a grouper with a fresh id sequence
    pub fn new() -> Self {
        Self {
            ids: IdSequence::new("compounds"),
        }
    }

    /// Build one compound per decharged entity that has at least one ion
    pub fn group(
        &mut self,
        ions: &[FeatureIon],
        decharged: &DechargeResult,
    ) -> Result<Vec<Compound>, TableError> {
        let mut members: BTreeMap<CompoundKey, (BTreeSet<ConsensusId>, Vec<&FeatureIon>)> =
            BTreeMap::new();

        for ion in ions {
            if let Some(key) = decharged.compound_of(ion.consensus) {
                let entry = members.entry(key).or_default();
                entry.0.insert(ion.consensus);
                entry.1.push(ion);
            }
        }

        let mut compounds = Vec::with_capacity(members.len());
        for (key, (groups, mut ions)) in members {
            ions.sort_by_key(|ion| ion.id);

            let area: f64 = ions.iter().map(|ion| ion.area).sum();
            let (mass, retention_time) = if area > 0.0 {
                (
                    ions.iter().map(|ion| ion.mass * ion.area).sum::<f64>() / area,
                    ions.iter()
                        .map(|ion| ion.retention_time * ion.area)
                        .sum::<f64>()
                        / area,
                )
            } else {
                let n = ions.len() as f64;
                (
                    ions.iter().map(|ion| ion.mass).sum::<f64>() / n,
                    ions.iter().map(|ion| ion.retention_time).sum::<f64>() / n,
                )
            };

            compounds.push(Compound {
                id: self.ids.next_id()?,
                key,
                mass,
                retention_time,
                area,
                adduct_count: adduct_count(decharged, key),
                groups: groups.into_iter().collect(),
                ions: ions.iter().map(|ion| ion.id).collect(),
            });
        }

        info!(
            "Grouped {} of {} ions into {} compounds",
            compounds.iter().map(|c| c.ions.len()).sum::<usize>(),
            ions.len(),
            compounds.len()
        );
        Ok(compounds)
    }
}

/// Distinct adduct relations recorded for a compound
fn adduct_count(decharged: &DechargeResult, key: CompoundKey) -> usize {
    decharged
        .pairs()
        .iter()
        .filter(|pair| pair.compound == key)
        .map(|pair| pair.relation_key())
        .collect::<HashSet<_>>()
        .len()
}
