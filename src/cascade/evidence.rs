//! Ordered evidence merge.
//!
//! Each tier contributes an optional value; tiers are applied in a fixed
//! order and the last one that is present decides the whole `(charge,
//! adduct)` pair. Values from different tiers are never combined.

use serde::{Deserialize, Serialize};

use crate::model::{Polarity, UNKNOWN_ADDUCT};

/// Source of a resolved charge, in increasing order of confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceTier {
    /// Charge reported by the detector for the feature itself
    Reported,
    /// Majority charge of the feature's consensus group
    Consensus,
    /// Charge and adduct assigned by the decharger
    Decharged,
}

/// Value contributed by one tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    /// Contributing tier
    pub tier: EvidenceTier,
    /// Charge, possibly 0 for the reported tier
    pub charge: i32,
    /// Adduct, only the decharged tier knows it
    pub adduct: Option<String>,
}

/// Evidence available for one raw feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChargeEvidence {
    /// Detector charge, 0 when unknown
    pub reported: i32,
    /// Majority charge of the consensus group; 0 must already be mapped to `None`
    pub consensus: Option<i32>,
    /// Decharger assignment
    pub decharged: Option<(i32, String)>,
}

impl ChargeEvidence {
    /// Tier values in application order
    pub fn tiers(&self) -> [Option<Evidence>; 3] {
        [
            Some(Evidence {
                tier: EvidenceTier::Reported,
                charge: self.reported,
                adduct: None,
            }),
            self.consensus.map(|charge| Evidence {
                tier: EvidenceTier::Consensus,
                charge,
                adduct: None,
            }),
            self.decharged.as_ref().map(|(charge, adduct)| Evidence {
                tier: EvidenceTier::Decharged,
                charge: *charge,
                adduct: Some(adduct.clone()),
            }),
        ]
    }

    /// Last present tier wins
    pub fn resolve(&self) -> Resolution {
        self.tiers()
            .into_iter()
            .flatten()
            .last()
            .map(Resolution::from)
            .unwrap_or_else(|| Resolution::unresolved(self.reported))
    }
}

/// Final charge and adduct of a raw feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Stored charge, may be 0
    pub charge: i32,
    /// Adduct description, `unknown` unless decharged
    pub adduct: String,
    /// Tier that decided the value
    pub tier: EvidenceTier,
}

impl Resolution {
    fn unresolved(charge: i32) -> Self {
        Self {
            charge,
            adduct: UNKNOWN_ADDUCT.to_string(),
            tier: EvidenceTier::Reported,
        }
    }

    /// Charge to use for mass windows and precursor matching
    pub fn effective_charge(&self, polarity: Polarity) -> i32 {
        polarity.effective_charge(self.charge)
    }
}

impl From<Evidence> for Resolution {
    fn from(evidence: Evidence) -> Self {
        Self {
            charge: evidence.charge,
            adduct: evidence
                .adduct
                .unwrap_or_else(|| UNKNOWN_ADDUCT.to_string()),
            tier: evidence.tier,
        }
    }
}
