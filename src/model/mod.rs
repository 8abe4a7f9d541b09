//! # Data Model
//!
//! Arena-friendly records for the reconciliation pipeline. Entities refer to
//! each other only through the typed identifiers in [`ids`]; there are no
//! owning pointers between features, groups and ions.

mod consensus;
mod feature;
mod ids;
mod records;
mod sample;
mod spectrum;

pub use consensus::{
    AdductAnnotation, AdductPair, ConsensusGroup, ConsensusMap, DechargeOutcome, GroupMember,
    MapDescriptor,
};
pub use feature::{
    masstrace_intensity_key, FeatureMap, FeatureRecord, HullPoint, HullRecord, IsotopePeak,
    RawFeature, MASSTRACE_INTENSITY_PREFIX,
};
pub use ids::{
    CompoundId, CompoundKey, ConsensusId, FeatureRef, FileId, IonId, MapIndex, PeakId, RasterId,
    SpectrumId, TraceId,
};
pub use records::{
    ChromatogramPeak, Compound, FeatureIon, RetentionTimeRaster, SpectralTree,
    SpectralTreeAssignment, TracePoint, XicTrace, UNKNOWN_ADDUCT,
};
pub use sample::{Polarity, SampleFile};
pub use spectrum::{Precursor, ScanEvent, Spectrum, SpectrumHeader};
