//! # mzreconcile - LC-MS Feature Reconciliation
//!
//! `mzreconcile` turns the per-sample output of an external feature detector,
//! linker and decharger into one consistent set of persisted records:
//!
//! - **Feature ions** with a single resolved `(charge, adduct)` each, and one
//!   chromatogram peak per isotope trace
//! - **Compounds** grouping the ions of decharged consensus groups
//! - **Component peaks** comparing every ion against its control file
//! - **XIC traces** sampled on one retention time raster per file
//! - **Spectral trees** linking every peak to its survey and fragment scans
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mzreconcile::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let samples = vec![SampleFile::new(FileId(1), "A.mzML", Polarity::Positive)];
//!
//! let mut detector = FeatureXmlDetector::new().with_result(FileId(1), "A.featureXML");
//! let mut linker = ConsensusXmlLinker::new("linked.consensusXML");
//! let mut decharger = RecordedDecharger::new();
//!
//! let mut spectra = InMemorySpectra::new();
//! spectra.load_mzml(FileId(1), "A.mzML", Polarity::Positive)?;
//!
//! let pipeline = Pipeline::new(ReconcileConfig::default())?;
//! let output = pipeline.run(PipelineInput {
//!     samples,
//!     detector: &mut detector,
//!     linker: &mut linker,
//!     decharger: &mut decharger,
//!     spectra: &spectra,
//! })?;
//!
//! ResultWriter::new("results").write(&output)?;
//! println!("{}", output.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identity`]: binds positional map indices to sample files via name tokens
//! - [`cascade`]: decharging schedule and the three-tier charge resolution
//! - [`ions`]: feature import, feature ions and chromatogram peaks
//! - [`compound`] and [`consolidation`]: compounds and component peaks
//! - [`xic`] and [`spectral_tree`]: spectrum-driven stages, batched through
//!   [`spectra::SpectrumSource`]
//! - [`pipeline`]: runs the stages in order
//! - [`output`]: JSON tables plus a Parquet trace file per run
//!
//! ## Identifiers
//!
//! All records refer to each other through the typed identifiers in
//! [`model`]. Tables keyed by those identifiers are write-once for the
//! duration of a run.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod cascade;
pub mod compound;
pub mod config;
pub mod consolidation;
pub mod identity;
pub mod io;
pub mod ions;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod spectra;
pub mod spectral_tree;
pub mod table;
pub mod tools;
pub mod xic;

/// Crate version written into result metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::cascade::{
        ChargeResolutionCascade, DechargeResult, DechargeSchedule, EvidenceTier, FeatureGroups,
        Resolution,
    };
    pub use crate::compound::CompoundGrouper;
    pub use crate::config::{AdductCandidate, ReconcileConfig};
    pub use crate::consolidation::{ComponentPeak, Consolidator, ControlStatus};
    pub use crate::identity::{IdentityMapper, IdentityTable};
    pub use crate::ions::{FeatureIonBuilder, IonSet};
    pub use crate::model::{
        ChromatogramPeak, Compound, FeatureIon, FileId, Polarity, SampleFile, SpectralTree,
        XicTrace,
    };
    pub use crate::output::ResultWriter;
    pub use crate::pipeline::{Pipeline, PipelineError, PipelineInput, PipelineOutput, RunSummary};
    pub use crate::spectra::{InMemorySpectra, SpectrumSource};
    pub use crate::spectral_tree::SpectralTreeAssigner;
    pub use crate::tools::{
        ConsensusXmlLinker, Decharger, FeatureDetector, FeatureLinker, FeatureXmlDetector,
        RecordedDecharger,
    };
    pub use crate::xic::XicTraceGenerator;
}
