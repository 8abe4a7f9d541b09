//! # External Result Files
//!
//! Readers for the result files written by the external detection, linking
//! and decharging tools:
//!
//! - **featureXML**: per-file features with convex hulls and trace intensities
//! - **consensusXML**: map list plus consensus groups, optionally annotated
//!   by the decharger
//! - **decharge JSON**: recorded decharging iterations including adduct pairs
//!
//! All XML is read with a `quick-xml` pull parser, one element at a time.

mod error;
pub(crate) mod xml;

pub mod consensusxml;
pub mod decharge;
pub mod featurexml;

pub use consensusxml::{parse_consensus_xml, read_consensus_xml, ConsensusXmlReader};
pub use decharge::{read_decharge_outcome, write_decharge_outcome};
pub use error::XmlReadError;
pub use featurexml::{parse_feature_xml, read_feature_xml, FeatureXmlReader};
