//! Decharge result documents.
//!
//! A recorded decharging run is stored as one JSON document per charge bound,
//! holding the refined consensus groups and the pairwise adduct relations.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::consensusxml::read_consensus_xml;
use super::XmlReadError;
use crate::model::DechargeOutcome;

/// Read one decharge result.
///
/// `.json` files hold a full [`DechargeOutcome`]; any other extension is read
/// as consensusXML, which carries annotations but no pair records.
pub fn read_decharge_outcome<P: AsRef<Path>>(path: P) -> Result<DechargeOutcome, XmlReadError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    } else {
        Ok(DechargeOutcome {
            consensus: read_consensus_xml(path)?,
            pairs: Vec::new(),
        })
    }
}

/// Write one decharge result as JSON
pub fn write_decharge_outcome<P: AsRef<Path>>(
    path: P,
    outcome: &DechargeOutcome,
) -> Result<(), XmlReadError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, outcome)?;
    writer.flush()?;
    Ok(())
}
