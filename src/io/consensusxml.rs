//! Pull parser for linker and decharger results in consensusXML.
//!
//! Reads the map list (positional index and display name) and every
//! consensus element with its centroid, charge attribute and grouped
//! elements. Decharger output is recognised through the `Group` and
//! `dc_charge_adducts` user parameters and becomes an [`AdductAnnotation`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::xml::{get_attribute, parse_attribute, parse_prefixed_id, parse_value, required_attribute};
use super::XmlReadError;
use crate::model::{
    AdductAnnotation, CompoundKey, ConsensusGroup, ConsensusId, ConsensusMap, GroupMember,
    MapDescriptor, MapIndex,
};

const CONSENSUS_ID_PREFIX: &str = "e_";
const COMPOUND_GROUP_PARAM: &str = "Group";
const ADDUCT_PARAM: &str = "dc_charge_adducts";

/// Streaming consensusXML reader
pub struct ConsensusXmlReader<R: BufRead> {
    reader: Reader<R>,
}

impl ConsensusXmlReader<BufReader<File>> {
    /// Open a consensusXML file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XmlReadError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(64 * 1024, file)))
    }
}

impl<R: BufRead> ConsensusXmlReader<R> {
    /// Create a reader over any buffered source
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);
        Self { reader: xml_reader }
    }

    /// Read the whole document
    pub fn read(mut self) -> Result<ConsensusMap, XmlReadError> {
        let mut map = ConsensusMap::default();
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) if e.name().as_ref() == b"consensusElement" => {
                    map.groups.push(self.parse_element(e)?);
                }
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    if e.name().as_ref() == b"map" {
                        map.maps.push(MapDescriptor {
                            index: MapIndex(required_attribute(e, "map", "id")?),
                            name: get_attribute(e, "name")?.unwrap_or_default(),
                        });
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XmlReadError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        debug!(
            "Read {} consensus groups over {} maps",
            map.groups.len(),
            map.maps.len()
        );
        Ok(map)
    }

    fn parse_element(&mut self, start: &BytesStart) -> Result<ConsensusGroup, XmlReadError> {
        let raw_id = get_attribute(start, "id")?.ok_or(XmlReadError::MissingAttribute {
            element: "consensusElement",
            attribute: "id",
        })?;

        let mut group = ConsensusGroup {
            id: ConsensusId(parse_prefixed_id(
                "consensusElement id",
                &raw_id,
                CONSENSUS_ID_PREFIX,
            )?),
            centroid_mz: 0.0,
            centroid_rt: 0.0,
            charge: parse_attribute(start, "charge")?,
            members: Vec::new(),
            annotation: None,
        };

        let mut annotation = PendingAnnotation::default();
        let mut depth = 1;
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    apply_child(&mut group, &mut annotation, e)?;
                }
                Ok(Event::Empty(ref e)) => apply_child(&mut group, &mut annotation, e)?,
                Ok(Event::End(ref e)) => {
                    depth -= 1;
                    if e.name().as_ref() == b"consensusElement" && depth == 0 {
                        break;
                    }
                }
                Ok(Event::Eof) => {
                    return Err(XmlReadError::InvalidStructure(format!(
                        "Unexpected EOF in consensus element {raw_id}"
                    )));
                }
                Err(e) => return Err(XmlReadError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        if let (Some(compound), Some(adduct)) = (annotation.compound, annotation.adduct) {
            group.annotation = Some(AdductAnnotation {
                charge: group.charge.unwrap_or(0),
                adduct,
                compound,
            });
        }

        Ok(group)
    }
}

#[derive(Default)]
struct PendingAnnotation {
    compound: Option<CompoundKey>,
    adduct: Option<String>,
}

fn apply_child(
    group: &mut ConsensusGroup,
    annotation: &mut PendingAnnotation,
    e: &BytesStart,
) -> Result<(), XmlReadError> {
    match e.name().as_ref() {
        b"centroid" => {
            let rt_seconds: f64 = required_attribute(e, "centroid", "rt")?;
            group.centroid_rt = rt_seconds / 60.0;
            group.centroid_mz = required_attribute(e, "centroid", "mz")?;
        }
        b"element" => group.members.push(GroupMember {
            map: MapIndex(required_attribute(e, "element", "map")?),
            feature_id: required_attribute(e, "element", "id")?,
        }),
        b"UserParam" | b"userParam" => {
            let name = get_attribute(e, "name")?.unwrap_or_default();
            let value = get_attribute(e, "value")?.unwrap_or_default();
            match name.as_str() {
                COMPOUND_GROUP_PARAM => {
                    annotation.compound = Some(CompoundKey(parse_value("Group", &value)?))
                }
                ADDUCT_PARAM => annotation.adduct = Some(value),
                _ => {}
            }
        }
        _ => {}
    }
    Ok(())
}

/// Read a consensusXML file
pub fn read_consensus_xml<P: AsRef<Path>>(path: P) -> Result<ConsensusMap, XmlReadError> {
    ConsensusXmlReader::open(path)?.read()
}

/// Parse consensusXML content held in memory
pub fn parse_consensus_xml(content: &str) -> Result<ConsensusMap, XmlReadError> {
    ConsensusXmlReader::new(content.as_bytes()).read()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<consensusXML version="1.7" id="cm_1">
  <mapList count="2">
    <map id="0" name="/tmp/3f2a[FileID_11].mzML" unique_id="1" label="" size="2">
      <UserParam type="string" name="filename" value="a" />
    </map>
    <map id="1" name="/tmp/9b1c[FileID_12].mzML" unique_id="2" label="" size="1"/>
  </mapList>
  <consensusElementList>
    <consensusElement id="e_500" quality="0.8" charge="1">
      <centroid rt="300" mz="250.1234" it="3000"/>
      <groupedElementList>
        <element map="0" id="1001" rt="299" mz="250.1233" it="1000" charge="0"/>
        <element map="1" id="2001" rt="301" mz="250.1235" it="2000" charge="1"/>
      </groupedElementList>
    </consensusElement>
    <consensusElement id="e_501" quality="0.1">
      <centroid rt="600" mz="400.5" it="10"/>
      <groupedElementList>
        <element map="0" id="1002" rt="600" mz="400.5" it="10"/>
      </groupedElementList>
      <UserParam type="int" name="Group" value="77" />
      <UserParam type="string" name="dc_charge_adducts" value="H+" />
    </consensusElement>
  </consensusElementList>
</consensusXML>"#;

    #[test]
    fn test_read_map_list_and_groups() {
        let map = parse_consensus_xml(DOC).unwrap();
        assert_eq!(map.maps.len(), 2);
        assert_eq!(map.maps[1].index, MapIndex(1));
        assert!(map.maps[1].name.contains("[FileID_12]"));

        assert_eq!(map.groups.len(), 2);
        let first = &map.groups[0];
        assert_eq!(first.id, ConsensusId(500));
        assert_eq!(first.charge, Some(1));
        assert_eq!(first.centroid_rt, 5.0);
        assert_eq!(first.members.len(), 2);
        assert_eq!(first.linked_file_count(), 2);
        assert!(first.annotation.is_none());
    }

    #[test]
    fn test_decharger_user_params_become_annotation() {
        let map = parse_consensus_xml(DOC).unwrap();
        let second = &map.groups[1];
        assert_eq!(second.charge, None);
        let annotation = second.annotation.as_ref().unwrap();
        assert_eq!(annotation.compound, CompoundKey(77));
        assert_eq!(annotation.adduct, "H+");
        assert_eq!(annotation.charge, 0);
    }

    #[test]
    fn test_truncated_element_is_an_error() {
        let doc = r#"<consensusXML><consensusElementList><consensusElement id="e_1"><centroid rt="1" mz="2"/>"#;
        assert!(parse_consensus_xml(doc).is_err());
    }
}
