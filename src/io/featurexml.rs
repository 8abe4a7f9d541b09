//! Pull parser for detector results in featureXML.
//!
//! Only the parts needed for reconciliation are read: feature id, position
//! (dim 0 = retention time in seconds, dim 1 = m/z), charge, convex hulls and
//! user parameters. Subordinate features are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::xml::{get_attribute, parse_prefixed_id, parse_value, required_attribute, text_content};
use super::XmlReadError;
use crate::model::{masstrace_intensity_key, FeatureMap, FeatureRecord, HullPoint, HullRecord};

const FEATURE_ID_PREFIX: &str = "f_";
const MASSTRACE_INTENSITY_LIST: &str = "masstrace_intensity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    RetentionTime,
    Mz,
    Charge,
}

/// Streaming featureXML reader
pub struct FeatureXmlReader<R: BufRead> {
    reader: Reader<R>,
}

impl FeatureXmlReader<BufReader<File>> {
    /// Open a featureXML file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, XmlReadError> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(64 * 1024, file)))
    }
}

impl<R: BufRead> FeatureXmlReader<R> {
    /// Create a reader over any buffered source
    pub fn new(reader: R) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);
        Self { reader: xml_reader }
    }

    /// Read all top-level features into a map named `name`
    pub fn read_map(mut self, name: impl Into<String>) -> Result<FeatureMap, XmlReadError> {
        let mut features = Vec::new();
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if e.name().as_ref() == b"feature" {
                        features.push(self.parse_feature(&e)?);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XmlReadError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        debug!("Read {} features from featureXML", features.len());
        Ok(FeatureMap {
            name: name.into(),
            features,
        })
    }

    fn parse_feature(&mut self, start: &BytesStart) -> Result<FeatureRecord, XmlReadError> {
        let raw_id = get_attribute(start, "id")?.ok_or(XmlReadError::MissingAttribute {
            element: "feature",
            attribute: "id",
        })?;
        let id = parse_prefixed_id("feature id", &raw_id, FEATURE_ID_PREFIX)?;

        let mut rt_seconds = None;
        let mut mz = None;
        let mut charge = 0;
        let mut hulls = Vec::new();
        let mut user_params = HashMap::new();

        let mut depth = 1;
        let mut subordinate = 0;
        let mut target: Option<TextTarget> = None;
        let mut current_hull: Option<HullRecord> = None;
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    match e.name().as_ref() {
                        b"subordinate" => subordinate += 1,
                        _ if subordinate > 0 => {}
                        b"position" => {
                            target = match get_attribute(e, "dim")?.as_deref() {
                                Some("0") => Some(TextTarget::RetentionTime),
                                Some("1") => Some(TextTarget::Mz),
                                _ => None,
                            };
                        }
                        b"charge" => target = Some(TextTarget::Charge),
                        b"convexhull" => {
                            let index = match get_attribute(e, "nr")? {
                                Some(raw) => Some(parse_value("convexhull nr", &raw)?),
                                None => None,
                            };
                            current_hull = Some(HullRecord {
                                index,
                                points: Vec::new(),
                            });
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    if subordinate > 0 {
                        buf.clear();
                        continue;
                    }
                    match e.name().as_ref() {
                        b"pt" => {
                            if let Some(hull) = current_hull.as_mut() {
                                hull.points.push(HullPoint {
                                    rt_seconds: required_attribute(e, "pt", "x")?,
                                    mz: required_attribute(e, "pt", "y")?,
                                });
                            }
                        }
                        b"UserParam" | b"userParam" => {
                            let name = get_attribute(e, "name")?.unwrap_or_default();
                            let value = get_attribute(e, "value")?.unwrap_or_default();
                            insert_user_param(&mut user_params, name, value);
                        }
                        b"convexhull" => hulls.push(HullRecord {
                            index: match get_attribute(e, "nr")? {
                                Some(raw) => Some(parse_value("convexhull nr", &raw)?),
                                None => None,
                            },
                            points: Vec::new(),
                        }),
                        _ => {}
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Some(field) = target.take() {
                        let text = text_content(t)?;
                        match field {
                            TextTarget::RetentionTime => {
                                rt_seconds = Some(parse_value("position dim 0", &text)?)
                            }
                            TextTarget::Mz => mz = Some(parse_value("position dim 1", &text)?),
                            TextTarget::Charge => charge = parse_value("charge", &text)?,
                        }
                    }
                }
                Ok(Event::End(ref e)) => {
                    depth -= 1;
                    match e.name().as_ref() {
                        b"subordinate" => subordinate -= 1,
                        b"feature" if depth == 0 => break,
                        _ if subordinate > 0 => {}
                        b"position" | b"charge" => target = None,
                        b"convexhull" => {
                            if let Some(hull) = current_hull.take() {
                                hulls.push(hull);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => {
                    return Err(XmlReadError::InvalidStructure(format!(
                        "Unexpected EOF in feature {raw_id}"
                    )));
                }
                Err(e) => return Err(XmlReadError::XmlError(e)),
                _ => {}
            }
            buf.clear();
        }

        let (Some(rt_seconds), Some(mz)) = (rt_seconds, mz) else {
            return Err(XmlReadError::InvalidStructure(format!(
                "Feature {raw_id} has no complete position"
            )));
        };

        Ok(FeatureRecord {
            id,
            rt_seconds,
            mz,
            charge,
            hulls,
            user_params,
        })
    }
}

/// Store a user parameter, expanding the list form of the trace intensities
/// into one `masstrace_intensity_<nr>` entry per trace.
fn insert_user_param(params: &mut HashMap<String, String>, name: String, value: String) {
    if name == MASSTRACE_INTENSITY_LIST {
        let values = value.trim().trim_start_matches('[').trim_end_matches(']');
        for (index, item) in values.split(',').map(str::trim).enumerate() {
            if !item.is_empty() {
                params
                    .entry(masstrace_intensity_key(index))
                    .or_insert_with(|| item.to_string());
            }
        }
    }
    params.insert(name, value);
}

/// Read a featureXML file; the map is named after the file
pub fn read_feature_xml<P: AsRef<Path>>(path: P) -> Result<FeatureMap, XmlReadError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    FeatureXmlReader::open(path)?.read_map(name)
}

/// Parse featureXML content held in memory
pub fn parse_feature_xml(content: &str, name: &str) -> Result<FeatureMap, XmlReadError> {
    FeatureXmlReader::new(content.as_bytes()).read_map(name)
}
