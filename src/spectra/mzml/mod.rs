//! Loader for spectra stored in mzML.
//!
//! The document is pulled event by event. For every `<spectrum>` the loader
//! keeps the metadata needed for trace extraction and spectral trees (ms
//! level, polarity, scan start time, filter string, scan window, precursor,
//! activation) and decodes the m/z and intensity arrays. Scan start times are
//! converted to minutes.

mod binary;
mod cv;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

pub use binary::BinaryDecodeError;
use binary::{ArrayEncoding, ArrayKind};

use crate::io::xml::{get_attribute, text_content};
use crate::io::XmlReadError;
use crate::model::{FileId, Polarity, Precursor, ScanEvent, Spectrum, SpectrumHeader, SpectrumId};

/// Errors raised while loading mzML
#[derive(Debug, thiserror::Error)]
pub enum MzmlError {
    /// XML level failure
    #[error(transparent)]
    Xml(#[from] XmlReadError),

    /// A binary array could not be decoded
    #[error("Binary array of spectrum '{spectrum}': {source}")]
    Binary {
        /// Native spectrum id
        spectrum: String,
        /// Decoder error
        #[source]
        source: BinaryDecodeError,
    },

    /// The m/z and intensity arrays differ in length
    #[error("Spectrum '{spectrum}' has {mz} m/z values but {intensity} intensities")]
    ArrayLengthMismatch {
        /// Native spectrum id
        spectrum: String,
        /// m/z array length
        mz: usize,
        /// Intensity array length
        intensity: usize,
    },
}

impl From<quick_xml::Error> for MzmlError {
    fn from(e: quick_xml::Error) -> Self {
        MzmlError::Xml(XmlReadError::XmlError(e))
    }
}

impl From<std::io::Error> for MzmlError {
    fn from(e: std::io::Error) -> Self {
        MzmlError::Xml(XmlReadError::IoError(e))
    }
}

#[derive(Debug)]
struct CvParam {
    accession: String,
    value: Option<String>,
    unit_accession: Option<String>,
}

impl CvParam {
    fn parse(e: &BytesStart) -> Result<Self, XmlReadError> {
        Ok(Self {
            accession: get_attribute(e, "accession")?.unwrap_or_default(),
            value: get_attribute(e, "value")?,
            unit_accession: get_attribute(e, "unitAccession")?,
        })
    }

    fn value_f64(&self) -> Option<f64> {
        self.value.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

/// Spectrum fields collected while its element is open
#[derive(Debug, Default)]
struct PendingSpectrum {
    ms_level: Option<u8>,
    polarity: Option<Polarity>,
    retention_time: Option<f64>,
    filter: Option<String>,
    window_lower: Option<f64>,
    window_upper: Option<f64>,
    precursor_mz: Option<f64>,
    precursor_charge: Option<i32>,
    activation: Option<&'static str>,
    activation_energy: Option<f64>,
    isolation_lower: Option<f64>,
    isolation_upper: Option<f64>,
    mz: Vec<f64>,
    intensity: Vec<f64>,
}

impl PendingSpectrum {
    fn apply(&mut self, param: &CvParam) {
        match param.accession.as_str() {
            cv::MS_LEVEL => self.ms_level = param.value_f64().map(|v| v as u8),
            cv::POSITIVE_SCAN => self.polarity = Some(Polarity::Positive),
            cv::NEGATIVE_SCAN => self.polarity = Some(Polarity::Negative),
            cv::SCAN_START_TIME => {
                self.retention_time = param.value_f64().map(|v| {
                    cv::retention_time_minutes(v, param.unit_accession.as_deref())
                })
            }
            cv::FILTER_STRING => self.filter = param.value.clone(),
            cv::SCAN_WINDOW_LOWER => self.window_lower = param.value_f64(),
            cv::SCAN_WINDOW_UPPER => self.window_upper = param.value_f64(),
            cv::SELECTED_ION_MZ => self.precursor_mz = param.value_f64(),
            cv::CHARGE_STATE => self.precursor_charge = param.value_f64().map(|v| v as i32),
            cv::COLLISION_ENERGY => self.activation_energy = param.value_f64(),
            cv::ISOLATION_LOWER_OFFSET => self.isolation_lower = param.value_f64(),
            cv::ISOLATION_UPPER_OFFSET => self.isolation_upper = param.value_f64(),
            other => {
                if let Some(method) = cv::activation(other) {
                    self.activation = Some(method);
                }
            }
        }
    }
}

/// Streaming mzML spectrum loader for one sample file
pub struct MzmlSpectrumReader<R: BufRead> {
    reader: Reader<R>,
    file: FileId,
    polarity: Polarity,
    next_id: u64,
    mass_analyzer: Option<&'static str>,
    ionization_source: Option<&'static str>,
}

impl MzmlSpectrumReader<BufReader<File>> {
    /// Open an mzML file
    pub fn open<P: AsRef<Path>>(path: P, file: FileId, polarity: Polarity) -> Result<Self, MzmlError> {
        let handle = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(64 * 1024, handle), file, polarity))
    }
}

impl<R: BufRead> MzmlSpectrumReader<R> {
    /// Create a loader; `polarity` applies to spectra that do not state one
    pub fn new(reader: R, file: FileId, polarity: Polarity) -> Self {
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.config_mut().trim_text(true);
        Self {
            reader: xml_reader,
            file,
            polarity,
            next_id: 1,
            mass_analyzer: None,
            ionization_source: None,
        }
    }

    /// Number spectra starting at `id`
    pub fn first_id(mut self, id: SpectrumId) -> Self {
        self.next_id = id.0;
        self
    }

    /// Read every spectrum of the document in acquisition order
    pub fn read_all(mut self) -> Result<Vec<Spectrum>, MzmlError> {
        let mut spectra = Vec::new();
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"instrumentConfiguration" => self.parse_instrument()?,
                    b"spectrum" => {
                        let native_id = get_attribute(&e, "id")?.unwrap_or_default();
                        spectra.push(self.parse_spectrum(native_id)?);
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }

        debug!("Read {} spectra for file {}", spectra.len(), self.file);
        Ok(spectra)
    }

    fn parse_instrument(&mut self) -> Result<(), MzmlError> {
        let mut depth = 1;
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    if e.name().as_ref() == b"cvParam" {
                        self.apply_instrument(&CvParam::parse(&e)?);
                    }
                }
                Ok(Event::Empty(e)) => {
                    if e.name().as_ref() == b"cvParam" {
                        self.apply_instrument(&CvParam::parse(&e)?);
                    }
                }
                Ok(Event::End(_)) => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Ok(Event::Eof) => {
                    return Err(XmlReadError::InvalidStructure(
                        "Unexpected EOF in instrumentConfiguration".to_string(),
                    )
                    .into())
                }
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    // first instrument configuration wins
    fn apply_instrument(&mut self, param: &CvParam) {
        if let Some(analyzer) = cv::mass_analyzer(&param.accession) {
            self.mass_analyzer.get_or_insert(analyzer);
        }
        if let Some(source) = cv::ionization_source(&param.accession) {
            self.ionization_source.get_or_insert(source);
        }
    }

    fn parse_spectrum(&mut self, native_id: String) -> Result<Spectrum, MzmlError> {
        let mut pending = PendingSpectrum::default();
        let mut array: Option<ArrayEncoding> = None;
        let mut text = String::new();
        let mut depth = 1;
        let mut buf = Vec::new();

        loop {
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    match e.name().as_ref() {
                        b"cvParam" => apply_param(&mut pending, &mut array, &CvParam::parse(&e)?),
                        b"binaryDataArray" => {
                            array = Some(ArrayEncoding::default());
                            text.clear();
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    if e.name().as_ref() == b"cvParam" {
                        apply_param(&mut pending, &mut array, &CvParam::parse(&e)?);
                    }
                }
                Ok(Event::Text(t)) => {
                    if array.is_some() {
                        text.push_str(&text_content(&t)?);
                    }
                }
                Ok(Event::End(e)) => {
                    depth -= 1;
                    if e.name().as_ref() == b"binaryDataArray" {
                        if let Some(encoding) = array.take() {
                            let values =
                                encoding
                                    .decode(&text)
                                    .map_err(|source| MzmlError::Binary {
                                        spectrum: native_id.clone(),
                                        source,
                                    })?;
                            match encoding.kind {
                                ArrayKind::Mz => pending.mz = values,
                                ArrayKind::Intensity => pending.intensity = values,
                                ArrayKind::Other => {}
                            }
                        }
                    }
                    if depth == 0 {
                        break;
                    }
                }
                Ok(Event::Eof) => {
                    return Err(XmlReadError::InvalidStructure(format!(
                        "Unexpected EOF in spectrum '{native_id}'"
                    ))
                    .into())
                }
                Err(e) => return Err(e.into()),
                _ => {}
            }
            buf.clear();
        }

        self.finish(native_id, pending)
    }

    fn finish(&mut self, native_id: String, pending: PendingSpectrum) -> Result<Spectrum, MzmlError> {
        if pending.mz.len() != pending.intensity.len() {
            return Err(MzmlError::ArrayLengthMismatch {
                spectrum: native_id,
                mz: pending.mz.len(),
                intensity: pending.intensity.len(),
            });
        }
        let retention_time = pending.retention_time.ok_or_else(|| {
            XmlReadError::InvalidStructure(format!("Spectrum '{native_id}' has no scan start time"))
        })?;

        // spectra without an ms level are treated as survey scans
        let ms_level = pending.ms_level.unwrap_or(1);
        let msn = ms_level > 1;
        let scan_event = ScanEvent {
            ms_level,
            polarity: pending.polarity.unwrap_or(self.polarity),
            ionization_source: self.ionization_source.map(str::to_string),
            mass_analyzer: self.mass_analyzer.map(str::to_string),
            scan_type: pending.filter,
            mass_range: pending.window_lower.zip(pending.window_upper),
            resolution_at_200: None,
            activation: pending.activation.filter(|_| msn).map(str::to_string),
            activation_energy: pending.activation_energy.filter(|_| msn),
            isolation_width: pending
                .isolation_lower
                .zip(pending.isolation_upper)
                .map(|(lower, upper)| lower + upper)
                .filter(|_| msn),
        };

        let id = SpectrumId(self.next_id);
        self.next_id += 1;

        Ok(Spectrum {
            header: SpectrumHeader {
                id,
                file: self.file,
                retention_time,
                scan_event,
                precursor: pending.precursor_mz.map(|mz| Precursor {
                    mz,
                    charge: pending.precursor_charge,
                }),
            },
            mz: pending.mz,
            intensity: pending.intensity.into_iter().map(|v| v as f32).collect(),
        })
    }
}

fn apply_param(pending: &mut PendingSpectrum, array: &mut Option<ArrayEncoding>, param: &CvParam) {
    match array {
        Some(encoding) => encoding.apply(&param.accession),
        None => pending.apply(param),
    }
}
