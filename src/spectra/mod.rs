//! # Spectrum Access
//!
//! Raw spectrum storage lives outside the reconciliation pipeline. Stages
//! read headers per file and fetch peak data by id through the
//! [`SpectrumSource`] trait, in bounded sequential batches.
//!
//! [`InMemorySpectra`] is the bundled store; with the `mzml` feature it can
//! be filled from mzML files.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::model::{FileId, Spectrum, SpectrumHeader, SpectrumId};

#[cfg(feature = "mzml")]
pub mod mzml;

#[cfg(feature = "mzml")]
pub use mzml::{MzmlError, MzmlSpectrumReader};

/// Errors raised by spectrum sources
#[derive(Debug, thiserror::Error)]
pub enum SpectrumSourceError {
    /// A spectrum id was stored twice
    #[error("Spectrum {0} is already stored")]
    DuplicateSpectrum(SpectrumId),

    /// m/z and intensity arrays differ in length
    #[error("Spectrum {id}: {mz} m/z values but {intensity} intensities")]
    ArrayLengthMismatch {
        /// Offending spectrum
        id: SpectrumId,
        /// Number of m/z values
        mz: usize,
        /// Number of intensities
        intensity: usize,
    },

    /// A requested spectrum does not exist
    #[error("Spectrum {0} is not available")]
    UnknownSpectrum(SpectrumId),

    /// mzML input could not be read
    #[cfg(feature = "mzml")]
    #[error("mzML error: {0}")]
    Mzml(#[from] MzmlError),
}

/// Read access to the spectra of a run
pub trait SpectrumSource {
    /// Headers of all spectra of `file`, in acquisition order
    fn headers(&self, file: FileId) -> Result<Vec<SpectrumHeader>, SpectrumSourceError>;

    /// Spectra with peak data, in the order of `ids`
    fn spectra(&self, ids: &[SpectrumId]) -> Result<Vec<Spectrum>, SpectrumSourceError>;
}

/// Split `ids` into consecutive batches of at most `size` ids
pub fn batches(ids: &[SpectrumId], size: usize) -> std::slice::Chunks<'_, SpectrumId> {
    ids.chunks(size.max(1))
}

/// Fetch `ids` batch by batch, preserving order
pub fn fetch_batched<S: SpectrumSource + ?Sized>(
    source: &S,
    ids: &[SpectrumId],
    batch_size: usize,
) -> Result<Vec<Spectrum>, SpectrumSourceError> {
    let mut spectra = Vec::with_capacity(ids.len());
    for (i, batch) in batches(ids, batch_size).enumerate() {
        debug!("Fetching spectrum batch {} ({} spectra)", i + 1, batch.len());
        spectra.extend(source.spectra(batch)?);
    }
    Ok(spectra)
}

/// Spectrum store held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySpectra {
    spectra: HashMap<SpectrumId, Spectrum>,
    by_file: BTreeMap<FileId, Vec<SpectrumId>>,
    next_id: u64,
}

impl InMemorySpectra {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Identifier the next allocated spectrum would receive
    pub fn next_id(&self) -> SpectrumId {
        SpectrumId(self.next_id.max(1))
    }

    /// Store a spectrum under the id in its header
    pub fn insert(&mut self, spectrum: Spectrum) -> Result<SpectrumId, SpectrumSourceError> {
        let id = spectrum.header.id;
        if self.spectra.contains_key(&id) {
            return Err(SpectrumSourceError::DuplicateSpectrum(id));
        }
        if spectrum.mz.len() != spectrum.intensity.len() {
            return Err(SpectrumSourceError::ArrayLengthMismatch {
                id,
                mz: spectrum.mz.len(),
                intensity: spectrum.intensity.len(),
            });
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.by_file
            .entry(spectrum.header.file)
            .or_default()
            .push(id);
        self.spectra.insert(id, spectrum);
        Ok(id)
    }

    /// Store a spectrum under a freshly allocated id
    pub fn push(
        &mut self,
        mut header: SpectrumHeader,
        mz: Vec<f64>,
        intensity: Vec<f32>,
    ) -> Result<SpectrumId, SpectrumSourceError> {
        header.id = self.next_id();
        self.insert(Spectrum {
            header,
            mz,
            intensity,
        })
    }

    /// Load all spectra of an mzML file for `file`
    #[cfg(feature = "mzml")]
    pub fn load_mzml<P: AsRef<std::path::Path>>(
        &mut self,
        file: FileId,
        path: P,
        polarity: crate::model::Polarity,
    ) -> Result<usize, SpectrumSourceError> {
        let reader = MzmlSpectrumReader::open(path.as_ref(), file, polarity)?;
        let spectra = reader.first_id(self.next_id()).read_all()?;
        let count = spectra.len();
        for spectrum in spectra {
            self.insert(spectrum)?;
        }
        log::info!(
            "Loaded {} spectra for file {} from {}",
            count,
            file,
            path.as_ref().display()
        );
        Ok(count)
    }

    /// Number of stored spectra
    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

impl SpectrumSource for InMemorySpectra {
    fn headers(&self, file: FileId) -> Result<Vec<SpectrumHeader>, SpectrumSourceError> {
        Ok(self
            .by_file
            .get(&file)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.spectra.get(id))
                    .map(|s| s.header.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn spectra(&self, ids: &[SpectrumId]) -> Result<Vec<Spectrum>, SpectrumSourceError> {
        ids.iter()
            .map(|id| {
                self.spectra
                    .get(id)
                    .cloned()
                    .ok_or(SpectrumSourceError::UnknownSpectrum(*id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanEvent;

    fn header(file: i32, rt: f64) -> SpectrumHeader {
        SpectrumHeader {
            id: SpectrumId(0),
            file: FileId(file),
            retention_time: rt,
            scan_event: ScanEvent {
                ms_level: 1,
                ..Default::default()
            },
            precursor: None,
        }
    }

    #[test]
    fn test_push_allocates_ids_per_store() {
        let mut store = InMemorySpectra::new();
        let a = store.push(header(1, 0.1), vec![100.0], vec![1.0]).unwrap();
        let b = store.push(header(2, 0.2), vec![100.0], vec![1.0]).unwrap();
        assert_eq!(a, SpectrumId(1));
        assert_eq!(b, SpectrumId(2));
        assert_eq!(store.headers(FileId(1)).unwrap().len(), 1);
        assert!(store.headers(FileId(3)).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown_ids() {
        let mut store = InMemorySpectra::new();
        let mut h = header(1, 0.1);
        h.id = SpectrumId(7);
        let spectrum = Spectrum {
            header: h,
            mz: Vec::new(),
            intensity: Vec::new(),
        };
        store.insert(spectrum.clone()).unwrap();
        assert!(matches!(
            store.insert(spectrum),
            Err(SpectrumSourceError::DuplicateSpectrum(SpectrumId(7)))
        ));
        assert_eq!(store.next_id(), SpectrumId(8));
        assert!(matches!(
            store.spectra(&[SpectrumId(9)]),
            Err(SpectrumSourceError::UnknownSpectrum(SpectrumId(9)))
        ));
    }

    #[test]
    fn test_mismatched_arrays_are_rejected() {
        let mut store = InMemorySpectra::new();
        let err = store
            .push(header(1, 0.1), vec![99.0, 100.0, 101.0], vec![1.0])
            .unwrap_err();
        assert!(matches!(
            err,
            SpectrumSourceError::ArrayLengthMismatch {
                mz: 3,
                intensity: 1,
                ..
            }
        ));
        assert!(store.headers(FileId(1)).unwrap().is_empty());
    }

    #[test]
    fn test_batches_cover_all_ids_in_order() {
        let ids: Vec<SpectrumId> = (1..=2500).map(SpectrumId).collect();
        let sizes: Vec<usize> = batches(&ids, 1000).map(<[SpectrumId]>::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(batches(&ids[..3], 0).count(), 3);
    }

    #[test]
    fn test_fetch_batched_preserves_order() {
        let mut store = InMemorySpectra::new();
        for i in 0..5 {
            store
                .push(header(1, i as f64), vec![100.0 + i as f64], vec![1.0])
                .unwrap();
        }
        let ids = [SpectrumId(5), SpectrumId(1), SpectrumId(3)];
        let spectra = fetch_batched(&store, &ids, 2).unwrap();
        let fetched: Vec<SpectrumId> = spectra.iter().map(|s| s.header.id).collect();
        assert_eq!(fetched, ids);
    }
}
