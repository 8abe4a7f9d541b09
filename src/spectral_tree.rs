//! Spectral tree assignment.
//!
//! Every chromatogram peak is linked to the survey scan closest to its apex
//! and to the data dependent scans that fragmented it: MS2 scans acquired
//! inside the peak's retention time span whose precursor m/z lies within the
//! mass tolerance of the peak mass.

use std::collections::BTreeSet;

use log::{debug, info};

use crate::ions::IonSet;
use crate::model::{
    ChromatogramPeak, FileId, Polarity, Spectrum, SpectralTree, SpectralTreeAssignment,
    SpectrumHeader, SpectrumId,
};
use crate::spectra::{fetch_batched, SpectrumSource, SpectrumSourceError};

/// The file has no MS1 spectrum at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("File {file} has no MS1 spectra, spectral trees cannot be built")]
pub struct MissingMs1Error {
    /// File without survey scans
    pub file: FileId,
}

/// Errors of the spectral tree stage for one file
#[derive(Debug, thiserror::Error)]
pub enum SpectralTreeError {
    /// No survey scans; only this file's spectral tree stage fails
    #[error(transparent)]
    MissingMs1(#[from] MissingMs1Error),

    /// Spectra could not be read
    #[error("Spectrum access failed: {0}")]
    Spectra(#[from] SpectrumSourceError),
}

/// Trees of one file plus the spectra they reference
#[derive(Debug, Clone, Default)]
pub struct FileSpectralTrees {
    /// One assignment per chromatogram peak of the file
    pub assignments: Vec<SpectralTreeAssignment>,
    /// Distinct assigned spectra, ordered by id
    pub spectra: Vec<Spectrum>,
}

/// Assigns spectral trees to chromatogram peaks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralTreeAssigner {
    tolerance_ppm: f64,
    batch_size: usize,
}

impl SpectralTreeAssigner {
    /// Create an assigner
    pub fn new(tolerance_ppm: f64, batch_size: usize) -> Self {
        Self {
            tolerance_ppm,
            batch_size,
        }
    }

    /// Assign trees to every peak of `file` and fetch the assigned spectra.
    ///
    /// `fallback` is the polarity used when the file holds no spectra to take
    /// the default charge from.
    pub fn assign<S: SpectrumSource + ?Sized>(
        &self,
        source: &S,
        file: FileId,
        ions: &IonSet,
        fallback: Polarity,
    ) -> Result<FileSpectralTrees, SpectralTreeError> {
        let mut headers = source.headers(file)?;
        headers.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));

        let polarity = headers
            .first()
            .map(|h| h.scan_event.polarity)
            .unwrap_or(fallback);

        let ms1: Vec<&SpectrumHeader> = headers.iter().filter(|h| h.is_ms1()).collect();
        if ms1.is_empty() {
            return Err(MissingMs1Error { file }.into());
        }
        let msn: Vec<&SpectrumHeader> = headers
            .iter()
            .filter(|h| h.scan_event.ms_level == 2)
            .collect();

        let mut assignments = Vec::new();
        let mut assigned = BTreeSet::new();
        for ion in ions.ions_of_file(file) {
            let charge = polarity.effective_charge(ion.charge);
            for peak in ions.peaks_of(ion) {
                let tree = self.tree_for(peak, charge, &ms1, &msn);
                assigned.extend(tree.spectra());
                assignments.push(SpectralTreeAssignment {
                    peak: peak.id,
                    tree,
                });
            }
        }

        let ids: Vec<SpectrumId> = assigned.into_iter().collect();
        let spectra = fetch_batched(source, &ids, self.batch_size)?;

        info!(
            "File {}: {} of {} peaks have an MS1 scan, {} spectra assigned",
            file,
            assignments.iter().filter(|a| a.tree.ms1.is_some()).count(),
            assignments.len(),
            spectra.len()
        );
        Ok(FileSpectralTrees {
            assignments,
            spectra,
        })
    }

    /// Tree of one peak; `ms1` must be in retention time order
    pub fn tree_for(
        &self,
        peak: &ChromatogramPeak,
        charge: i32,
        ms1: &[&SpectrumHeader],
        msn: &[&SpectrumHeader],
    ) -> SpectralTree {
        let Some(survey) = nearest_ms1(peak, ms1) else {
            debug!("Peak {} has no MS1 scan within its span", peak.id);
            return SpectralTree::empty();
        };

        let max_delta = peak.mass * self.tolerance_ppm * 1e-6;
        let ms2 = msn
            .iter()
            .filter(|h| h.scan_event.ms_level == 2)
            .filter(|h| h.retention_time >= peak.left_rt && h.retention_time <= peak.right_rt)
            .filter(|h| {
                h.precursor.is_some_and(|p| {
                    (p.mz - peak.mass).abs() <= max_delta
                        && p.charge
                            .filter(|&c| c != 0)
                            .map_or(true, |c| c.abs() == charge.abs())
                })
            })
            .map(|h| h.id)
            .collect();

        SpectralTree {
            ms1: Some(survey.id),
            ms2,
        }
    }
}

/// Survey scan closest to the apex inside the peak span, earlier scan on ties
fn nearest_ms1<'a>(peak: &ChromatogramPeak, ms1: &[&'a SpectrumHeader]) -> Option<&'a SpectrumHeader> {
    let mut best: Option<(&SpectrumHeader, f64)> = None;
    for header in ms1
        .iter()
        .copied()
        .filter(|h| h.retention_time >= peak.left_rt && h.retention_time <= peak.right_rt)
    {
        let distance = (header.retention_time - peak.apex_rt).abs();
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((header, distance));
        }
    }
    best.map(|(h, _)| h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IonId, PeakId, Precursor, ScanEvent};
    use crate::spectra::InMemorySpectra;

    fn peak(mass: f64, left: f64, apex: f64, right: f64) -> ChromatogramPeak {
        ChromatogramPeak {
            id: PeakId(1),
            ion: IonId(1),
            file: FileId(1),
            isotope: 0,
            mass,
            apex_rt: apex,
            left_rt: left,
            right_rt: right,
            area: 100.0,
        }
    }

    fn header(id: u64, rt: f64, ms_level: u8, precursor: Option<Precursor>) -> SpectrumHeader {
        SpectrumHeader {
            id: SpectrumId(id),
            file: FileId(1),
            retention_time: rt,
            scan_event: ScanEvent {
                ms_level,
                ..Default::default()
            },
            precursor,
        }
    }

    #[test]
    fn test_tree_picks_nearest_ms1_and_matching_ms2() {
        let headers = [
            header(1, 2.9, 1, None),
            header(2, 3.05, 1, None),
            header(
                3,
                3.1,
                2,
                Some(Precursor {
                    mz: 300.0008,
                    charge: None,
                }),
            ),
            header(
                4,
                3.2,
                2,
                Some(Precursor {
                    mz: 300.01,
                    charge: None,
                }),
            ),
            header(
                5,
                3.6,
                2,
                Some(Precursor {
                    mz: 300.0,
                    charge: Some(1),
                }),
            ),
        ];
        let ms1: Vec<&SpectrumHeader> = headers.iter().filter(|h| h.is_ms1()).collect();
        let msn: Vec<&SpectrumHeader> = headers.iter().filter(|h| !h.is_ms1()).collect();

        let tree = SpectralTreeAssigner::new(5.0, 1000).tree_for(
            &peak(300.0, 2.8, 3.0, 3.4),
            1,
            &ms1,
            &msn,
        );
        assert_eq!(tree.ms1, Some(SpectrumId(2)));
        // 300.01 is outside 5 ppm, scan 5 is after the right bound
        assert_eq!(tree.ms2, vec![SpectrumId(3)]);
    }

    #[test]
    fn test_only_ms2_scans_become_children() {
        let precursor = Some(Precursor {
            mz: 300.0,
            charge: None,
        });
        let headers = [
            header(1, 3.0, 1, None),
            header(2, 3.1, 2, precursor),
            header(3, 3.2, 3, precursor),
        ];
        let ms1: Vec<&SpectrumHeader> = headers.iter().filter(|h| h.is_ms1()).collect();
        let msn: Vec<&SpectrumHeader> = headers.iter().filter(|h| !h.is_ms1()).collect();

        let tree = SpectralTreeAssigner::new(5.0, 1000).tree_for(
            &peak(300.0, 2.8, 3.0, 3.4),
            1,
            &ms1,
            &msn,
        );
        assert_eq!(tree.ms1, Some(SpectrumId(1)));
        assert_eq!(tree.ms2, vec![SpectrumId(2)]);
    }

    #[test]
    fn test_tie_picks_earlier_scan_and_charge_must_agree() {
        let headers = [
            header(1, 2.75, 1, None),
            header(2, 3.25, 1, None),
            header(
                3,
                3.0,
                2,
                Some(Precursor {
                    mz: 300.0,
                    charge: Some(2),
                }),
            ),
        ];
        let ms1: Vec<&SpectrumHeader> = headers.iter().filter(|h| h.is_ms1()).collect();
        let msn: Vec<&SpectrumHeader> = headers.iter().filter(|h| !h.is_ms1()).collect();
        let assigner = SpectralTreeAssigner::new(5.0, 1000);

        let tree = assigner.tree_for(&peak(300.0, 2.5, 3.0, 3.5), 1, &ms1, &msn);
        assert_eq!(tree.ms1, Some(SpectrumId(1)));
        assert!(tree.ms2.is_empty());

        let tree = assigner.tree_for(&peak(300.0, 2.5, 3.0, 3.5), -2, &ms1, &msn);
        assert_eq!(tree.ms2, vec![SpectrumId(3)]);
    }

    #[test]
    fn test_no_ms1_in_span_gives_empty_tree() {
        let headers = [header(1, 5.0, 1, None)];
        let ms1: Vec<&SpectrumHeader> = headers.iter().collect();
        let tree = SpectralTreeAssigner::new(5.0, 1000).tree_for(
            &peak(300.0, 2.0, 3.0, 4.0),
            1,
            &ms1,
            &[],
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn test_file_without_ms1_is_missing_ms1() {
        let mut store = InMemorySpectra::new();
        store
            .push(header(0, 1.0, 2, None), vec![100.0], vec![1.0])
            .unwrap();
        let err = SpectralTreeAssigner::new(5.0, 1000)
            .assign(&store, FileId(1), &IonSet::default(), Polarity::Positive)
            .unwrap_err();
        assert!(matches!(
            err,
            SpectralTreeError::MissingMs1(MissingMs1Error { file: FileId(1) })
        ));
    }
}
