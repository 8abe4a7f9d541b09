//! # XIC Trace Generation
//!
//! Rebuilds extracted ion chromatograms for the isotope peaks of every ion of
//! one file. Each isotope peak gets a mass window
//! `[m * (1 - tol), m * (1 + tol)]` with the tolerance in ppm. All MS1
//! spectra of the file are scanned in retention time order and contribute
//! exactly one point to every window, zero when nothing falls inside it.
//!
//! Traces of a file share one [`RetentionTimeRaster`]. Besides the isotope
//! traces, every ion gets a summed trace built with [`sum_points`].

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::ions::IonSet;
use crate::model::{
    ChromatogramPeak, FileId, RasterId, RetentionTimeRaster, Spectrum, SpectrumHeader, TraceId,
    TracePoint, XicTrace,
};
use crate::spectra::{batches, SpectrumSource, SpectrumSourceError};
use crate::table::{IdSequence, TableError};

/// Errors raised while generating traces
#[derive(Debug, thiserror::Error)]
pub enum XicError {
    /// Spectra could not be read
    #[error("Spectrum access failed: {0}")]
    Spectra(#[from] SpectrumSourceError),

    /// Identifier allocation failed
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Inclusive m/z window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassWindow {
    /// Lower bound
    pub low: f64,
    /// Upper bound
    pub high: f64,
}

impl MassWindow {
    /// Window of `tolerance_ppm` around `mass`
    pub fn around(mass: f64, tolerance_ppm: f64) -> Self {
        let delta = tolerance_ppm * 1e-6;
        Self {
            low: mass * (1.0 - delta),
            high: mass * (1.0 + delta),
        }
    }

    /// Whether `mz` lies inside the window
    pub fn contains(&self, mz: f64) -> bool {
        mz >= self.low && mz <= self.high
    }

    /// Summed intensity of `spectrum` inside the window
    pub fn intensity(&self, spectrum: &Spectrum, sorted: bool) -> f64 {
        if !sorted {
            return spectrum.intensity_in_window(self.low, self.high);
        }
        let start = spectrum.mz.partition_point(|&mz| mz < self.low);
        let end = spectrum.mz.partition_point(|&mz| mz <= self.high);
        spectrum
            .intensity
            .get(start..end.max(start))
            .unwrap_or_default()
            .iter()
            .fold(0.0, |acc, &i| acc + i as f64)
    }
}

/// Traces and raster of one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileTraces {
    /// Shared raster, absent when the file has no ions or no MS1 scans
    pub raster: Option<RetentionTimeRaster>,
    /// Isotope traces followed by the summed ion trace, per ion
    pub traces: Vec<XicTrace>,
}

/// Sum trace points that share a spectrum, keeping first-seen order.
///
/// Only meaningful for traces sampled on the same raster.
pub fn sum_points<'a, I>(points: I) -> Vec<TracePoint>
where
    I: IntoIterator<Item = &'a TracePoint>,
{
    let mut summed: Vec<TracePoint> = Vec::new();
    let mut index = HashMap::new();
    for point in points {
        match index.get(&point.spectrum) {
            Some(&i) => {
                let existing: &mut TracePoint = &mut summed[i];
                existing.intensity += point.intensity;
            }
            None => {
                index.insert(point.spectrum, summed.len());
                summed.push(*point);
            }
        }
    }
    summed
}

/// MS1 headers of a file in retention time order
pub fn ms1_in_rt_order(headers: Vec<SpectrumHeader>) -> Vec<SpectrumHeader> {
    let mut ms1: Vec<SpectrumHeader> = headers.into_iter().filter(|h| h.is_ms1()).collect();
    ms1.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));
    ms1
}

/// Builds XIC traces and rasters
#[derive(Debug, Clone)]
pub struct XicTraceGenerator {
    tolerance_ppm: f64,
    batch_size: usize,
    trace_ids: IdSequence<TraceId>,
    raster_ids: IdSequence<RasterId>,
}

impl XicTraceGenerator {
    /// Create a generator
    pub fn new(tolerance_ppm: f64, batch_size: usize) -> Self {
        Self {
            tolerance_ppm,
            batch_size,
            trace_ids: IdSequence::new("xic traces"),
            raster_ids: IdSequence::new("retention time rasters"),
        }
    }

    /// Mass tolerance in ppm
    pub fn tolerance_ppm(&self) -> f64 {
        self.tolerance_ppm
    }

    /// Generate the traces of every ion of `file`
    pub fn generate<S: SpectrumSource + ?Sized>(
        &mut self,
        source: &S,
        file: FileId,
        ions: &IonSet,
    ) -> Result<FileTraces, XicError> {
        let targets: Vec<(_, Vec<&ChromatogramPeak>)> = ions
            .ions_of_file(file)
            .map(|ion| (ion, ions.peaks_of(ion).collect()))
            .collect();
        if targets.is_empty() {
            debug!("File {} has no ions, no traces generated", file);
            return Ok(FileTraces::default());
        }

        let ms1 = ms1_in_rt_order(source.headers(file)?);
        let Some(first) = ms1.first() else {
            warn!("File {} has no MS1 spectra, no traces generated", file);
            return Ok(FileTraces::default());
        };

        let raster = RetentionTimeRaster {
            id: self.raster_ids.next_id()?,
            file,
            scan_event: first.scan_event.clone(),
            times: ms1.iter().map(|h| h.retention_time).collect(),
            spectra: ms1.iter().map(|h| h.id).collect(),
        };

        let windows: Vec<MassWindow> = targets
            .iter()
            .flat_map(|(_, peaks)| peaks.iter())
            .map(|peak| MassWindow::around(peak.mass, self.tolerance_ppm))
            .collect();
        let mut points: Vec<Vec<TracePoint>> = vec![Vec::with_capacity(ms1.len()); windows.len()];

        for batch in batches(&raster.spectra, self.batch_size) {
            for spectrum in source.spectra(batch)? {
                let sorted = spectrum.mz.windows(2).all(|w| w[0] <= w[1]);
                for (window, trace) in windows.iter().zip(points.iter_mut()) {
                    trace.push(TracePoint {
                        spectrum: spectrum.header.id,
                        time: spectrum.header.retention_time,
                        intensity: window.intensity(&spectrum, sorted),
                    });
                }
            }
        }

        let mut traces = Vec::with_capacity(windows.len() + targets.len());
        let mut sampled = points.into_iter();
        for (ion, peaks) in &targets {
            let first_trace = traces.len();
            for peak in peaks {
                let Some(points) = sampled.next() else {
                    break;
                };
                traces.push(XicTrace {
                    id: self.trace_ids.next_id()?,
                    file,
                    ion: ion.id,
                    peak: Some(peak.id),
                    isotope: Some(peak.isotope),
                    raster: raster.id,
                    points,
                });
            }
            if traces.len() > first_trace {
                let summed = sum_points(traces[first_trace..].iter().flat_map(|t| t.points.iter()));
                traces.push(XicTrace {
                    id: self.trace_ids.next_id()?,
                    file,
                    ion: ion.id,
                    peak: None,
                    isotope: None,
                    raster: raster.id,
                    points: summed,
                });
            }
        }

        info!(
            "File {}: {} traces over {} MS1 scans",
            file,
            traces.len(),
            raster.len()
        );
        Ok(FileTraces {
            raster: Some(raster),
            traces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{ChargeResolutionCascade, DechargeResult, FeatureGroups};
    use crate::identity::IdentityMapper;
    use crate::ions::FeatureIonBuilder;
    use crate::model::{
        masstrace_intensity_key, ConsensusMap, FeatureMap, FeatureRecord, HullPoint, HullRecord,
        Polarity, SampleFile, ScanEvent, SpectrumId,
    };
    use crate::spectra::InMemorySpectra;

    fn header(file: i32, rt: f64, ms_level: u8) -> SpectrumHeader {
        SpectrumHeader {
            id: SpectrumId(0),
            file: FileId(file),
            retention_time: rt,
            scan_event: ScanEvent {
                ms_level,
                mass_analyzer: Some(format!("analyzer at {rt}")),
                ..Default::default()
            },
            precursor: None,
        }
    }

    /// One ion with isotope peaks at the given hull masses
    fn ion_set(masses: &[f64]) -> IonSet {
        let mut feature = FeatureRecord {
            id: 1,
            rt_seconds: 120.0,
            mz: masses[0],
            charge: 1,
            hulls: Vec::new(),
            user_params: Default::default(),
        };
        for (i, &mass) in masses.iter().enumerate() {
            feature.hulls.push(HullRecord {
                index: Some(i),
                points: vec![
                    HullPoint {
                        rt_seconds: 60.0,
                        mz: mass,
                    },
                    HullPoint {
                        rt_seconds: 180.0,
                        mz: mass,
                    },
                ],
            });
            feature
                .user_params
                .insert(masstrace_intensity_key(i), "100".to_string());
        }
        let map = FeatureMap {
            name: "a.mzML".into(),
            features: vec![feature],
        };

        let sample = SampleFile::new(FileId(1), "a.raw", Polarity::Positive);
        let consensus = ConsensusMap::from_single_feature_map(&map);
        let identity = IdentityMapper::new()
            .build(&consensus.maps, std::slice::from_ref(&sample))
            .unwrap();

        let mut builder = FeatureIonBuilder::new();
        let imported = builder.import(FileId(1), &map);
        let groups = FeatureGroups::build(&consensus, &identity, &imported.features).unwrap();
        let decharged = DechargeResult::empty();
        let charges = ChargeResolutionCascade::new()
            .resolve(&imported.features, &groups, &decharged)
            .unwrap();
        builder
            .build(&imported.features, &groups, &charges)
            .unwrap()
    }

    #[test]
    fn test_window_bounds() {
        let window = MassWindow::around(100.0, 5.0);
        assert!((window.low - 99.9995).abs() < 1e-9);
        assert!((window.high - 100.0005).abs() < 1e-9);
        assert!(window.contains(100.0004));
        assert!(!window.contains(100.0006));
    }

    #[test]
    fn test_window_intensity_with_short_intensity_array() {
        let spectrum = Spectrum {
            header: header(1, 1.0, 1),
            mz: vec![99.0, 100.0, 101.0],
            intensity: vec![1.0],
        };
        let window = MassWindow::around(100.0, 5.0);
        for sorted in [false, true] {
            let intensity = window.intensity(&spectrum, sorted);
            assert_eq!(intensity, 0.0);
            assert!(intensity.is_sign_positive());
        }
    }

    #[test]
    fn test_empty_window_yields_zero_point() {
        let ions = ion_set(&[100.0]);
        let mut store = InMemorySpectra::new();
        store.push(header(1, 1.0, 1), vec![100.0, 150.0], vec![40.0, 7.0]).unwrap();
        store.push(header(1, 1.5, 1), vec![120.0], vec![99.0]).unwrap();

        let result = XicTraceGenerator::new(5.0, 1000)
            .generate(&store, FileId(1), &ions)
            .unwrap();

        let raster = result.raster.unwrap();
        assert_eq!(raster.times, vec![1.0, 1.5]);

        let isotope = &result.traces[0];
        assert_eq!(isotope.isotope, Some(0));
        assert_eq!(isotope.points.len(), raster.len());
        assert_eq!(isotope.points[0].intensity, 40.0);
        assert_eq!(isotope.points[1].intensity, 0.0);
        assert!(isotope.points[1].intensity.is_sign_positive());
        assert_eq!(isotope.points[1].time, 1.5);
    }

    #[test]
    fn test_rt_order_shared_raster_and_ion_trace() {
        let ions = ion_set(&[200.0, 201.0034]);
        let mut store = InMemorySpectra::new();
        // stored out of order, MS2 scans are ignored
        store.push(header(1, 2.0, 1), vec![200.0, 201.0034], vec![10.0, 4.0]).unwrap();
        store.push(header(1, 1.0, 1), vec![200.0], vec![5.0]).unwrap();
        store.push(header(1, 1.2, 2), vec![200.0], vec![500.0]).unwrap();

        let result = XicTraceGenerator::new(5.0, 1)
            .generate(&store, FileId(1), &ions)
            .unwrap();

        let raster = result.raster.unwrap();
        assert_eq!(raster.times, vec![1.0, 2.0]);
        assert_eq!(raster.spectra, vec![SpectrumId(2), SpectrumId(1)]);
        assert_eq!(raster.scan_event.mass_analyzer.as_deref(), Some("analyzer at 1"));

        assert_eq!(result.traces.len(), 3);
        assert!(result.traces.iter().all(|t| t.raster == raster.id));
        assert!(result.traces.iter().all(|t| t.points.len() == raster.len()));

        let summed = &result.traces[2];
        assert_eq!(summed.peak, None);
        let intensities: Vec<f64> = summed.points.iter().map(|p| p.intensity).collect();
        assert_eq!(intensities, vec![5.0, 14.0]);
    }

    #[test]
    fn test_file_without_ions_has_no_raster() {
        let ions = ion_set(&[100.0]);
        let mut store = InMemorySpectra::new();
        store.push(header(2, 1.0, 1), vec![100.0], vec![1.0]).unwrap();
        let result = XicTraceGenerator::new(5.0, 10)
            .generate(&store, FileId(2), &ions)
            .unwrap();
        assert_eq!(result, FileTraces::default());
    }

    #[test]
    fn test_sum_points_groups_by_spectrum() {
        let a = [
            TracePoint {
                spectrum: SpectrumId(1),
                time: 1.0,
                intensity: 2.0,
            },
            TracePoint {
                spectrum: SpectrumId(2),
                time: 2.0,
                intensity: 3.0,
            },
        ];
        let b = [TracePoint {
            spectrum: SpectrumId(2),
            time: 2.0,
            intensity: 4.0,
        }];
        let summed = sum_points(a.iter().chain(b.iter()));
        assert_eq!(summed.len(), 2);
        assert_eq!(summed[1].intensity, 7.0);
        assert_eq!(summed[0].time, 1.0);
    }
}
