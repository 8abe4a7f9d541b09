//! # Reconciliation Pipeline
//!
//! Runs the stages of one reconciliation in order:
//!
//! 1. detect features per sample and export each map under a name carrying
//!    the sample's file token
//! 2. link the maps (a single map becomes singleton groups)
//! 3. bind map positions to files ([`IdentityMapper`])
//! 4. import raw features, dropping malformed ones
//! 5. decharge the well-linked groups over the charge-bound schedule
//! 6. resolve charges and build feature ions
//! 7. group compounds and consolidate component peaks
//! 8. generate XIC traces and assign spectral trees per file
//!
//! Everything runs sequentially. A tool failure or an identity error aborts
//! the run; a file without survey scans only loses its spectral trees.

mod error;
mod report;

use std::time::Instant;

use log::{error, info};

use crate::cascade::{ChargeResolutionCascade, DechargeSchedule, FeatureGroups};
use crate::compound::CompoundGrouper;
use crate::config::ReconcileConfig;
use crate::consolidation::{ComponentPeak, Consolidator};
use crate::identity::{exported_map_name, IdentityMapper};
use crate::ions::{FeatureIonBuilder, IonSet};
use crate::model::{
    Compound, ConsensusMap, FeatureMap, RawFeature, RetentionTimeRaster, SampleFile,
    SpectralTreeAssignment, Spectrum, XicTrace,
};
use crate::spectra::SpectrumSource;
use crate::spectral_tree::{SpectralTreeAssigner, SpectralTreeError};
use crate::tools::{Decharger, FeatureDetector, FeatureLinker};
use crate::xic::XicTraceGenerator;

pub use error::PipelineError;
pub use report::{RejectedFeature, RunSummary};

/// Inputs and external tools of one run
pub struct PipelineInput<'a> {
    /// Sample files in input order
    pub samples: Vec<SampleFile>,
    /// Feature detector
    pub detector: &'a mut dyn FeatureDetector,
    /// Feature linker
    pub linker: &'a mut dyn FeatureLinker,
    /// Decharger
    pub decharger: &'a mut dyn Decharger,
    /// Spectra of all samples
    pub spectra: &'a dyn SpectrumSource,
}

/// Records produced by one run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Feature ions and chromatogram peaks
    pub ions: IonSet,
    /// Compounds formed by decharged groups
    pub compounds: Vec<Compound>,
    /// One component peak per ion
    pub component_peaks: Vec<ComponentPeak>,
    /// One raster per file with survey scans and ions
    pub rasters: Vec<RetentionTimeRaster>,
    /// Isotope and summed ion traces
    pub traces: Vec<XicTrace>,
    /// One assignment per chromatogram peak of files with survey scans
    pub spectral_trees: Vec<SpectralTreeAssignment>,
    /// Distinct spectra referenced by the spectral trees
    pub assigned_spectra: Vec<Spectrum>,
    /// Counts and problems of the run
    pub summary: RunSummary,
}

/// Sequential reconciliation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ReconcileConfig,
}

impl Pipeline {
    /// Create a pipeline with validated parameters
    pub fn new(config: ReconcileConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parameters of the run
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run every stage on `input`
    pub fn run(&self, input: PipelineInput<'_>) -> Result<PipelineOutput, PipelineError> {
        let PipelineInput {
            samples,
            detector,
            linker,
            decharger,
            spectra,
        } = input;
        if samples.is_empty() {
            return Err(PipelineError::NoSamples);
        }

        let mut summary = RunSummary::start();
        summary.files = samples.len();
        info!("Run {} over {} sample files", summary.run_id, samples.len());

        let started = Instant::now();
        let maps = self.detect(detector, &samples)?;
        stage_done("Feature detection", started);

        let started = Instant::now();
        let consensus = if let [map] = maps.as_slice() {
            ConsensusMap::from_single_feature_map(map)
        } else {
            linker.link(&maps, &self.config.linking_settings())?
        };
        summary.consensus_groups = consensus.groups.len();
        stage_done("Feature linking", started);

        let identity = IdentityMapper::new().build(&consensus.maps, &samples)?;

        let started = Instant::now();
        let mut builder = FeatureIonBuilder::new();
        let mut features: Vec<RawFeature> = Vec::new();
        for (sample, map) in samples.iter().zip(&maps) {
            let imported = builder.import(sample.id, map);
            summary
                .rejected_features
                .extend(imported.rejected.iter().map(RejectedFeature::from));
            features.extend(imported.features);
        }
        summary.raw_features = features.len();
        let groups = FeatureGroups::build(&consensus, &identity, &features)?;
        summary.synthetic_groups = groups.synthetic_count();
        stage_done("Feature import", started);

        let started = Instant::now();
        let schedule = DechargeSchedule::new(self.config.max_charge, self.config.min_linked_samples);
        let decharged = schedule.run(
            decharger,
            &consensus,
            samples.len(),
            &self.config.decharge_settings(),
        )?;
        summary.decharged_groups = decharged.len();
        summary.decharge_iterations = decharged.iterations();
        stage_done("Decharging", started);

        let started = Instant::now();
        let resolved = ChargeResolutionCascade::new().resolve(&features, &groups, &decharged)?;
        summary.resolution_tiers = resolved.tier_counts().into_iter().collect();
        let ions = builder.build(&features, &groups, &resolved)?;
        summary.ions = ions.ions.len();
        summary.peaks = ions.peaks.len();
        stage_done("Charge resolution", started);

        let started = Instant::now();
        let compounds = CompoundGrouper::new().group(&ions.ions, &decharged)?;
        summary.compounds = compounds.len();
        let component_peaks = Consolidator::new(
            self.config.mass_tolerance_ppm,
            self.config.max_sample_to_control,
            self.config.max_control_to_sample,
        )
        .consolidate(&ions.ions, &consensus, &samples);
        stage_done("Compound grouping", started);

        let started = Instant::now();
        let mut generator =
            XicTraceGenerator::new(self.config.mass_tolerance_ppm, self.config.spectrum_batch_size);
        let mut rasters = Vec::new();
        let mut traces = Vec::new();
        for sample in &samples {
            let file_traces = generator.generate(spectra, sample.id, &ions)?;
            rasters.extend(file_traces.raster);
            traces.extend(file_traces.traces);
        }
        summary.rasters = rasters.len();
        summary.traces = traces.len();
        stage_done("XIC generation", started);

        let started = Instant::now();
        let assigner =
            SpectralTreeAssigner::new(self.config.mass_tolerance_ppm, self.config.spectrum_batch_size);
        let mut spectral_trees = Vec::new();
        let mut assigned_spectra = Vec::new();
        for sample in &samples {
            if ions.ions_of_file(sample.id).next().is_none() {
                continue;
            }
            match assigner.assign(spectra, sample.id, &ions, sample.polarity) {
                Ok(trees) => {
                    spectral_trees.extend(trees.assignments);
                    assigned_spectra.extend(trees.spectra);
                }
                Err(SpectralTreeError::MissingMs1(e)) => {
                    error!("{}", e);
                    summary.missing_ms1.push(e.file);
                }
                Err(e) => return Err(e.into()),
            }
        }
        summary.spectral_trees = spectral_trees.len();
        summary.assigned_spectra = assigned_spectra.len();
        stage_done("Spectral tree assignment", started);

        summary.finish();
        info!("{}", summary);

        Ok(PipelineOutput {
            ions,
            compounds,
            component_peaks,
            rasters,
            traces,
            spectral_trees,
            assigned_spectra,
            summary,
        })
    }

    /// Detect features of every sample and name each map after its file token
    fn detect(
        &self,
        detector: &mut dyn FeatureDetector,
        samples: &[SampleFile],
    ) -> Result<Vec<FeatureMap>, PipelineError> {
        let settings = self.config.detection_settings();
        let mut maps = Vec::with_capacity(samples.len());
        for sample in samples {
            let mut map = detector.detect(sample, &settings)?;
            map.name = exported_map_name(sample);
            info!(
                "File {}: {} features detected in {}",
                sample.id,
                map.features.len(),
                sample.display_name()
            );
            maps.push(map);
        }
        Ok(maps)
    }
}

fn stage_done(stage: &str, started: Instant) {
    info!("{} finished in {:.2?}", stage, started.elapsed());
}
