use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use mzreconcile::config::ReconcileConfig;
use mzreconcile::model::{FileId, SampleFile};
use mzreconcile::output::ResultWriter;
use mzreconcile::pipeline::{Pipeline, PipelineInput};
use mzreconcile::spectra::InMemorySpectra;
use mzreconcile::tools::{ConsensusXmlLinker, FeatureXmlDetector, RecordedDecharger};

use super::config::RunManifest;

const DEFAULT_OUTPUT: &str = "mzreconcile_results";

/// Command line values taking precedence over the manifest
#[derive(Debug, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub mass_tolerance_ppm: Option<f64>,
    pub min_linked_samples: Option<usize>,
    pub max_charge: Option<u32>,
    pub batch_size: Option<usize>,
}

impl Overrides {
    fn apply(&self, config: &mut ReconcileConfig) {
        if let Some(v) = self.mass_tolerance_ppm {
            config.mass_tolerance_ppm = v;
        }
        if let Some(v) = self.min_linked_samples {
            config.min_linked_samples = v;
        }
        if let Some(v) = self.max_charge {
            config.max_charge = v;
        }
        if let Some(v) = self.batch_size {
            config.spectrum_batch_size = v;
        }
    }
}

/// Reconcile the samples of a manifest
pub fn run(manifest_path: PathBuf, overrides: Overrides) -> Result<()> {
    let manifest = RunManifest::from_file(&manifest_path)?;
    if manifest.samples.is_empty() {
        anyhow::bail!("Manifest lists no samples: {}", manifest_path.display());
    }

    let mut config = manifest.reconcile.clone();
    overrides.apply(&mut config);
    let pipeline = Pipeline::new(config).context("Invalid reconciliation parameters")?;

    let samples: Vec<SampleFile> = manifest.samples.iter().map(|s| s.sample_file()).collect();

    let mut detector = FeatureXmlDetector::new();
    for entry in &manifest.samples {
        detector.insert(FileId(entry.id), &entry.features);
    }

    let consensus = match (&manifest.consensus, samples.len()) {
        (Some(path), _) => path.clone(),
        (None, 1) => PathBuf::new(),
        (None, _) => anyhow::bail!("A consensus file is required for runs with several samples"),
    };
    let mut linker = ConsensusXmlLinker::new(consensus);

    let mut decharger = manifest
        .decharge
        .iter()
        .fold(RecordedDecharger::new(), |d, entry| {
            d.with_file(entry.max_charge, &entry.path)
        });
    if decharger.is_empty() {
        info!("No decharge results given, groups keep their consensus charges");
    }

    let spectra = load_spectra(&manifest)?;

    info!("mzreconcile - LC-MS feature reconciliation");
    info!("Manifest: {}", manifest_path.display());
    info!("Samples:  {}", samples.len());

    let output = pipeline
        .run(PipelineInput {
            samples,
            detector: &mut detector,
            linker: &mut linker,
            decharger: &mut decharger,
            spectra: &spectra,
        })
        .context("Reconciliation failed")?;

    let dir = overrides
        .output
        .or(manifest.output)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let bundle = ResultWriter::new(&dir)
        .write(&output)
        .with_context(|| format!("Failed to write results to {}", dir.display()))?;

    println!("{}", output.summary);
    println!("  Compounds:       {}", output.summary.compounds);
    println!("  Component peaks: {}", output.component_peaks.len());
    println!("  {}", bundle.traces);
    for file in &output.summary.missing_ms1 {
        println!("  File {} has no MS1 spectra, spectral trees skipped", file);
    }
    println!("Results written to {}", dir.display());
    Ok(())
}

#[cfg(feature = "mzml")]
fn load_spectra(manifest: &RunManifest) -> Result<InMemorySpectra> {
    let mut spectra = InMemorySpectra::new();
    for entry in &manifest.samples {
        let path = entry.spectra_path();
        let count = spectra
            .load_mzml(FileId(entry.id), path, entry.polarity)
            .with_context(|| format!("Failed to load spectra from {}", path.display()))?;
        info!("File {}: {} spectra loaded", entry.id, count);
    }
    Ok(spectra)
}

#[cfg(not(feature = "mzml"))]
fn load_spectra(_manifest: &RunManifest) -> Result<InMemorySpectra> {
    log::warn!("Built without mzML support, XIC and spectral tree stages see no spectra");
    Ok(InMemorySpectra::new())
}
