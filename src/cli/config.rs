//! TOML run manifest.
//!
//! A manifest names the input files of a run and carries the reconciliation
//! parameters:
//!
//! ```toml
//! # run.toml
//! output = "results"
//! consensus = "linked.consensusXML"
//!
//! [[samples]]
//! id = 1
//! path = "QC_01.mzML"
//! polarity = "positive"
//! features = "QC_01.featureXML"
//! reference = 2
//!
//! [[samples]]
//! id = 2
//! path = "Blank_01.mzML"
//! features = "Blank_01.featureXML"
//! is_reference = true
//!
//! [[decharge]]
//! max_charge = 1
//! path = "decharge_z1.json"
//!
//! [reconcile]
//! mass_tolerance_ppm = 5.0
//! min_linked_samples = 2
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use mzreconcile::config::ReconcileConfig;
use mzreconcile::model::{FileId, Polarity, SampleFile};

/// Root of a run manifest
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    /// Result directory
    pub output: Option<PathBuf>,

    /// Linker result; required when more than one sample is given
    pub consensus: Option<PathBuf>,

    /// Input samples in run order
    #[serde(default)]
    pub samples: Vec<SampleEntry>,

    /// Recorded decharger results, one per charge bound
    #[serde(default)]
    pub decharge: Vec<DechargeEntry>,

    /// Reconciliation parameters
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// One input sample
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleEntry {
    /// File id, also used in map name tokens
    pub id: i32,
    /// Acquisition file
    pub path: PathBuf,
    /// Acquisition polarity
    #[serde(default)]
    pub polarity: Polarity,
    /// Detector result (featureXML)
    pub features: PathBuf,
    /// Spectra file; defaults to `path`
    pub spectra: Option<PathBuf>,
    /// Control file of this sample
    pub reference: Option<i32>,
    /// Whether this sample is a control file
    #[serde(default)]
    pub is_reference: bool,
}

impl SampleEntry {
    /// Sample file of the entry
    pub fn sample_file(&self) -> SampleFile {
        SampleFile {
            id: FileId(self.id),
            path: self.path.clone(),
            polarity: self.polarity,
            reference: self.reference.map(FileId),
            is_reference: self.is_reference,
        }
    }

    /// File the spectra are loaded from
    pub fn spectra_path(&self) -> &Path {
        self.spectra.as_deref().unwrap_or(&self.path)
    }
}

/// Recorded decharger result for one charge bound
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DechargeEntry {
    /// Charge bound of the iteration
    pub max_charge: u32,
    /// Result document (JSON or consensusXML)
    pub path: PathBuf,
}

impl RunManifest {
    /// Load a manifest; relative paths are resolved against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run manifest: {}", path.display()))?;
        let mut manifest = Self::from_str(&content)?;
        if let Some(base) = path.parent() {
            manifest.resolve_paths(base);
        }
        Ok(manifest)
    }

    /// Parse a manifest from TOML
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse run manifest")
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(p) = self.output.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.consensus.as_mut() {
            resolve(p);
        }
        for sample in &mut self.samples {
            resolve(&mut sample.path);
            resolve(&mut sample.features);
            if let Some(p) = sample.spectra.as_mut() {
                resolve(p);
            }
        }
        for entry in &mut self.decharge {
            resolve(&mut entry.path);
        }
    }
}
