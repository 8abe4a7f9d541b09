//! # Result Bundle
//!
//! A finished run is written to one directory: a JSON document per record
//! table, the run summary, and the XIC traces as a Parquet file.
//!
//! ```text
//! out/
//! ├── feature_ions.json
//! ├── chromatogram_peaks.json
//! ├── compounds.json
//! ├── component_peaks.json
//! ├── rasters.json
//! ├── spectral_trees.json
//! ├── assigned_spectra.json
//! ├── run_summary.json
//! └── xic_traces.parquet
//! ```

pub mod trace_writer;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::model::SpectrumHeader;
use crate::pipeline::PipelineOutput;

pub use trace_writer::{trace_schema, TraceWriterConfig, TraceWriterStats, XicTraceWriter};

/// File name of the trace table inside a result bundle
pub const TRACES_FILE: &str = "xic_traces.parquet";
/// File name of the run summary inside a result bundle
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Errors raised while writing results
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record batch could not be built
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The Parquet file could not be written
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// What was written to a bundle
#[derive(Debug, Clone)]
pub struct WrittenBundle {
    /// Files written, in write order
    pub files: Vec<PathBuf>,
    /// Trace file counters
    pub traces: TraceWriterStats,
}

/// Writes the records of a run to a result directory
#[derive(Debug, Clone)]
pub struct ResultWriter {
    dir: PathBuf,
    trace_config: TraceWriterConfig,
}

impl ResultWriter {
    /// Writer targeting `dir`; the directory is created on write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            trace_config: TraceWriterConfig::default(),
        }
    }

    /// Use non-default Parquet settings for the trace file
    pub fn with_trace_config(mut self, config: TraceWriterConfig) -> Self {
        self.trace_config = config;
        self
    }

    /// Target directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every table of `output`
    pub fn write(&self, output: &PipelineOutput) -> Result<WrittenBundle, OutputError> {
        fs::create_dir_all(&self.dir)?;
        let mut files = Vec::new();

        files.push(self.write_json("feature_ions.json", &output.ions.ions)?);
        files.push(self.write_json("chromatogram_peaks.json", &output.ions.peaks)?);
        files.push(self.write_json("compounds.json", &output.compounds)?);
        files.push(self.write_json("component_peaks.json", &output.component_peaks)?);
        files.push(self.write_json("rasters.json", &output.rasters)?);
        files.push(self.write_json("spectral_trees.json", &output.spectral_trees)?);
        let headers: Vec<&SpectrumHeader> =
            output.assigned_spectra.iter().map(|s| &s.header).collect();
        files.push(self.write_json("assigned_spectra.json", &headers)?);

        let metadata = BTreeMap::from([
            (
                "mzreconcile:run_id".to_string(),
                output.summary.run_id.to_string(),
            ),
            (
                "mzreconcile:started_at".to_string(),
                output.summary.started_at.to_rfc3339(),
            ),
            (
                "mzreconcile:version".to_string(),
                crate::VERSION.to_string(),
            ),
        ]);
        let traces_path = self.dir.join(TRACES_FILE);
        let mut writer = XicTraceWriter::new_file(&traces_path, &metadata, &self.trace_config)?;
        writer.write_traces(&output.traces)?;
        let traces = writer.finish()?;
        debug!("{}", traces);
        files.push(traces_path);

        files.push(self.write_json(SUMMARY_FILE, &output.summary)?);

        info!("Wrote {} files to {}", files.len(), self.dir.display());
        Ok(WrittenBundle { files, traces })
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf, OutputError> {
        let path = self.dir.join(name);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(path)
    }
}
