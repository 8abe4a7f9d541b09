//! # XIC Trace Writer
//!
//! XIC traces are stored one row per trace with the sampled points as
//! parallel list columns (spectrum ids, times, intensities). Reading a trace
//! is a single row lookup instead of a scan over a long point table.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Builder, Int32Builder, ListBuilder, UInt32Builder, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use parquet::schema::types::ColumnPath;

use super::OutputError;
use crate::model::XicTrace;

/// Column names of the trace table
pub mod trace_columns {
    /// Trace id
    pub const TRACE_ID: &str = "trace_id";
    /// Owning file
    pub const FILE_ID: &str = "file_id";
    /// Traced ion
    pub const ION_ID: &str = "ion_id";
    /// Traced isotope peak, null for the summed ion trace
    pub const PEAK_ID: &str = "peak_id";
    /// Isotope index, null for the summed ion trace
    pub const ISOTOPE: &str = "isotope";
    /// Raster the trace is sampled on
    pub const RASTER_ID: &str = "raster_id";
    /// Sampled spectrum ids
    pub const SPECTRUM_IDS: &str = "spectrum_ids";
    /// Retention times in minutes
    pub const TIME: &str = "time";
    /// Summed intensities
    pub const INTENSITY: &str = "intensity";
}

fn item(data_type: DataType) -> Arc<Field> {
    Arc::new(Field::new("item", data_type, false))
}

/// Arrow schema of the trace table
pub fn trace_schema() -> Arc<Schema> {
    use trace_columns::*;
    Arc::new(Schema::new(vec![
        Field::new(TRACE_ID, DataType::UInt32, false),
        Field::new(FILE_ID, DataType::Int32, false),
        Field::new(ION_ID, DataType::UInt32, false),
        Field::new(PEAK_ID, DataType::UInt32, true),
        Field::new(ISOTOPE, DataType::UInt64, true),
        Field::new(RASTER_ID, DataType::UInt32, false),
        Field::new(SPECTRUM_IDS, DataType::List(item(DataType::UInt64)), false),
        Field::new(TIME, DataType::List(item(DataType::Float64)), false),
        Field::new(INTENSITY, DataType::List(item(DataType::Float64)), false),
    ]))
}

/// Parquet settings for trace files
#[derive(Debug, Clone)]
pub struct TraceWriterConfig {
    /// ZSTD compression level
    pub compression_level: i32,
    /// Rows per row group
    pub row_group_size: usize,
    /// Data page size in bytes
    pub data_page_size: usize,
    /// Write column chunk statistics
    pub write_statistics: bool,
}

impl Default for TraceWriterConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            // rows carry whole traces
            row_group_size: 512,
            data_page_size: 1024 * 1024,
            write_statistics: true,
        }
    }
}

impl TraceWriterConfig {
    fn to_writer_properties(&self, metadata: &BTreeMap<String, String>) -> WriterProperties {
        let compression = Compression::ZSTD(
            ZstdLevel::try_new(self.compression_level).unwrap_or(ZstdLevel::default()),
        );
        let statistics = if self.write_statistics {
            EnabledStatistics::Chunk
        } else {
            EnabledStatistics::None
        };

        let mut builder = WriterProperties::builder()
            .set_compression(compression)
            .set_data_page_size_limit(self.data_page_size)
            .set_statistics_enabled(statistics)
            .set_max_row_group_size(self.row_group_size);

        for column in [
            trace_columns::SPECTRUM_IDS,
            trace_columns::TIME,
            trace_columns::INTENSITY,
        ] {
            builder = builder.set_column_dictionary_enabled(
                ColumnPath::new(vec![column.to_string(), "list".to_string(), "item".to_string()]),
                false,
            );
        }

        let kv_metadata = metadata
            .iter()
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: Some(v.clone()),
            })
            .collect();
        builder.set_key_value_metadata(Some(kv_metadata)).build()
    }
}

/// Streaming writer for XIC trace Parquet files
pub struct XicTraceWriter<W: Write + Send> {
    writer: ArrowWriter<W>,
    schema: Arc<Schema>,
    traces_written: usize,
    points_written: usize,
}

impl XicTraceWriter<File> {
    /// Create a writer to a file path
    pub fn new_file<P: AsRef<Path>>(
        path: P,
        metadata: &BTreeMap<String, String>,
        config: &TraceWriterConfig,
    ) -> Result<Self, OutputError> {
        let file = File::create(path)?;
        Self::new(file, metadata, config)
    }
}

impl<W: Write + Send> XicTraceWriter<W> {
    /// Create a writer to any sink; `metadata` lands in the file footer
    pub fn new(
        writer: W,
        metadata: &BTreeMap<String, String>,
        config: &TraceWriterConfig,
    ) -> Result<Self, OutputError> {
        let schema = trace_schema();
        let props = config.to_writer_properties(metadata);
        let writer = ArrowWriter::try_new(writer, schema.clone(), Some(props))?;
        Ok(Self {
            writer,
            schema,
            traces_written: 0,
            points_written: 0,
        })
    }

    /// Write a batch of traces as one record batch
    pub fn write_traces(&mut self, traces: &[XicTrace]) -> Result<(), OutputError> {
        if traces.is_empty() {
            return Ok(());
        }

        let mut trace_ids = UInt32Builder::with_capacity(traces.len());
        let mut file_ids = Int32Builder::with_capacity(traces.len());
        let mut ion_ids = UInt32Builder::with_capacity(traces.len());
        let mut peak_ids = UInt32Builder::with_capacity(traces.len());
        let mut isotopes = UInt64Builder::with_capacity(traces.len());
        let mut raster_ids = UInt32Builder::with_capacity(traces.len());
        let mut spectra = ListBuilder::new(UInt64Builder::new()).with_field(item(DataType::UInt64));
        let mut times = ListBuilder::new(Float64Builder::new()).with_field(item(DataType::Float64));
        let mut intensities =
            ListBuilder::new(Float64Builder::new()).with_field(item(DataType::Float64));

        for trace in traces {
            trace_ids.append_value(trace.id.0);
            file_ids.append_value(trace.file.0);
            ion_ids.append_value(trace.ion.0);
            peak_ids.append_option(trace.peak.map(|p| p.0));
            isotopes.append_option(trace.isotope.map(|i| i as u64));
            raster_ids.append_value(trace.raster.0);

            for point in &trace.points {
                spectra.values().append_value(point.spectrum.0);
                times.values().append_value(point.time);
                intensities.values().append_value(point.intensity);
            }
            spectra.append(true);
            times.append(true);
            intensities.append(true);

            self.points_written += trace.points.len();
        }

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(trace_ids.finish()),
            Arc::new(file_ids.finish()),
            Arc::new(ion_ids.finish()),
            Arc::new(peak_ids.finish()),
            Arc::new(isotopes.finish()),
            Arc::new(raster_ids.finish()),
            Arc::new(spectra.finish()),
            Arc::new(times.finish()),
            Arc::new(intensities.finish()),
        ];
        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        self.writer.write(&batch)?;
        self.traces_written += traces.len();
        Ok(())
    }

    /// Flush buffered rows and write the footer
    pub fn finish(self) -> Result<TraceWriterStats, OutputError> {
        let file_metadata = self.writer.close()?;
        Ok(TraceWriterStats {
            traces_written: self.traces_written,
            points_written: self.points_written,
            row_groups_written: file_metadata.row_groups.len(),
            file_size_bytes: file_metadata
                .row_groups
                .iter()
                .map(|rg| rg.total_byte_size as u64)
                .sum(),
        })
    }

    /// Finish and hand back the sink
    pub fn finish_into_inner(self) -> Result<W, OutputError> {
        Ok(self.writer.into_inner()?)
    }
}

/// Counters of a finished trace file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceWriterStats {
    /// Rows written
    pub traces_written: usize,
    /// Points over all rows
    pub points_written: usize,
    /// Row groups in the file
    pub row_groups_written: usize,
    /// Uncompressed size of all row groups
    pub file_size_bytes: u64,
}

impl std::fmt::Display for TraceWriterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Wrote {} traces ({} points) in {} row groups",
            self.traces_written, self.points_written, self.row_groups_written
        )
    }
}
