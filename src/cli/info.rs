use anyhow::{Context, Result};
use std::path::PathBuf;

use mzreconcile::output::{SUMMARY_FILE, TRACES_FILE};
use mzreconcile::pipeline::RunSummary;

/// Display the run summary and trace file of a result bundle
pub fn run(dir: PathBuf) -> Result<()> {
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use std::fs::File;

    if !dir.is_dir() {
        anyhow::bail!("Result directory does not exist: {}", dir.display());
    }

    let summary_path = dir.join(SUMMARY_FILE);
    let content = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("Failed to read {}", summary_path.display()))?;
    let summary: RunSummary =
        serde_json::from_str(&content).context("Failed to parse run summary")?;

    println!("mzreconcile Result Bundle");
    println!("=========================");
    println!("Directory: {}", dir.display());
    println!("Run:       {}", summary.run_id);
    println!("Started:   {}", summary.started_at.to_rfc3339());
    println!("Duration:  {} ms", summary.duration().num_milliseconds());
    println!();

    println!("Counts:");
    println!("  Files:              {}", summary.files);
    println!("  Raw features:       {}", summary.raw_features);
    println!("  Rejected features:  {}", summary.rejected_features.len());
    println!(
        "  Consensus groups:   {} (+{} singletons)",
        summary.consensus_groups, summary.synthetic_groups
    );
    println!(
        "  Decharged groups:   {} ({} iterations)",
        summary.decharged_groups, summary.decharge_iterations
    );
    for (tier, count) in &summary.resolution_tiers {
        println!("    {:?}: {}", tier, count);
    }
    println!("  Ions / peaks:       {} / {}", summary.ions, summary.peaks);
    println!("  Compounds:          {}", summary.compounds);
    println!("  Rasters / traces:   {} / {}", summary.rasters, summary.traces);
    println!(
        "  Spectral trees:     {} ({} spectra)",
        summary.spectral_trees, summary.assigned_spectra
    );
    if !summary.missing_ms1.is_empty() {
        let files: Vec<String> = summary.missing_ms1.iter().map(|f| f.to_string()).collect();
        println!("  Files without MS1:  {}", files.join(", "));
    }
    println!();

    let traces_path = dir.join(TRACES_FILE);
    let file_handle = File::open(&traces_path)
        .with_context(|| format!("Failed to open {}", traces_path.display()))?;
    let reader = SerializedFileReader::new(file_handle).context("Failed to read Parquet file")?;
    let metadata = reader.metadata();
    let file_metadata = metadata.file_metadata();

    println!("Trace File:");
    println!("  Row groups: {}", metadata.num_row_groups());
    println!("  Traces:     {}", file_metadata.num_rows());
    if let Some(kv_metadata) = file_metadata.key_value_metadata() {
        for kv in kv_metadata {
            println!(
                "  {}: {}",
                kv.key,
                kv.value.as_deref().unwrap_or("<null>")
            );
        }
    }

    println!("Schema:");
    for i in 0..file_metadata.schema_descr().num_columns() {
        let col = file_metadata.schema_descr().column(i);
        println!("  {:3}. {} ({})", i + 1, col.path().string(), col.physical_type());
    }

    Ok(())
}
