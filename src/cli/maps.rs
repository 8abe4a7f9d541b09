use anyhow::{Context, Result};
use std::path::PathBuf;

use mzreconcile::identity::{parse_file_token, IdentityMapper};
use mzreconcile::io::read_consensus_xml;
use mzreconcile::model::SampleFile;

use super::config::RunManifest;

/// Print the map list of a consensus file and, with a manifest, its bindings
pub fn run(consensus: PathBuf, manifest: Option<PathBuf>) -> Result<()> {
    let map = read_consensus_xml(&consensus)
        .with_context(|| format!("Failed to read consensus file: {}", consensus.display()))?;

    println!("Consensus file: {}", consensus.display());
    println!("  Groups: {}", map.groups.len());
    println!(
        "  Annotated groups: {}",
        map.groups.iter().filter(|g| g.annotation.is_some()).count()
    );
    println!();

    println!("Maps:");
    for descriptor in &map.maps {
        let token = match parse_file_token(&descriptor.name) {
            Ok(Some(file)) => format!("file {}", file),
            Ok(None) => "no file token".to_string(),
            Err(_) => "malformed file token".to_string(),
        };
        println!("  {:3}. {} ({})", descriptor.index, descriptor.name, token);
    }

    if let Some(path) = manifest {
        let manifest = RunManifest::from_file(&path)?;
        let samples: Vec<SampleFile> = manifest.samples.iter().map(|s| s.sample_file()).collect();
        let table = IdentityMapper::new()
            .build(&map.maps, &samples)
            .context("Maps do not bind to the manifest samples")?;

        println!();
        println!("Bindings:");
        for file in table.files() {
            let index = table
                .index_for(file)
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string());
            let name = table
                .sample(file)
                .map(SampleFile::display_name)
                .unwrap_or_default();
            println!("  file {} <- map {} ({})", file, index, name);
        }
    }

    Ok(())
}
