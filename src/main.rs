//! # mzreconcile
//!
//! Command-line front end for LC-MS feature reconciliation.
//!
//! ## Usage
//!
//! ```bash
//! # Reconcile the samples listed in a run manifest
//! mzreconcile -v run run.toml --output results
//!
//! # Check how the maps of a consensus file bind to the manifest samples
//! mzreconcile maps linked.consensusXML --manifest run.toml
//!
//! # Inspect a result bundle
//! mzreconcile info results
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
