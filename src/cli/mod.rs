use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod info;
mod maps;
mod run;

use run::Overrides;

/// mzreconcile - LC-MS feature reconciliation
#[derive(Parser)]
#[command(name = "mzreconcile")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the samples of a run manifest and write the result bundle
    Run {
        /// Run manifest (TOML)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Result directory (overrides the manifest)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Mass tolerance in ppm
        #[arg(long)]
        mass_tolerance_ppm: Option<f64>,

        /// Minimum number of linked files for decharging
        #[arg(long)]
        min_linked_samples: Option<usize>,

        /// Highest charge bound of the decharging schedule
        #[arg(long)]
        max_charge: Option<u32>,

        /// Spectra per retrieval batch
        #[arg(short = 'b', long, hide = true)]
        batch_size: Option<usize>,
    },

    /// Show the map list of a consensus file and its file bindings
    Maps {
        /// Linker result (consensusXML)
        #[arg(value_name = "CONSENSUS")]
        consensus: PathBuf,

        /// Bind the maps to the samples of this manifest
        #[arg(short, long, value_name = "MANIFEST")]
        manifest: Option<PathBuf>,
    },

    /// Display the summary and trace file of a result bundle
    Info {
        /// Result directory
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            manifest,
            output,
            mass_tolerance_ppm,
            min_linked_samples,
            max_charge,
            batch_size,
        } => run::run(
            manifest,
            Overrides {
                output,
                mass_tolerance_ppm,
                min_linked_samples,
                max_charge,
                batch_size,
            },
        ),
        Commands::Maps {
            consensus,
            manifest,
        } => maps::run(consensus, manifest),
        Commands::Info { dir } => info::run(dir),
    }
}
