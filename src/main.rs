// ABP Flatfile Pipeline - CLI entry point

use abp_flatfile::inspect;
use abp_flatfile::pipeline::{self, Step};
use abp_flatfile::settings::Settings;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "abp-flatfile",
    version,
    about = "Transform AddressBase Premium exports into an address-matching flatfile"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Re-process even when outputs already exist
    #[arg(long, global = true)]
    force: bool,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the configured data package from the OS Downloads API
    Fetch {
        /// List the package files without downloading them
        #[arg(long)]
        list: bool,
    },
    /// Unpack downloaded archives
    Extract,
    /// Route raw export rows into per-type tables
    Split,
    /// Generate the deduplicated address variant flatfile
    Flatfile,
    /// Run fetch, extract, split and flatfile in order
    Run,
    /// Summarize and sample the generated flatfile
    Inspect {
        /// Show the variants of one property
        #[arg(long)]
        uprn: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch { list } => pipeline::run(Step::Fetch, &settings, cli.force, list),
        Command::Extract => pipeline::run(Step::Extract, &settings, cli.force, false),
        Command::Split => pipeline::run(Step::Split, &settings, cli.force, false),
        Command::Flatfile => pipeline::run(Step::Flatfile, &settings, cli.force, false),
        Command::Run => pipeline::run(Step::All, &settings, cli.force, false),
        Command::Inspect { uprn } => inspect::run_inspect_step(&settings, uprn),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
