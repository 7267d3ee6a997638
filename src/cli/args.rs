//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs,
    err::ErrCommands,
    exit::ExitCommands,
    extp::ExtpCommands,
    init::InitArgs,
    job::JobCommands,
    material::MaterialCommands,
    measure::MeasureCommands,
    roster::RosterCommands,
};

#[derive(Parser)]
#[command(name = "shopqc")]
#[command(author, version, about = "Shop quality-control tracker")]
#[command(
    long_about = "Tracks machined parts through a quality-control pipeline from purchase-order receipt to shipment: incoming material inspection, in-process measurement, external processes, exit-control sampling, and nonconformance escalation."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Project root (default: auto-detect by finding .shopqc/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shopqc project
    Init(InitArgs),

    /// Job management (PO intake, stages, dimensions)
    #[command(subcommand)]
    Job(JobCommands),

    /// Incoming material inspection
    #[command(subcommand)]
    Material(MaterialCommands),

    /// External process tracking (plating, coating, heat treatment)
    #[command(subcommand)]
    Extp(ExtpCommands),

    /// Measurement report intake
    #[command(subcommand)]
    Measure(MeasureCommands),

    /// Exit-control sampling and lot sign-off
    #[command(subcommand)]
    Exit(ExitCommands),

    /// Error report (nonconformance) management
    #[command(subcommand)]
    Err(ErrCommands),

    /// Quality roster and role management
    #[command(subcommand)]
    Roster(RosterCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (tsv for list, yaml for show)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// JSON format (for programming)
    Json,
    /// Aligned columns (for terminals)
    Tsv,
    /// Just IDs, one per line
    Id,
}
