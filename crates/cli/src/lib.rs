//! adya CLI -- generate transactional workloads and check recorded
//! histories for isolation anomalies.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "adya",
    about = "Transactional anomaly detection for distributed database histories"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate random transactional histories
    Generate(GenerateArgs),
    /// Check recorded histories for isolation anomalies
    Check(CheckArgs),
}

#[derive(Debug, Parser)]
pub struct GenerateArgs {
    /// Number of histories to generate
    #[arg(long)]
    pub n_hist: u64,
    /// Number of transactions per history
    #[arg(long)]
    pub n_txn: u64,
    /// Number of logical client processes
    #[arg(long)]
    pub n_process: u64,
    /// Key selection distribution
    #[arg(long, value_enum, default_value_t = KeyDistArg::Exponential)]
    pub key_dist: KeyDistArg,
    /// Size of the active key pool (distribution-dependent default)
    #[arg(long)]
    pub key_count: Option<u64>,
    /// Output directory for generated history files
    #[arg(long)]
    pub output_dir: PathBuf,
}

#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Input directory containing history JSON files
    #[arg(long)]
    pub input_dir: PathBuf,
    /// Consistency model the histories are expected to satisfy
    #[arg(long, value_enum, default_value_t = ModelArg::StrictSerializable)]
    pub consistency: ModelArg,
    /// Cycle-search budget per strongly connected component, in ms
    #[arg(long, default_value_t = 1000)]
    pub cycle_search_timeout: u64,
    /// Write one <anomaly-type>.txt report per detected type here
    #[arg(long)]
    pub directory: Option<PathBuf>,
    /// Output results as JSON (one object per file)
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeyDistArg {
    Uniform,
    Exponential,
}

impl From<KeyDistArg> for adya_testgen::KeyDist {
    fn from(dist: KeyDistArg) -> Self {
        match dist {
            KeyDistArg::Uniform => Self::Uniform,
            KeyDistArg::Exponential => Self::Exponential,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelArg {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    SnapshotIsolation,
    Serializable,
    StrictSerializable,
}

impl From<ModelArg> for adya_core::ConsistencyModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::ReadUncommitted => Self::ReadUncommitted,
            ModelArg::ReadCommitted => Self::ReadCommitted,
            ModelArg::RepeatableRead => Self::RepeatableRead,
            ModelArg::SnapshotIsolation => Self::SnapshotIsolation,
            ModelArg::Serializable => Self::Serializable,
            ModelArg::StrictSerializable => Self::StrictSerializable,
        }
    }
}
