mod check;
pub mod query;
mod stats;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::index::build::BuildConfig;

#[derive(Parser, Debug)]
#[command(name = "kstream")]
#[command(about = "Streaming canonical k-mer queries over a minimizer-bucketed dictionary")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Query(query::QueryArgs),
    Stats(stats::StatsArgs),
    Check(check::CheckArgs),
}

/// Dictionary construction options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct DictionaryArgs {
    /// Reference FASTA/FASTQ file(s), optionally compressed
    #[arg(short = 'r', long = "reference", required = true, num_args = 1..)]
    pub references: Vec<String>,
    /// K-mer length
    #[arg(short = 'k', long, default_value = "31")]
    pub klen: usize,
    /// Minimizer length
    #[arg(short = 'm', long, default_value = "19")]
    pub mlen: usize,
    /// Seed of the minimizer order
    #[arg(short = 's', long, default_value = "1")]
    pub seed: u64,
    /// Buckets with more than 2^N super-kmers get the large-bucket index
    #[arg(long, default_value = "6")]
    pub skew_min_log2: u64,
}

impl DictionaryArgs {
    pub fn to_config(&self) -> BuildConfig {
        BuildConfig {
            k: self.klen,
            m: self.mlen,
            seed: self.seed,
            skew_min_log2: self.skew_min_log2,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Query(args) => query::run(args),
        Commands::Stats(args) => stats::run(args),
        Commands::Check(args) => check::run(args),
    }
}
