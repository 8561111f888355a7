use anyhow::Result;
use clap::Args;

use super::DictionaryArgs;
use crate::verify::parity::{ParityConfig, run_parity};

#[derive(Args, Debug)]
#[command(about = "Compare streaming answers with fresh lookups for every read window")]
pub struct CheckArgs {
    #[command(flatten)]
    pub dictionary: DictionaryArgs,
    /// Read file(s) to audit
    #[arg(long = "reads", required = true, num_args = 1..)]
    pub reads: Vec<String>,
    /// Output report path
    #[arg(long)]
    pub output_report: Option<String>,
    /// Maximum number of mismatching windows listed in the report
    #[arg(long, default_value = "100")]
    pub max_reported: usize,
}

pub fn run(args: CheckArgs) -> Result<()> {
    let cfg = ParityConfig {
        reference_paths: args.dictionary.references.clone(),
        reads_paths: args.reads,
        build: args.dictionary.to_config(),
        output_report: args.output_report,
        max_reported: args.max_reported,
    };
    run_parity(cfg).map(|_| ())
}
