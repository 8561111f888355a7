use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::DictionaryArgs;
use crate::index::build::build_from_files;
use crate::index::skew_index::ceil_log2;

#[derive(Args, Debug)]
#[command(about = "Build the dictionary and print its statistics as pretty-printed JSON")]
pub struct StatsArgs {
    #[command(flatten)]
    pub dictionary: DictionaryArgs,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let dict = build_from_files(&args.dictionary.references, args.dictionary.to_config())?;

    let store = dict.super_kmers();
    let skew = dict.skew_index();
    let num_buckets = dict.minimizers().num_buckets();
    let max_bucket_size = store.max_bucket_size();
    let mean_bucket_size = if num_buckets > 0 {
        store.num_super_kmers() as f64 / num_buckets as f64
    } else {
        0.0
    };
    let bits_per_kmer = if dict.num_kmers() > 0 {
        (dict.size_bytes() * 8) as f64 / dict.num_kmers() as f64
    } else {
        0.0
    };

    let root = json!({
        "k": dict.k(),
        "m": dict.m(),
        "seed": dict.seed(),
        "dictionary": {
            "num_kmers": dict.num_kmers(),
            "num_contigs": dict.num_contigs(),
            "num_bits": dict.num_bits(),
        },
        "buckets": {
            "num_buckets": num_buckets,
            "num_super_kmers": store.num_super_kmers(),
            "offset_bits": store.offset_width(),
            "max_bucket_size": max_bucket_size,
            "log2_max_bucket_size": ceil_log2(max_bucket_size),
            "mean_bucket_size": (mean_bucket_size * 100.0).round() / 100.0,
        },
        "skew_index": {
            "min_log2": skew.min_log2(),
            "num_buckets": skew.num_buckets(),
            "num_kmers": skew.num_kmers(),
        },
        "size_in_memory_bytes": dict.size_bytes(),
        "bits_per_kmer": (bits_per_kmer * 100.0).round() / 100.0,
    });

    println!("{}", serde_json::to_string_pretty(&root)?);
    Ok(())
}
