use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use crossbeam::channel;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use tracing::info;

use super::DictionaryArgs;
use crate::index::build::build_from_files;
use crate::index::dictionary::Dictionary;
use crate::io::fastx::{FastxConfig, FastxSource, ReadChunk};
use crate::io::threads::ThreadConfig;
use crate::query::streaming::StreamingQueryStats;

#[derive(Args, Debug)]
#[command(about = "Stream every k-mer of a set of reads through the dictionary")]
pub struct QueryArgs {
    #[command(flatten)]
    pub dictionary: DictionaryArgs,
    /// Read file(s) to query (FASTA/FASTQ, optionally compressed)
    #[arg(long = "reads", required = true, num_args = 1..)]
    pub reads: Vec<String>,
    /// Number of threads (0 = all cores)
    #[arg(short = 't', long, default_value = "1")]
    pub threads: usize,
    /// Write the JSON report here instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<String>,
    /// Suppress the progress spinner
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Summary of one query run.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub k: usize,
    pub m: usize,
    pub num_reads: u64,
    /// Reads with at least one positive window.
    pub num_reads_with_hits: u64,
    pub stats: StreamingQueryStats,
    pub extension_rate: f64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerTotals {
    num_reads: u64,
    num_reads_with_hits: u64,
    stats: StreamingQueryStats,
}

impl WorkerTotals {
    fn merge(&mut self, other: &WorkerTotals) {
        self.num_reads += other.num_reads;
        self.num_reads_with_hits += other.num_reads_with_hits;
        self.stats.merge(&other.stats);
    }
}

pub fn run(args: QueryArgs) -> Result<()> {
    let dict = build_from_files(&args.dictionary.references, args.dictionary.to_config())?;
    let fastx = FastxConfig {
        paths: args.reads,
        ..Default::default()
    };
    let threads = ThreadConfig {
        threads: args.threads,
    };
    let progress = make_progress_bar(args.quiet);
    let report = query_reads(&dict, &fastx, threads, &progress)?;
    progress.finish_and_clear();

    info!(
        "Queried {} reads: {} k-mers, {} positive ({:.1}% by extension), {} negative, {} invalid",
        report.num_reads,
        report.stats.num_kmers,
        report.stats.num_positive(),
        report.extension_rate * 100.0,
        report.stats.num_negative,
        report.stats.num_invalid,
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {path}"))?
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Stream every read of `fastx` through its own engine, fanned out over
/// worker threads. One producer thread reads the input in chunks.
pub fn query_reads(
    dict: &Dictionary,
    fastx: &FastxConfig,
    threads: ThreadConfig,
    progress: &ProgressBar,
) -> Result<QueryReport> {
    let num_threads = threads.resolve();
    info!(
        "Querying {} read file(s) with {} threads",
        fastx.paths.len(),
        num_threads
    );
    let start = Instant::now();

    let (sender, receiver) = channel::bounded::<ReadChunk>(num_threads * 4);

    let totals = crossbeam::scope(|s| -> Result<WorkerTotals> {
        let producer = s.spawn(move |_| -> Result<()> {
            for path in &fastx.paths {
                let mut source = FastxSource::open(Path::new(path), fastx.chunk_size)?;
                let mut chunk = ReadChunk::new();
                while source.next_chunk(&mut chunk)? {
                    if sender.send(std::mem::take(&mut chunk)).is_err() {
                        return Ok(());
                    }
                }
            }
            Ok(())
        });

        let workers: Vec<_> = (0..num_threads)
            .map(|_| {
                let recv = receiver.clone();
                s.spawn(move |_| {
                    let mut query = dict.streaming_query();
                    let mut local = WorkerTotals::default();
                    for chunk in recv {
                        for seq in &chunk {
                            let mut hit = false;
                            query.stream(seq, |_, res| hit |= res.is_found());
                            local.num_reads += 1;
                            local.num_reads_with_hits += hit as u64;
                        }
                        progress.inc(chunk.len() as u64);
                    }
                    local.stats = query.stats();
                    local
                })
            })
            .collect();
        drop(receiver);

        let mut totals = WorkerTotals::default();
        for worker in workers {
            let local = worker
                .join()
                .map_err(|e| anyhow!("query worker panicked: {:?}", e))?;
            totals.merge(&local);
        }
        producer
            .join()
            .map_err(|e| anyhow!("reader thread panicked: {:?}", e))??;
        Ok(totals)
    })
    .map_err(|e| anyhow!("thread panicked: {:?}", e))??;

    Ok(QueryReport {
        k: dict.k(),
        m: dict.m(),
        num_reads: totals.num_reads,
        num_reads_with_hits: totals.num_reads_with_hits,
        stats: totals.stats,
        extension_rate: totals.stats.extension_rate(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

pub(crate) fn make_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(1));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {human_pos} reads queried ({per_sec})",
    ) {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(1_000));
    pb
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
