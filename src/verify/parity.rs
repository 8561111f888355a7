//! Parity audit: streaming answers against fresh lookups.
//!
//! Every window of every read is answered twice, once by a
//! [`StreamingQuery`] fed the read in order and once by a stateless
//! [`Dictionary::lookup`]. Any difference is recorded in the report.

use std::fs;
use std::path::Path;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::info;

use crate::index::build::{BuildConfig, build_from_files};
use crate::index::dictionary::Dictionary;
use crate::io::fastx::{FastxSource, ReadChunk};
use crate::query::result::LookupResult;
use crate::query::streaming::{StreamingQuery, StreamingQueryStats};

/// Configuration for a parity check run.
#[derive(Debug)]
pub struct ParityConfig {
    pub reference_paths: Vec<String>,
    pub reads_paths: Vec<String>,
    pub build: BuildConfig,
    /// Path for output report JSON.
    pub output_report: Option<String>,
    /// Mismatches kept in the report; the rest are only counted.
    pub max_reported: usize,
}

/// A window whose streaming answer differs from the fresh one.
#[derive(Debug, Clone, Serialize)]
pub struct Mismatch {
    pub record: u64,
    pub window_start: u64,
    pub window: String,
    pub streaming: LookupResult,
    pub fresh: LookupResult,
}

/// Full parity report.
#[derive(Debug, Serialize)]
pub struct ParityReport {
    pub num_records: u64,
    pub num_windows: u64,
    pub num_mismatches: u64,
    pub mismatches: Vec<Mismatch>,
    pub stats: StreamingQueryStats,
    pub passed: bool,
}

/// Incremental checker over one dictionary.
pub struct ParityChecker<'a> {
    dict: &'a Dictionary,
    query: StreamingQuery<'a>,
    max_reported: usize,
    num_records: u64,
    num_windows: u64,
    num_mismatches: u64,
    mismatches: Vec<Mismatch>,
}

impl<'a> ParityChecker<'a> {
    pub fn new(dict: &'a Dictionary, max_reported: usize) -> Self {
        Self {
            dict,
            query: dict.streaming_query(),
            max_reported,
            num_records: 0,
            num_windows: 0,
            num_mismatches: 0,
            mismatches: Vec::new(),
        }
    }

    /// Check every window of one read.
    pub fn check_record(&mut self, seq: &[u8]) {
        let Self {
            dict,
            query,
            max_reported,
            num_records,
            num_windows,
            num_mismatches,
            mismatches,
        } = self;
        let k = dict.k();
        let record = *num_records;
        query.stream(seq, |start, streaming| {
            let window = &seq[start..start + k];
            let fresh = dict.lookup(window);
            *num_windows += 1;
            if streaming != fresh {
                *num_mismatches += 1;
                if mismatches.len() < *max_reported {
                    mismatches.push(Mismatch {
                        record,
                        window_start: start as u64,
                        window: String::from_utf8_lossy(window).into_owned(),
                        streaming,
                        fresh,
                    });
                }
            }
        });
        *num_records += 1;
    }

    pub fn finish(self) -> ParityReport {
        ParityReport {
            num_records: self.num_records,
            num_windows: self.num_windows,
            num_mismatches: self.num_mismatches,
            mismatches: self.mismatches,
            stats: self.query.stats(),
            passed: self.num_mismatches == 0,
        }
    }
}

/// Build the dictionary, audit every read and write the report.
///
/// Fails when any mismatch is found.
pub fn run_parity(cfg: ParityConfig) -> Result<ParityReport> {
    let dict = build_from_files(&cfg.reference_paths, cfg.build)?;
    let mut checker = ParityChecker::new(&dict, cfg.max_reported);

    let mut chunk = ReadChunk::new();
    for path in &cfg.reads_paths {
        let mut source = FastxSource::open(Path::new(path), 1000)?;
        while source.next_chunk(&mut chunk)? {
            for seq in &chunk {
                checker.check_record(seq);
            }
        }
    }
    let report = checker.finish();

    let report_path = cfg
        .output_report
        .unwrap_or_else(|| "parity_report.json".to_string());
    fs::write(&report_path, serde_json::to_vec_pretty(&report)?)?;

    if report.passed {
        info!(
            report_path,
            windows = report.num_windows,
            "Parity check passed"
        );
        Ok(report)
    } else {
        bail!(
            "Parity check failed: {} of {} windows differ. See report: {}",
            report.num_mismatches,
            report.num_windows,
            report_path
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::DictionaryBuilder;

    #[test]
    fn test_checker_passes_on_reference_reads() {
        let reference = b"ACGGTTACCAGTAGGATCCATTGACCGTAGCTAGCTTAGGACCATG";
        let mut builder = DictionaryBuilder::new(BuildConfig {
            k: 11,
            m: 5,
            ..Default::default()
        })
        .unwrap();
        builder.add_sequence(reference);
        let dict = builder.build().unwrap();

        let mut checker = ParityChecker::new(&dict, 10);
        checker.check_record(&reference[3..40]);
        checker.check_record(b"TTAGGACCNTGGGGGGGGGGGG");
        checker.check_record(b"ACG");
        let report = checker.finish();
        assert!(report.passed);
        assert_eq!(report.num_records, 3);
        assert_eq!(report.num_windows, (40 - 3 - 11 + 1) + (22 - 11 + 1));
        assert!(report.mismatches.is_empty());
        assert!(report.stats.num_searches > 0);
    }
}
