//! Dictionary construction from raw sequences.
//!
//! Input sequences are cut into contigs such that every canonical k-mer is
//! stored exactly once: a contig ends at any non-ACGT base and right before
//! any k-mer whose canonical form was already stored. Each contig is then
//! split into super-kmers, maximal runs of consecutive k-mers sharing a
//! canonical minimizer (at most `k - m + 1` k-mers each), and the super-kmers
//! are grouped into buckets by minimizer.

use std::path::Path;

use ahash::AHashSet;
use anyhow::{Result, bail};
use tracing::info;

use crate::io::fastx::for_each_reference;
use crate::kmer::minimizer::MinimizerEnumerator;
use crate::kmer::{Kmer, MAX_K, char_to_code};

use super::bit_string::BitString;
use super::buckets::{MinimizerIndex, SuperKmerStore};
use super::contigs::ContigOffsets;
use super::dictionary::Dictionary;
use super::skew_index::{SkewIndex, ceil_log2};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for dictionary construction.
#[derive(Debug, Clone, Copy)]
pub struct BuildConfig {
    /// K-mer length.
    pub k: usize,
    /// Minimizer length.
    pub m: usize,
    /// Seed of the minimizer order.
    pub seed: u64,
    /// Buckets with more than `2^skew_min_log2` super-kmers go to the skew
    /// index.
    pub skew_min_log2: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            k: 31,
            m: 19,
            seed: 1,
            skew_min_log2: 6,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.k > MAX_K {
            bail!("k must be in [1, {MAX_K}], got {}", self.k);
        }
        if self.m == 0 || self.m > self.k {
            bail!("m must be in [1, k={}], got {}", self.k, self.m);
        }
        if self.skew_min_log2 >= 32 {
            bail!("skew_min_log2 must be below 32, got {}", self.skew_min_log2);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct SuperKmer {
    minimizer: u64,
    /// Base offset of its first k-mer.
    offset: u64,
    num_kmers: u32,
}

/// Counters reported once the build finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    pub num_sequences: u64,
    pub num_contigs: u64,
    pub num_kmers: u64,
    /// K-mers skipped because their canonical form was already stored.
    pub num_duplicates: u64,
}

pub struct DictionaryBuilder {
    config: BuildConfig,
    strings: BitString,
    /// Contig boundaries in bases, starting at 0.
    contig_boundaries: Vec<u64>,
    super_kmers: Vec<SuperKmer>,
    seen: AHashSet<u64>,
    fw_minimizers: MinimizerEnumerator,
    rc_minimizers: MinimizerEnumerator,
    stats: BuildStats,
}

impl DictionaryBuilder {
    pub fn new(config: BuildConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            strings: BitString::new(),
            contig_boundaries: vec![0],
            super_kmers: Vec::new(),
            seen: AHashSet::new(),
            fw_minimizers: MinimizerEnumerator::new(config.k, config.m, config.seed),
            rc_minimizers: MinimizerEnumerator::new_reverse(config.k, config.m, config.seed),
            stats: BuildStats::default(),
        })
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Add every not-yet-stored canonical k-mer of `seq`.
    pub fn add_sequence(&mut self, seq: &[u8]) {
        let k = self.config.k;
        self.stats.num_sequences += 1;

        let mut fw = Kmer::default();
        let mut run_len = 0usize;
        // First base of the contig being extended, if any.
        let mut contig_start: Option<usize> = None;

        for (i, &b) in seq.iter().enumerate() {
            let Some(code) = char_to_code(b) else {
                if let Some(start) = contig_start.take() {
                    self.push_contig(&seq[start..i]);
                }
                run_len = 0;
                continue;
            };
            fw.drop_char();
            fw.kth_char_or(k - 1, code);
            run_len += 1;
            if run_len < k {
                continue;
            }

            let kmer_start = i + 1 - k;
            if self.seen.insert(fw.canonical(k).bits()) {
                contig_start.get_or_insert(kmer_start);
            } else {
                self.stats.num_duplicates += 1;
                if let Some(start) = contig_start.take() {
                    self.push_contig(&seq[start..kmer_start + k - 1]);
                }
            }
        }
        if let Some(start) = contig_start {
            self.push_contig(&seq[start..]);
        }
    }

    /// Store one contig (all ACGT, at least k bases) and cut it into
    /// super-kmers.
    fn push_contig(&mut self, contig: &[u8]) {
        let k = self.config.k;
        let max_len = (k - self.config.m + 1) as u32;
        let begin = self.strings.num_bases();
        for &b in contig {
            if let Some(code) = char_to_code(b) {
                self.strings.push_base(code);
            }
        }
        self.contig_boundaries.push(self.strings.num_bases());

        let num_kmers = contig.len() - k + 1;
        self.stats.num_contigs += 1;
        self.stats.num_kmers += num_kmers as u64;

        let mut current: Option<SuperKmer> = None;
        for j in 0..num_kmers {
            let kmer = Kmer::from_bits(self.strings.get_bits(2 * (begin + j as u64), 2 * k));
            let kmer_rc = kmer.reverse_complement(k);
            let minimizer = self
                .fw_minimizers
                .next(kmer, j == 0)
                .min(self.rc_minimizers.next(kmer_rc, j == 0));

            match current.as_mut() {
                Some(sk) if sk.minimizer == minimizer && sk.num_kmers < max_len => {
                    sk.num_kmers += 1;
                }
                _ => {
                    if let Some(sk) = current.take() {
                        self.super_kmers.push(sk);
                    }
                    current = Some(SuperKmer {
                        minimizer,
                        offset: begin + j as u64,
                        num_kmers: 1,
                    });
                }
            }
        }
        if let Some(sk) = current {
            self.super_kmers.push(sk);
        }
    }

    /// Group super-kmers into buckets and assemble the dictionary.
    pub fn build(mut self) -> Result<Dictionary> {
        let k = self.config.k;
        info!(
            "Building dictionary (k={}, m={}): {} k-mers in {} contigs, {} duplicates skipped",
            k,
            self.config.m,
            self.stats.num_kmers,
            self.stats.num_contigs,
            self.stats.num_duplicates
        );

        // Stable, so super-kmers of a bucket keep their storage order.
        self.super_kmers.sort_by_key(|sk| sk.minimizer);

        let mut minimizers: Vec<u64> = Vec::new();
        let mut bucket_begins: Vec<u64> = vec![0];
        for (i, sk) in self.super_kmers.iter().enumerate() {
            if minimizers.last() != Some(&sk.minimizer) {
                if i > 0 {
                    bucket_begins.push(i as u64);
                }
                minimizers.push(sk.minimizer);
            }
        }
        if !self.super_kmers.is_empty() {
            bucket_begins.push(self.super_kmers.len() as u64);
        }
        let offsets: Vec<u64> = self.super_kmers.iter().map(|sk| sk.offset).collect();

        let mut skew_index = SkewIndex::new(self.config.skew_min_log2);
        for w in bucket_begins.windows(2) {
            let (begin, end) = (w[0] as usize, w[1] as usize);
            let size = (end - begin) as u64;
            if !skew_index.covers(size) {
                continue;
            }
            let bucket = &self.super_kmers[begin..end];
            let strings = &self.strings;
            let entries = bucket.iter().enumerate().flat_map(move |(position, sk)| {
                (0..sk.num_kmers as u64).map(move |j| {
                    (
                        position as u32,
                        strings.get_bits(2 * (sk.offset + j), 2 * k),
                    )
                })
            });
            skew_index.add_bucket(size, entries);
        }

        let store = SuperKmerStore::new(&bucket_begins, &offsets, self.strings.num_bases());
        info!(
            "  {} buckets, {} super-kmers, max bucket size {} (log2 {}), {} skewed buckets",
            minimizers.len(),
            store.num_super_kmers(),
            store.max_bucket_size(),
            ceil_log2(store.max_bucket_size()),
            skew_index.num_buckets()
        );

        let minimizer_index = MinimizerIndex::new(minimizers, self.config.seed);
        Ok(Dictionary::from_parts(
            k,
            self.config.m,
            self.config.seed,
            self.stats.num_kmers,
            self.strings,
            ContigOffsets::from_boundaries(&self.contig_boundaries),
            minimizer_index,
            store,
            skew_index,
        ))
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Build a dictionary from every record of the FASTA/FASTQ files at `paths`.
pub fn build_from_files<P: AsRef<Path>>(paths: &[P], config: BuildConfig) -> Result<Dictionary> {
    let mut builder = DictionaryBuilder::new(config)?;
    for path in paths {
        let path = path.as_ref();
        info!("Reading reference {}", path.display());
        for_each_reference(path, |seq| builder.add_sequence(seq))?;
    }
    builder.build()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config(k: usize, m: usize) -> BuildConfig {
        BuildConfig {
            k,
            m,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(config(0, 0).validate().is_err());
        assert!(config(32, 5).validate().is_err());
        assert!(config(11, 12).validate().is_err());
        assert!(config(11, 0).validate().is_err());
        let mut cfg = config(11, 5);
        cfg.skew_min_log2 = 32;
        assert!(cfg.validate().is_err());
        assert!(config(31, 31).validate().is_ok());
        assert!(config(1, 1).validate().is_ok());
    }

    #[test]
    fn test_split_at_invalid_bases() {
        let mut builder = DictionaryBuilder::new(config(5, 3)).unwrap();
        builder.add_sequence(b"ACGTTGNNCATTGACNAC");
        let stats = builder.stats();
        // ACGTTG -> 2 k-mers, CATTGAC -> 3 k-mers, AC too short
        assert_eq!(stats.num_contigs, 2);
        assert_eq!(stats.num_kmers, 5);
        let dict = builder.build().unwrap();
        assert_eq!(dict.contig_sequence(0), b"ACGTTG".to_vec());
        assert_eq!(dict.contig_sequence(1), b"CATTGAC".to_vec());
    }

    #[test]
    fn test_packed_tables_match_layout() {
        let k = 5;
        let mut builder = DictionaryBuilder::new(config(k, 3)).unwrap();
        builder.add_sequence(b"ACGTTGNNCATTGACNAC");
        let dict = builder.build().unwrap();

        // 6 + 7 bases stored: offsets need ceil_log2(13) = 4 bits
        let contigs = dict.contigs();
        assert_eq!(dict.strings().num_bases(), 13);
        assert_eq!(dict.super_kmers().offset_width(), 4);
        assert_eq!((contigs.contig_begin(0), contigs.contig_end(0)), (0, 6));
        assert_eq!((contigs.contig_begin(1), contigs.contig_end(1)), (6, 13));
        assert_eq!(contigs.contig_of(5), 0);
        assert_eq!(contigs.contig_of(6), 1);
        assert_eq!(contigs.contig_of(12), 1);

        let store = dict.super_kmers();
        for id in 0..store.num_super_kmers() as u64 {
            let offset = store.offset(id);
            let contig_id = contigs.contig_of(offset);
            assert!(offset + k as u64 <= contigs.contig_end(contig_id));
        }
    }

    #[test]
    fn test_duplicates_split_contigs() {
        let mut builder = DictionaryBuilder::new(config(3, 2)).unwrap();
        // ACG repeats; CGT is the reverse complement of ACG
        builder.add_sequence(b"ACGACGT");
        let stats = builder.stats();
        assert_eq!(stats.num_duplicates, 2);
        let dict = builder.build().unwrap();
        // ACG, CGA, GAC are new; ACG again, then CGT (= rc ACG) are skipped
        assert_eq!(dict.num_kmers(), 3);
        assert_eq!(dict.num_contigs(), 1);
        assert_eq!(dict.contig_sequence(0), b"ACGAC".to_vec());
    }

    #[test]
    fn test_second_sequence_reuses_nothing() {
        let mut builder = DictionaryBuilder::new(config(5, 3)).unwrap();
        builder.add_sequence(b"ACGTTGCATT");
        builder.add_sequence(b"AATGCAACGT");
        let dict = builder.build().unwrap();
        // the second sequence is the rc of the first: nothing new
        assert_eq!(dict.num_contigs(), 1);
        assert_eq!(dict.num_kmers(), 6);
    }

    #[test]
    fn test_super_kmers_share_minimizer_and_respect_cap() {
        let (k, m) = (9, 4);
        let seq = b"ATTTTCAGGATGTTTTCAGGTTCATCATCTCCCTTCTTTGCAGGATAGTAGATAAGATCGC";
        let mut builder = DictionaryBuilder::new(config(k, m)).unwrap();
        builder.add_sequence(seq);
        let dict = builder.build().unwrap();

        let store = dict.super_kmers();
        let index = dict.minimizers();
        let mut covered = 0u64;
        for bucket_id in 0..index.num_buckets() {
            let (begin, end) = store.bucket_range(bucket_id);
            assert!(end > begin);
            for id in begin..end {
                let offset = store.offset(id);
                let kmer = Kmer::from_bits(dict.strings().get_bits(2 * offset, 2 * k));
                let rc = kmer.reverse_complement(k);
                assert_eq!(dict.canonical_minimizer(kmer, rc), index.minimizer_for(bucket_id));
                covered += 1;
            }
        }
        assert_eq!(covered as usize, store.num_super_kmers());
        assert!(store.num_super_kmers() as u64 >= dict.num_kmers() / (k - m + 1) as u64);
    }

    #[test]
    fn test_skew_index_built_for_large_buckets() {
        // m = 1: at most 4 minimizers, so buckets grow large fast
        let cfg = BuildConfig {
            k: 7,
            m: 1,
            seed: 3,
            skew_min_log2: 1,
        };
        let mut builder = DictionaryBuilder::new(cfg).unwrap();
        builder.add_sequence(b"ATTTTCAGGATGTTTTCAGGTTCATCATCTCCCTTCTTTGCAGGATAGTAGATAAGATCGCTCATCAACGG");
        let dict = builder.build().unwrap();
        assert!(!dict.skew_index().is_empty());
        for id in 0..dict.num_kmers() {
            let kmer = dict.access(id).unwrap();
            let res = dict.lookup_kmer(kmer);
            assert!(res.is_found());
            assert_eq!(res.kmer_id, id);
        }
    }
}
