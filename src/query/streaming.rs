//! Streaming canonical k-mer query engine.
//!
//! `StreamingQuery` answers lookups for the consecutive windows of a
//! sequence, one new base per call. Successive k-mers usually share a
//! minimizer and sit next to each other in the same stored contig, so the
//! engine first tries to *extend* the previous match by one position (a
//! single packed comparison) and only falls back to a full bucket search
//! when that fails.
//!
//! Every answer equals what [`Dictionary::lookup`] returns for the same
//! window; the incremental state is purely an accelerator.
//!
//! State per engine:
//! - the packed k-mer and its reverse complement, updated one base at a time
//! - two minimizer enumerators (forward and reverse-complement mode)
//! - a [`Phase`] recording the previous canonical minimizer and whether its
//!   bucket was found not to hold it
//! - the [`Anchor`] of the last match, present only when the previous call
//!   matched

use serde::Serialize;

use crate::index::bit_string::BitCursor;
use crate::index::dictionary::Dictionary;
use crate::index::skew_index::ceil_log2;
use crate::kmer::minimizer::MinimizerEnumerator;
use crate::kmer::{Kmer, char_to_code};
use crate::query::result::{LookupResult, Orientation};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Per-engine counters. Mergeable across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamingQueryStats {
    /// Valid windows queried.
    pub num_kmers: u64,
    /// Matches resolved by a full bucket search.
    pub num_searches: u64,
    /// Matches resolved by extending the previous match.
    pub num_extensions: u64,
    /// Windows rejected for a non-ACGT base.
    pub num_invalid: u64,
    /// Valid windows that were not found.
    pub num_negative: u64,
}

impl StreamingQueryStats {
    pub fn merge(&mut self, other: &StreamingQueryStats) {
        self.num_kmers += other.num_kmers;
        self.num_searches += other.num_searches;
        self.num_extensions += other.num_extensions;
        self.num_invalid += other.num_invalid;
        self.num_negative += other.num_negative;
    }

    /// Valid windows that were found.
    pub fn num_positive(&self) -> u64 {
        self.num_searches + self.num_extensions
    }

    /// Fraction of positive windows resolved by extension.
    pub fn extension_rate(&self) -> f64 {
        let positive = self.num_positive();
        if positive == 0 {
            0.0
        } else {
            self.num_extensions as f64 / positive as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Engine state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Next window is parsed from scratch.
    AwaitingRestart,
    /// Previous canonical minimizer; its bucket is trusted.
    Tracking(u64),
    /// Previous canonical minimizer is known to be absent from the index.
    /// Sticky until the minimizer changes.
    Suppressed(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Where the last match sits in the packed storage.
///
/// Forward: the cursor is one base past the start of the matched window, so
/// `peek(2k)` reads the next window. Backward: the cursor is at the last
/// base of the matched window, so `peek_backward(2k)` reads the previous
/// one. `pos_in_window` counts matched positions of the scan window,
/// `1..=window_size`.
#[derive(Debug, Clone, Copy)]
struct Anchor<'a> {
    cursor: BitCursor<'a>,
    pos_in_window: u64,
    window_size: u64,
    direction: Direction,
    result: LookupResult,
}

enum Scan<'a> {
    Found(Anchor<'a>),
    Missing,
    /// The scanned bucket does not hold the query minimizer.
    Suppressed,
}

// ---------------------------------------------------------------------------
// StreamingQuery
// ---------------------------------------------------------------------------

pub struct StreamingQuery<'a> {
    dict: &'a Dictionary,
    k: usize,
    kmer: Kmer,
    kmer_rc: Kmer,
    fw_minimizers: MinimizerEnumerator,
    rc_minimizers: MinimizerEnumerator,
    phase: Phase,
    /// Super-kmer id range of the current minimizer's bucket.
    bucket: (u64, u64),
    anchor: Option<Anchor<'a>>,
    stats: StreamingQueryStats,
}

impl<'a> StreamingQuery<'a> {
    pub fn new(dict: &'a Dictionary) -> Self {
        let (k, m, seed) = (dict.k(), dict.m(), dict.seed());
        Self {
            dict,
            k,
            kmer: Kmer::default(),
            kmer_rc: Kmer::default(),
            fw_minimizers: MinimizerEnumerator::new(k, m, seed),
            rc_minimizers: MinimizerEnumerator::new_reverse(k, m, seed),
            phase: Phase::AwaitingRestart,
            bucket: (0, 0),
            anchor: None,
            stats: StreamingQueryStats::default(),
        }
    }

    /// Forget the current stream. The next window is parsed from scratch.
    /// Counters are kept.
    #[inline]
    pub fn reset(&mut self) {
        self.phase = Phase::AwaitingRestart;
        self.anchor = None;
    }

    #[inline]
    pub fn num_searches(&self) -> u64 {
        self.stats.num_searches
    }

    #[inline]
    pub fn num_extensions(&self) -> u64 {
        self.stats.num_extensions
    }

    #[inline]
    pub fn stats(&self) -> StreamingQueryStats {
        self.stats
    }

    /// Look up `window`, the k bases ending at the newest base of the
    /// stream. Unless the engine was just reset (or the previous window was
    /// invalid), `window` must be the successor of the previous window.
    pub fn query(&mut self, window: &[u8]) -> LookupResult {
        let restart = self.phase == Phase::AwaitingRestart;
        let Some(kmer) = self.next_kmer(window, restart) else {
            self.stats.num_invalid += 1;
            self.reset();
            return LookupResult::not_found();
        };
        self.stats.num_kmers += 1;

        self.kmer = kmer;
        self.kmer_rc = kmer.reverse_complement(self.k);
        let minimizer = self
            .fw_minimizers
            .next(self.kmer, restart)
            .min(self.rc_minimizers.next(self.kmer_rc, restart));

        let (res, phase) = match self.phase {
            Phase::AwaitingRestart => {
                self.locate_bucket(minimizer);
                self.search(minimizer, true)
            }
            Phase::Tracking(prev) if prev == minimizer => match self.extend() {
                Some(res) => (res, Phase::Tracking(minimizer)),
                None => self.search(minimizer, false),
            },
            Phase::Suppressed(prev) if prev == minimizer => {
                (LookupResult::not_found(), Phase::Suppressed(minimizer))
            }
            Phase::Tracking(_) | Phase::Suppressed(_) => {
                self.locate_bucket(minimizer);
                // Neighbouring k-mers can sit in the same contig across a
                // minimizer change.
                match self.extend() {
                    Some(res) => (res, Phase::Tracking(minimizer)),
                    None => self.search(minimizer, true),
                }
            }
        };

        self.phase = phase;
        if !res.is_found() {
            self.anchor = None;
            self.stats.num_negative += 1;
        }
        res
    }

    /// Reset, then query every k-length window of `seq` in order, calling
    /// `f(window_start, result)` for each.
    pub fn stream<F>(&mut self, seq: &[u8], mut f: F)
    where
        F: FnMut(usize, LookupResult),
    {
        self.reset();
        if seq.len() < self.k {
            return;
        }
        for start in 0..=(seq.len() - self.k) {
            let res = self.query(&seq[start..start + self.k]);
            f(start, res);
        }
    }

    // ---- K-mer update ----

    /// Packed form of `window`: parsed in full on a restart, otherwise the
    /// previous k-mer shifted by one base. `None` if invalid.
    #[inline]
    fn next_kmer(&self, window: &[u8], restart: bool) -> Option<Kmer> {
        if window.len() != self.k {
            return None;
        }
        if restart {
            return Kmer::from_ascii(window);
        }
        let code = char_to_code(window[self.k - 1])?;
        let mut kmer = self.kmer;
        kmer.drop_char();
        kmer.kth_char_or(self.k - 1, code);
        Some(kmer)
    }

    #[inline]
    fn locate_bucket(&mut self, minimizer: u64) {
        self.bucket = self.dict.locate_bucket(minimizer);
    }

    // ---- Extension ----

    /// Try to resolve the current k-mer as the neighbour of the last match.
    #[inline]
    fn extend(&mut self) -> Option<LookupResult> {
        let width = 2 * self.k;
        let anchor = self.anchor.as_mut()?;
        match anchor.direction {
            Direction::Forward => {
                if anchor.pos_in_window == anchor.window_size
                    || anchor.cursor.peek(width) != self.kmer.bits()
                {
                    return None;
                }
                anchor.cursor.advance(2);
                anchor.pos_in_window += 1;
                anchor.result = anchor.result.shifted(1);
            }
            Direction::Backward => {
                if anchor.pos_in_window == 1
                    || anchor.cursor.peek_backward(width) != self.kmer_rc.bits()
                {
                    return None;
                }
                anchor.cursor.retreat(2);
                anchor.pos_in_window -= 1;
                // A palindrome equals its stored copy read forward.
                let orientation = if self.kmer == self.kmer_rc {
                    Orientation::Forward
                } else {
                    Orientation::Backward
                };
                anchor.result = anchor.result.shifted(-1).with_orientation(orientation);
            }
        }
        self.stats.num_extensions += 1;
        Some(anchor.result)
    }

    // ---- Full lookup ----

    /// Search the current bucket. Returns the result and the phase to move
    /// to.
    fn search(&mut self, minimizer: u64, check_minimizer: bool) -> (LookupResult, Phase) {
        let (begin, end) = self.bucket;
        let size = end - begin;
        let skew_index = self.dict.skew_index();

        let scan = if skew_index.covers(size) {
            // The skew index is exhaustive for the buckets it covers: no
            // linear fallback.
            let log2_bucket_size = ceil_log2(size);
            let mut check = check_minimizer;
            let mut scan = Scan::Missing;
            for candidate in [self.kmer, self.kmer_rc] {
                let p = skew_index.lookup(candidate.bits(), log2_bucket_size);
                if p >= size {
                    continue;
                }
                scan = self.scan(begin + p, begin + p + 1, minimizer, check);
                if !matches!(scan, Scan::Missing) {
                    break;
                }
                check = false;
            }
            scan
        } else {
            self.scan(begin, end, minimizer, check_minimizer)
        };

        match scan {
            Scan::Found(anchor) => {
                self.stats.num_searches += 1;
                self.anchor = Some(anchor);
                (anchor.result, Phase::Tracking(minimizer))
            }
            Scan::Missing => (LookupResult::not_found(), Phase::Tracking(minimizer)),
            Scan::Suppressed => (LookupResult::not_found(), Phase::Suppressed(minimizer)),
        }
    }

    /// Walk super-kmers `[begin, end)` left to right looking for the
    /// current k-mer in either orientation.
    fn scan(&self, begin: u64, end: u64, minimizer: u64, check_minimizer: bool) -> Scan<'a> {
        let dict: &'a Dictionary = self.dict;
        let k = self.k;
        let width = 2 * k;

        for super_kmer_id in begin..end {
            let offset = dict.super_kmers().offset(super_kmer_id);
            let (base, contig_end) = dict.contigs().offset_to_id(offset, k);
            let window_size = dict.window_size(offset, contig_end);
            let mut cursor = dict.strings().cursor_at(2 * offset);

            for idx in 0..window_size {
                let val = cursor.peek(width);

                if check_minimizer && super_kmer_id == begin && idx == 0 {
                    let stored = Kmer::from_bits(val);
                    let stored_minimizer =
                        dict.canonical_minimizer(stored, stored.reverse_complement(k));
                    if stored_minimizer != minimizer {
                        return Scan::Suppressed;
                    }
                }

                cursor.advance(2);

                if val == self.kmer.bits() {
                    return Scan::Found(Anchor {
                        cursor,
                        pos_in_window: idx + 1,
                        window_size,
                        direction: Direction::Forward,
                        result: base
                            .shifted(idx as i64)
                            .with_orientation(Orientation::Forward),
                    });
                }
                if val == self.kmer_rc.bits() {
                    cursor.seek(2 * (offset + idx + k as u64 - 1));
                    return Scan::Found(Anchor {
                        cursor,
                        pos_in_window: idx + 1,
                        window_size,
                        direction: Direction::Backward,
                        result: base
                            .shifted(idx as i64)
                            .with_orientation(Orientation::Backward),
                    });
                }
            }
        }
        Scan::Missing
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
