//! The k-mer dictionary.
//!
//! Assembles the packed base storage, contig boundaries, minimizer buckets
//! and the skew index into one read-only structure. Once built it is never
//! mutated, so a single `&Dictionary` can back any number of concurrently
//! running [`StreamingQuery`] engines.
//!
//! `lookup` is the stateless canonical lookup: compute the canonical
//! minimizer, locate its bucket, then either consult the skew index (large
//! buckets) or scan the bucket's super-kmers.

use crate::INVALID_U64;
use crate::kmer::minimizer::{self, MinimizerHasher};
use crate::kmer::{Kmer, code_to_char};
use crate::query::result::{LookupResult, Orientation};
use crate::query::streaming::StreamingQuery;

use super::bit_string::BitString;
use super::buckets::{MinimizerIndex, SuperKmerStore};
use super::contigs::ContigOffsets;
use super::skew_index::{SkewIndex, ceil_log2};

pub struct Dictionary {
    k: usize,
    m: usize,
    seed: u64,
    num_kmers: u64,
    /// All contigs, 2 bits per base, back to back.
    strings: BitString,
    contigs: ContigOffsets,
    minimizers: MinimizerIndex,
    super_kmers: SuperKmerStore,
    skew_index: SkewIndex,
    hasher: MinimizerHasher,
}

impl Dictionary {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        k: usize,
        m: usize,
        seed: u64,
        num_kmers: u64,
        strings: BitString,
        contigs: ContigOffsets,
        minimizers: MinimizerIndex,
        super_kmers: SuperKmerStore,
        skew_index: SkewIndex,
    ) -> Self {
        Self {
            k,
            m,
            seed,
            num_kmers,
            strings,
            contigs,
            minimizers,
            super_kmers,
            skew_index,
            hasher: MinimizerHasher::new(seed),
        }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn m(&self) -> usize {
        self.m
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of distinct canonical k-mers stored.
    #[inline]
    pub fn num_kmers(&self) -> u64 {
        self.num_kmers
    }

    #[inline]
    pub fn num_contigs(&self) -> usize {
        self.contigs.num_contigs()
    }

    #[inline]
    pub fn num_bits(&self) -> u64 {
        self.strings.num_bits()
    }

    #[inline]
    pub fn strings(&self) -> &BitString {
        &self.strings
    }

    #[inline]
    pub fn contigs(&self) -> &ContigOffsets {
        &self.contigs
    }

    #[inline]
    pub fn minimizers(&self) -> &MinimizerIndex {
        &self.minimizers
    }

    #[inline]
    pub fn super_kmers(&self) -> &SuperKmerStore {
        &self.super_kmers
    }

    #[inline]
    pub fn skew_index(&self) -> &SkewIndex {
        &self.skew_index
    }

    /// Approximate heap footprint of the query-time structures.
    pub fn size_bytes(&self) -> usize {
        self.strings.size_bytes()
            + self.super_kmers.size_bytes()
            + self.contigs.size_bytes()
            + self.minimizers.num_buckets() * (std::mem::size_of::<u64>() * 2 + 4)
            + self.skew_index.num_kmers() * (std::mem::size_of::<u64>() + 4)
    }

    /// New streaming engine over this dictionary.
    pub fn streaming_query(&self) -> StreamingQuery<'_> {
        StreamingQuery::new(self)
    }

    /// Canonical minimizer: minimum of the forward and reverse-complement
    /// minimizers.
    #[inline]
    pub fn canonical_minimizer(&self, kmer: Kmer, kmer_rc: Kmer) -> u64 {
        minimizer::canonical_minimizer(kmer, kmer_rc, self.k, self.m, &self.hasher)
    }

    /// Super-kmer id range of the bucket `minimizer` maps to. Empty when the
    /// dictionary has no buckets.
    #[inline]
    pub fn locate_bucket(&self, minimizer: u64) -> (u64, u64) {
        match self.minimizers.bucket_for(minimizer) {
            Some(bucket_id) => self.super_kmers.bucket_range(bucket_id),
            None => (0, 0),
        }
    }

    /// Number of k-mer positions to scan from a super-kmer starting at base
    /// `offset` in a contig ending at `contig_end`.
    #[inline]
    pub fn window_size(&self, offset: u64, contig_end: u64) -> u64 {
        ((self.k - self.m + 1) as u64).min(contig_end - offset - self.k as u64 + 1)
    }

    /// Fresh canonical lookup of an ASCII k-mer. Not-found on a wrong
    /// length or a non-ACGT byte.
    pub fn lookup(&self, kmer: &[u8]) -> LookupResult {
        if kmer.len() != self.k {
            return LookupResult::not_found();
        }
        match Kmer::from_ascii(kmer) {
            Some(kmer) => self.lookup_kmer(kmer),
            None => LookupResult::not_found(),
        }
    }

    /// Fresh canonical lookup of a packed k-mer.
    pub fn lookup_kmer(&self, kmer: Kmer) -> LookupResult {
        let kmer_rc = kmer.reverse_complement(self.k);
        let minimizer = self.canonical_minimizer(kmer, kmer_rc);
        let (begin, end) = self.locate_bucket(minimizer);
        let size = end - begin;

        if self.skew_index.covers(size) {
            let log2_bucket_size = ceil_log2(size);
            for candidate in [kmer, kmer_rc] {
                let p = self.skew_index.lookup(candidate.bits(), log2_bucket_size);
                if p < size {
                    let res = self.scan_super_kmer(begin + p, kmer, kmer_rc);
                    if res.is_found() {
                        return res;
                    }
                }
            }
            return LookupResult::not_found();
        }

        for super_kmer_id in begin..end {
            let res = self.scan_super_kmer(super_kmer_id, kmer, kmer_rc);
            if res.is_found() {
                return res;
            }
        }
        LookupResult::not_found()
    }

    fn scan_super_kmer(&self, super_kmer_id: u64, kmer: Kmer, kmer_rc: Kmer) -> LookupResult {
        let offset = self.super_kmers.offset(super_kmer_id);
        let (res, contig_end) = self.contigs.offset_to_id(offset, self.k);
        let window_size = self.window_size(offset, contig_end);
        for pos in 0..window_size {
            let val = self.strings.get_bits(2 * (offset + pos), 2 * self.k);
            if val == kmer.bits() {
                return res.shifted(pos as i64).with_orientation(Orientation::Forward);
            }
            if val == kmer_rc.bits() {
                return res.shifted(pos as i64).with_orientation(Orientation::Backward);
            }
        }
        LookupResult::not_found()
    }

    /// Decode contig `contig_id` back to ASCII.
    pub fn contig_sequence(&self, contig_id: usize) -> Vec<u8> {
        let begin = self.contigs.contig_begin(contig_id);
        let end = self.contigs.contig_end(contig_id);
        (begin..end)
            .map(|p| code_to_char(self.strings.get_bits(2 * p, 2)))
            .collect()
    }

    /// Packed k-mer with global id `kmer_id`, or `None` when out of range.
    pub fn access(&self, kmer_id: u64) -> Option<Kmer> {
        if kmer_id >= self.num_kmers {
            return None;
        }
        // contig c starts at k-mer id begins[c] - c * (k - 1)
        let k1 = self.k as u64 - 1;
        let (mut lo, mut hi) = (0usize, self.contigs.num_contigs());
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.contigs.contig_begin(mid) - mid as u64 * k1 <= kmer_id {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let offset = kmer_id + lo as u64 * k1;
        debug_assert_ne!(offset, INVALID_U64);
        Some(Kmer::from_bits(self.strings.get_bits(2 * offset, 2 * self.k)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
