//! Minimizer buckets: minimizer -> bucket id -> super-kmer id range ->
//! base offset.
//!
//! Buckets are numbered in increasing minimizer order and the super-kmers of
//! a bucket occupy a contiguous id range, so a bucket is fully described by
//! `[begin, end)` into the super-kmer offset array.

use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;
use sux::bits::bit_field_vec::BitFieldVec;
use sux::dict::elias_fano::{EfSeq, EliasFanoBuilder};
use sux::traits::IndexedSeq;
use value_traits::slices::{SliceByValue, SliceByValueGet, SliceByValueSet};

use super::skew_index::ceil_log2;
use crate::kmer::minimizer::MinimizerHasher;

// ---------------------------------------------------------------------------
// MinimizerIndex
// ---------------------------------------------------------------------------

/// Maps minimizer values to bucket ids and back.
///
/// Behaves like a minimal perfect hash: any minimizer maps to *some* bucket.
/// A minimizer that was never indexed lands on an arbitrary existing bucket,
/// so callers that need certainty must compare against the bucket's stored
/// minimizer.
#[derive(Debug, Clone)]
pub struct MinimizerIndex {
    minimizers: Vec<u64>,
    ids: HashMap<u64, u32, BuildNoHashHasher<u64>>,
    hasher: MinimizerHasher,
}

impl MinimizerIndex {
    /// Build from strictly increasing minimizer values; bucket `i` gets
    /// `minimizers[i]`.
    pub fn new(minimizers: Vec<u64>, seed: u64) -> Self {
        debug_assert!(minimizers.windows(2).all(|w| w[0] < w[1]));
        let mut ids =
            HashMap::with_capacity_and_hasher(minimizers.len(), BuildNoHashHasher::default());
        for (bucket_id, &minimizer) in minimizers.iter().enumerate() {
            ids.insert(minimizer, bucket_id as u32);
        }
        Self {
            minimizers,
            ids,
            hasher: MinimizerHasher::new(seed ^ 0x9e37_79b9_7f4a_7c15),
        }
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.minimizers.len()
    }

    /// Bucket for `minimizer`. `None` only when there are no buckets.
    #[inline]
    pub fn bucket_for(&self, minimizer: u64) -> Option<usize> {
        if self.minimizers.is_empty() {
            return None;
        }
        match self.ids.get(&minimizer) {
            Some(&id) => Some(id as usize),
            None => Some((self.hasher.hash(minimizer) % self.minimizers.len() as u64) as usize),
        }
    }

    /// Minimizer stored for `bucket_id`.
    #[inline]
    pub fn minimizer_for(&self, bucket_id: usize) -> u64 {
        self.minimizers[bucket_id]
    }
}

// ---------------------------------------------------------------------------
// SuperKmerStore
// ---------------------------------------------------------------------------

/// Bucket boundaries and super-kmer base offsets.
///
/// Boundaries are a monotone Elias-Fano sequence; offsets are packed at
/// `ceil_log2(num_bases)` bits each.
#[derive(Debug, Clone)]
pub struct SuperKmerStore {
    /// `num_buckets + 1` prefix sums of bucket sizes.
    bucket_begins: EfSeq,
    /// Base offset of the first k-mer of each super-kmer, grouped by bucket.
    offsets: BitFieldVec<usize>,
    offset_width: usize,
    num_buckets: usize,
    max_bucket_size: u64,
}

impl SuperKmerStore {
    /// `bucket_begins` holds `num_buckets + 1` prefix sums ending at
    /// `offsets.len()`; every offset is below `num_bases`.
    pub fn new(bucket_begins: &[u64], offsets: &[u64], num_bases: u64) -> Self {
        debug_assert_eq!(bucket_begins.first().copied(), Some(0));
        debug_assert_eq!(bucket_begins.last().copied(), Some(offsets.len() as u64));

        let n = bucket_begins.len();
        let mut ef_builder = EliasFanoBuilder::new(n, offsets.len() + 1);
        for &v in bucket_begins {
            ef_builder.push(v as usize);
        }

        let offset_width = (ceil_log2(num_bases) as usize).max(1);
        let mut packed: BitFieldVec<usize> = BitFieldVec::new(offset_width, offsets.len());
        for (i, &offset) in offsets.iter().enumerate() {
            debug_assert!(offset < num_bases);
            packed.set_value(i, offset as usize);
        }

        let max_bucket_size = bucket_begins
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0);
        Self {
            bucket_begins: ef_builder.build_with_seq(),
            offsets: packed,
            offset_width,
            num_buckets: n.saturating_sub(1),
            max_bucket_size,
        }
    }

    /// Super-kmer id range `[begin, end)` of `bucket_id`.
    #[inline]
    pub fn bucket_range(&self, bucket_id: usize) -> (u64, u64) {
        (
            self.bucket_begins.get(bucket_id) as u64,
            self.bucket_begins.get(bucket_id + 1) as u64,
        )
    }

    /// Base offset of super-kmer `super_kmer_id`.
    #[inline]
    pub fn offset(&self, super_kmer_id: u64) -> u64 {
        self.offsets.index_value(super_kmer_id as usize) as u64
    }

    #[inline]
    pub fn num_super_kmers(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Largest bucket, in super-kmers.
    pub fn max_bucket_size(&self) -> u64 {
        self.max_bucket_size
    }

    /// Bits per packed super-kmer offset.
    pub fn offset_width(&self) -> usize {
        self.offset_width
    }

    pub fn size_bytes(&self) -> usize {
        let n = self.num_buckets + 1;
        let u = self.num_super_kmers() + 1;
        let ef_bits = n * ((u / n).max(1).ilog2() as usize + 2);
        let offsets_bits = self.offsets.len() * self.offset_width;
        (ef_bits + offsets_bits).div_ceil(8) + std::mem::size_of::<Self>()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_minimizers_round_trip() {
        let index = MinimizerIndex::new(vec![3, 17, 40, 99], 1);
        assert_eq!(index.num_buckets(), 4);
        for bucket_id in 0..4 {
            let minimizer = index.minimizer_for(bucket_id);
            assert_eq!(index.bucket_for(minimizer), Some(bucket_id));
        }
    }

    #[test]
    fn test_unknown_minimizer_aliases_into_range() {
        let index = MinimizerIndex::new(vec![3, 17, 40], 1);
        for minimizer in [0u64, 4, 1000, u64::MAX >> 2] {
            let bucket_id = index.bucket_for(minimizer).unwrap();
            assert!(bucket_id < 3);
            assert_ne!(index.minimizer_for(bucket_id), minimizer);
        }
    }

    #[test]
    fn test_empty_index_has_no_bucket() {
        let index = MinimizerIndex::new(Vec::new(), 1);
        assert_eq!(index.bucket_for(5), None);
    }

    #[test]
    fn test_store_ranges() {
        let store = SuperKmerStore::new(&[0, 2, 2, 7], &[0, 10, 20, 30, 40, 50, 60], 61);
        assert_eq!(store.num_buckets(), 3);
        assert_eq!(store.bucket_range(0), (0, 2));
        assert_eq!(store.bucket_range(1), (2, 2));
        assert_eq!(store.bucket_range(2), (2, 7));
        assert_eq!(store.offset(3), 30);
        assert_eq!(store.max_bucket_size(), 5);
        assert_eq!(store.num_super_kmers(), 7);
        assert_eq!(store.offset_width(), 6);
        assert_eq!(store.offset(6), 60);
    }

    #[test]
    fn test_empty_store() {
        let store = SuperKmerStore::new(&[0], &[], 0);
        assert_eq!(store.num_buckets(), 0);
        assert_eq!(store.num_super_kmers(), 0);
        assert_eq!(store.max_bucket_size(), 0);
        assert_eq!(store.offset_width(), 1);
    }
}
