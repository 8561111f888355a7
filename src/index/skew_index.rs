//! Large-bucket ("skew") index.
//!
//! Buckets whose super-kmer count `n` satisfies `ceil_log2(n) > min_log2`
//! are too large to scan linearly. For those, every k-mer of every
//! super-kmer is mapped directly to the position of its super-kmer inside
//! the bucket. A k-mer belongs to exactly one super-kmer, so keys never
//! collide across buckets. Buckets are partitioned by `ceil_log2` of
//! their size, one map per partition, and a lookup names the partition it
//! expects.
//!
//! The index is exhaustive for the buckets it covers: a k-mer of a large
//! bucket that is absent here is absent from the dictionary.

use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::INVALID_U64;

type PositionMap = HashMap<u64, u32, BuildNoHashHasher<u64>>;

/// Minimum number of bits needed to represent values in `[0, n)`.
/// Returns 0 when `n <= 1`.
#[inline]
pub(crate) fn ceil_log2(n: u64) -> u64 {
    if n <= 1 {
        return 0;
    }
    64 - (n - 1).leading_zeros() as u64
}

#[derive(Debug, Clone)]
pub struct SkewIndex {
    min_log2: u64,
    /// `partitions[i]` covers buckets with `ceil_log2(size) == min_log2 + 1 + i`.
    partitions: Vec<PositionMap>,
    num_buckets: usize,
}

impl SkewIndex {
    pub fn new(min_log2: u64) -> Self {
        Self {
            min_log2,
            partitions: Vec::new(),
            num_buckets: 0,
        }
    }

    /// Buckets with `ceil_log2(size)` above this are indexed.
    #[inline]
    pub fn min_log2(&self) -> u64 {
        self.min_log2
    }

    /// Whether a bucket of `bucket_size` super-kmers belongs here.
    #[inline]
    pub fn covers(&self, bucket_size: u64) -> bool {
        ceil_log2(bucket_size) > self.min_log2
    }

    pub fn is_empty(&self) -> bool {
        self.num_buckets == 0
    }

    /// Number of buckets indexed.
    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    /// Number of k-mers indexed across all partitions.
    pub fn num_kmers(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    fn partition_mut(&mut self, log2_bucket_size: u64) -> &mut PositionMap {
        let slot = (log2_bucket_size - self.min_log2 - 1) as usize;
        if slot >= self.partitions.len() {
            self.partitions.resize_with(slot + 1, PositionMap::default);
        }
        &mut self.partitions[slot]
    }

    /// Register a bucket from `(position, kmer)` pairs, one per k-mer of the
    /// bucket's super-kmers.
    pub fn add_bucket<I>(&mut self, bucket_size: u64, kmers_by_position: I)
    where
        I: IntoIterator<Item = (u32, u64)>,
    {
        debug_assert!(self.covers(bucket_size));
        let partition = self.partition_mut(ceil_log2(bucket_size));
        for (position, kmer) in kmers_by_position {
            partition.entry(kmer).or_insert(position);
        }
        self.num_buckets += 1;
    }

    /// Position of `kmer` inside its bucket, or [`INVALID_U64`].
    #[inline]
    pub fn lookup(&self, kmer: u64, log2_bucket_size: u64) -> u64 {
        if log2_bucket_size <= self.min_log2 {
            return INVALID_U64;
        }
        let slot = (log2_bucket_size - self.min_log2 - 1) as usize;
        self.partitions
            .get(slot)
            .and_then(|p| p.get(&kmer))
            .map_or(INVALID_U64, |&pos| pos as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(64), 6);
        assert_eq!(ceil_log2(65), 7);
    }

    #[test]
    fn test_covers_threshold() {
        let skew = SkewIndex::new(2);
        assert!(!skew.covers(4));
        assert!(skew.covers(5));
        assert!(skew.is_empty());
    }

    #[test]
    fn test_lookup_by_partition() {
        let mut skew = SkewIndex::new(2);
        skew.add_bucket(6, vec![(0, 100), (1, 101), (5, 105), (4, 100)]);
        skew.add_bucket(20, vec![(17, 200)]);
        assert_eq!(skew.num_buckets(), 2);
        assert_eq!(skew.num_kmers(), 4);

        let log2_small = ceil_log2(6);
        assert_eq!(skew.lookup(100, log2_small), 0);
        assert_eq!(skew.lookup(105, log2_small), 5);
        assert_eq!(skew.lookup(999, log2_small), INVALID_U64);
        // wrong partition
        assert_eq!(skew.lookup(200, log2_small), INVALID_U64);
        assert_eq!(skew.lookup(200, ceil_log2(20)), 17);
        // below threshold
        assert_eq!(skew.lookup(100, 2), INVALID_U64);
    }
}
