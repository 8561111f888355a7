//! Contig boundaries inside the concatenated base storage.
//!
//! Contig `i` occupies bases `begins[i]..begins[i + 1]`. From a base offset
//! anywhere inside a contig we recover the contig id by binary search over
//! the Elias-Fano sequence, and from it the dense global k-mer id:
//!
//! ```text
//! kmer_id = offset - contig_id * (k - 1)
//! ```
//!
//! since every contig before it contributes `k - 1` bases that start no
//! k-mer.

use sux::dict::elias_fano::{EfSeq, EliasFanoBuilder};
use sux::traits::IndexedSeq;

use crate::query::result::{LookupResult, Orientation};

/// Contig boundaries as a monotone Elias-Fano sequence.
#[derive(Debug, Clone)]
pub struct ContigOffsets {
    /// `num_contigs + 1` monotone base offsets, starting at 0.
    begins: EfSeq,
    num_contigs: usize,
}

impl ContigOffsets {
    /// Build from `num_contigs + 1` non-decreasing base offsets starting
    /// at 0.
    pub fn from_boundaries(boundaries: &[u64]) -> Self {
        debug_assert_eq!(boundaries.first().copied(), Some(0));
        debug_assert!(boundaries.windows(2).all(|w| w[0] <= w[1]));
        let n = boundaries.len();
        let u = boundaries.last().map_or(1, |&last| last as usize + 1);
        let mut ef_builder = EliasFanoBuilder::new(n, u);
        for &v in boundaries {
            ef_builder.push(v as usize);
        }
        Self {
            begins: ef_builder.build_with_seq(),
            num_contigs: n.saturating_sub(1),
        }
    }

    #[inline]
    pub fn num_contigs(&self) -> usize {
        self.num_contigs
    }

    /// First base of contig `contig_id`.
    #[inline]
    pub fn contig_begin(&self, contig_id: usize) -> u64 {
        self.begins.get(contig_id) as u64
    }

    /// One past the last base of contig `contig_id`.
    #[inline]
    pub fn contig_end(&self, contig_id: usize) -> u64 {
        self.begins.get(contig_id + 1) as u64
    }

    /// Contig containing base `offset`: the last contig whose begin is
    /// `<= offset`.
    pub fn contig_of(&self, offset: u64) -> usize {
        let (mut lo, mut hi) = (0usize, self.num_contigs);
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.contig_begin(mid) <= offset {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Approximate heap footprint of the Elias-Fano boundaries.
    pub fn size_bytes(&self) -> usize {
        let n = self.num_contigs + 1;
        let u = self.contig_begin(self.num_contigs) as usize + 1;
        let low_bits = (u / n).max(1).ilog2() as usize;
        (n * (low_bits + 2)).div_ceil(8) + std::mem::size_of::<Self>()
    }

    /// Location of the k-mer starting at base `offset`, plus the end offset
    /// of its contig. The returned result has no orientation yet.
    pub fn offset_to_id(&self, offset: u64, k: usize) -> (LookupResult, u64) {
        let contig_id = self.contig_of(offset);
        let begin = self.contig_begin(contig_id);
        let end = self.contig_end(contig_id);
        let res = LookupResult {
            kmer_id: offset - contig_id as u64 * (k as u64 - 1),
            kmer_id_in_contig: offset - begin,
            kmer_orientation: Orientation::None,
            contig_id: contig_id as u64,
            contig_size: end - begin - k as u64 + 1,
        };
        (res, end)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_offsets(lens: &[u64]) -> ContigOffsets {
        let mut boundaries = vec![0u64];
        for &len in lens {
            boundaries.push(boundaries.last().unwrap() + len);
        }
        ContigOffsets::from_boundaries(&boundaries)
    }

    #[test]
    fn test_contig_of() {
        let offsets = make_offsets(&[10, 5, 7]);
        assert_eq!(offsets.num_contigs(), 3);
        assert_eq!(offsets.contig_of(0), 0);
        assert_eq!(offsets.contig_of(9), 0);
        assert_eq!(offsets.contig_of(10), 1);
        assert_eq!(offsets.contig_of(14), 1);
        assert_eq!(offsets.contig_of(15), 2);
        assert_eq!(offsets.contig_end(2), 22);
    }

    #[test]
    fn test_offset_to_id_is_dense() {
        let k = 4;
        let lens = [10u64, 5, 7];
        let offsets = make_offsets(&lens);
        let mut expected_id = 0;
        for (contig_id, &len) in lens.iter().enumerate() {
            let begin = offsets.contig_begin(contig_id);
            for pos in 0..(len - k as u64 + 1) {
                let (res, end) = offsets.offset_to_id(begin + pos, k);
                assert_eq!(res.kmer_id, expected_id);
                assert_eq!(res.kmer_id_in_contig, pos);
                assert_eq!(res.contig_id, contig_id as u64);
                assert_eq!(res.contig_size, len - k as u64 + 1);
                assert_eq!(end, begin + len);
                assert!(!res.is_found());
                expected_id += 1;
            }
        }
        assert_eq!(expected_id, 7 + 2 + 4);
    }

    #[test]
    fn test_empty_offsets() {
        let offsets = ContigOffsets::from_boundaries(&[0]);
        assert_eq!(offsets.num_contigs(), 0);
        assert_eq!(offsets.contig_begin(0), 0);
        assert!(offsets.size_bytes() > 0);
    }
}
