//! Lookup result returned for every queried window.

use serde::Serialize;

use crate::INVALID_U64;

/// Orientation of a match relative to the indexed strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// The queried window equals the stored k-mer.
    Forward,
    /// The queried window equals the reverse complement of the stored k-mer.
    Backward,
    /// No match.
    None,
}

impl Orientation {
    /// Swap forward and backward.
    #[inline]
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Backward,
            Orientation::Backward => Orientation::Forward,
            Orientation::None => Orientation::None,
        }
    }
}

/// Result of a k-mer lookup.
///
/// A not-found result has every id set to [`INVALID_U64`] and orientation
/// [`Orientation::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// Global k-mer id (dense over all stored k-mers).
    pub kmer_id: u64,
    /// Offset of the k-mer within its contig (0-based).
    pub kmer_id_in_contig: u64,
    pub kmer_orientation: Orientation,
    /// Contig containing the k-mer.
    pub contig_id: u64,
    /// Number of k-mers in that contig.
    pub contig_size: u64,
}

impl LookupResult {
    /// The not-found sentinel.
    #[inline]
    pub const fn not_found() -> Self {
        Self {
            kmer_id: INVALID_U64,
            kmer_id_in_contig: INVALID_U64,
            kmer_orientation: Orientation::None,
            contig_id: INVALID_U64,
            contig_size: INVALID_U64,
        }
    }

    /// Check if this result represents a found k-mer.
    #[inline]
    pub fn is_found(&self) -> bool {
        self.kmer_orientation != Orientation::None
    }

    /// Same location with a different orientation.
    #[inline]
    pub(crate) fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.kmer_orientation = orientation;
        self
    }

    /// Location shifted by `delta` k-mers inside the same contig.
    #[inline]
    pub(crate) fn shifted(mut self, delta: i64) -> Self {
        self.kmer_id = self.kmer_id.wrapping_add_signed(delta);
        self.kmer_id_in_contig = self.kmer_id_in_contig.wrapping_add_signed(delta);
        self
    }
}

impl Default for LookupResult {
    fn default() -> Self {
        Self::not_found()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
