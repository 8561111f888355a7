//! Packed 2-bit k-mers.
//!
//! `Kmer` wraps a `u64` holding up to 31 bases at 2 bits per base. Base `i`
//! of the k-mer (0 = leftmost in the text) occupies bits `2i..2i+2`, so the
//! packed value grows toward the high bits as the window reads left to right.
//! This is the same layout the dictionary's concatenated base storage uses,
//! which lets a stored window be compared against a query with a single
//! integer equality.
//!
//! Encoding: `A=0, C=1, G=2, T=3`. The complement of a base code `c` is
//! `c ^ 3`.
//!
//! The k-mer length is not stored in the value; operations that depend on it
//! take `k` explicitly, as every caller already carries it.

pub mod minimizer;

/// Largest supported k (2 bits x 31 = 62 bits).
pub const MAX_K: usize = 31;

/// Map an ASCII base to its 2-bit code, or `None` for anything outside
/// `ACGTacgt`.
#[inline]
pub fn char_to_code(b: u8) -> Option<u64> {
    match b {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
pub(crate) fn code_to_char(c: u64) -> u8 {
    b"ACGT"[(c & 3) as usize]
}

/// Mask covering the low `2 * len` bits.
#[inline]
pub(crate) fn bases_mask(len: usize) -> u64 {
    if len >= 32 {
        u64::MAX
    } else {
        (1u64 << (2 * len)) - 1
    }
}

/// A k-mer packed into a `u64`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Kmer(pub(crate) u64);

impl Kmer {
    /// Create from a raw packed value.
    #[inline]
    pub fn from_bits(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw packed `u64` value.
    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Parse a k-mer from ASCII. Returns `None` if any byte is not a base or
    /// the slice is longer than [`MAX_K`].
    pub fn from_ascii(s: &[u8]) -> Option<Self> {
        if s.len() > MAX_K {
            return None;
        }
        let mut bits = 0u64;
        for (i, &b) in s.iter().enumerate() {
            bits |= char_to_code(b)? << (2 * i);
        }
        Some(Self(bits))
    }

    /// Drop the leftmost base; everything shifts one base down.
    #[inline]
    pub fn drop_char(&mut self) {
        self.0 >>= 2;
    }

    /// OR `code` into base slot `pos`. The slot must be empty, which is the
    /// case for slot `k - 1` right after [`drop_char`](Self::drop_char).
    #[inline]
    pub fn kth_char_or(&mut self, pos: usize, code: u64) {
        self.0 |= code << (2 * pos);
    }

    /// Reverse complement of this `k`-length k-mer.
    #[inline]
    pub fn reverse_complement(self, k: usize) -> Self {
        // Complement every base, reverse the order of the 32 2-bit groups,
        // then shift the k live groups back down.
        let mut x = !self.0;
        x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
        x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
        x = x.swap_bytes();
        Self(x >> (64 - 2 * k))
    }

    /// The smaller of this k-mer and its reverse complement.
    #[inline]
    pub fn canonical(self, k: usize) -> Self {
        self.min(self.reverse_complement(k))
    }

    /// The `len`-base sub-window starting at base `pos`.
    #[inline]
    pub fn sub_window(self, pos: usize, len: usize) -> u64 {
        (self.0 >> (2 * pos)) & bases_mask(len)
    }
}

impl std::fmt::Debug for Kmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Kmer(0x{:016x})", self.0)
    }
}

/// Reverse complement of an ASCII sequence. Non-ACGT bytes map to `N`.
pub fn reverse_complement_ascii(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&b| match char_to_code(b) {
            Some(c) => code_to_char(c ^ 3),
            None => b'N',
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
