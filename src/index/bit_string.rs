//! Concatenated 2-bit base storage and a bidirectional cursor over it.
//!
//! All contigs of the dictionary are packed back to back into one bit
//! sequence, 2 bits per base, base `i` at bits `2i..2i+2` (little-endian
//! within 64-bit words). Reading `2k` bits at bit position `2p` therefore
//! yields exactly the packed [`Kmer`](crate::kmer::Kmer) of the window
//! starting at base `p`.
//!
//! [`BitCursor`] is an index into the immutable buffer. It never owns data
//! and bounds are the caller's responsibility: the query engine only moves
//! it within the scan window of a super-kmer, whose extent is known.

/// Immutable packed bit sequence (append-only while building).
#[derive(Debug, Clone, Default)]
pub struct BitString {
    words: Vec<u64>,
    num_bits: u64,
}

impl BitString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `width` bits of `value` (`width <= 64`).
    pub fn push_bits(&mut self, value: u64, width: usize) {
        debug_assert!(width <= 64);
        if width == 0 {
            return;
        }
        let value = if width == 64 { value } else { value & ((1u64 << width) - 1) };
        let word = (self.num_bits / 64) as usize;
        let shift = (self.num_bits % 64) as usize;
        if word == self.words.len() {
            self.words.push(0);
        }
        self.words[word] |= value << shift;
        if shift + width > 64 {
            self.words.push(value >> (64 - shift));
        }
        self.num_bits += width as u64;
    }

    /// Append one base code (2 bits).
    #[inline]
    pub fn push_base(&mut self, code: u64) {
        self.push_bits(code, 2);
    }

    /// Total number of bits stored.
    #[inline]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Total number of bases stored.
    #[inline]
    pub fn num_bases(&self) -> u64 {
        self.num_bits / 2
    }

    /// Size of the backing buffer in bytes.
    pub fn size_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<u64>()
    }

    /// Read `width` bits (`width <= 64`) starting at bit `pos`. Bits past
    /// the end of the buffer read as zero.
    #[inline]
    pub fn get_bits(&self, pos: u64, width: usize) -> u64 {
        debug_assert!(width <= 64);
        if width == 0 {
            return 0;
        }
        let word = (pos / 64) as usize;
        let shift = (pos % 64) as usize;
        let lo = self.words.get(word).copied().unwrap_or(0) >> shift;
        let value = if shift + width > 64 {
            let hi = self.words.get(word + 1).copied().unwrap_or(0);
            lo | (hi << (64 - shift))
        } else {
            lo
        };
        if width == 64 { value } else { value & ((1u64 << width) - 1) }
    }

    /// Cursor positioned at bit `pos`.
    #[inline]
    pub fn cursor_at(&self, pos: u64) -> BitCursor<'_> {
        BitCursor { bits: self, pos }
    }
}

/// Positionable cursor over a [`BitString`].
///
/// Forward reads cover `[pos, pos + width)`; backward reads cover
/// `[pos - width, pos)`.
#[derive(Debug, Clone, Copy)]
pub struct BitCursor<'a> {
    bits: &'a BitString,
    pos: u64,
}

impl<'a> BitCursor<'a> {
    /// Current bit position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Move to an absolute bit position.
    #[inline]
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Read `width` bits at the cursor without moving it.
    #[inline]
    pub fn peek(&self, width: usize) -> u64 {
        self.bits.get_bits(self.pos, width)
    }

    /// Read the `width` bits that end at the cursor without moving it.
    #[inline]
    pub fn peek_backward(&self, width: usize) -> u64 {
        debug_assert!(self.pos >= width as u64);
        self.bits.get_bits(self.pos - width as u64, width)
    }

    /// Step forward by `width` bits.
    #[inline]
    pub fn advance(&mut self, width: usize) {
        self.pos += width as u64;
    }

    /// Step backward by `width` bits.
    #[inline]
    pub fn retreat(&mut self, width: usize) {
        debug_assert!(self.pos >= width as u64);
        self.pos -= width as u64;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
