//! Minimizers under a seeded order.
//!
//! The minimizer of a k-mer is the m-mer (sub-window of length `m`) whose
//! seeded hash is smallest; ties go to the leftmost occurrence. The value
//! reported is the packed m-mer itself, not its hash.
//!
//! [`MinimizerEnumerator`] produces the minimizer of consecutive windows
//! without rescanning all `k - m + 1` m-mers, rescanning only when the
//! current minimum slides out. It runs in one of two modes:
//!
//! - **forward**: the window slides so that the new m-mer enters at the
//!   right end (position `k - m`) and the oldest leaves at position 0. This
//!   is how a forward k-mer evolves as a read is scanned.
//! - **reverse**: the new m-mer enters at position 0 and the oldest leaves at
//!   position `k - m`. This is how the reverse complement of the same window
//!   evolves.
//!
//! Both modes produce exactly what [`compute_minimizer`] gives on the same
//! k-mer.

use ahash::RandomState;

use super::Kmer;

/// Seeded hash defining the minimizer order.
#[derive(Clone)]
pub struct MinimizerHasher {
    state: RandomState,
}

impl MinimizerHasher {
    pub fn new(seed: u64) -> Self {
        Self {
            state: RandomState::with_seeds(
                seed,
                seed ^ 0x517c_c1b7_2722_0a95,
                seed.rotate_left(17) ^ 0x6c62_272e_07bb_0142,
                seed.rotate_left(41) ^ 0x62b8_2175_6295_c58d,
            ),
        }
    }

    #[inline]
    pub fn hash(&self, value: u64) -> u64 {
        self.state.hash_one(value)
    }
}

impl std::fmt::Debug for MinimizerHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MinimizerHasher")
    }
}

/// From-scratch minimizer of `kmer`: full scan of all m-mers, leftmost
/// minimum wins.
pub fn compute_minimizer(kmer: Kmer, k: usize, m: usize, hasher: &MinimizerHasher) -> u64 {
    let mut min_hash = u64::MAX;
    let mut min_value = 0;
    let mut first = true;
    for i in 0..=(k - m) {
        let value = kmer.sub_window(i, m);
        let hash = hasher.hash(value);
        if first || hash < min_hash {
            first = false;
            min_hash = hash;
            min_value = value;
        }
    }
    min_value
}

/// Canonical minimizer: numeric minimum of the minimizers of `kmer` and of
/// its reverse complement `kmer_rc`.
#[inline]
pub fn canonical_minimizer(
    kmer: Kmer,
    kmer_rc: Kmer,
    k: usize,
    m: usize,
    hasher: &MinimizerHasher,
) -> u64 {
    compute_minimizer(kmer, k, m, hasher).min(compute_minimizer(kmer_rc, k, m, hasher))
}

/// Incremental minimizer tracker over consecutive windows.
#[derive(Debug, Clone)]
pub struct MinimizerEnumerator {
    k: usize,
    m: usize,
    reverse: bool,
    hasher: MinimizerHasher,
    /// Position of the current minimum within the window (0..=k-m).
    min_pos: usize,
    min_hash: u64,
    min_value: u64,
}

impl MinimizerEnumerator {
    /// Enumerator for forward-sliding windows.
    pub fn new(k: usize, m: usize, seed: u64) -> Self {
        Self::with_direction(k, m, seed, false)
    }

    /// Enumerator for windows that slide like a reverse complement.
    pub fn new_reverse(k: usize, m: usize, seed: u64) -> Self {
        Self::with_direction(k, m, seed, true)
    }

    fn with_direction(k: usize, m: usize, seed: u64, reverse: bool) -> Self {
        assert!(m >= 1 && m <= k, "minimizer length must satisfy 1 <= m <= k");
        Self {
            k,
            m,
            reverse,
            hasher: MinimizerHasher::new(seed),
            min_pos: 0,
            min_hash: u64::MAX,
            min_value: 0,
        }
    }

    #[inline]
    fn last_pos(&self) -> usize {
        self.k - self.m
    }

    fn rescan(&mut self, kmer: Kmer) {
        self.min_hash = u64::MAX;
        self.min_value = 0;
        self.min_pos = 0;
        let mut first = true;
        for i in 0..=self.last_pos() {
            let value = kmer.sub_window(i, self.m);
            let hash = self.hasher.hash(value);
            if first || hash < self.min_hash {
                first = false;
                self.min_hash = hash;
                self.min_value = value;
                self.min_pos = i;
            }
        }
    }

    /// Minimizer of `kmer`, which must be the successor window of the k-mer
    /// passed on the previous call unless `is_run_start` is set.
    pub fn next(&mut self, kmer: Kmer, is_run_start: bool) -> u64 {
        let last = self.last_pos();
        if is_run_start {
            self.rescan(kmer);
        } else if !self.reverse {
            if self.min_pos == 0 {
                self.rescan(kmer);
            } else {
                let value = kmer.sub_window(last, self.m);
                let hash = self.hasher.hash(value);
                if hash < self.min_hash {
                    self.min_hash = hash;
                    self.min_value = value;
                    self.min_pos = last;
                } else {
                    self.min_pos -= 1;
                }
            }
        } else if self.min_pos == last {
            self.rescan(kmer);
        } else {
            // The new m-mer sits leftmost, so it also wins ties.
            let value = kmer.sub_window(0, self.m);
            let hash = self.hasher.hash(value);
            if hash <= self.min_hash {
                self.min_hash = hash;
                self.min_value = value;
                self.min_pos = 0;
            } else {
                self.min_pos += 1;
            }
        }
        self.min_value
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
