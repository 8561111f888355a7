pub mod cli;
pub mod index;
pub mod io;
pub mod kmer;
pub mod query;
pub mod verify;

/// Sentinel for "no id" in lookup results and index answers.
pub const INVALID_U64: u64 = u64::MAX;
