pub mod bit_string;
pub mod buckets;
pub mod build;
pub mod contigs;
pub mod dictionary;
pub mod skew_index;
