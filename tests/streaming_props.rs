//! Property tests: streaming answers against fresh lookups and a naive
//! k-mer set.

use std::collections::HashSet;

use kstream_rs::index::build::{BuildConfig, DictionaryBuilder};
use kstream_rs::index::dictionary::Dictionary;
use kstream_rs::kmer::{Kmer, reverse_complement_ascii};
use kstream_rs::query::result::{LookupResult, Orientation};
use proptest::prelude::*;
use proptest::sample::Index;

fn build_dict(reference: &[u8], k: usize, m: usize, skew_min_log2: u64) -> Dictionary {
    let mut builder = DictionaryBuilder::new(BuildConfig {
        k,
        m,
        seed: 7,
        skew_min_log2,
    })
    .unwrap();
    builder.add_sequence(reference);
    builder.build().unwrap()
}

/// Canonical k-mers of `seq`, skipping windows with non-ACGT bytes.
fn naive_kmer_set(seq: &[u8], k: usize) -> HashSet<u64> {
    let mut set = HashSet::new();
    if seq.len() < k {
        return set;
    }
    for window in seq.windows(k) {
        if let Some(kmer) = Kmer::from_ascii(window) {
            set.insert(kmer.canonical(k).bits());
        }
    }
    set
}

/// A read cut from `reference`, with a few point substitutions and an
/// optional reverse complement.
fn make_read(
    reference: &[u8],
    start: Index,
    len: usize,
    flip: bool,
    edits: &[(Index, u8)],
) -> Vec<u8> {
    let start = start.index(reference.len());
    let end = (start + len).min(reference.len());
    let mut read = reference[start..end].to_vec();
    if !read.is_empty() {
        for (pos, base) in edits {
            let p = pos.index(read.len());
            read[p] = *base;
        }
    }
    if flip {
        read = reverse_complement_ascii(&read);
    }
    read
}

fn dna(alphabet: &'static [u8], len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(alphabet.to_vec()), len)
}

fn params() -> impl Strategy<Value = (usize, usize, u64)> {
    (3usize..=21).prop_flat_map(|k| (Just(k), 1usize..=k, 0u64..4))
}

fn read_specs() -> impl Strategy<Value = Vec<(Index, usize, bool, Vec<(Index, u8)>)>> {
    prop::collection::vec(
        (
            any::<Index>(),
            10usize..150,
            any::<bool>(),
            prop::collection::vec((any::<Index>(), prop::sample::select(b"ACGTN".to_vec())), 0..4),
        ),
        1..6,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_streaming_equals_fresh_lookup(
        (k, m, skew_min_log2) in params(),
        reference in dna(b"ACGTACGTACGTACGTN", 30..400),
        specs in read_specs(),
        noise in dna(b"ACGTN", 0..80),
    ) {
        let dict = build_dict(&reference, k, m, skew_min_log2);
        let mut reads: Vec<Vec<u8>> = specs
            .iter()
            .map(|(start, len, flip, edits)| make_read(&reference, *start, *len, *flip, edits))
            .collect();
        reads.push(noise);

        let mut query = dict.streaming_query();
        for read in &reads {
            let mut results = Vec::new();
            query.stream(read, |start, res| results.push((start, res)));
            for (start, res) in results {
                let window = &read[start..start + k];
                prop_assert_eq!(res, dict.lookup(window), "k={} m={} window {}", k, m, start);
            }
        }
    }

    #[test]
    fn prop_lookup_agrees_with_naive_set(
        (k, m, skew_min_log2) in params(),
        reference in dna(b"ACGTACGTACGTACGTN", 30..300),
        probe in dna(b"ACGT", 30..200),
    ) {
        let dict = build_dict(&reference, k, m, skew_min_log2);
        let stored = naive_kmer_set(&reference, k);
        prop_assert_eq!(dict.num_kmers() as usize, stored.len());

        for seq in [&reference, &probe] {
            if seq.len() < k {
                continue;
            }
            for window in seq.windows(k) {
                let res = dict.lookup(window);
                let Some(kmer) = Kmer::from_ascii(window) else {
                    prop_assert!(!res.is_found());
                    continue;
                };
                prop_assert_eq!(res.is_found(), stored.contains(&kmer.canonical(k).bits()));
                if res.is_found() {
                    let at = dict.access(res.kmer_id).unwrap();
                    let expected = match res.kmer_orientation {
                        Orientation::Forward => kmer,
                        _ => kmer.reverse_complement(k),
                    };
                    prop_assert_eq!(at, expected);
                    prop_assert!(res.kmer_id_in_contig < res.contig_size);
                }
            }
        }
    }

    #[test]
    fn prop_extension_moves_by_one(
        (k, m, skew_min_log2) in params(),
        reference in dna(b"ACGT", 40..300),
        specs in read_specs(),
    ) {
        let dict = build_dict(&reference, k, m, skew_min_log2);
        let mut query = dict.streaming_query();
        for (start, len, flip, edits) in &specs {
            let read = make_read(&reference, *start, *len, *flip, edits);
            if read.len() < k {
                continue;
            }
            query.reset();
            let mut prev = LookupResult::not_found();
            for window in read.windows(k) {
                let searches = query.num_searches();
                let extensions = query.num_extensions();
                let res = query.query(window);
                if query.num_extensions() > extensions {
                    prop_assert_eq!(query.num_searches(), searches);
                    prop_assert!(prev.is_found());
                    prop_assert!(res.is_found());
                    prop_assert_eq!(res.contig_id, prev.contig_id);
                    // palindromes (even k) may report either orientation
                    match (prev.kmer_orientation, res.kmer_orientation) {
                        (Orientation::Forward, Orientation::Forward) => {
                            prop_assert_eq!(res.kmer_id, prev.kmer_id + 1)
                        }
                        (Orientation::Backward, Orientation::Backward) => {
                            prop_assert_eq!(res.kmer_id + 1, prev.kmer_id)
                        }
                        _ => prop_assert!(
                            res.kmer_id == prev.kmer_id + 1 || res.kmer_id + 1 == prev.kmer_id
                        ),
                    }
                }
                prev = res;
            }
        }
    }

    #[test]
    fn prop_orientation_symmetry(
        (k, m, skew_min_log2) in params(),
        reference in dna(b"ACGT", 30..250),
    ) {
        let dict = build_dict(&reference, k, m, skew_min_log2);
        let rc_reference = reverse_complement_ascii(&reference);

        let mut forward = Vec::new();
        let mut query = dict.streaming_query();
        query.stream(&reference, |_, res| forward.push(res));
        let mut backward = Vec::new();
        query.stream(&rc_reference, |_, res| backward.push(res));

        prop_assert_eq!(forward.len(), backward.len());
        for (i, (fw, bw)) in forward.iter().zip(backward.iter().rev()).enumerate() {
            prop_assert!(fw.is_found());
            prop_assert_eq!(fw.kmer_id, bw.kmer_id);
            let kmer = Kmer::from_ascii(&reference[i..i + k]).unwrap();
            if kmer != kmer.reverse_complement(k) {
                prop_assert_eq!(fw.kmer_orientation, bw.kmer_orientation.flipped());
            }
        }
    }

    #[test]
    fn prop_restart_is_idempotent(
        (k, m, skew_min_log2) in params(),
        reference in dna(b"ACGTN", 30..200),
        positions in prop::collection::vec(any::<Index>(), 1..10),
    ) {
        prop_assume!(reference.len() >= k);
        let dict = build_dict(&reference, k, m, skew_min_log2);
        let mut query = dict.streaming_query();
        for pos in positions {
            let start = pos.index(reference.len() - k + 1);
            let window = &reference[start..start + k];
            query.reset();
            let first = query.query(window);
            query.reset();
            prop_assert_eq!(query.query(window), first);
        }
    }
}
