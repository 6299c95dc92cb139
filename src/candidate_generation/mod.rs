// src/candidate_generation/mod.rs
pub mod random_pairs;

pub use random_pairs::{
    pair_count, pairs_from_indices, random_pairs, random_pairs_seeded, IndexPair, PairSample,
};
