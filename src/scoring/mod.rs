// src/scoring/mod.rs
pub mod logistic;
pub mod scorer;

pub use logistic::{predict_probabilities, sigmoid};
pub use scorer::{
    score_chunk, score_duplicates, score_duplicates_blocking, ParallelScorer, ScoredPair,
    ScoringRun, ScoringSummary,
};
