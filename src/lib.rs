// src/lib.rs
pub mod candidate_generation;
pub mod errors;
pub mod matching;
pub mod models;
pub mod scoring;
pub mod utils;

pub use errors::{FeatureError, ModelError, SamplingError, ScoringError};
pub use models::{DataModel, IdentifiedPair, Record, RecordId, RecordPair};
pub use scoring::{score_duplicates, score_duplicates_blocking, ParallelScorer, ScoredPair};
