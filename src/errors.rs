// src/errors.rs
use thiserror::Error;

/// Failures raised while validating field declarations into a `DataModel`.
/// All of these are fatal: no scoring may proceed with an invalid model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown field kind '{kind}' for field '{field}'")]
    UnknownFieldKind { field: String, kind: String },

    #[error("Interaction field '{field}' references '{reference}', which is not declared before it")]
    DanglingInteractionReference { field: String, reference: String },

    #[error("Interaction field '{field}' is invalid: {reason}")]
    InvalidInteraction { field: String, reason: String },

    #[error("Field '{0}' is declared more than once")]
    DuplicateFieldName(String),

    #[error("Only one Source field is allowed, found '{first}' and '{second}'")]
    MultipleSourceFields { first: String, second: String },

    #[error("Source field '{field}' needs exactly two distinct labels, got {labels:?}")]
    InvalidSourceLabels { field: String, labels: Vec<String> },

    #[error("Categorical field '{field}' is invalid: {reason}")]
    InvalidCategories { field: String, reason: String },

    #[error("Unknown comparator '{comparator}' for field '{field}'")]
    UnknownComparator { field: String, comparator: String },

    #[error("Weight vector has {actual} entries but the model has dimension {expected}")]
    WeightDimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    #[error("Cannot draw {sample_size} pairs from {n} items: at least two items are required")]
    InvalidDomain { n: u64, sample_size: usize },

    #[error("Population of {n} items exceeds the supported maximum of {max}")]
    PopulationTooLarge { n: u64, max: u64 },
}

/// Per-pair failures while building a feature row. Missing values never end
/// up here; they fall back to the documented defaults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Source field '{field}' has value '{value}', expected one of {labels:?}")]
    UnknownSourceLabel {
        field: String,
        value: String,
        labels: [String; 2],
    },

    #[error("Comparator '{comparator}' returned {value} for field '{field}', expected a value in [0, 1]")]
    DistanceOutOfRange {
        field: String,
        comparator: String,
        value: f64,
    },
}

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Chunk size must be at least 1")]
    EmptyChunkSize,

    #[error("Chunk {chunk_index} ({chunk_len} pairs) failed: {cause}")]
    WorkerFailure {
        chunk_index: usize,
        chunk_len: usize,
        cause: String,
    },

    #[error("Worker task was lost: {0}")]
    WorkerLost(String),

    #[error("Scoring run was cancelled after {chunks_completed} chunks")]
    Cancelled { chunks_completed: usize },

    #[error("Blocking scoring entry point called from inside a tokio runtime; use the async API instead")]
    NestedRuntime,

    #[error("Failed to start scoring runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
