// src/matching/mod.rs
pub mod comparator;
pub mod features;

pub use comparator::{ComparatorRegistry, StringComparator, StringMetric};
pub use features::{build_features, pair_distances};
