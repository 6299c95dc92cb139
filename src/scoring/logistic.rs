// src/scoring/logistic.rs
use ndarray::{Array1, Array2, ArrayView1};

use crate::models::DataModel;

pub fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

/// Linear predictor `w · x + b` for one feature row.
pub fn logit(weights: &Array1<f64>, bias: f64, features: ArrayView1<f64>) -> f64 {
    weights.dot(&features) + bias
}

/// Duplicate probability of every row of `features`. Rows are scored
/// independently, so the result for a pair does not depend on how the input
/// was chunked.
pub fn predict_probabilities(model: &DataModel, features: &Array2<f64>) -> Array1<f64> {
    debug_assert_eq!(features.ncols(), model.dimension());
    features
        .rows()
        .into_iter()
        .map(|row| sigmoid(logit(model.weights(), model.bias(), row)))
        .collect()
}
