// src/matching/features.rs
//
// Turns record pairs into fixed-width distance vectors following the layout
// fixed by `DataModel`.
use ndarray::{Array1, Array2, ArrayViewMut1};

use crate::errors::FeatureError;
use crate::matching::comparator::StringMetric;
use crate::models::data_model::{ColumnPlan, SourcePlan};
use crate::models::{DataModel, RecordPair};

/// Distance used for a String field when either side has no value.
pub const MISSING_STRING_DISTANCE: f64 = 1.0;

const RANGE_TOLERANCE: f64 = 1e-9;

/// Builds the `pairs.len() × model.dimension()` feature matrix.
pub fn build_features(pairs: &[RecordPair], model: &DataModel) -> Result<Array2<f64>, FeatureError> {
    let mut features = Array2::zeros((pairs.len(), model.dimension()));
    let mut scratch = RowScratch::new(model);
    for (pair, row) in pairs.iter().zip(features.rows_mut()) {
        write_row(pair, model, &mut scratch, row)?;
    }
    Ok(features)
}

/// Feature vector of a single pair.
pub fn pair_distances(pair: &RecordPair, model: &DataModel) -> Result<Array1<f64>, FeatureError> {
    let mut row = Array1::zeros(model.dimension());
    let mut scratch = RowScratch::new(model);
    write_row(pair, model, &mut scratch, row.view_mut())?;
    Ok(row)
}

/// Buffers reused across the rows of one chunk.
struct RowScratch {
    base: Vec<f64>,
    // scalar contribution per field index, read by interaction terms
    scalars: Vec<f64>,
}

impl RowScratch {
    fn new(model: &DataModel) -> Self {
        Self {
            base: Vec::with_capacity(model.base_width()),
            scalars: vec![0.0; model.fields().len()],
        }
    }
}

fn write_row(
    pair: &RecordPair,
    model: &DataModel,
    scratch: &mut RowScratch,
    mut row: ArrayViewMut1<f64>,
) -> Result<(), FeatureError> {
    fill_base_columns(pair, model, scratch)?;
    let base = &scratch.base;

    match model.source_plan() {
        None => {
            for (dst, value) in row.iter_mut().zip(base) {
                *dst = *value;
            }
        }
        Some(plan) => {
            let (indicator, different) = source_indicators(pair, model, plan)?;
            let width = base.len();
            row[0] = indicator;
            row[width + 1] = different;
            for (column, value) in base.iter().enumerate() {
                row[1 + column] = *value;
                row[width + 2 + column] = value * different;
            }
        }
    }
    Ok(())
}

fn fill_base_columns(
    pair: &RecordPair,
    model: &DataModel,
    scratch: &mut RowScratch,
) -> Result<(), FeatureError> {
    scratch.base.clear();

    for plan in model.plans() {
        match plan {
            ColumnPlan::String { field, metric } => {
                let name = model.fields()[*field].name.as_str();
                let distance = match (pair.left.value(name), pair.right.value(name)) {
                    (Some(a), Some(b)) => checked_distance(name, metric, a, b)?,
                    _ => MISSING_STRING_DISTANCE,
                };
                scratch.scalars[*field] = distance;
                scratch.base.push(distance);
            }
            ColumnPlan::Categorical {
                field,
                labels,
                count,
            } => {
                let name = model.fields()[*field].name.as_str();
                let start = scratch.base.len();
                scratch
                    .base
                    .extend(std::iter::repeat(0.0).take(plan.width()));

                // Unknown, absent or equal labels assert no pair.
                let mut matched = 0.0;
                if let (Some(a), Some(b)) = (pair.left.value(name), pair.right.value(name)) {
                    if let (Some(&x), Some(&y)) = (labels.get(a), labels.get(b)) {
                        if x != y {
                            let column = category_pair_column(*count, x.min(y), x.max(y));
                            scratch.base[start + column] = 1.0;
                            matched = 1.0;
                        }
                    }
                }
                // max over the expansion, used when this field feeds an interaction
                scratch.scalars[*field] = matched;
            }
            ColumnPlan::Interaction {
                field,
                constituents,
            } => {
                let product: f64 = constituents.iter().map(|&c| scratch.scalars[c]).product();
                scratch.scalars[*field] = product;
                scratch.base.push(product);
            }
        }
    }
    Ok(())
}

/// Column of the unordered label pair `(x, y)`, `x < y`, among `count` labels.
fn category_pair_column(count: usize, x: usize, y: usize) -> usize {
    x * count - x * (x + 1) / 2 + (y - x - 1)
}

fn checked_distance(
    field: &str,
    metric: &StringMetric,
    a: &str,
    b: &str,
) -> Result<f64, FeatureError> {
    let value = metric.distance(a, b);
    if !value.is_finite() || value < -RANGE_TOLERANCE || value > 1.0 + RANGE_TOLERANCE {
        return Err(FeatureError::DistanceOutOfRange {
            field: field.to_string(),
            comparator: metric.name().to_string(),
            value,
        });
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Returns `(source, different sources)`. A missing label on either side
/// asserts nothing; a label outside the declared pair is a malformed record.
fn source_indicators(
    pair: &RecordPair,
    model: &DataModel,
    plan: &SourcePlan,
) -> Result<(f64, f64), FeatureError> {
    let name = model.fields()[plan.field].name.as_str();
    let (Some(a), Some(b)) = (pair.left.value(name), pair.right.value(name)) else {
        return Ok((0.0, 0.0));
    };

    for value in [a, b] {
        if value != plan.labels[0] && value != plan.labels[1] {
            return Err(FeatureError::UnknownSourceLabel {
                field: name.to_string(),
                value: value.to_string(),
                labels: plan.labels.clone(),
            });
        }
    }

    let indicator = if a == plan.labels[0] && b == plan.labels[0] {
        1.0
    } else {
        0.0
    };
    let different = if a != b { 1.0 } else { 0.0 };
    Ok((indicator, different))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::comparator::StringComparator;
    use crate::models::{FieldSpec, Record};
    use std::sync::Arc;

    const STEVE_STEVEN: f64 = 7.125 / 11.0;

    fn record(fields: &[(&str, &str)]) -> Record {
        fields.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn pair(left: &[(&str, &str)], right: &[(&str, &str)]) -> RecordPair {
        RecordPair::new(record(left), record(right))
    }

    fn assert_row(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "row {:?}", actual);
        for (column, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-3, "column {}: {} != {} in {:?}", column, a, e, actual);
        }
    }

    #[test]
    fn test_string_field_distances() {
        let model = DataModel::new(vec![FieldSpec::string("name", 1.0)], 0.0).unwrap();
        let pairs = vec![
            pair(&[("name", "steve")], &[("name", "steve")]),
            pair(&[("name", "steve")], &[("name", "steven")]),
        ];
        let features = build_features(&pairs, &model).unwrap();
        assert_eq!(features.dim(), (2, 1));
        assert_eq!(features[[0, 0]], 0.0);
        assert!((features[[1, 0]] - 0.647).abs() < 1e-3);
    }

    #[test]
    fn test_missing_string_is_maximal_distance() {
        let model = DataModel::new(vec![FieldSpec::string("name", 1.0)], 0.0).unwrap();
        let row = pair_distances(&pair(&[("name", "steve")], &[("city", "Tacoma")]), &model).unwrap();
        assert_eq!(row.to_vec(), vec![MISSING_STRING_DISTANCE]);
        let row = pair_distances(&pair(&[("name", "")], &[("name", "steve")]), &model).unwrap();
        assert_eq!(row.to_vec(), vec![MISSING_STRING_DISTANCE]);
    }

    #[test]
    fn test_categorical_one_hot_over_label_pairs() {
        let model = DataModel::new(vec![FieldSpec::categorical("type", ["a", "b", "c"], 1.0)], 0.0)
            .unwrap();
        let pairs = vec![
            pair(&[("type", "a")], &[("type", "b")]),
            pair(&[("type", "a")], &[("type", "c")]),
            pair(&[("type", "c")], &[("type", "b")]),
        ];
        let features = build_features(&pairs, &model).unwrap();
        assert_eq!(features.row(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(features.row(1).to_vec(), vec![0.0, 1.0, 0.0]);
        assert_eq!(features.row(2).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_categorical_without_known_pair_is_all_zero() {
        let model = DataModel::new(vec![FieldSpec::categorical("type", ["a", "b", "c"], 1.0)], 0.0)
            .unwrap();
        let pairs = vec![
            pair(&[("type", "a")], &[("type", "a")]),
            pair(&[("type", "a")], &[("type", "z")]),
            pair(&[("type", "a")], &[]),
        ];
        let features = build_features(&pairs, &model).unwrap();
        for row in features.rows() {
            assert_eq!(row.to_vec(), vec![0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_source_same_first_side() {
        let model = DataModel::new(
            vec![
                FieldSpec::string("name", 1.0),
                FieldSpec::source("source", "s1", "s2", 1.0),
            ],
            0.0,
        )
        .unwrap();
        let row = pair_distances(
            &pair(
                &[("name", "steve"), ("source", "s1")],
                &[("name", "steven"), ("source", "s1")],
            ),
            &model,
        )
        .unwrap();
        assert_row(row.as_slice().unwrap(), &[1.0, STEVE_STEVEN, 0.0, 0.0]);
    }

    #[test]
    fn test_source_same_second_side_and_split() {
        let model = DataModel::new(
            vec![
                FieldSpec::string("name", 1.0),
                FieldSpec::source("source", "s1", "s2", 1.0),
            ],
            0.0,
        )
        .unwrap();
        let pairs = vec![
            pair(
                &[("name", "steve"), ("source", "s2")],
                &[("name", "steven"), ("source", "s2")],
            ),
            pair(
                &[("name", "steve"), ("source", "s1")],
                &[("name", "steven"), ("source", "s2")],
            ),
        ];
        let features = build_features(&pairs, &model).unwrap();
        assert_row(&features.row(0).to_vec(), &[0.0, STEVE_STEVEN, 0.0, 0.0]);
        assert_row(&features.row(1).to_vec(), &[0.0, STEVE_STEVEN, 1.0, STEVE_STEVEN]);
    }

    #[test]
    fn test_categorical_with_source() {
        let model = DataModel::new(
            vec![
                FieldSpec::categorical("type", ["a", "b", "c"], 1.0),
                FieldSpec::source("source", "foo", "bar", 1.0),
            ],
            0.0,
        )
        .unwrap();
        let pairs = vec![
            pair(
                &[("type", "a"), ("source", "bar")],
                &[("type", "b"), ("source", "bar")],
            ),
            pair(
                &[("type", "a"), ("source", "foo")],
                &[("type", "c"), ("source", "bar")],
            ),
            pair(
                &[("type", "b"), ("source", "foo")],
                &[("type", "c"), ("source", "foo")],
            ),
        ];
        let features = build_features(&pairs, &model).unwrap();
        assert_eq!(features.dim(), (3, 8));
        assert_eq!(
            features.row(0).to_vec(),
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(
            features.row(1).to_vec(),
            vec![0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0]
        );
        assert_eq!(
            features.row(2).to_vec(),
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_interaction_multiplies_constituents() {
        let model = DataModel::new(
            vec![
                FieldSpec::string("first_name", 1.0),
                FieldSpec::string("last_name", 1.0),
                FieldSpec::interaction("first-last", ["first_name", "last_name"], 1.0),
                FieldSpec::source("source", "a", "b", 1.0),
            ],
            0.0,
        )
        .unwrap();
        let product = STEVE_STEVEN * STEVE_STEVEN;

        let same_side = pair(
            &[("first_name", "steve"), ("last_name", "smith"), ("source", "b")],
            &[("first_name", "steven"), ("last_name", "smithe"), ("source", "b")],
        );
        let row = pair_distances(&same_side, &model).unwrap();
        assert_row(
            row.as_slice().unwrap(),
            &[0.0, STEVE_STEVEN, STEVE_STEVEN, product, 0.0, 0.0, 0.0, 0.0],
        );

        let split = pair(
            &[("first_name", "steve"), ("last_name", "smith"), ("source", "a")],
            &[("first_name", "steven"), ("last_name", "smithe"), ("source", "b")],
        );
        let row = pair_distances(&split, &model).unwrap();
        assert_row(
            row.as_slice().unwrap(),
            &[
                0.0,
                STEVE_STEVEN,
                STEVE_STEVEN,
                product,
                1.0,
                STEVE_STEVEN,
                STEVE_STEVEN,
                product,
            ],
        );
    }

    #[test]
    fn test_interaction_with_categorical_uses_match_indicator() {
        let model = DataModel::new(
            vec![
                FieldSpec::categorical("type", ["a", "b", "c"], 1.0),
                FieldSpec::string("name", 1.0),
                FieldSpec::interaction("type-name", ["type", "name"], 1.0),
            ],
            0.0,
        )
        .unwrap();
        let matched = pair(
            &[("type", "a"), ("name", "steve")],
            &[("type", "b"), ("name", "steven")],
        );
        let row = pair_distances(&matched, &model).unwrap();
        assert_row(row.as_slice().unwrap(), &[1.0, 0.0, 0.0, STEVE_STEVEN, STEVE_STEVEN]);

        let unmatched = pair(
            &[("type", "a"), ("name", "steve")],
            &[("type", "a"), ("name", "steven")],
        );
        let row = pair_distances(&unmatched, &model).unwrap();
        assert_row(row.as_slice().unwrap(), &[0.0, 0.0, 0.0, STEVE_STEVEN, 0.0]);
    }

    #[test]
    fn test_missing_source_asserts_nothing() {
        let model = DataModel::new(
            vec![
                FieldSpec::string("name", 1.0),
                FieldSpec::source("source", "a", "b", 1.0),
            ],
            0.0,
        )
        .unwrap();
        let row = pair_distances(
            &pair(&[("name", "steve"), ("source", "a")], &[("name", "steve")]),
            &model,
        )
        .unwrap();
        assert_eq!(row.to_vec(), vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_source_label_is_rejected() {
        let model = DataModel::new(
            vec![
                FieldSpec::string("name", 1.0),
                FieldSpec::source("source", "a", "b", 1.0),
            ],
            0.0,
        )
        .unwrap();
        let err = pair_distances(
            &pair(
                &[("name", "steve"), ("source", "a")],
                &[("name", "steve"), ("source", "c")],
            ),
            &model,
        )
        .unwrap_err();
        assert!(matches!(err, FeatureError::UnknownSourceLabel { ref value, .. } if value == "c"));
    }

    struct Broken;

    impl StringComparator for Broken {
        fn distance(&self, _a: &str, _b: &str) -> f64 {
            2.5
        }
    }

    #[test]
    fn test_out_of_range_comparator_is_rejected() {
        let metric = StringMetric::Custom {
            name: "broken".to_string(),
            comparator: Arc::new(Broken),
        };
        let model = DataModel::new(vec![FieldSpec::string_with_metric("name", metric, 1.0)], 0.0)
            .unwrap();
        let err = pair_distances(&pair(&[("name", "a")], &[("name", "b")]), &model).unwrap_err();
        assert!(matches!(err, FeatureError::DistanceOutOfRange { value, .. } if value == 2.5));
    }

    #[test]
    fn test_category_pair_columns_are_dense() {
        let mut columns = Vec::new();
        for x in 0..5 {
            for y in x + 1..5 {
                columns.push(category_pair_column(5, x, y));
            }
        }
        assert_eq!(columns, (0..10).collect::<Vec<_>>());
    }
}
