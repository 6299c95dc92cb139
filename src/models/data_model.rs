// src/models/data_model.rs
use log::debug;
use ndarray::Array1;
use std::collections::{HashMap, HashSet};

use crate::errors::ModelError;
use crate::matching::comparator::{ComparatorRegistry, StringMetric};
use crate::models::field::{DataModelConfig, FieldKind, FieldSpec};

pub const SOURCE_COLUMN_DIFFERENT: &str = "different sources";

/// How one non-source field writes into the base block of a feature row.
#[derive(Debug, Clone)]
pub(crate) enum ColumnPlan {
    String {
        field: usize,
        metric: StringMetric,
    },
    Categorical {
        field: usize,
        labels: HashMap<String, usize>,
        count: usize,
    },
    Interaction {
        field: usize,
        constituents: Vec<usize>,
    },
}

impl ColumnPlan {
    pub(crate) fn field(&self) -> usize {
        match self {
            ColumnPlan::String { field, .. }
            | ColumnPlan::Categorical { field, .. }
            | ColumnPlan::Interaction { field, .. } => *field,
        }
    }

    pub(crate) fn width(&self) -> usize {
        match self {
            ColumnPlan::String { .. } | ColumnPlan::Interaction { .. } => 1,
            ColumnPlan::Categorical { count, .. } => count * count.saturating_sub(1) / 2,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SourcePlan {
    pub field: usize,
    pub labels: [String; 2],
}

/// Ordered field declarations plus the fitted linear model.
///
/// The feature layout is fixed at construction: every non-source field
/// contributes its columns in declaration order (the base block). With a
/// source field the row becomes
/// `[source] + base + [different sources] + base × different sources`.
#[derive(Debug, Clone)]
pub struct DataModel {
    fields: Vec<FieldSpec>,
    bias: f64,
    weights: Array1<f64>,
    plans: Vec<ColumnPlan>,
    source: Option<SourcePlan>,
    base_width: usize,
}

impl DataModel {
    /// Validates the declarations and derives the feature layout. Column
    /// weights are taken from the owning field's `weight`.
    pub fn new(fields: Vec<FieldSpec>, bias: f64) -> Result<Self, ModelError> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut plans = Vec::new();
        let mut source: Option<SourcePlan> = None;

        for (index, spec) in fields.iter().enumerate() {
            if seen.contains_key(spec.name.as_str()) {
                return Err(ModelError::DuplicateFieldName(spec.name.clone()));
            }

            match &spec.kind {
                FieldKind::String { metric } => plans.push(ColumnPlan::String {
                    field: index,
                    metric: metric.clone(),
                }),
                FieldKind::Categorical { categories } => {
                    plans.push(categorical_plan(index, spec, categories)?)
                }
                FieldKind::Source { labels } => {
                    if let Some(existing) = &source {
                        return Err(ModelError::MultipleSourceFields {
                            first: fields[existing.field].name.clone(),
                            second: spec.name.clone(),
                        });
                    }
                    if labels[0] == labels[1] {
                        return Err(ModelError::InvalidSourceLabels {
                            field: spec.name.clone(),
                            labels: labels.to_vec(),
                        });
                    }
                    source = Some(SourcePlan {
                        field: index,
                        labels: labels.clone(),
                    });
                }
                FieldKind::Interaction { fields: names } => {
                    plans.push(interaction_plan(index, spec, names, &seen, &fields)?)
                }
            }

            seen.insert(spec.name.as_str(), index);
        }

        let base_width = plans.iter().map(ColumnPlan::width).sum();
        let mut model = Self {
            fields,
            bias,
            weights: Array1::zeros(0),
            plans,
            source,
            base_width,
        };
        model.weights = Array1::from(model.field_column_weights());

        debug!(
            "Built data model with {} fields, dimension {} (source field: {})",
            model.fields.len(),
            model.dimension(),
            model.source_field().map_or("none", |f| f.name.as_str())
        );

        Ok(model)
    }

    /// Builds a model from schema-layer configuration.
    pub fn from_config(
        config: &DataModelConfig,
        registry: &ComparatorRegistry,
    ) -> Result<Self, ModelError> {
        let fields = config
            .fields
            .iter()
            .map(|def| def.to_spec(registry))
            .collect::<Result<Vec<_>, _>>()?;
        let model = Self::new(fields, config.bias)?;
        match &config.weights {
            Some(weights) => model.with_weights(weights.clone()),
            None => Ok(model),
        }
    }

    /// Replaces the per-field weights with one weight per feature column.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self, ModelError> {
        if weights.len() != self.dimension() {
            return Err(ModelError::WeightDimensionMismatch {
                expected: self.dimension(),
                actual: weights.len(),
            });
        }
        self.weights = Array1::from(weights);
        Ok(self)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Width of the columns produced by non-source fields.
    pub fn base_width(&self) -> usize {
        self.base_width
    }

    /// Total feature-vector width.
    pub fn dimension(&self) -> usize {
        match self.source {
            Some(_) => 2 * self.base_width + 2,
            None => self.base_width,
        }
    }

    pub fn source_field(&self) -> Option<&FieldSpec> {
        self.source.as_ref().map(|s| &self.fields[s.field])
    }

    pub(crate) fn plans(&self) -> &[ColumnPlan] {
        &self.plans
    }

    pub(crate) fn source_plan(&self) -> Option<&SourcePlan> {
        self.source.as_ref()
    }

    /// Human readable name for every feature column, in column order.
    pub fn column_names(&self) -> Vec<String> {
        let mut base = Vec::with_capacity(self.base_width);
        for plan in &self.plans {
            let spec = &self.fields[plan.field()];
            match &spec.kind {
                FieldKind::Categorical { categories } => {
                    for (x, first) in categories.iter().enumerate() {
                        for second in &categories[x + 1..] {
                            base.push(format!("{}:{}|{}", spec.name, first, second));
                        }
                    }
                }
                _ => base.push(spec.name.clone()),
            }
        }

        match self.source_field() {
            None => base,
            Some(source) => {
                let mut names = Vec::with_capacity(self.dimension());
                names.push(source.name.clone());
                names.extend(base.iter().cloned());
                names.push(SOURCE_COLUMN_DIFFERENT.to_string());
                names.extend(
                    base.iter()
                        .map(|name| format!("{}:{}", SOURCE_COLUMN_DIFFERENT, name)),
                );
                names
            }
        }
    }

    fn field_column_weights(&self) -> Vec<f64> {
        let mut base = Vec::with_capacity(self.base_width);
        for plan in &self.plans {
            let weight = self.fields[plan.field()].weight;
            base.extend(std::iter::repeat(weight).take(plan.width()));
        }

        match self.source_field() {
            None => base,
            Some(source) => {
                let mut weights = Vec::with_capacity(self.dimension());
                weights.push(source.weight);
                weights.extend_from_slice(&base);
                weights.push(source.weight);
                weights.extend_from_slice(&base);
                weights
            }
        }
    }
}

fn categorical_plan(
    index: usize,
    spec: &FieldSpec,
    categories: &[String],
) -> Result<ColumnPlan, ModelError> {
    if categories.len() < 2 {
        return Err(ModelError::InvalidCategories {
            field: spec.name.clone(),
            reason: format!("at least two categories required, got {}", categories.len()),
        });
    }
    let mut labels = HashMap::with_capacity(categories.len());
    for (position, category) in categories.iter().enumerate() {
        if labels.insert(category.clone(), position).is_some() {
            return Err(ModelError::InvalidCategories {
                field: spec.name.clone(),
                reason: format!("category '{}' is listed twice", category),
            });
        }
    }
    Ok(ColumnPlan::Categorical {
        field: index,
        labels,
        count: categories.len(),
    })
}

fn interaction_plan(
    index: usize,
    spec: &FieldSpec,
    names: &[String],
    declared: &HashMap<&str, usize>,
    fields: &[FieldSpec],
) -> Result<ColumnPlan, ModelError> {
    if names.len() < 2 {
        return Err(ModelError::InvalidInteraction {
            field: spec.name.clone(),
            reason: format!("needs at least two fields, got {}", names.len()),
        });
    }

    let mut constituents = Vec::with_capacity(names.len());
    let mut unique = HashSet::new();
    for name in names {
        let &position =
            declared
                .get(name.as_str())
                .ok_or_else(|| ModelError::DanglingInteractionReference {
                    field: spec.name.clone(),
                    reference: name.clone(),
                })?;
        match fields[position].kind {
            FieldKind::Source { .. } | FieldKind::Interaction { .. } => {
                return Err(ModelError::InvalidInteraction {
                    field: spec.name.clone(),
                    reason: format!(
                        "'{}' is a {} field",
                        name,
                        fields[position].kind.type_name()
                    ),
                })
            }
            _ => {}
        }
        if !unique.insert(position) {
            return Err(ModelError::InvalidInteraction {
                field: spec.name.clone(),
                reason: format!("'{}' is listed twice", name),
            });
        }
        constituents.push(position);
    }

    Ok(ColumnPlan::Interaction {
        field: index,
        constituents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::FieldDefinition;

    #[test]
    fn test_dimension_without_and_with_source() {
        let model = DataModel::new(vec![FieldSpec::string("name", 1.0)], 0.0).unwrap();
        assert_eq!(model.dimension(), 1);

        let model = DataModel::new(
            vec![
                FieldSpec::string("name", 1.0),
                FieldSpec::source("source", "s1", "s2", 0.5),
            ],
            0.0,
        )
        .unwrap();
        assert_eq!(model.base_width(), 1);
        assert_eq!(model.dimension(), 4);
    }

    #[test]
    fn test_categorical_dimension_is_pair_count() {
        let model = DataModel::new(
            vec![FieldSpec::categorical("type", ["a", "b", "c", "d"], 1.0)],
            0.0,
        )
        .unwrap();
        assert_eq!(model.dimension(), 6);
        assert_eq!(
            model.column_names(),
            vec!["type:a|b", "type:a|c", "type:a|d", "type:b|c", "type:b|d", "type:c|d"]
        );
    }

    #[test]
    fn test_column_names_with_source_and_interaction() {
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
        assert_eq!(
            model.column_names(),
            vec![
                "source",
                "first_name",
                "last_name",
                "first-last",
                "different sources",
                "different sources:first_name",
                "different sources:last_name",
                "different sources:first-last",
            ]
        );
        assert_eq!(model.dimension(), 8);
    }

    #[test]
    fn test_dangling_interaction_reference() {
        let err = DataModel::new(
            vec![
                FieldSpec::string("first_name", 1.0),
                FieldSpec::interaction("first-last", ["first_name", "last_name"], 1.0),
            ],
            0.0,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ModelError::DanglingInteractionReference {
                field: "first-last".to_string(),
                reference: "last_name".to_string()
            }
        );
    }

    #[test]
    fn test_interaction_must_reference_earlier_fields() {
        let err = DataModel::new(
            vec![
                FieldSpec::string("first_name", 1.0),
                FieldSpec::interaction("first-last", ["first_name", "last_name"], 1.0),
                FieldSpec::string("last_name", 1.0),
            ],
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DanglingInteractionReference { .. }));
    }

    #[test]
    fn test_interaction_rejects_source_constituent() {
        let err = DataModel::new(
            vec![
                FieldSpec::string("name", 1.0),
                FieldSpec::source("source", "a", "b", 1.0),
                FieldSpec::interaction("name-source", ["name", "source"], 1.0),
            ],
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidInteraction { .. }));
    }

    #[test]
    fn test_single_source_field_allowed() {
        let err = DataModel::new(
            vec![
                FieldSpec::source("source", "a", "b", 1.0),
                FieldSpec::source("origin", "x", "y", 1.0),
            ],
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::MultipleSourceFields { .. }));
    }

    #[test]
    fn test_duplicate_names_and_bad_categories() {
        assert_eq!(
            DataModel::new(
                vec![FieldSpec::string("name", 1.0), FieldSpec::string("name", 2.0)],
                0.0
            )
            .unwrap_err(),
            ModelError::DuplicateFieldName("name".to_string())
        );
        assert!(matches!(
            DataModel::new(vec![FieldSpec::categorical("type", ["a"], 1.0)], 0.0),
            Err(ModelError::InvalidCategories { .. })
        ));
        assert!(matches!(
            DataModel::new(vec![FieldSpec::categorical("type", ["a", "b", "a"], 1.0)], 0.0),
            Err(ModelError::InvalidCategories { .. })
        ));
    }

    #[test]
    fn test_weights_follow_owning_field() {
        let model = DataModel::new(
            vec![
                FieldSpec::string("name", -1.5),
                FieldSpec::categorical("type", ["a", "b", "c"], 0.25),
                FieldSpec::source("source", "a", "b", 2.0),
            ],
            0.0,
        )
        .unwrap();
        assert_eq!(
            model.weights().to_vec(),
            vec![2.0, -1.5, 0.25, 0.25, 0.25, 2.0, -1.5, 0.25, 0.25, 0.25]
        );
    }

    #[test]
    fn test_explicit_weights_must_match_dimension() {
        let model = DataModel::new(vec![FieldSpec::string("name", 1.0)], 0.0).unwrap();
        assert_eq!(
            model.clone().with_weights(vec![1.0, 2.0]).unwrap_err(),
            ModelError::WeightDimensionMismatch {
                expected: 1,
                actual: 2
            }
        );
        let model = model.with_weights(vec![-3.0]).unwrap();
        assert_eq!(model.weights().to_vec(), vec![-3.0]);
    }

    #[test]
    fn test_from_config() {
        let config: DataModelConfig = serde_json::from_str(
            r#"{
                "fields": [
                    {"field": "name", "type": "String", "weight": -1.03},
                    {"field": "source", "type": "Source", "source_names": ["a", "b"]}
                ],
                "bias": 4.76
            }"#,
        )
        .unwrap();
        let model = DataModel::from_config(&config, &ComparatorRegistry::new()).unwrap();
        assert_eq!(model.dimension(), 4);
        assert_eq!(model.bias(), 4.76);
        assert_eq!(model.field("name").unwrap().weight, -1.03);

        let bad = DataModelConfig {
            fields: vec![FieldDefinition {
                field: "when".to_string(),
                kind: "Timestamp".to_string(),
                weight: 0.0,
                categories: None,
                source_names: None,
                interaction_fields: None,
                comparator: None,
            }],
            bias: 0.0,
            weights: None,
        };
        assert!(matches!(
            DataModel::from_config(&bad, &ComparatorRegistry::new()),
            Err(ModelError::UnknownFieldKind { .. })
        ));
    }
}
