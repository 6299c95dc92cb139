// src/models/field.rs
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::matching::comparator::{ComparatorRegistry, StringMetric};

#[derive(Debug, Clone)]
pub enum FieldKind {
    String { metric: StringMetric },
    Categorical { categories: Vec<String> },
    Source { labels: [String; 2] },
    Interaction { fields: Vec<String> },
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "String",
            FieldKind::Categorical { .. } => "Categorical",
            FieldKind::Source { .. } => "Source",
            FieldKind::Interaction { .. } => "Interaction",
        }
    }
}

/// One declared field of a data model.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub weight: f64,
}

impl FieldSpec {
    pub fn string(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::String {
                metric: StringMetric::default(),
            },
            weight,
        }
    }

    pub fn string_with_metric(name: impl Into<String>, metric: StringMetric, weight: f64) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::String { metric },
            weight,
        }
    }

    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
            },
            weight,
        }
    }

    pub fn source(
        name: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Source {
                labels: [first.into(), second.into()],
            },
            weight,
        }
    }

    pub fn interaction<S: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = S>,
        weight: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Interaction {
                fields: fields.into_iter().map(Into::into).collect(),
            },
            weight,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, FieldKind::Source { .. })
    }
}

/// Field declaration as delivered by the schema layer.
///
/// `type` is kept as a free string so that unknown kinds are reported as a
/// model error instead of a deserialisation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, alias = "Categories", skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, alias = "Source Names", skip_serializing_if = "Option::is_none")]
    pub source_names: Option<Vec<String>>,
    #[serde(default, alias = "Interaction Fields", skip_serializing_if = "Option::is_none")]
    pub interaction_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
}

impl FieldDefinition {
    pub fn to_spec(&self, registry: &ComparatorRegistry) -> Result<FieldSpec, ModelError> {
        let kind = match self.kind.to_ascii_lowercase().as_str() {
            "string" => {
                let metric = registry.resolve(self.comparator.as_deref()).ok_or_else(|| {
                    ModelError::UnknownComparator {
                        field: self.field.clone(),
                        comparator: self.comparator.clone().unwrap_or_default(),
                    }
                })?;
                FieldKind::String { metric }
            }
            "categorical" => FieldKind::Categorical {
                categories: self.categories.clone().ok_or_else(|| {
                    ModelError::InvalidCategories {
                        field: self.field.clone(),
                        reason: "no categories declared".to_string(),
                    }
                })?,
            },
            "source" => {
                let labels = self.source_names.clone().unwrap_or_default();
                match <[String; 2]>::try_from(labels) {
                    Ok(labels) => FieldKind::Source { labels },
                    Err(labels) => {
                        return Err(ModelError::InvalidSourceLabels {
                            field: self.field.clone(),
                            labels,
                        })
                    }
                }
            }
            "interaction" => FieldKind::Interaction {
                fields: self.interaction_fields.clone().unwrap_or_default(),
            },
            _ => {
                return Err(ModelError::UnknownFieldKind {
                    field: self.field.clone(),
                    kind: self.kind.clone(),
                })
            }
        };

        Ok(FieldSpec {
            name: self.field.clone(),
            kind,
            weight: self.weight,
        })
    }
}

/// Complete model configuration: ordered field declarations, the bias and an
/// optional full-width weight vector that overrides per-field weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataModelConfig {
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}
