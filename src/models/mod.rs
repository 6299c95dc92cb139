// src/models/mod.rs
pub mod data_model;
pub mod field;
pub mod record;

pub use data_model::DataModel;
pub use field::{DataModelConfig, FieldDefinition, FieldKind, FieldSpec};
pub use record::{IdentifiedPair, Record, RecordId, RecordPair};
