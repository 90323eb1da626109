//! Type definitions shared across deployments

pub mod prediction;
pub mod schema;

pub use prediction::{Prediction, PredictionKind, PredictionResponse};
pub use schema::{BoundsPolicy, FeatureSchema, FieldKind, FieldSpec};
