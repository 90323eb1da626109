//! Model and scaler artifacts

pub mod inference;
pub mod loader;
pub mod native;
pub mod onnx;

pub use inference::InferenceEngine;
pub use loader::ModelLoader;

use crate::error::Result;

/// An externally trained predictor
pub trait Model: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Number of input features, when the artifact declares it
    fn n_features(&self) -> Option<usize>;

    /// Predict one scalar from one feature row
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

/// An externally fitted feature normalization
pub trait Scaler: Send + Sync {
    fn n_features(&self) -> usize;

    fn transform(&self, features: &[f64]) -> Result<Vec<f64>>;
}
