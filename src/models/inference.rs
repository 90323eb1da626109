//! Model invoker: optional scaling followed by a single prediction

use crate::error::{PredictError, Result};
use crate::models::loader::ModelLoader;
use crate::models::{Model, Scaler};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// A loaded model and its optional scaler, immutable after construction
pub struct InferenceEngine {
    model: Box<dyn Model>,
    scaler: Option<Box<dyn Scaler>>,
}

impl InferenceEngine {
    pub fn new(model: Box<dyn Model>, scaler: Option<Box<dyn Scaler>>) -> Result<Self> {
        if let (Some(scaler), Some(expected)) = (&scaler, model.n_features()) {
            if scaler.n_features() != expected {
                return Err(PredictError::SchemaMismatch {
                    expected,
                    actual: scaler.n_features(),
                });
            }
        }
        Ok(Self { model, scaler })
    }

    /// Load model and scaler artifacts from disk
    pub fn load<P: AsRef<Path>>(
        loader: &ModelLoader,
        model_path: P,
        scaler_path: Option<P>,
    ) -> Result<Self> {
        let model = loader.load_model(model_path)?;
        let scaler = scaler_path.map(|p| loader.load_scaler(p)).transpose()?;
        Self::new(model, scaler)
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    /// Arity the artifacts declare (the model's, else the scaler's)
    pub fn n_features(&self) -> Option<usize> {
        self.model
            .n_features()
            .or_else(|| self.scaler.as_ref().map(|s| s.n_features()))
    }

    /// Scale if configured, then predict exactly one value
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let start = Instant::now();

        let value = match &self.scaler {
            Some(scaler) => {
                let scaled = scaler.transform(features)?;
                self.model.predict(&scaled)?
            }
            None => self.model.predict(features)?,
        };

        if !value.is_finite() {
            return Err(PredictError::Invocation(format!(
                "{} model returned non-finite value {}",
                self.model.name(),
                value
            )));
        }

        debug!(
            model = self.model.name(),
            scaled = self.scaler.is_some(),
            value = value,
            latency_us = start.elapsed().as_micros() as u64,
            "Model invocation complete"
        );

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::native::{NativeModel, NativeScaler};
    use ndarray::{array, Array1};

    fn linear(coefficients: Vec<f64>, intercept: f64) -> Box<dyn Model> {
        Box::new(NativeModel::Linear {
            coefficients: Array1::from(coefficients),
            intercept,
        })
    }

    #[test]
    fn test_scaled_prediction() {
        let scaler = NativeScaler::Standard {
            mean: array![10.0, 20.0],
            scale: array![2.0, 5.0],
        };
        let engine =
            InferenceEngine::new(linear(vec![1.0, 1.0], 100.0), Some(Box::new(scaler))).unwrap();

        // (14-10)/2 + (30-20)/5 + 100
        assert_eq!(engine.predict(&[14.0, 30.0]).unwrap(), 104.0);
        assert!(engine.has_scaler());
        assert_eq!(engine.n_features(), Some(2));
    }

    #[test]
    fn test_scaler_model_width_mismatch() {
        let scaler = NativeScaler::MinMax {
            min: array![0.0],
            scale: array![1.0],
        };
        let result = InferenceEngine::new(linear(vec![1.0, 1.0], 0.0), Some(Box::new(scaler)));
        assert!(matches!(
            result,
            Err(PredictError::SchemaMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_non_finite_output_is_invocation_error() {
        let engine = InferenceEngine::new(linear(vec![1e308], 0.0), None).unwrap();
        assert!(matches!(
            engine.predict(&[1e308]),
            Err(PredictError::Invocation(_))
        ));
    }

    #[test]
    fn test_repeated_invocations_are_identical() {
        let engine = InferenceEngine::new(
            Box::new(NativeModel::Kmeans {
                centroids: array![[0.0, 0.0], [5.0, 5.0]],
            }),
            None,
        )
        .unwrap();

        let outputs: Vec<f64> = (0..5).map(|_| engine.predict(&[4.0, 4.5]).unwrap()).collect();
        assert!(outputs.iter().all(|&v| v == 1.0));
    }
}
