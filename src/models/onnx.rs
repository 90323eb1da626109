//! ONNX Runtime backed models

use super::Model;
use crate::error::{PredictError, Result};
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use std::sync::Mutex;
use tracing::debug;

/// ONNX session plus the names needed to feed it
pub struct OnnxModel {
    /// Running a session needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    n_features: Option<usize>,
}

impl OnnxModel {
    pub fn new(session: Session) -> Self {
        let input = session.inputs.first();

        let input_name = input
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // [batch, n_features]; dynamic dimensions show up as -1
        let n_features = input.and_then(|i| match &i.input_type {
            ValueType::Tensor { shape, .. } => shape
                .get(1)
                .copied()
                .filter(|&d| d > 0)
                .map(|d| d as usize),
            _ => None,
        });

        Self {
            session: Mutex::new(session),
            input_name,
            n_features,
        }
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

impl Model for OnnxModel {
    fn name(&self) -> &str {
        "onnx"
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<f64> {
        let shape = vec![1_i64, features.len() as i64];
        let data: Vec<f32> = features.iter().map(|&x| x as f32).collect();
        let input_tensor = Tensor::from_array((shape, data))
            .map_err(|e| PredictError::Invocation(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| PredictError::Invocation(format!("Lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| PredictError::Invocation(e.to_string()))?;

        // Classifiers export (label, probabilities), regressors a single
        // variable; the first scalar-convertible output is the prediction
        for (name, output) in outputs.iter() {
            if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
                if let Some(&v) = data.first() {
                    debug!(output = %name, value = v, "Extracted i64 output");
                    return Ok(v as f64);
                }
            }
            if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
                if let Some(&v) = data.first() {
                    debug!(output = %name, value = v, "Extracted f32 output");
                    return Ok(v as f64);
                }
            }
            if let Ok((_, data)) = output.try_extract_tensor::<f64>() {
                if let Some(&v) = data.first() {
                    debug!(output = %name, value = v, "Extracted f64 output");
                    return Ok(v);
                }
            }
        }

        Err(PredictError::Invocation(
            "model produced no numeric tensor output".to_string(),
        ))
    }
}
