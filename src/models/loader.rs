//! Artifact loader: picks the backend from the file extension

use super::native::{NativeModel, NativeScaler};
use super::onnx::OnnxModel;
use super::{Model, Scaler};
use crate::error::{PredictError, Result};
use anyhow::Context;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Once;
use tracing::info;

static ORT_INIT: Once = Once::new();

/// Loader for serialized model and scaler artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a model artifact (`.json` native or `.onnx`)
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn Model>> {
        let path = path.as_ref();

        let model: Box<dyn Model> = match extension(path).as_str() {
            "json" => {
                let text = read_artifact(path)?;
                let model =
                    NativeModel::from_json(&text).map_err(|e| PredictError::artifact(path, e))?;
                Box::new(model)
            }
            "onnx" => Box::new(self.load_onnx(path)?),
            other => {
                return Err(PredictError::artifact(
                    path,
                    format!("unsupported model format '{}'", other),
                ))
            }
        };

        info!(
            path = %path.display(),
            model = model.name(),
            n_features = ?model.n_features(),
            "Model artifact loaded"
        );

        Ok(model)
    }

    /// Load a scaler artifact (`.json` only)
    pub fn load_scaler<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn Scaler>> {
        let path = path.as_ref();

        if extension(path) != "json" {
            return Err(PredictError::artifact(
                path,
                "scaler artifacts must be .json",
            ));
        }
        let text = read_artifact(path)?;
        let scaler = NativeScaler::from_json(&text).map_err(|e| PredictError::artifact(path, e))?;

        info!(
            path = %path.display(),
            n_features = scaler.n_features(),
            "Scaler artifact loaded"
        );

        Ok(Box::new(scaler))
    }

    fn load_onnx(&self, path: &Path) -> Result<OnnxModel> {
        if !path.is_file() {
            return Err(PredictError::artifact(path, "file not found"));
        }

        ORT_INIT.call_once(|| {
            if let Err(e) = ort::init().commit() {
                tracing::warn!(error = %e, "ONNX Runtime environment init failed, using defaults");
            }
        });

        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = self
            .build_session(path)
            .map_err(|e| PredictError::artifact(path, format!("{:#}", e)))?;

        let model = OnnxModel::new(session);
        info!(
            path = %path.display(),
            input = %model.input_name(),
            "ONNX model loaded successfully"
        );
        Ok(model)
    }

    fn build_session(&self, path: &Path) -> anyhow::Result<Session> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;
        Ok(session)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

fn read_artifact(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| PredictError::artifact(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    #[test]
    fn test_load_native_model() {
        let file = write_temp(".json", r#"{"type": "linear", "coefficients": [1.0, 1.0]}"#);
        let model = ModelLoader::new().load_model(file.path()).unwrap();
        assert_eq!(model.name(), "linear");
        assert_eq!(model.n_features(), Some(2));
        assert_eq!(model.predict(&[1.0, 2.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_missing_artifact_fails() {
        let err = ModelLoader::new()
            .load_model("/nonexistent/customer_model.json")
            .err()
            .unwrap();
        assert_eq!(err.kind(), "artifact_load");

        let err = ModelLoader::new()
            .load_model("/nonexistent/rf_best_model.onnx")
            .err()
            .unwrap();
        assert_eq!(err.kind(), "artifact_load");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_temp(".sav", "pickle bytes");
        let err = ModelLoader::new().load_model(file.path()).err().unwrap();
        assert!(err.to_string().contains("unsupported model format 'sav'"));
    }

    #[test]
    fn test_corrupt_artifact() {
        let file = write_temp(".json", "{ not json");
        assert!(ModelLoader::new().load_model(file.path()).is_err());
        assert!(ModelLoader::new().load_scaler(file.path()).is_err());
    }

    #[test]
    fn test_load_scaler() {
        let file = write_temp(".json", r#"{"type": "standard", "mean": [0.0], "scale": [2.0]}"#);
        let scaler = ModelLoader::new().load_scaler(file.path()).unwrap();
        assert_eq!(scaler.transform(&[4.0]).unwrap(), vec![2.0]);

        let onnx = write_temp(".onnx", "");
        assert!(ModelLoader::new().load_scaler(onnx.path()).is_err());
    }
}
