//! Process-wide state: deployments loaded once before serving

use crate::config::{AppConfig, DeploymentConfig};
use crate::dataset::ReferenceDataset;
use crate::error::{PredictError, Result};
use crate::feature_extractor::{FeatureAssembler, InputCollector};
use crate::metrics::ServiceMetrics;
use crate::models::{InferenceEngine, ModelLoader};
use crate::report::{Presenter, Report};
use crate::types::prediction::Prediction;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One configured front-end with its artifacts in memory
pub struct Deployment {
    pub config: DeploymentConfig,
    collector: InputCollector,
    assembler: FeatureAssembler,
    engine: InferenceEngine,
    presenter: Presenter,
    dataset: Option<ReferenceDataset>,
}

impl Deployment {
    /// Load every artifact the deployment needs; any failure is fatal
    pub fn load(config: &DeploymentConfig, loader: &ModelLoader) -> Result<Self> {
        let engine = InferenceEngine::load(loader, &config.model_path, config.scaler_path.as_ref())?;

        let schema = config.fields.clone();
        if let Some(expected) = engine.n_features() {
            if expected != schema.len() {
                return Err(PredictError::SchemaMismatch {
                    expected,
                    actual: schema.len(),
                });
            }
        }

        let dataset = config
            .dataset
            .as_ref()
            .map(|d| ReferenceDataset::load(&d.path, &d.cluster_column))
            .transpose()?;

        info!(
            deployment = %config.name,
            kind = config.kind.as_str(),
            model = engine.model_name(),
            scaled = engine.has_scaler(),
            fields = schema.len(),
            reference_rows = dataset.as_ref().map(|d| d.row_count()),
            "Deployment ready"
        );

        Ok(Self {
            collector: InputCollector::new(schema.clone(), config.bounds_policy),
            assembler: FeatureAssembler::new(&schema, engine.n_features()),
            engine,
            presenter: Presenter::new(
                config.kind,
                config.result_label.clone(),
                config.categories.clone(),
            ),
            dataset,
            config: config.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn dataset(&self) -> Option<&ReferenceDataset> {
        self.dataset.as_ref()
    }

    /// collect -> assemble -> invoke
    pub fn predict(&self, form: &HashMap<String, String>) -> Result<Prediction> {
        let values = self.collector.collect(form)?;
        let features = self.assembler.assemble(&values)?;
        let value = self.engine.predict(&features)?;
        Ok(Prediction::new(self.name(), value))
    }

    /// Shape the prediction for display
    pub fn report(&self, prediction: &Prediction) -> Result<Report> {
        self.presenter.present(prediction, self.dataset.as_ref())
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Deployments in configuration order
    deployments: Vec<Arc<Deployment>>,
    pub metrics: Arc<ServiceMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Load all deployments; returns an error before anything is served
    pub fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let loader = ModelLoader::with_threads(config.models.onnx_threads);

        let mut deployments = Vec::with_capacity(config.deployments.len());
        for deployment in &config.deployments {
            let loaded = Deployment::load(deployment, &loader)
                .with_context(|| format!("Failed to load deployment '{}'", deployment.name))?;
            deployments.push(Arc::new(loaded));
        }

        Ok(Self::from_deployments(deployments))
    }

    pub fn from_deployments(deployments: Vec<Arc<Deployment>>) -> Self {
        Self {
            deployments,
            metrics: Arc::new(ServiceMetrics::new()),
            started_at: Utc::now(),
        }
    }

    pub fn deployments(&self) -> &[Arc<Deployment>] {
        &self.deployments
    }

    pub fn deployment(&self, name: &str) -> Result<Arc<Deployment>> {
        self.deployments
            .iter()
            .find(|d| d.name() == name)
            .cloned()
            .ok_or_else(|| PredictError::UnknownDeployment(name.to_string()))
    }

    /// Run one prediction with metrics and structured logging
    pub fn predict(
        &self,
        name: &str,
        form: &HashMap<String, String>,
    ) -> Result<(Arc<Deployment>, Prediction)> {
        let start = Instant::now();

        let result = self
            .deployment(name)
            .and_then(|d| d.predict(form).map(|p| (d, p)));

        match &result {
            Ok((deployment, prediction)) => {
                let latency = start.elapsed();
                self.metrics.record_prediction(
                    deployment.name(),
                    deployment.config.kind,
                    prediction.value,
                    latency,
                );
                info!(
                    request_id = %prediction.request_id,
                    deployment = %deployment.name(),
                    value = prediction.value,
                    latency_us = latency.as_micros() as u64,
                    "Prediction served"
                );
            }
            Err(e) => {
                self.metrics.record_failure(e.kind(), start.elapsed());
                match e {
                    PredictError::InvalidInput { .. } | PredictError::UnknownDeployment(_) => {
                        debug!(deployment = %name, error = %e, "Prediction request rejected")
                    }
                    _ => warn!(deployment = %name, error = %e, "Prediction failed"),
                }
            }
        }

        result
    }
}
