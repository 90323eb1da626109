//! Prediction records and response bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a deployment's scalar output is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    /// Cluster id from a clustering model
    Cluster,
    /// Class label from a classifier
    Category,
    /// Continuous value from a regressor
    Regression,
}

impl PredictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionKind::Cluster => "cluster",
            PredictionKind::Category => "category",
            PredictionKind::Regression => "regression",
        }
    }
}

/// One model invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Request identifier for log correlation
    pub request_id: String,
    /// Deployment that served the request
    pub deployment: String,
    /// Raw model output
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Prediction {
    pub fn new(deployment: &str, value: f64) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deployment: deployment.to_string(),
            value,
            timestamp: Utc::now(),
        }
    }

    /// Cluster id for cluster deployments (model output is an index)
    pub fn cluster_id(&self) -> i64 {
        self.value.round() as i64
    }
}

/// JSON body of the predict endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(rename = "Prediction")]
    pub prediction: f64,
}

impl From<&Prediction> for PredictionResponse {
    fn from(prediction: &Prediction) -> Self {
        Self {
            prediction: prediction.value,
        }
    }
}
