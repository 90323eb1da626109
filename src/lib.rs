//! Prediction Forms Library
//!
//! Serves data-entry forms in front of pre-trained models: collect the
//! fields a model was fit on, assemble them in order, invoke the model and
//! present the result (with per-cluster histograms for clustering models).

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod report;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use dataset::ReferenceDataset;
pub use error::{PredictError, Result};
pub use feature_extractor::{FeatureAssembler, InputCollector};
pub use models::{InferenceEngine, ModelLoader};
pub use report::{Presenter, Report};
pub use server::{AppState, Deployment};
pub use types::{FeatureSchema, FieldSpec, Prediction, PredictionKind};
