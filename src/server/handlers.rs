//! Request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::Html,
    Json,
};
use serde_json::{json, Value};

use super::{pages, state::AppState};
use crate::error::{PageError, PredictError};
use crate::metrics::MetricsSnapshot;
use crate::types::prediction::PredictionResponse;

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(pages::index_page(state.deployments()))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let deployments: Vec<&str> = state.deployments().iter().map(|d| d.name()).collect();
    Json(json!({
        "status": "healthy",
        "deployments": deployments,
        "started_at": state.started_at.to_rfc3339(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Empty form with each field at its default
pub async fn show_form(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Html<String>, PageError> {
    let deployment = state.deployment(&name)?;
    Ok(Html(pages::form_page(&deployment, None, None)))
}

/// Form submission: predict, then render the result below the filled form
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<(StatusCode, Html<String>), PageError> {
    match state.predict(&name, &form) {
        Ok((deployment, prediction)) => {
            // Subsetting and chart drawing are CPU-bound
            let report = tokio::task::spawn_blocking({
                let deployment = Arc::clone(&deployment);
                move || deployment.report(&prediction)
            })
            .await
            .map_err(|e| PredictError::Render(e.to_string()))??;
            Ok((
                StatusCode::OK,
                Html(pages::form_page(&deployment, Some(&form), Some(&report))),
            ))
        }
        // Bad input goes back to the user next to the form they filled
        Err(err @ PredictError::InvalidInput { .. }) => {
            let deployment = state.deployment(&name)?;
            Ok((
                StatusCode::BAD_REQUEST,
                Html(pages::form_page_with_error(&deployment, &form, &err.to_string())),
            ))
        }
        Err(err) => Err(err.into()),
    }
}

/// Machine endpoint: form-encoded fields in, `{"Prediction": <number>}` out
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Json<PredictionResponse>, PredictError> {
    let (_, prediction) = state.predict(&name, &form)?;
    Ok(Json(PredictionResponse::from(&prediction)))
}
