//! Health check handler

use axum::{extract::State, Json};

use crate::AppState;
use crate::models::{HealthResponse, ModelInfo};

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state.context.model();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        timestamp: chrono::Utc::now().timestamp(),
        model: ModelInfo {
            num_features: model.num_features(),
            num_trees: model.trees().len(),
            objective: model.objective(),
            base_score: model.base_score(),
            expected_value: state.context.explainer().expected_value(),
            feature_names: state.context.feature_names().to_vec(),
            artifacts: (*state.manifest).clone(),
        },
    })
}
