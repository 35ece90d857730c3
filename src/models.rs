//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactManifest;
use crate::inference::Objective;

/// `POST /predict_api` body. `data` maps feature name to value; its
/// insertion order is the model's column order.
#[derive(Debug, Deserialize)]
pub struct PredictApiRequest {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictApiResponse {
    pub prediction: f64,
    pub explanation: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub num_features: usize,
    pub num_trees: usize,
    pub objective: Objective,
    pub base_score: f64,
    pub expected_value: f64,
    pub feature_names: Vec<String>,
    #[serde(flatten)]
    pub artifacts: ArtifactManifest,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub timestamp: i64,
    pub model: ModelInfo,
}
