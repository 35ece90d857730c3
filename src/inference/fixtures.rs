//! Test fixtures built from the bundled sample artifacts.

use super::{InferenceContext, ScalerArtifact, StandardScaler, TreeEnsemble, XgbModelFile};

pub const MODEL_JSON: &str = include_str!("../../artifacts/xgb_model.json");
pub const SCALER_JSON: &str = include_str!("../../artifacts/scaler.json");

pub fn model() -> TreeEnsemble {
    let file: XgbModelFile = serde_json::from_str(MODEL_JSON).unwrap();
    TreeEnsemble::from_xgboost(file).unwrap()
}

pub fn scaler() -> StandardScaler {
    let artifact: ScalerArtifact = serde_json::from_str(SCALER_JSON).unwrap();
    StandardScaler::from_artifact(artifact).unwrap()
}

pub fn context() -> InferenceContext {
    InferenceContext::new(model(), scaler()).unwrap()
}

/// b, d, fc, rho, a_d for a beam predicted at exactly 219 kN
pub fn raw_sample() -> Vec<f64> {
    vec![350.0, 500.0, 40.0, 1.2, 2.5]
}

pub fn scaled_sample() -> Vec<f64> {
    scaler().transform(&raw_sample()).unwrap()
}
