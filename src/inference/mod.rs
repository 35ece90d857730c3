//! Inference Module - scaler, tree ensemble and TreeSHAP explainer
//!
//! Everything a request needs lives in one immutable [`InferenceContext`],
//! built once at startup and shared behind an `Arc`.

pub mod ensemble;
pub mod scaler;
pub mod shap;

#[cfg(test)]
pub mod fixtures;

pub use ensemble::{Objective, TreeEnsemble, XgbModelFile};
pub use scaler::{ScalerArtifact, StandardScaler};
pub use shap::TreeExplainer;

use serde::Serialize;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("invalid tree: {0}")]
    InvalidTree(String),

    #[error("invalid scaler: {0}")]
    InvalidScaler(String),

    #[error("unsupported model: {0}")]
    Unsupported(String),
}

// ============================================================================
// CONTEXT
// ============================================================================

/// One scored and explained input
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// Model output after the objective's link
    pub value: f64,
    /// Raw ensemble output
    pub margin: f64,
    /// Explainer baseline in margin space
    pub expected_value: f64,
    /// Per-feature contributions to `margin`
    pub contributions: Vec<f64>,
}

/// Read-only inference state shared by every request.
#[derive(Debug)]
pub struct InferenceContext {
    scaler: StandardScaler,
    model: TreeEnsemble,
    explainer: TreeExplainer,
    feature_names: Vec<String>,
}

impl InferenceContext {
    pub fn new(model: TreeEnsemble, scaler: StandardScaler) -> Result<Self, ModelError> {
        if scaler.n_features() != model.num_features() {
            return Err(ModelError::FeatureCountMismatch {
                expected: model.num_features(),
                actual: scaler.n_features(),
            });
        }

        let feature_names = scaler
            .feature_names()
            .or_else(|| model.feature_names())
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| (0..model.num_features()).map(|i| format!("x{}", i)).collect());

        let explainer = TreeExplainer::new(&model);

        tracing::info!(
            "Inference context ready: {} trees (max depth {}), {} features, expected value {:.4}",
            model.trees().len(),
            model.trees().iter().map(|t| t.max_depth()).max().unwrap_or(0),
            model.num_features(),
            explainer.expected_value()
        );

        Ok(Self {
            scaler,
            model,
            explainer,
            feature_names,
        })
    }

    pub fn model(&self) -> &TreeEnsemble {
        &self.model
    }

    pub fn explainer(&self) -> &TreeExplainer {
        &self.explainer
    }

    /// Input field names, in model column order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Scale, predict and explain one raw feature vector.
    pub fn predict(&self, raw: &[f64]) -> Result<Prediction, ModelError> {
        let scaled = self.scaler.transform(raw)?;
        let margin = self.model.predict_margin(&scaled)?;
        let contributions = self.explainer.shap_values(&self.model, &scaled)?;

        Ok(Prediction {
            value: self.model.objective().apply(margin),
            margin,
            expected_value: self.explainer.expected_value(),
            contributions,
        })
    }
}
