//! Standard scaler - per-feature centering and unit-variance scaling.

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Scale values this close to zero are replaced with 1.0
const ZERO_SCALE_EPS: f64 = 10.0 * f64::EPSILON;

/// Serialized form of a fitted scaler.
///
/// Accepts both the short names and the fitted-attribute names
/// (`mean_`, `scale_`, `feature_names_in_`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    #[serde(default, alias = "mean_")]
    pub mean: Option<Vec<f64>>,
    #[serde(default, alias = "scale_")]
    pub scale: Option<Vec<f64>>,
    #[serde(default, alias = "feature_names_in_")]
    pub feature_names: Option<Vec<String>>,
}

/// Fitted standard scaler: `(x - mean) / scale`
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
    feature_names: Option<Vec<String>>,
    n_features: usize,
}

impl StandardScaler {
    /// Build from an artifact, checking that every column list has one width.
    pub fn from_artifact(artifact: ScalerArtifact) -> Result<Self, ModelError> {
        if artifact.mean.is_none() && artifact.scale.is_none() {
            return Err(ModelError::InvalidScaler(
                "scaler has neither mean nor scale".to_string(),
            ));
        }

        let widths: Vec<usize> = [
            artifact.mean.as_ref().map(Vec::len),
            artifact.scale.as_ref().map(Vec::len),
            artifact.feature_names.as_ref().map(Vec::len),
        ]
        .into_iter()
        .flatten()
        .collect();

        let n_features = widths[0];
        if widths.iter().any(|&w| w != n_features) {
            return Err(ModelError::InvalidScaler(format!(
                "inconsistent column counts: {:?}",
                widths
            )));
        }

        let mut values = artifact.mean.iter().chain(artifact.scale.iter()).flatten();
        if values.any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidScaler(
                "mean and scale must be finite".to_string(),
            ));
        }

        let scale = artifact.scale.map(|s| {
            s.into_iter()
                .map(|v| if v.abs() < ZERO_SCALE_EPS { 1.0 } else { v })
                .collect()
        });

        Ok(Self {
            mean: artifact.mean,
            scale,
            feature_names: artifact.feature_names,
            n_features,
        })
    }

    /// Number of input columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Transform one raw feature vector.
    pub fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, ModelError> {
        if raw.len() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features,
                actual: raw.len(),
            });
        }

        let scaled = raw
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let centered = match &self.mean {
                    Some(mean) => x - mean[i],
                    None => x,
                };
                match &self.scale {
                    Some(scale) => centered / scale[i],
                    None => centered,
                }
            })
            .collect();

        Ok(scaled)
    }
}
