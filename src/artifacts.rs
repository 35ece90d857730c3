//! Artifact loading - model and scaler files read once at startup

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::inference::{
    InferenceContext, ModelError, ScalerArtifact, StandardScaler, TreeEnsemble, XgbModelFile,
};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid artifact {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: ModelError,
    },

    #[error("model and scaler disagree: {0}")]
    Mismatch(ModelError),
}

/// Fingerprints of the files the context was built from
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactManifest {
    pub model_path: String,
    pub model_sha256: String,
    pub scaler_path: String,
    pub scaler_sha256: String,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// Raw file bytes with their SHA-256
struct ArtifactBytes {
    bytes: Vec<u8>,
    sha256: String,
}

fn read_artifact(path: &Path) -> Result<ArtifactBytes, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    tracing::debug!("Read {} ({} bytes, sha256 {})", path.display(), bytes.len(), sha256);

    Ok(ArtifactBytes { bytes, sha256 })
}

fn decode<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, ArtifactError> {
    serde_json::from_slice(bytes).map_err(|source| ArtifactError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the tree ensemble from an XGBoost JSON model file.
pub fn load_model(path: impl AsRef<Path>) -> Result<(TreeEnsemble, String), ArtifactError> {
    let path = path.as_ref();
    tracing::info!("Loading model from: {}", path.display());

    let raw = read_artifact(path)?;
    let file: XgbModelFile = decode(path, &raw.bytes)?;
    let model = TreeEnsemble::from_xgboost(file).map_err(|source| ArtifactError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;

    Ok((model, raw.sha256))
}

/// Load the fitted scaler.
pub fn load_scaler(path: impl AsRef<Path>) -> Result<(StandardScaler, String), ArtifactError> {
    let path = path.as_ref();
    tracing::info!("Loading scaler from: {}", path.display());

    let raw = read_artifact(path)?;
    let artifact: ScalerArtifact = decode(path, &raw.bytes)?;
    let scaler = StandardScaler::from_artifact(artifact).map_err(|source| ArtifactError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;

    Ok((scaler, raw.sha256))
}

/// Load both artifacts and build the inference context.
pub fn load_context(config: &Config) -> Result<(InferenceContext, ArtifactManifest), ArtifactError> {
    let (model, model_sha256) = load_model(&config.model_path)?;
    let (scaler, scaler_sha256) = load_scaler(&config.scaler_path)?;

    let context = InferenceContext::new(model, scaler).map_err(ArtifactError::Mismatch)?;

    let manifest = ArtifactManifest {
        model_path: config.model_path.clone(),
        model_sha256,
        scaler_path: config.scaler_path.clone(),
        scaler_sha256,
        loaded_at: chrono::Utc::now(),
    };

    Ok((context, manifest))
}
