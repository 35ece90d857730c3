//! Configuration module

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the tree ensemble (XGBoost JSON model)
    pub model_path: String,

    /// Path to the fitted standard scaler
    pub scaler_path: String,

    /// Bind address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: "artifacts/xgb_model.json".to_string(),
            scaler_path: "artifacts/scaler.json".to_string(),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            environment: "development".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            model_path: lookup("MODEL_PATH").unwrap_or(defaults.model_path),

            scaler_path: lookup("SCALER_PATH").unwrap_or(defaults.scaler_path),

            host: lookup("HOST")
                .and_then(|h| h.parse().ok())
                .unwrap_or(defaults.host),

            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),

            json_logs: lookup("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.json_logs),
        }
    }

    /// Socket address to listen on
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
