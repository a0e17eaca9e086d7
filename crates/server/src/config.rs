//! Server configuration

use anyhow::Result;
use serde::Deserialize;

/// Estimation server configuration, read from `ESTIMATOR_*` environment
/// variables with serde defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Canonical model artifact location
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Optional historical dataset CSV
    #[serde(default = "default_data_path")]
    pub data_path: Option<String>,

    /// SQLite audit log location
    #[serde(default = "default_audit_db_path")]
    pub audit_db_path: String,

    /// Bearer token required for model replacement
    #[serde(default = "default_admin_token")]
    pub admin_token: String,

    /// Mean cost-per-unit used when no historical data is usable
    #[serde(default = "default_fallback_mean_cost_per_unit")]
    pub fallback_mean_cost_per_unit: f64,

    /// Strict mode: analogous estimation fails instead of falling back
    #[serde(default)]
    pub strict_analogous: bool,

    /// Upload size cap for model artifacts, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_api_port() -> u16 {
    8080
}

fn default_model_path() -> String {
    "models/teamexp_classifier.json".to_string()
}

fn default_data_path() -> Option<String> {
    Some("models/data_saved.csv".to_string())
}

fn default_audit_db_path() -> String {
    "database/software_estimation.db".to_string()
}

fn default_admin_token() -> String {
    std::env::var("ADMIN_TOKEN").unwrap_or_else(|_| "supersecretadmintoken".to_string())
}

fn default_fallback_mean_cost_per_unit() -> f64 {
    estimator_core::DEFAULT_FALLBACK_MEAN_COST_PER_UNIT
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            model_path: default_model_path(),
            data_path: default_data_path(),
            audit_db_path: default_audit_db_path(),
            admin_token: default_admin_token(),
            fallback_mean_cost_per_unit: default_fallback_mean_cost_per_unit(),
            strict_analogous: false,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("ESTIMATOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Fallback constant honoring strict mode
    pub fn analogous_fallback(&self) -> Option<f64> {
        if self.strict_analogous {
            None
        } else {
            Some(self.fallback_mean_cost_per_unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.api_port, 8080);
        assert!(!config.strict_analogous);
        assert_eq!(
            config.analogous_fallback(),
            Some(estimator_core::DEFAULT_FALLBACK_MEAN_COST_PER_UNIT)
        );
    }

    #[test]
    fn test_strict_mode_disables_fallback() {
        let config = ServerConfig {
            strict_analogous: true,
            ..Default::default()
        };
        assert_eq!(config.analogous_fallback(), None);
    }
}
