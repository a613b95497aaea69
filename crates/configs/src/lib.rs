//! # configs
//!
//! Environment-driven configuration. `.env` files are honored in
//! development; real deployments set the variables directly.

use config::Environment;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_origins() -> String {
    "http://localhost:5173".to_string()
}

fn default_rate_limit() -> u32 {
    120
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of CORS origins.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    /// API key for the hosted identity provider. When absent the binary
    /// falls back to the in-process provider.
    #[serde(default)]
    pub identity_api_key: Option<SecretString>,
}

impl AppConfig {
    /// Loads from the process environment (`PORT`, `ALLOWED_ORIGINS`,
    /// `RATE_LIMIT_PER_MINUTE`, `IDENTITY_API_KEY`).
    pub fn load() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            info!("loaded environment from .env");
        }
        let cfg = config::Config::builder()
            .add_source(Environment::default())
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_split_and_trim() {
        let cfg = AppConfig {
            port: 8080,
            allowed_origins: "http://a.example, http://b.example ,".to_string(),
            rate_limit_per_minute: 120,
            identity_api_key: None,
        };
        assert_eq!(cfg.origins(), ["http://a.example", "http://b.example"]);
    }
}
