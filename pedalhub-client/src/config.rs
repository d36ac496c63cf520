//! Configuration loading for the PedalHub client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    /// Origins trusted to complete the external-login popup handshake.
    pub allowed_sso_origins: Vec<String>,
    pub request_timeout_ms: u64,
    /// Durable key-value storage location (tokens, serialized user).
    pub storage_path: PathBuf,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or PEDALHUB_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.ws_endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ws_endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.allowed_sso_origins.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "allowed_sso_origins",
                reason: "at least one trusted origin is required".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        Ok(())
    }

    /// Valid config pointing at an unroutable endpoint, for offline tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:9/api".to_string(),
            ws_endpoint: "ws://127.0.0.1:9/ws".to_string(),
            allowed_sso_origins: vec!["https://sso.test".to_string()],
            request_timeout_ms: 1_000,
            storage_path: PathBuf::from("/tmp/pedalhub-tests.json"),
            reconnect: ReconnectConfig {
                initial_ms: 10,
                max_ms: 100,
                multiplier: 2.0,
                jitter_ms: 5,
            },
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("PEDALHUB_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ClientConfig {
        toml::from_str(
            r#"
            api_base_url = "https://api.example.com/api/"
            ws_endpoint = "wss://api.example.com/hubs/presence"
            allowed_sso_origins = ["https://api.example.com"]
            request_timeout_ms = 10000
            storage_path = "/tmp/pedalhub-state.json"

            [reconnect]
            initial_ms = 500
            max_ms = 30000
            multiplier = 2.0
            jitter_ms = 250
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = valid_config();
        config.api_base_url = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "api_base_url", .. })
        ));
    }

    #[test]
    fn test_no_sso_origins_rejected() {
        let mut config = valid_config();
        config.allowed_sso_origins.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_bounds_checked() {
        let mut config = valid_config();
        config.reconnect.max_ms = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "reconnect.max_ms", .. })
        ));
    }
}
