//! Configuration loading from disk, plus the built-in development config.

use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::schema::{
    ControllerConfig, KmsConfig, ListenerConfig, KMS_PURPOSE_ROOT, KMS_PURPOSE_WORKER_AUTH,
    PURPOSE_API, PURPOSE_CLUSTER,
};
use crate::config::validation::{validate_config, ValidationError};

/// Default dev-mode API listener address.
pub const DEV_API_ADDRESS: &str = "127.0.0.1:9200";

/// Default dev-mode cluster listener address.
pub const DEV_CLUSTER_ADDRESS: &str = "127.0.0.1:9201";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ControllerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ControllerConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Configuration used by `--dev`.
///
/// Plaintext API and cluster listeners on loopback, freshly generated keys,
/// and no memory locking.
pub fn dev_config() -> Result<ControllerConfig, ConfigError> {
    let config = ControllerConfig {
        listeners: vec![
            ListenerConfig {
                address: DEV_API_ADDRESS.to_string(),
                purpose: vec![PURPOSE_API.to_string()],
                tls_disable: true,
                ..Default::default()
            },
            ListenerConfig {
                address: DEV_CLUSTER_ADDRESS.to_string(),
                purpose: vec![PURPOSE_CLUSTER.to_string()],
                tls_disable: true,
                ..Default::default()
            },
        ],
        disable_mlock: true,
        kms: vec![
            generated_key(KMS_PURPOSE_ROOT),
            generated_key(KMS_PURPOSE_WORKER_AUTH),
        ],
        ..Default::default()
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn generated_key(purpose: &str) -> KmsConfig {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    KmsConfig {
        purpose: purpose.to_string(),
        key_id: format!("dev-{}", purpose),
        key: hex::encode(key),
    }
}
