//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of loaded files (serde handles syntactic)
//! - Listener purpose topology checks, run as a startup stage
//!
//! # Design Decisions
//! - File validation returns all errors, not just the first
//! - Purpose validation stops at the first offending listener

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{
    ControllerConfig, ListenerConfig, KMS_PURPOSE_ROOT, KMS_PURPOSE_WORKER_AUTH, PURPOSE_API,
    PURPOSE_CLUSTER,
};
use crate::error::ConfigurationError;

/// A single semantic problem found in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener {index}: invalid address {address:?}")]
    InvalidAddress { index: usize, address: String },

    #[error("listener {index}: max_connections must be greater than zero")]
    ZeroConnections { index: usize },

    #[error("listener {index}: TLS is enabled but tls_cert_file or tls_key_file is missing")]
    MissingTlsFiles { index: usize },

    #[error("kms block {index}: unknown purpose {purpose:?}")]
    UnknownKmsPurpose { index: usize, purpose: String },

    #[error("telemetry: invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),

    #[error("profiler: interval_secs must be greater than zero")]
    ZeroProfilerInterval,
}

/// Validate a freshly parsed config file.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, listener) in config.listeners.iter().enumerate() {
        if listener.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                index,
                address: listener.address.clone(),
            });
        }
        if listener.max_connections == 0 {
            errors.push(ValidationError::ZeroConnections { index });
        }
        if !listener.tls_disable
            && (listener.tls_cert_file.is_none() || listener.tls_key_file.is_none())
        {
            errors.push(ValidationError::MissingTlsFiles { index });
        }
    }

    for (index, kms) in config.kms.iter().enumerate() {
        if kms.purpose != KMS_PURPOSE_ROOT && kms.purpose != KMS_PURPOSE_WORKER_AUTH {
            errors.push(ValidationError::UnknownKmsPurpose {
                index,
                purpose: kms.purpose.clone(),
            });
        }
    }

    if config.telemetry.metrics_enabled
        && config
            .telemetry
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.telemetry.metrics_address.clone(),
        ));
    }

    if config.profiler.enabled && config.profiler.interval_secs == 0 {
        errors.push(ValidationError::ZeroProfilerInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Purposes a validated listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purposes {
    pub api: bool,
    pub cluster: bool,
}

impl Purposes {
    pub const API: Self = Self {
        api: true,
        cluster: false,
    };
    pub const CLUSTER: Self = Self {
        api: false,
        cluster: true,
    };
    pub const BOTH: Self = Self {
        api: true,
        cluster: true,
    };
}

impl std::fmt::Display for Purposes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.api, self.cluster) {
            (true, true) => write!(f, "api,cluster"),
            (true, false) => write!(f, "api"),
            (false, true) => write!(f, "cluster"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// A listener that passed purpose validation. Immutable from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSpec {
    pub address: String,
    pub purposes: Purposes,
    pub tls_disable: bool,
    pub tls_cert_file: Option<String>,
    pub tls_key_file: Option<String>,
    pub max_connections: usize,
}

impl ListenerSpec {
    fn from_config(config: &ListenerConfig, purposes: Purposes) -> Self {
        Self {
            address: config.address.clone(),
            purposes,
            tls_disable: config.tls_disable,
            tls_cert_file: config.tls_cert_file.clone(),
            tls_key_file: config.tls_key_file.clone(),
            max_connections: config.max_connections,
        }
    }
}

/// Check that the listener set is a valid controller topology.
///
/// Every API entry point needs a cluster-facing counterpart somewhere in the
/// set. Cluster-only nodes are allowed.
pub fn validate_listener_purposes(
    listeners: &[ListenerConfig],
) -> Result<Vec<ListenerSpec>, ConfigurationError> {
    let mut found_api = false;
    let mut found_cluster = false;
    let mut specs = Vec::with_capacity(listeners.len());

    for listener in listeners {
        let purposes = match listener.purpose.as_slice() {
            [single] => match single.as_str() {
                PURPOSE_CLUSTER => {
                    found_cluster = true;
                    Purposes::CLUSTER
                }
                PURPOSE_API => {
                    found_api = true;
                    Purposes::API
                }
                other => return Err(ConfigurationError::UnknownPurpose(other.to_string())),
            },
            [] | [_, _] => {
                let declared: Vec<&str> = if listener.purpose.is_empty() {
                    vec![PURPOSE_API, PURPOSE_CLUSTER]
                } else {
                    listener.purpose.iter().map(String::as_str).collect()
                };
                if !declared.contains(&PURPOSE_API) || !declared.contains(&PURPOSE_CLUSTER) {
                    return Err(ConfigurationError::InvalidPurposeSet(listener.purpose.clone()));
                }
                if listener.tls_disable {
                    return Err(ConfigurationError::TlsDisabledOnCombined {
                        address: listener.address.clone(),
                    });
                }
                found_api = true;
                found_cluster = true;
                Purposes::BOTH
            }
            _ => return Err(ConfigurationError::InvalidPurposeSet(listener.purpose.clone())),
        };
        specs.push(ListenerSpec::from_config(listener, purposes));
    }

    if found_api && !found_cluster {
        return Err(ConfigurationError::NoClusterListener);
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(purpose: &[&str], tls_disable: bool) -> ListenerConfig {
        ListenerConfig {
            purpose: purpose.iter().map(|p| p.to_string()).collect(),
            tls_disable,
            ..Default::default()
        }
    }

    #[test]
    fn api_without_cluster_fails() {
        let set = vec![listener(&["api"], true), listener(&["api"], false)];
        assert!(matches!(
            validate_listener_purposes(&set),
            Err(ConfigurationError::NoClusterListener)
        ));
    }

    #[test]
    fn cluster_only_is_allowed() {
        let set = vec![listener(&["cluster"], true), listener(&["cluster"], false)];
        let specs = validate_listener_purposes(&set).unwrap();
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|s| s.purposes == Purposes::CLUSTER));
    }

    #[test]
    fn api_and_cluster_split_across_listeners() {
        let set = vec![listener(&["api"], true), listener(&["cluster"], true)];
        assert!(validate_listener_purposes(&set).is_ok());
    }

    #[test]
    fn unknown_purpose_fails_regardless_of_rest() {
        let set = vec![
            listener(&["cluster"], false),
            listener(&["bogus"], false),
            listener(&["api"], false),
        ];
        match validate_listener_purposes(&set) {
            Err(ConfigurationError::UnknownPurpose(p)) => assert_eq!(p, "bogus"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn combined_listener_requires_tls() {
        let insecure = vec![listener(&["api", "cluster"], true)];
        assert!(matches!(
            validate_listener_purposes(&insecure),
            Err(ConfigurationError::TlsDisabledOnCombined { .. })
        ));

        let secure = vec![listener(&["cluster", "api"], false)];
        let specs = validate_listener_purposes(&secure).unwrap();
        assert_eq!(specs[0].purposes, Purposes::BOTH);
    }

    #[test]
    fn duplicate_pair_is_invalid() {
        let set = vec![listener(&["api", "api"], false)];
        assert!(matches!(
            validate_listener_purposes(&set),
            Err(ConfigurationError::InvalidPurposeSet(_))
        ));
    }

    #[test]
    fn three_purposes_are_invalid() {
        let set = vec![listener(&["api", "cluster", "api"], false)];
        assert!(matches!(
            validate_listener_purposes(&set),
            Err(ConfigurationError::InvalidPurposeSet(_))
        ));
    }

    #[test]
    fn empty_purpose_defaults_to_both() {
        for tls_disable in [false, true] {
            let empty = validate_listener_purposes(&[listener(&[], tls_disable)]);
            let explicit = validate_listener_purposes(&[listener(&["api", "cluster"], tls_disable)]);
            match (empty, explicit) {
                (Ok(a), Ok(b)) => assert_eq!(a[0].purposes, b[0].purposes),
                (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
                (a, b) => panic!("defaulting diverged: {a:?} vs {b:?}"),
            }
        }
    }

    #[test]
    fn empty_set_is_valid() {
        assert!(validate_listener_purposes(&[]).unwrap().is_empty());
    }

    #[test]
    fn file_validation_collects_all_errors() {
        let mut config = ControllerConfig::default();
        config.listeners.push(ListenerConfig {
            address: "not-an-address".into(),
            max_connections: 0,
            ..Default::default()
        });
        config.profiler.interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroConnections { index: 0 }));
        assert!(errors.contains(&ValidationError::MissingTlsFiles { index: 0 }));
    }
}
