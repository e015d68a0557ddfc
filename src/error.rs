//! Error taxonomy for the controller supervisor.
//!
//! # Propagation
//! ```text
//! ConfigurationError  → always fatal to startup
//! StartupError        → aborts Run, exit code 1
//! ShutdownError       → logged only, process still exits cleanly
//! ReloadError         → aggregated, logged, never stops the process
//! ```

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::net::ListenerError;
use crate::security::kms::KmsError;
use crate::security::mlock::MlockError;

/// Malformed or contradictory configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown listener purpose {0:?}")]
    UnknownPurpose(String),

    #[error("invalid listener purpose set: {0:?}")]
    InvalidPurposeSet(Vec<String>),

    #[error("TLS cannot be disabled on listener {address} when serving both \"api\" and \"cluster\" purposes")]
    TlsDisabledOnCombined { address: String },

    #[error("no cluster listener found, but a listener explicitly marked for api was found")]
    NoClusterListener,

    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),

    #[error("unknown log format {0:?}")]
    UnknownLogFormat(String),

    #[error("must specify a config file using --config")]
    MissingConfigPath,

    #[error("error parsing config: {0}")]
    Load(#[from] ConfigError),
}

/// Failure of one startup stage. Each variant names the stage that failed.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("error setting up logging: {0}")]
    Logging(String),

    #[error("error setting up metrics: {0}")]
    Metrics(String),

    #[error("error setting up KMS: {0}")]
    Kms(#[from] KmsError),

    #[error("error setting up listeners: {0}")]
    Listeners(#[source] ListenerError),

    #[error("error storing PID: {0}")]
    PidFile(#[source] std::io::Error),

    #[error("error creating dev store: {0}")]
    DevStore(#[source] std::io::Error),

    #[error("error initializing controller: {0}")]
    ControllerInit(#[from] MlockError),

    #[error("error starting controller: {0}")]
    ControllerStart(#[source] ListenerError),

    #[error("error with controller shutdown after failed start ({start}): {source}")]
    ControllerStartCleanup {
        start: String,
        #[source]
        source: ShutdownError,
    },
}

/// Teardown failure. Surfaced through logs, never escalated.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("error stopping controller listeners: {0}")]
    Listeners(#[source] ListenerError),
}

/// A single reload callback failure.
#[derive(Debug, Error)]
#[error("error encountered reloading {kind} ({key}): {source}")]
pub struct ReloadFailure {
    pub key: String,
    pub kind: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Every callback failure collected during one reload pass.
#[derive(Debug)]
pub struct ReloadError {
    pub failures: Vec<ReloadFailure>,
}

impl ReloadError {
    /// `None` when nothing failed.
    pub fn from_failures(failures: Vec<ReloadFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }
}

impl std::fmt::Display for ReloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s) occurred during reload: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReloadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_error_empty_is_none() {
        assert!(ReloadError::from_failures(Vec::new()).is_none());
    }

    #[test]
    fn reload_error_lists_every_failure() {
        let err = ReloadError::from_failures(vec![
            ReloadFailure {
                key: "listener|0".into(),
                kind: "listener".into(),
                source: "cert missing".into(),
            },
            ReloadFailure {
                key: "listener|1".into(),
                kind: "listener".into(),
                source: "key missing".into(),
            },
        ])
        .unwrap();

        let msg = err.to_string();
        assert!(msg.starts_with("2 error(s)"));
        assert!(msg.contains("cert missing"));
        assert!(msg.contains("key missing"));
        assert!(msg.contains("listener|1"));
    }
}
