//! Reload registry and coordinator.
//!
//! # Responsibilities
//! - Hold reload callbacks registered by subsystems, keyed `"<kind>|<instance>"`
//! - On reload: re-read config, apply log level, run listener callbacks
//! - Aggregate callback failures instead of stopping at the first
//! - Acknowledge every completed reload on a dedicated channel
//!
//! # Design Decisions
//! - Registration takes the write lock; reload holds the read lock only
//!   while selecting callbacks, so a callback may register without deadlock
//! - Reload is forward-only: no rollback on failure

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use arc_swap::ArcSwap;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ControllerConfig;
use crate::config::validation::validate_listener_purposes;
use crate::error::{ReloadError, ReloadFailure};
use crate::observability::logging::LogLevel;
use crate::observability::metrics;

/// Boxed error returned by reload callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A reload callback.
pub type ReloadCallback = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Key prefix of callbacks that participate in reload.
pub const LISTENER_PREFIX: &str = "listener|";

/// Registry key for a listener's callbacks.
pub fn listener_key(id: impl std::fmt::Display) -> String {
    format!("{}{}", LISTENER_PREFIX, id)
}

type Entries = Vec<(String, Vec<Option<ReloadCallback>>)>;

/// Callbacks keyed by resource, in registration order.
///
/// Cloning shares the underlying registry.
#[derive(Clone, Default)]
pub struct ReloadRegistry {
    entries: Arc<RwLock<Entries>>,
}

impl ReloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.register_slot(key, Some(Arc::new(callback)));
    }

    /// Register a possibly absent callback. Absent slots are skipped on reload.
    pub fn register_slot(&self, key: impl Into<String>, callback: Option<ReloadCallback>) {
        let key = key.into();
        let mut entries = self.entries.write().expect("reload registry lock poisoned");
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, callbacks)) => callbacks.push(callback),
            None => entries.push((key, vec![callback])),
        }
    }

    /// Callbacks under keys starting with `prefix`, in registration order.
    pub fn select(&self, prefix: &str) -> Vec<(String, ReloadCallback)> {
        let entries = self.entries.read().expect("reload registry lock poisoned");
        entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .flat_map(|(key, callbacks)| {
                callbacks
                    .iter()
                    .flatten()
                    .map(move |cb| (key.clone(), Arc::clone(cb)))
            })
            .collect()
    }

    /// Total registered slots, present or absent.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("reload registry lock poisoned")
            .iter()
            .map(|(_, callbacks)| callbacks.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run every listener callback, collecting failures.
pub fn run_reload_callbacks(registry: &ReloadRegistry) -> Result<(), ReloadError> {
    let selected = registry.select(LISTENER_PREFIX);
    let mut failures = Vec::new();

    for (key, callback) in selected {
        if let Err(source) = callback() {
            tracing::warn!(key = %key, error = %source, "Reload callback failed");
            failures.push(ReloadFailure {
                key,
                kind: "listener".to_string(),
                source,
            });
        }
    }

    metrics::record_reload(failures.len());

    match ReloadError::from_failures(failures) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Receives log level changes found on reload.
pub trait LogLevelTarget {
    fn set_log_level(&self, level: LogLevel);
}

/// Performs one reload pass on behalf of the event loop.
pub struct ReloadCoordinator {
    config_path: Option<PathBuf>,
    registry: ReloadRegistry,
    reloaded_tx: mpsc::Sender<()>,
}

impl ReloadCoordinator {
    /// Returns the coordinator and the acknowledgment receiver.
    pub fn new(config_path: Option<PathBuf>, registry: ReloadRegistry) -> (Self, mpsc::Receiver<()>) {
        let (reloaded_tx, reloaded_rx) = mpsc::channel(1);
        (
            Self {
                config_path,
                registry,
                reloaded_tx,
            },
            reloaded_rx,
        )
    }

    pub fn registry(&self) -> &ReloadRegistry {
        &self.registry
    }

    /// Re-read config, apply its log level, then run callbacks.
    ///
    /// Config problems are logged and never prevent the callbacks from running.
    pub fn reload(
        &self,
        current: &ArcSwap<ControllerConfig>,
        target: &dyn LogLevelTarget,
    ) -> Result<(), ReloadError> {
        self.reconfigure(current, target);

        let result = run_reload_callbacks(&self.registry);

        // Observers that are not waiting do not block the loop.
        let _ = self.reloaded_tx.try_send(());

        result
    }

    fn reconfigure(&self, current: &ArcSwap<ControllerConfig>, target: &dyn LogLevelTarget) {
        let Some(path) = &self.config_path else {
            tracing::debug!("No config path known, running reload callbacks only");
            return;
        };

        let new_config = match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "could not reload config");
                return;
            }
        };

        if let Err(e) = validate_listener_purposes(&new_config.listeners) {
            tracing::error!(path = ?path, error = %e, "reloaded config failed listener validation");
            return;
        }

        if !new_config.log_level.is_empty() {
            match new_config.log_level.parse::<LogLevel>() {
                Ok(level) => {
                    tracing::info!(level = %level, "Applying log level from reloaded config");
                    target.set_log_level(level);
                }
                Err(_) => {
                    tracing::error!(level = %new_config.log_level, "unknown log level found on reload");
                    return;
                }
            }
        }

        current.store(Arc::new(new_config));
    }
}
