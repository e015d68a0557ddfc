//! Service core of the controller node.
//!
//! # Responsibilities
//! - Own the secure random source and the loggers handed out at construction
//! - Enforce memory locking unless disabled by configuration
//! - Start and stop the listener subsystem
//! - Propagate log level changes to every logger in place
//!
//! # Design Decisions
//! - Construction fails if memory locking is enabled but fails
//! - Shutdown is not idempotent here; the supervisor guards it
//! - A cancellation token scopes all background work started under the core

use std::sync::{Arc, Mutex};

use rand::RngCore;
use tokio_util::sync::CancellationToken;

use crate::config::schema::ControllerConfig;
use crate::error::{ShutdownError, StartupError};
use crate::lifecycle::reload::LogLevelTarget;
use crate::net::ListenerSubsystem;
use crate::observability::logging::{LogLevel, Logger};
use crate::security::kms::KmsSet;
use crate::security::mlock::{self, MemoryLocker, MlockCapability, MlockError};
use crate::security::random::{self, SecureRandom};

/// Everything the service core is built from.
pub struct ControllerParams {
    pub raw_config: Arc<ControllerConfig>,
    pub listeners: Arc<dyn ListenerSubsystem>,
    pub kms: Option<Arc<KmsSet>>,
    /// Logger to derive the core's named logger from. Created if absent.
    pub logger: Option<Logger>,
    /// Every logger whose level follows `set_log_level`.
    pub all_loggers: Vec<Logger>,
    /// Defaults to the platform CSPRNG.
    pub secure_random: Option<Box<dyn SecureRandom>>,
    pub locker: Arc<dyn MemoryLocker>,
    /// Root context for work started before the core exists. Created if absent.
    pub base_context: Option<CancellationToken>,
}

/// The service core: listeners, keys, randomness and loggers of one node.
pub struct Controller {
    logger: Logger,
    all_loggers: Vec<Logger>,
    listeners: Arc<dyn ListenerSubsystem>,
    kms: Option<Arc<KmsSet>>,
    secure_random: Mutex<Box<dyn SecureRandom>>,
    mlock: MlockCapability,
    base_cancel: CancellationToken,
}

impl Controller {
    /// Build the core, enforcing memory locking unless `disable_mlock` is set.
    pub fn new(params: ControllerParams) -> Result<Self, MlockError> {
        let mut all_loggers = params.all_loggers;

        let logger = match params.logger {
            Some(logger) => logger,
            None => {
                let logger = Logger::new("broker", LogLevel::Trace);
                all_loggers.push(logger.clone());
                logger
            }
        };

        let secure_random = params.secure_random.unwrap_or_else(random::default_source);

        let mlock = mlock::enforce(params.locker.as_ref(), params.raw_config.disable_mlock)?;

        let logger = logger.named("controller");
        let _span = logger.span().enter();
        tracing::debug!(mlock = ?mlock, loggers = all_loggers.len(), "Controller initialized");
        drop(_span);

        Ok(Self {
            logger,
            all_loggers,
            listeners: params.listeners,
            kms: params.kms,
            secure_random: Mutex::new(secure_random),
            mlock,
            base_cancel: params.base_context.unwrap_or_default(),
        })
    }

    /// Begin serving on every bound listener.
    pub fn start(&self) -> Result<(), StartupError> {
        let _span = self.logger.span().enter();
        self.listeners.start().map_err(StartupError::ControllerStart)?;
        tracing::info!("Controller started");
        Ok(())
    }

    /// Stop listeners, then cancel the root context.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        let _span = self.logger.span().enter();
        let result = self.listeners.stop().map_err(ShutdownError::Listeners);
        self.base_cancel.cancel();
        tracing::info!(clean = result.is_ok(), "Controller stopped");
        result
    }

    /// Apply `level` to every logger held since construction, in order.
    pub fn set_log_level(&self, level: LogLevel) {
        for logger in &self.all_loggers {
            logger.set_level(level);
        }
    }

    /// A token cancelled when the controller shuts down.
    pub fn base_context(&self) -> CancellationToken {
        self.base_cancel.child_token()
    }

    /// Fill `buf` from the core's secure random source.
    pub fn fill_random(&self, buf: &mut [u8]) {
        self.secure_random
            .lock()
            .expect("secure random mutex poisoned")
            .fill_bytes(buf);
    }

    /// Keys acquired at startup, if any were supplied.
    pub fn kms(&self) -> Option<&KmsSet> {
        self.kms.as_deref()
    }

    /// Outcome of the memory locking check made at construction.
    pub fn mlock_capability(&self) -> MlockCapability {
        self.mlock
    }

    /// The core's own logger, named `<parent>.controller`.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Every logger that follows `set_log_level`.
    pub fn loggers(&self) -> &[Logger] {
        &self.all_loggers
    }
}

impl LogLevelTarget for Controller {
    fn set_log_level(&self, level: LogLevel) {
        Controller::set_log_level(self, level);
    }
}
