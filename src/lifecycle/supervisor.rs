//! Lifecycle supervisor: ordered startup and the control event loop.
//!
//! # Responsibilities
//! - Run the startup stages in order, failing fast on the first error
//! - Own the reload registry and hand it to the listener subsystem
//! - Construct and start the service core
//! - React to shutdown, reload, dump and external shutdown events
//!
//! # State Machine
//! ```text
//! Initializing ──(core started)──▶ Running ──(shutdown)──▶ ShuttingDown ──▶ Terminated
//!      │                                                                      ▲
//!      └──────────────────────(startup stage failed)──────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - One task runs the loop; reload and shutdown handlers run inline, so they
//!   never interleave with each other
//! - Teardown of the core goes through `ShutdownGuard`, so it runs once, whether
//!   it is reached from the event loop or from a failed start
//! - Work started before the core exists runs under the core's root context
//! - Shutdown actions registered during startup run on every exit path
//! - No timeouts: a hanging collaborator hangs the supervisor

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::config::schema::ControllerConfig;
use crate::config::validation::validate_listener_purposes;
use crate::config::watcher::ConfigWatcher;
use crate::controller::{Controller, ControllerParams};
use crate::dev::DevStore;
use crate::error::{ShutdownError, StartupError};
use crate::globals;
use crate::lifecycle::pidfile;
use crate::lifecycle::reload::{ReloadCoordinator, ReloadRegistry};
use crate::lifecycle::shutdown::{ShutdownActions, ShutdownGuard};
use crate::lifecycle::signals::{control_channel, ControlEvents, ControlHandle};
use crate::lifecycle::startup::{self, BannerInfo};
use crate::net::{ListenerSubsystem, TcpListenerSubsystem};
use crate::observability::diagnostics::{self, BackgroundTasks};
use crate::observability::logging::{self, Logger, LoggingHandles};
use crate::observability::{metrics, profiler};
use crate::security::kms::{self, REQUIRED_KMS_COUNT};
use crate::security::mlock::{self, MemoryLocker, MlockCapability, SystemMemoryLocker};

/// Lifecycle position of the supervisor, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Initializing,
    Running,
    ShuttingDown,
    Terminated,
}

/// External collaborators the supervisor drives.
pub struct Collaborators {
    pub listeners: Arc<dyn ListenerSubsystem>,
    pub locker: Arc<dyn MemoryLocker>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            listeners: Arc::new(TcpListenerSubsystem::new()),
            locker: Arc::new(SystemMemoryLocker),
        }
    }
}

/// Drives one controller node from flags to exit.
pub struct Supervisor {
    args: Args,
    collaborators: Collaborators,
    handle: ControlHandle,
    events: ControlEvents,
    external_shutdown: Option<broadcast::Receiver<()>>,
    coordinator: ReloadCoordinator,
    reload_ack: Option<mpsc::Receiver<()>>,
    shutdown_guard: Arc<ShutdownGuard>,
    state: watch::Sender<SupervisorState>,
    loggers: watch::Sender<Vec<Logger>>,
    tasks: BackgroundTasks,
    dev_store_dir: Option<PathBuf>,
}

impl Supervisor {
    /// Wire the control queues and the reload coordinator. Nothing runs until `run`.
    pub fn new(args: Args, collaborators: Collaborators) -> Self {
        let (handle, events) = control_channel();
        let (coordinator, reload_ack) =
            ReloadCoordinator::new(startup::config_path(&args), ReloadRegistry::new());
        let (state, _) = watch::channel(SupervisorState::Initializing);
        let (loggers, _) = watch::channel(Vec::new());

        Self {
            args,
            collaborators,
            handle,
            events,
            external_shutdown: None,
            coordinator,
            reload_ack: Some(reload_ack),
            shutdown_guard: Arc::new(ShutdownGuard::new()),
            state,
            loggers,
            tasks: BackgroundTasks::new(),
            dev_store_dir: None,
        }
    }

    /// Treat a trigger on, or closure of, `rx` as a shutdown request.
    pub fn with_external_shutdown(mut self, rx: broadcast::Receiver<()>) -> Self {
        self.external_shutdown = Some(rx);
        self
    }

    /// Create the dev store under `dir` instead of the system temp dir.
    pub fn with_dev_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dev_store_dir = Some(dir.into());
        self
    }

    /// Handle for pushing control events onto the loop's queues.
    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// The registry listener reload callbacks are kept in.
    pub fn registry(&self) -> ReloadRegistry {
        self.coordinator.registry().clone()
    }

    /// Receiver acknowledging each completed reload. Only the first call gets it.
    pub fn take_reload_ack(&mut self) -> Option<mpsc::Receiver<()>> {
        self.reload_ack.take()
    }

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Sink loggers, published once logging is initialized.
    pub fn loggers(&self) -> watch::Receiver<Vec<Logger>> {
        self.loggers.subscribe()
    }

    /// The one-shot guard around controller teardown.
    pub fn shutdown_guard(&self) -> Arc<ShutdownGuard> {
        Arc::clone(&self.shutdown_guard)
    }

    /// Run startup, then the event loop until shutdown.
    pub async fn run(mut self) -> Result<(), StartupError> {
        let mut actions = ShutdownActions::new();
        let mut log_handles = None;

        let result = self.run_stages(&mut actions, &mut log_handles).await;

        actions.run();
        self.state.send_replace(SupervisorState::Terminated);
        drop(log_handles);
        result
    }

    async fn run_stages(
        &mut self,
        actions: &mut ShutdownActions,
        log_handles: &mut Option<LoggingHandles>,
    ) -> Result<(), StartupError> {
        // 1. Flags and configuration
        let config = startup::resolve_config(&self.args)?;
        let log_level = startup::resolve_log_level(&self.args, &config)?;
        let log_format = startup::resolve_log_format(&self.args, &config)?;

        // 2. Logging
        let handles = logging::init_logging(
            log_level,
            log_format,
            self.args.combine_logs,
            config.log_file.as_deref(),
        )
        .map_err(|e| StartupError::Logging(e.to_string()))?;
        let loggers = handles.loggers.clone();
        self.loggers.send_replace(loggers.clone());
        *log_handles = Some(handles);

        for flag in startup::ignored_dev_flags(&self.args) {
            tracing::warn!(flag, "Flag is only used in dev mode, ignoring");
        }

        // 3. Memory profiler, under the root context the core will own
        let root_context = CancellationToken::new();
        let cancel_root = root_context.clone();
        actions.push("background-tasks", move || {
            cancel_root.cancel();
            Ok(())
        });
        if config.profiler.enabled {
            let interval = Duration::from_secs(config.profiler.interval_secs);
            self.tasks.track(
                "mem-profiler",
                profiler::start_mem_profiler(interval, root_context.child_token()),
            );
        }

        // 4. Metrics
        if config.telemetry.metrics_enabled {
            let addr = config
                .telemetry
                .metrics_address
                .parse::<SocketAddr>()
                .map_err(|e| StartupError::Metrics(e.to_string()))?;
            metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))?;
        }

        // 5. KMS
        let kms = Arc::new(kms::setup_kmses(&config.kms, REQUIRED_KMS_COUNT)?);

        // 6. Request duration override
        if config.default_max_request_duration_secs > 0 {
            let duration = Duration::from_secs(config.default_max_request_duration_secs);
            globals::set_default_max_request_duration(duration);
            tracing::info!(secs = duration.as_secs(), "Default max request duration overridden");
        }

        // 7. Memory locking
        let mlock_state = mlock::probe(self.collaborators.locker.as_ref(), config.disable_mlock);
        if mlock_state == MlockCapability::Fatal && !self.args.dev {
            tracing::warn!(
                "mlock is not supported on this system; set disable_mlock = true \
                 to run without it, at the risk of secrets being swapped to disk"
            );
        }

        // 8. Listener purposes
        let specs = validate_listener_purposes(&config.listeners)?;

        // 9. Listener bring-up
        self.collaborators
            .listeners
            .setup(&specs, self.coordinator.registry())
            .map_err(StartupError::Listeners)?;

        // 10. PID file, only once listeners are bound
        if let Some(path) = pidfile::store_pid_file(&config.pid_file).map_err(StartupError::PidFile)? {
            tracing::info!(path = ?path, "PID file written");
            actions.push("pid-file", move || Ok(pidfile::remove_pid_file(&path)?));
        }

        // 11. Dev store
        let mut dev_password = None;
        if self.args.dev {
            let password = self.args.dev_admin_password.clone();
            let store = match &self.dev_store_dir {
                Some(dir) => DevStore::create_in(dir, password),
                None => DevStore::create(password),
            }
            .map_err(StartupError::DevStore)?;
            dev_password = Some(store.admin_password().to_string());
            actions.push("dev-store", move || Ok(store.destroy()?));
        }

        if config.reload_on_change {
            if let Some(path) = startup::config_path(&self.args) {
                match ConfigWatcher::new(&path, self.handle.clone()).run() {
                    Ok(watcher) => actions.push("config-watcher", move || {
                        watcher.stop();
                        Ok(())
                    }),
                    Err(e) => tracing::warn!(
                        path = ?path,
                        error = %e,
                        "Could not watch config file, reload on change disabled"
                    ),
                }
            }
        }

        let bound = self.collaborators.listeners.local_addrs();
        print!(
            "{}",
            startup::render_banner(&BannerInfo {
                listeners: &specs,
                bound: &bound,
                log_level,
                mlock: mlock_state,
                dev_admin_password: dev_password.as_deref(),
            })
        );

        // 12. Service core
        let config = ArcSwap::from_pointee(config);
        let controller = Controller::new(ControllerParams {
            raw_config: config.load_full(),
            listeners: Arc::clone(&self.collaborators.listeners),
            kms: Some(kms),
            logger: loggers.first().cloned(),
            all_loggers: loggers,
            secure_random: None,
            locker: Arc::clone(&self.collaborators.locker),
            base_context: Some(root_context),
        })?;

        if let Err(start) = controller.start() {
            if let Some(Err(e)) = self.shutdown(&controller) {
                tracing::error!(error = %e, "Error shutting down controller after failed start");
                return Err(StartupError::ControllerStartCleanup {
                    start: start.to_string(),
                    source: e,
                });
            }
            return Err(start);
        }
        self.state.send_replace(SupervisorState::Running);

        // 13. Event loop
        self.wait_for_interrupt(&controller, &config).await;
        Ok(())
    }

    async fn wait_for_interrupt(&mut self, controller: &Controller, config: &ArcSwap<ControllerConfig>) {
        let mut shutdown_triggered = false;

        while !shutdown_triggered {
            tokio::select! {
                _ = self.events.shutdown_rx.recv() => {
                    tracing::info!("Shutdown requested");
                    shutdown_triggered = true;
                }
                _ = external_shutdown(&mut self.external_shutdown) => {
                    tracing::info!("External shutdown channel fired");
                    shutdown_triggered = true;
                }
                _ = self.events.reload_rx.recv() => {
                    tracing::info!("Reload requested");
                    if let Err(e) = self.coordinator.reload(config, controller) {
                        tracing::error!(error = %e, "Reload finished with errors");
                    }
                }
                _ = self.events.dump_rx.recv() => {
                    let mut tasks = self.tasks.snapshot();
                    tasks.extend(self.collaborators.listeners.tasks());
                    let stack = diagnostics::capture_dump(&tasks);
                    tracing::info!(stack = %stack, "Dumping stack traces");
                }
            }
        }

        if let Some(Err(e)) = self.shutdown(controller) {
            tracing::error!(error = %e, "Error shutting down controller");
        }
    }

    /// Tear the controller down through the guard.
    ///
    /// `None` when teardown already ran.
    fn shutdown(&self, controller: &Controller) -> Option<Result<(), ShutdownError>> {
        self.state.send_replace(SupervisorState::ShuttingDown);

        let ran = self.shutdown_guard.run_once(|| {
            let result = controller.shutdown();
            metrics::record_shutdown();
            result
        });
        if ran.is_none() {
            tracing::debug!("Controller shutdown already ran");
        }
        ran
    }
}

/// Resolves once the external channel is triggered or closed. Never without one.
async fn external_shutdown(rx: &mut Option<broadcast::Receiver<()>>) {
    match rx {
        Some(rx) => {
            let _ = rx.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
