//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs, helpers in startup.rs):
//!     Flags/config → logging → profiler → metrics → KMS → request duration
//!     → mlock warning → listener purposes → listener bring-up → PID file
//!     → dev store → service core start → event loop
//!
//! Event loop (supervisor.rs):
//!     shutdown queue / external channel → core shutdown, once
//!     reload queue → reload.rs coordinator
//!     dump queue → diagnostic dump to the log
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown queue
//!     SIGHUP → reload queue
//!     SIGUSR2 → dump queue
//! ```
//!
//! # Design Decisions
//! - Ordered startup: a failing stage aborts the rest
//! - Shutdown actions (shutdown.rs) run on every exit path
//! - No forced exit after a deadline; shutdown is cooperative

pub mod pidfile;
pub mod reload;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use reload::{ReloadCoordinator, ReloadRegistry};
pub use shutdown::{Shutdown, ShutdownActions, ShutdownGuard};
pub use signals::{control_channel, forward_os_signals, ControlEvent, ControlHandle};
pub use supervisor::{Collaborators, Supervisor, SupervisorState};
