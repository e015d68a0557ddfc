//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Validated ListenerSpec set
//!     → listener.rs setup (bind sockets, load TLS, register reload callbacks)
//!     → listener.rs start (serve api / cluster routers)
//!     → listener.rs stop (graceful shutdown of every server)
//! ```
//!
//! # Design Decisions
//! - Binding happens before serving so a PID file means "bound"
//! - TLS material can be swapped in place on reload
//! - The supervisor only sees the `ListenerSubsystem` trait

pub mod listener;
pub mod tls;

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::validation::ListenerSpec;
use crate::lifecycle::reload::ReloadRegistry;

pub use listener::TcpListenerSubsystem;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load TLS material.
    #[error("TLS setup failed for {address}: {reason}")]
    Tls { address: String, reason: String },

    /// Serving could not begin.
    #[error("failed to start listener {0}: {1}")]
    Start(String, String),

    /// Teardown failed.
    #[error("failed to stop listener {0}: {1}")]
    Stop(String, String),
}

/// Lifecycle hooks of the transport layer.
pub trait ListenerSubsystem: Send + Sync {
    /// Bind every listener and register its reload callbacks.
    fn setup(&self, listeners: &[ListenerSpec], registry: &ReloadRegistry) -> Result<(), ListenerError>;

    /// Begin serving on every bound listener.
    fn start(&self) -> Result<(), ListenerError>;

    /// Stop serving.
    fn stop(&self) -> Result<(), ListenerError>;

    /// `(name, finished)` for every serving task, for diagnostic dumps.
    fn tasks(&self) -> Vec<(String, bool)> {
        Vec::new()
    }

    /// Addresses actually bound, in listener order.
    fn local_addrs(&self) -> Vec<SocketAddr> {
        Vec::new()
    }
}
