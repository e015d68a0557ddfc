//! Control-plane supervisor for the access broker.
//!
//! # Architecture Overview
//!
//! ```text
//!   OS signals ──▶ lifecycle::signals ──▶ ┌──────────────────────────────┐
//!   config file change ──▶ config::watcher │   lifecycle::supervisor      │
//!   external shutdown channel ───────────▶ │   startup stages + loop      │
//!                                          └──────┬───────────────┬───────┘
//!                                                 │               │
//!                                                 ▼               ▼
//!                                        ┌──────────────┐  ┌─────────────────┐
//!                                        │  controller  │  │ lifecycle::reload│
//!                                        │ service core │  │ registry + coord │
//!                                        └──────┬───────┘  └────────┬────────┘
//!                                               │                   │
//!                                               ▼                   ▼
//!                                        ┌─────────────────────────────────┐
//!                                        │ net: api / cluster listeners     │
//!                                        └─────────────────────────────────┘
//!
//!   Cross-cutting: config, security (KMS, mlock, CSPRNG), observability
//!   (logging, metrics, profiler, diagnostics), globals, dev store
//! ```

// Entry surface
pub mod cli;
pub mod lifecycle;

// Core
pub mod config;
pub mod controller;
pub mod net;

// Cross-cutting concerns
pub mod dev;
pub mod error;
pub mod globals;
pub mod observability;
pub mod security;

pub use config::schema::ControllerConfig;
pub use controller::Controller;
pub use error::{ConfigurationError, ReloadError, ShutdownError, StartupError};
pub use lifecycle::{Shutdown, Supervisor};
