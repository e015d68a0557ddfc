//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-sink level cells)
//!     → metrics.rs (counters, gauges)
//!
//! Background:
//!     → profiler.rs (periodic memory samples)
//!     → diagnostics.rs (on-demand dump of running work)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Level changes propagate by mutating each logger in place
//! - Metrics are cheap (no-op without an exporter)

pub mod diagnostics;
pub mod logging;
pub mod metrics;
pub mod profiler;
