//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     → kms.rs (acquire root and worker-auth keys)
//!     → mlock.rs (probe, then lock memory during service construction)
//!     → random.rs (secure random source for the service core)
//! ```
//!
//! # Design Decisions
//! - Fail closed: missing keys or failed memory locking abort startup
//! - Key bytes never appear in logs or debug output

pub mod kms;
pub mod mlock;
pub mod random;
