//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or --dev defaults
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (syntactic checks, then listener purposes)
//!     → ControllerConfig snapshot held in ArcSwap by the supervisor
//!
//! On reload request (SIGHUP or watcher.rs):
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → snapshot swapped, log level applied
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The watcher only requests reloads; it never applies config itself

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::ControllerConfig;
pub use schema::KmsConfig;
pub use schema::ListenerConfig;
pub use validation::ListenerSpec;
