//! Startup stage helpers.
//!
//! # Responsibilities
//! - Resolve configuration from flags: `--config` file or `--dev` defaults
//! - Apply dev listener address overrides
//! - Resolve log level and format with flag > env > config > default precedence
//! - Render the startup banner
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Helpers here are pure so the stage order lives in one place (supervisor.rs)

use std::fmt::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::cli::Args;
use crate::config::loader::{dev_config, load_config};
use crate::config::schema::{ControllerConfig, PURPOSE_API, PURPOSE_CLUSTER};
use crate::config::validation::ListenerSpec;
use crate::error::ConfigurationError;
use crate::observability::logging::{LogFormat, LogLevel};
use crate::security::mlock::MlockCapability;

/// Path reload should re-read. Dev mode has none.
pub fn config_path(args: &Args) -> Option<PathBuf> {
    if args.dev {
        None
    } else {
        args.config.clone()
    }
}

/// Stage 1: produce the startup configuration.
pub fn resolve_config(args: &Args) -> Result<ControllerConfig, ConfigurationError> {
    if args.dev {
        let mut config = dev_config()?;
        apply_dev_overrides(&mut config, args);
        return Ok(config);
    }

    let path = args.config.as_ref().ok_or(ConfigurationError::MissingConfigPath)?;
    Ok(load_config(path)?)
}

/// Point every single-purpose dev listener at its override address.
pub fn apply_dev_overrides(config: &mut ControllerConfig, args: &Args) {
    for listener in &mut config.listeners {
        let [purpose] = listener.purpose.as_slice() else {
            continue;
        };
        let address = match purpose.as_str() {
            PURPOSE_API => args.dev_api_listen_address.as_ref(),
            PURPOSE_CLUSTER => args.dev_cluster_listen_address.as_ref(),
            _ => None,
        };
        if let Some(address) = address {
            listener.address = address.clone();
        }
    }
}

/// Flags set but meaningless outside `--dev`.
pub fn ignored_dev_flags(args: &Args) -> Vec<&'static str> {
    if args.dev {
        return Vec::new();
    }
    let mut ignored = Vec::new();
    if args.dev_admin_password.is_some() {
        ignored.push("dev-admin-password");
    }
    if args.dev_api_listen_address.is_some() {
        ignored.push("dev-api-listen-address");
    }
    if args.dev_cluster_listen_address.is_some() {
        ignored.push("dev-cluster-listen-address");
    }
    ignored
}

fn first_set<'a>(flag: Option<&'a str>, config: &'a str) -> &'a str {
    match flag {
        Some(value) if !value.trim().is_empty() => value,
        _ => config,
    }
}

pub fn resolve_log_level(args: &Args, config: &ControllerConfig) -> Result<LogLevel, ConfigurationError> {
    first_set(args.log_level.as_deref(), &config.log_level).parse()
}

pub fn resolve_log_format(args: &Args, config: &ControllerConfig) -> Result<LogFormat, ConfigurationError> {
    first_set(args.log_format.as_deref(), &config.log_format).parse()
}

/// What the banner reports about the node.
pub struct BannerInfo<'a> {
    pub listeners: &'a [ListenerSpec],
    pub bound: &'a [SocketAddr],
    pub log_level: LogLevel,
    pub mlock: MlockCapability,
    pub dev_admin_password: Option<&'a str>,
}

pub fn render_banner(info: &BannerInfo<'_>) -> String {
    let mut out = String::from("==> Controller configuration:\n\n");

    for (index, spec) in info.listeners.iter().enumerate() {
        let address = info
            .bound
            .get(index)
            .map(|a| a.to_string())
            .unwrap_or_else(|| spec.address.clone());
        let tls = if spec.tls_disable { "disabled" } else { "enabled" };
        let _ = writeln!(
            out,
            "  Listener {}: {} (purposes: {}, tls: {})",
            index + 1,
            address,
            spec.purposes,
            tls
        );
    }

    let _ = writeln!(out, "  Log Level: {}", info.log_level);

    let mlock = match info.mlock {
        MlockCapability::Supported => "supported: true, enabled: true",
        MlockCapability::Tolerated => "enabled: false",
        MlockCapability::Fatal => "supported: false, enabled: true",
    };
    let _ = writeln!(out, "  Mlock: {}", mlock);

    if let Some(password) = info.dev_admin_password {
        let _ = writeln!(out, "\n  Dev admin login: {}", crate::dev::DEV_ADMIN_LOGIN);
        let _ = writeln!(out, "  Dev admin password: {}", password);
    }

    out.push_str("\n==> Controller started! Log data will stream in below:\n");
    out
}
