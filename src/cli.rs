//! Command line surface of the controller.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "broker-controller")]
#[command(version, about = "Control-plane node of the access broker", long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file. Required unless --dev is set.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, notice, warn, err).
    #[arg(long, env = "BROKER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (standard, json).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Run with an in-memory development configuration and ephemeral store.
    #[arg(long)]
    pub dev: bool,

    /// Admin password for the dev store. Generated when empty.
    #[arg(long, env = "BROKER_DEV_ADMIN_PASSWORD", hide_env_values = true)]
    pub dev_admin_password: Option<String>,

    /// Override the dev API listener address.
    #[arg(long, value_name = "ADDR")]
    pub dev_api_listen_address: Option<String>,

    /// Override the dev cluster listener address.
    #[arg(long, value_name = "ADDR")]
    pub dev_cluster_listen_address: Option<String>,

    /// Write logs to stdout together with regular output.
    #[arg(long)]
    pub combine_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dev_flags() {
        let args = Args::try_parse_from([
            "broker-controller",
            "--dev",
            "--dev-api-listen-address",
            "127.0.0.1:0",
            "--combine-logs",
        ])
        .unwrap();

        assert!(args.dev);
        assert!(args.combine_logs);
        assert_eq!(args.dev_api_listen_address.as_deref(), Some("127.0.0.1:0"));
        assert!(args.config.is_none());
    }

    #[test]
    fn parses_config_path() {
        let args = Args::try_parse_from(["broker-controller", "--config", "/etc/broker.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/broker.toml")));
        assert!(!args.dev);
    }
}
