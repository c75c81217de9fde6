//! Exporter configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, `ERDMA_EXPORTER_*` environment variables, command-line flags.

use anyhow::{bail, Context, Result};
use clap::Parser;
use exporter_lib::api::RESERVED_PATHS;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "ERDMA_EXPORTER";

/// Command-line flags
#[derive(Debug, Default, Parser)]
#[command(name = "erdma-exporter", version, about = "Prometheus exporter for ERDMA adapters")]
pub struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address on which to expose metrics and web interface
    #[arg(long = "web.listen-address", value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", value_name = "PATH")]
    pub metrics_path: Option<String>,

    /// Deadline for each external command, in seconds
    #[arg(long = "command.timeout-secs", value_name = "SECS")]
    pub command_timeout_secs: Option<u64>,
}

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// HTTP bind address
    pub listen_address: String,

    /// Path serving the exposition text
    pub metrics_path: String,

    /// Per-command deadline in seconds
    pub command_timeout_secs: u64,

    /// Directories searched for the ERDMA tools before falling back to `PATH`
    pub search_paths: Vec<PathBuf>,

    pub eadm_command: String,

    pub ibv_devices_command: String,
}

impl ExporterConfig {
    /// Load configuration from defaults, file, environment and flags
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("listen_address", "0.0.0.0:9101")?
            .set_default("metrics_path", "/metrics")?
            .set_default("command_timeout_secs", 10_i64)?
            .set_default("search_paths", vec!["/usr/bin", "/usr/sbin", "/usr/local/bin"])?
            .set_default("eadm_command", "eadm")?
            .set_default("ibv_devices_command", "ibv_devices")?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        let config: ExporterConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("search_paths"),
            )
            .set_override_option("listen_address", cli.listen_address.clone())?
            .set_override_option("metrics_path", cli.metrics_path.clone())?
            .set_override_option(
                "command_timeout_secs",
                cli.command_timeout_secs.map(|secs| secs as i64),
            )?
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.metrics_path.starts_with('/') {
            bail!("metrics_path must be absolute, got {:?}", self.metrics_path);
        }
        if RESERVED_PATHS.contains(&self.metrics_path.as_str()) {
            bail!(
                "metrics_path {:?} is already served by the exporter",
                self.metrics_path
            );
        }
        if self.metrics_path.contains([':', '*']) {
            bail!(
                "metrics_path must not contain ':' or '*', got {:?}",
                self.metrics_path
            );
        }
        if self.command_timeout_secs == 0 {
            bail!("command_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
