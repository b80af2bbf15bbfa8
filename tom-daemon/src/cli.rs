//! CLI argument definitions for the tom daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Every flag except `--config` and `--validate` overrides the matching
//! `tom.toml` key after environment overrides have been applied.

use std::path::PathBuf;

use clap::Parser;

use tom_core::config::TomConfig;

/// Per-host traffic accounting daemon.
///
/// Captures frames on one interface, accounts captured bytes to hosts
/// inside the configured target subnets, and appends a record for each
/// host once it goes idle.
#[derive(Parser, Debug)]
#[command(name = "tom")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to tom.toml configuration file.
    #[arg(short, long, default_value = "/etc/tom/tom.toml")]
    pub config: PathBuf,

    /// Capture interface (overrides capture.interface).
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Host record directory (overrides accounting.log_dir).
    #[arg(short = 'd', long)]
    pub log_dir: Option<String>,

    /// Target subnet as A.B.C.D/N. Repeat for several targets.
    ///
    /// When given, replaces accounting.targets entirely.
    #[arg(short, long = "target", value_name = "SUBNET")]
    pub targets: Vec<String>,

    /// Idle threshold in seconds (overrides accounting.idle_timeout_secs).
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut TomConfig) {
        if let Some(interface) = &self.interface {
            config.capture.interface.clone_from(interface);
        }
        if let Some(log_dir) = &self.log_dir {
            config.accounting.log_dir.clone_from(log_dir);
        }
        if !self.targets.is_empty() {
            config.accounting.targets.clone_from(&self.targets);
        }
        if let Some(idle) = self.idle_timeout {
            config.accounting.idle_timeout_secs = idle;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
    }
}
