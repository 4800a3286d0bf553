//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config path tried when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "etc/panel.toml";

#[derive(Parser, Debug)]
#[command(name = "panel", version, about = "IoT simulator panel CLI")]
pub struct Cli {
    /// Path to config TOML; defaults to etc/panel.toml when present
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Settings store (JSON file) holding edits made through `settings`
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Output and log as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG takes precedence
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Behaviour of the simulated device attached to each switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum DeviceArg {
    /// Confirm every command
    #[default]
    Echo,
    /// Never confirm
    Silent,
}

impl From<DeviceArg> for panel_bus::DeviceMode {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Echo => Self::Echo,
            DeviceArg::Silent => Self::Silent,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every injector and print the telemetry it publishes
    Run {
        /// Stop after this many telemetry messages (default: until Ctrl-C)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Seed the noise generators (overrides [runtime] seed)
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,
        /// Simulated device behaviour for the switches
        #[arg(long, value_enum, default_value_t = DeviceArg::Echo)]
        device: DeviceArg,
        /// Device confirmation latency in ms
        #[arg(long = "latency-ms", value_name = "MS", default_value_t = 50)]
        latency_ms: u64,
    },
    /// Toggle one switch and wait for the device to confirm
    Toggle {
        /// Switch label as configured
        #[arg(long)]
        label: String,
        #[arg(long, value_enum, default_value_t = DeviceArg::Echo)]
        device: DeviceArg,
        #[arg(long = "latency-ms", value_name = "MS", default_value_t = 50)]
        latency_ms: u64,
        /// Override the confirmation timeout (0 waits indefinitely)
        #[arg(long = "timeout-ms", value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// Inspect or edit persisted settings
    Settings {
        #[command(subcommand)]
        cmd: SettingsCmd,
    },
    /// Validate configuration and settings store
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCmd {
    /// Print the effective settings (store overrides applied)
    Show,
    /// Edit the broker connection profile
    Connection {
        #[arg(long)]
        host: Option<String>,
        #[arg(long = "client-id")]
        client_id: Option<String>,
        /// Enable or disable authentication (credentials are dropped when disabled)
        #[arg(long = "use-auth", value_name = "BOOL", action = ArgAction::Set)]
        use_auth: Option<bool>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Edit one injector
    Injector {
        /// Injector name as configured
        #[arg(long)]
        name: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long = "base", value_name = "VALUE")]
        base_value: Option<f64>,
        #[arg(long = "noise", value_name = "BOUND")]
        noise_bound: Option<f64>,
        #[arg(long = "period-ms", value_name = "MS")]
        period_ms: Option<u64>,
        /// none | moving_average | kalman
        #[arg(long, value_parser = parse_filter)]
        filter: Option<panel_config::FilterCfg>,
    },
    /// Edit one switch's topic pair
    Switch {
        /// Switch label as configured
        #[arg(long)]
        label: String,
        #[arg(long = "command-topic")]
        command_topic: Option<String>,
        #[arg(long = "state-topic")]
        state_topic: Option<String>,
    },
}

fn parse_filter(s: &str) -> Result<panel_config::FilterCfg, String> {
    s.parse().map_err(|e: eyre::Report| e.to_string())
}
