#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and persisted settings for the simulator panel.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - [`store`] holds the key/value settings store the panel reads at session
//!   start and writes back on edit.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub mod store;

/// Longest accepted injector period (24h).
pub const MAX_PERIOD_MS: u64 = 24 * 60 * 60 * 1000;
/// Longest accepted confirmation bound (10min).
pub const MAX_CONFIRM_TIMEOUT_MS: u64 = 10 * 60 * 1000;
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_HOST: &str = "wss://mqtt.domainanda.com/mqtt";
pub const CLIENT_ID_PREFIX: &str = "mqtt_sim_";

/// Filtering strategy applied to generated samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCfg {
    #[default]
    None,
    MovingAverage,
    Kalman,
}

impl FilterCfg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MovingAverage => "moving_average",
            Self::Kalman => "kalman",
        }
    }
}

impl std::str::FromStr for FilterCfg {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "moving_average" | "moving-average" | "ma" => Ok(Self::MovingAverage),
            "kalman" => Ok(Self::Kalman),
            other => eyre::bail!("unknown filter '{other}' (expected none|moving_average|kalman)"),
        }
    }
}

/// Broker connection profile. The connection itself is managed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub host: String,
    /// Empty means "generate one at startup"; see [`client_id_from_suffix`].
    pub client_id: String,
    pub use_auth: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            client_id: String::new(),
            use_auth: false,
            username: None,
            password: None,
        }
    }
}

/// Build a `mqtt_sim_xxxxxx` client id from the low 24 bits of `n`.
pub fn client_id_from_suffix(n: u32) -> String {
    format!("{CLIENT_ID_PREFIX}{:06x}", n & 0x00ff_ffff)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectorCfg {
    /// Identifier used by the CLI and in logs.
    pub name: String,
    /// Publish topic; the original value is also the settings-store key.
    pub topic: String,
    #[serde(default = "default_base_value")]
    pub base_value: f64,
    #[serde(default = "default_noise_bound")]
    pub noise_bound: f64,
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    #[serde(default)]
    pub filter: FilterCfg,
}

const fn default_base_value() -> f64 {
    74.0
}
const fn default_noise_bound() -> f64 {
    5.0
}
const fn default_period_ms() -> u64 {
    1000
}
const fn default_confirm_timeout_ms() -> u64 {
    DEFAULT_CONFIRM_TIMEOUT_MS
}

impl InjectorCfg {
    pub fn new(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            base_value: default_base_value(),
            noise_bound: default_noise_bound(),
            period_ms: default_period_ms(),
            filter: FilterCfg::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCfg {
    pub label: String,
    pub command_topic: String,
    pub state_topic: String,
    /// 0 keeps a pending command waiting indefinitely.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
}

impl SwitchCfg {
    pub fn new(
        label: impl Into<String>,
        command_topic: impl Into<String>,
        state_topic: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            command_topic: command_topic.into(),
            state_topic: state_topic.into(),
            confirm_timeout_ms: DEFAULT_CONFIRM_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeCfg {
    /// Fixed noise seed for reproducible runs.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

fn default_injectors() -> Vec<InjectorCfg> {
    vec![
        InjectorCfg::new("temperature", "sensor/suhu"),
        InjectorCfg::new("humidity", "sensor/kelembaban"),
    ]
}

fn default_switches() -> Vec<SwitchCfg> {
    vec![
        SwitchCfg::new("Lampu Teras", "device/lampu1/cmd", "device/lampu1/state"),
        SwitchCfg::new("Pompa Air", "device/pompa/cmd", "device/pompa/state"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: Connection,
    #[serde(default = "default_injectors", rename = "injector")]
    pub injectors: Vec<InjectorCfg>,
    #[serde(default = "default_switches", rename = "switch")]
    pub switches: Vec<SwitchCfg>,
    #[serde(default)]
    pub runtime: RuntimeCfg,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: Connection::default(),
            injectors: default_injectors(),
            switches: default_switches(),
            runtime: RuntimeCfg::default(),
            logging: Logging::default(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Topics published to or subscribed on must be concrete.
fn check_topic(key: &str, topic: &str) -> eyre::Result<()> {
    if topic.trim().is_empty() {
        eyre::bail!("{key} must be non-empty");
    }
    if topic.contains(['+', '#']) {
        eyre::bail!("{key} must not contain MQTT wildcards (+ or #)");
    }
    Ok(())
}

impl InjectorCfg {
    pub fn validate(&self) -> eyre::Result<()> {
        let n = &self.name;
        check_topic(&format!("injector[{n}].topic"), &self.topic)?;
        if !self.base_value.is_finite() {
            eyre::bail!("injector[{n}].base_value must be finite");
        }
        if !self.noise_bound.is_finite() || self.noise_bound < 0.0 {
            eyre::bail!("injector[{n}].noise_bound must be finite and >= 0");
        }
        if self.period_ms == 0 {
            eyre::bail!("injector[{n}].period_ms must be > 0");
        }
        if self.period_ms > MAX_PERIOD_MS {
            eyre::bail!("injector[{n}].period_ms is unreasonably large (>24h)");
        }
        Ok(())
    }
}

impl SwitchCfg {
    pub fn validate(&self) -> eyre::Result<()> {
        let l = &self.label;
        check_topic(&format!("switch[{l}].command_topic"), &self.command_topic)?;
        check_topic(&format!("switch[{l}].state_topic"), &self.state_topic)?;
        if self.confirm_timeout_ms > MAX_CONFIRM_TIMEOUT_MS {
            eyre::bail!("switch[{l}].confirm_timeout_ms is unreasonably large (>10min)");
        }
        Ok(())
    }
}

impl Connection {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.host.trim().is_empty() {
            eyre::bail!("connection.host must be non-empty");
        }
        if self.client_id.trim().is_empty() {
            eyre::bail!("connection.client_id must be non-empty");
        }
        if self.use_auth {
            if self.username.as_deref().is_none_or(|u| u.trim().is_empty()) {
                eyre::bail!("connection.username is required when use_auth = true");
            }
            if self.password.is_none() {
                eyre::bail!("connection.password is required when use_auth = true");
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        self.connection.validate()?;

        // Injectors
        let mut names = HashSet::new();
        for inj in &self.injectors {
            if inj.name.trim().is_empty() {
                eyre::bail!("injector.name must be non-empty");
            }
            if !names.insert(inj.name.as_str()) {
                eyre::bail!("injector.name '{}' is defined more than once", inj.name);
            }
            inj.validate()?;
        }

        // Switches
        let mut labels = HashSet::new();
        for sw in &self.switches {
            if sw.label.trim().is_empty() {
                eyre::bail!("switch.label must be non-empty");
            }
            if !labels.insert(sw.label.as_str()) {
                eyre::bail!("switch.label '{}' is defined more than once", sw.label);
            }
            sw.validate()?;
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }

    pub fn injector(&self, name: &str) -> Option<&InjectorCfg> {
        self.injectors.iter().find(|i| i.name == name)
    }

    pub fn switch(&self, label: &str) -> Option<&SwitchCfg> {
        self.switches.iter().find(|s| s.label == label)
    }
}
