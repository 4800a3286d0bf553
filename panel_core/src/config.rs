//! Runtime configuration snapshots used by the injector and actuator controller.
//!
//! These are separate from the TOML-deserialized config in `panel_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use crate::filter::FilterKind;

/// Default bound on how long a toggle may wait for its confirmation.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Immutable snapshot handed to an injector each time it is (re)armed.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectorConfig {
    /// Topic the telemetry is published to; also used as `sensor_id`.
    pub topic: String,
    pub base_value: f64,
    /// Half-width of the uniform noise band. Expected >= 0.
    pub noise_bound: f64,
    /// Tick period in milliseconds. Expected > 0.
    pub period_ms: u64,
    pub filter: FilterKind,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            topic: "sensor/suhu".into(),
            base_value: 74.0,
            noise_bound: 5.0,
            period_ms: 1_000,
            filter: FilterKind::None,
        }
    }
}

/// Topic pair (and confirmation bound) for one actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchConfig {
    pub command_topic: String,
    pub state_topic: String,
    /// `None` keeps a pending command waiting indefinitely.
    pub confirm_timeout: Option<Duration>,
}

impl SwitchConfig {
    pub fn new(command_topic: impl Into<String>, state_topic: impl Into<String>) -> Self {
        Self {
            command_topic: command_topic.into(),
            state_topic: state_topic.into(),
            confirm_timeout: Some(DEFAULT_CONFIRM_TIMEOUT),
        }
    }

    /// Disable (or set) the confirmation bound.
    pub fn with_confirm_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirm_timeout = timeout;
        self
    }
}
