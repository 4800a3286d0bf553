//! Type-state builder for [`Panel`].
//!
//! The builder enforces at compile time that a transport and its inbound
//! channel are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Duration;

use crossbeam_channel as xch;
use panel_traits::clock::{Clock, MonotonicClock};
use panel_traits::{InboundMessage, NoiseSource, Transport};

use crate::actuator::ActuatorController;
use crate::config::{InjectorConfig, SwitchConfig};
use crate::error::{BuildError, Result};
use crate::generator::RandNoise;
use crate::injector::Injector;
use crate::runtime::{BoxedClock, BoxedNoise, DEFAULT_IDLE_POLL, Panel, PanelEvent};

/// Longest accepted injector period (one day).
pub const MAX_PERIOD_MS: u64 = 24 * 60 * 60 * 1_000;

// ── Type-state markers ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Missing;
#[derive(Debug)]
pub struct Set;

struct InjectorEntry {
    name: String,
    config: InjectorConfig,
    noise: Option<BoxedNoise>,
}

/// Builder for `Panel`. Injector and switch definitions are validated on `build()`.
///
/// `T` is the transport type (or [`Missing`]); `I` tracks the inbound channel.
pub struct PanelBuilder<T, I> {
    transport: T,
    inbound: Option<xch::Receiver<InboundMessage>>,
    clock: Option<BoxedClock>,
    seed: Option<u64>,
    injectors: Vec<InjectorEntry>,
    switches: Vec<(String, SwitchConfig)>,
    observer: Option<xch::Sender<PanelEvent>>,
    manual_ticks: bool,
    idle_poll: Option<Duration>,
    _i: PhantomData<I>,
}

impl Default for PanelBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            transport: Missing,
            inbound: None,
            clock: None,
            seed: None,
            injectors: Vec::new(),
            switches: Vec::new(),
            observer: None,
            manual_ticks: false,
            idle_poll: None,
            _i: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn is_publish_topic(topic: &str) -> bool {
    !topic.trim().is_empty() && !topic.contains(['+', '#'])
}

fn validate_injector(config: &InjectorConfig) -> Result<()> {
    if !is_publish_topic(&config.topic) {
        return Err(invalid("injector topic must be non-empty without wildcards"));
    }
    if !config.base_value.is_finite() {
        return Err(invalid("injector base_value must be finite"));
    }
    if !config.noise_bound.is_finite() || config.noise_bound < 0.0 {
        return Err(invalid("injector noise_bound must be finite and >= 0"));
    }
    if config.period_ms == 0 || config.period_ms > MAX_PERIOD_MS {
        return Err(invalid("injector period_ms must be in 1..=86400000"));
    }
    Ok(())
}

fn validate_switch(config: &SwitchConfig) -> Result<()> {
    if !is_publish_topic(&config.command_topic) {
        return Err(invalid("switch command_topic must be non-empty without wildcards"));
    }
    if !is_publish_topic(&config.state_topic) {
        return Err(invalid("switch state_topic must be non-empty without wildcards"));
    }
    Ok(())
}

/// Chainable setters that do not affect type-state.
impl<T, I> PanelBuilder<T, I> {
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seed every injector's noise source. Injector `i` uses `seed + i`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn add_injector(mut self, name: impl Into<String>, config: InjectorConfig) -> Self {
        self.injectors.push(InjectorEntry {
            name: name.into(),
            config,
            noise: None,
        });
        self
    }

    /// Add an injector with an explicit noise source (overrides the seed).
    pub fn add_injector_with_noise(
        mut self,
        name: impl Into<String>,
        config: InjectorConfig,
        noise: impl NoiseSource + Send + 'static,
    ) -> Self {
        self.injectors.push(InjectorEntry {
            name: name.into(),
            config,
            noise: Some(Box::new(noise)),
        });
        self
    }

    pub fn add_switch(mut self, label: impl Into<String>, config: SwitchConfig) -> Self {
        self.switches.push((label.into(), config));
        self
    }

    /// Receive [`PanelEvent`] notifications on `tx`.
    pub fn with_observer(mut self, tx: xch::Sender<PanelEvent>) -> Self {
        self.observer = Some(tx);
        self
    }

    /// Do not spawn tick threads; the caller delivers `Event::Tick` itself.
    pub fn manual_ticks(mut self) -> Self {
        self.manual_ticks = true;
        self
    }

    /// Longest the loop waits between deadline checks when idle.
    pub fn with_idle_poll(mut self, poll: Duration) -> Self {
        self.idle_poll = Some(poll.max(Duration::from_millis(1)));
        self
    }
}

// Setters that advance type-state
impl<I> PanelBuilder<Missing, I> {
    pub fn with_transport<T: Transport + Send>(self, transport: T) -> PanelBuilder<T, I> {
        PanelBuilder {
            transport,
            inbound: self.inbound,
            clock: self.clock,
            seed: self.seed,
            injectors: self.injectors,
            switches: self.switches,
            observer: self.observer,
            manual_ticks: self.manual_ticks,
            idle_poll: self.idle_poll,
            _i: PhantomData,
        }
    }
}

impl<T> PanelBuilder<T, Missing> {
    /// Channel on which the transport delivers messages for subscribed topics.
    pub fn with_inbound(self, inbound: xch::Receiver<InboundMessage>) -> PanelBuilder<T, Set> {
        PanelBuilder {
            transport: self.transport,
            inbound: Some(inbound),
            clock: self.clock,
            seed: self.seed,
            injectors: self.injectors,
            switches: self.switches,
            observer: self.observer,
            manual_ticks: self.manual_ticks,
            idle_poll: self.idle_poll,
            _i: PhantomData,
        }
    }
}

impl<T: Transport, I> PanelBuilder<T, I> {
    /// Fallible build available once a transport is set; reports a missing inbound channel.
    pub fn try_build(self) -> Result<Panel<T>> {
        let inbound_rx = self
            .inbound
            .ok_or_else(|| eyre::Report::new(BuildError::MissingInbound))?;

        let mut names = HashSet::new();
        for entry in &self.injectors {
            if entry.name.trim().is_empty() {
                return Err(invalid("injector name must be non-empty"));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(invalid("injector names must be unique"));
            }
            validate_injector(&entry.config)?;
        }
        let mut labels = HashSet::new();
        for (label, config) in &self.switches {
            if label.trim().is_empty() {
                return Err(invalid("switch label must be non-empty"));
            }
            if !labels.insert(label.as_str()) {
                return Err(invalid("switch labels must be unique"));
            }
            validate_switch(config)?;
        }

        let seed = self.seed;
        let injectors: Vec<Injector<BoxedNoise>> = self
            .injectors
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let noise: BoxedNoise = match (entry.noise, seed) {
                    (Some(n), _) => n,
                    (None, Some(s)) => Box::new(RandNoise::seeded(s.wrapping_add(i as u64))),
                    (None, None) => Box::new(RandNoise::from_entropy()),
                };
                Injector::new(entry.name, entry.config, noise)
            })
            .collect();
        let tickers = injectors.iter().map(|_| None).collect();
        let switches = self
            .switches
            .into_iter()
            .map(|(label, config)| ActuatorController::new(label, config))
            .collect();

        let (ticks_tx, ticks_rx) = xch::unbounded();
        let (control_tx, control_rx) = xch::unbounded();
        Ok(Panel {
            transport: self.transport,
            clock: self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new())),
            injectors,
            tickers,
            switches,
            ticks_tx,
            ticks_rx,
            control_tx: Some(control_tx),
            control_rx,
            inbound_rx,
            observer: self.observer,
            manual_ticks: self.manual_ticks,
            idle_poll: self.idle_poll.unwrap_or(DEFAULT_IDLE_POLL),
            attached: false,
        })
    }
}

impl<T: Transport> PanelBuilder<T, Set> {
    /// Validate and build the Panel. Only available when transport and inbound are set.
    pub fn build(self) -> Result<Panel<T>> {
        self.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingTransport;

    fn base() -> PanelBuilder<RecordingTransport, Set> {
        let (_tx, rx) = xch::unbounded();
        Panel::builder()
            .with_transport(RecordingTransport::default())
            .with_inbound(rx)
    }

    #[test]
    fn duplicate_injector_names_rejected() {
        let err = base()
            .add_injector("a", InjectorConfig::default())
            .add_injector("a", InjectorConfig::default())
            .build()
            .unwrap_err();
        assert!(format!("{err}").contains("unique"));
    }

    #[test]
    fn wildcard_topic_rejected() {
        let cfg = SwitchConfig::new("device/+/cmd", "device/x/state");
        assert!(base().add_switch("s", cfg).build().is_err());
    }

    #[test]
    fn negative_noise_rejected() {
        let cfg = InjectorConfig {
            noise_bound: -1.0,
            ..InjectorConfig::default()
        };
        assert!(base().add_injector("a", cfg).build().is_err());
    }

    #[test]
    fn try_build_reports_missing_inbound() {
        let err = Panel::builder()
            .with_transport(RecordingTransport::default())
            .try_build()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingInbound)
        ));
    }
}
