//! One simulated sensor: generator, filter session and publisher together.
//!
//! The injector itself never schedules anything. The runtime arms a
//! [`Ticker`](crate::ticker::Ticker) for the session id returned by
//! [`Injector::start`] and feeds ticks back through [`Injector::on_tick`].
//! Ticks carrying a stale session id are ignored, which is what makes a
//! stop that races an in-flight tick safe.

use panel_traits::{NoiseSource, Transport};

use crate::config::InjectorConfig;
use crate::error::PanelError;
use crate::filter::FilterState;
use crate::generator::SignalGenerator;
use crate::publisher::{Sample, TelemetryMessage, publish_sample};

/// Result of delivering one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A sample was generated and handed to the transport.
    Published(TelemetryMessage),
    /// A sample was generated but the transport rejected it. Not retried.
    PublishFailed(PanelError),
    /// The tick belonged to a session that is no longer active.
    Stale,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InjectorStats {
    pub published: u64,
    pub publish_failures: u64,
    pub stale_ticks: u64,
}

pub struct Injector<N> {
    name: String,
    config: InjectorConfig,
    generator: SignalGenerator<N>,
    /// Id of the current (or most recent) session; 0 before the first start.
    session: u64,
    /// Present only while generation is active.
    filter: Option<FilterState>,
    last: Option<Sample>,
    stats: InjectorStats,
}

impl<N> core::fmt::Debug for Injector<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Injector")
            .field("name", &self.name)
            .field("topic", &self.config.topic)
            .field("session", &self.session)
            .field("active", &self.filter.is_some())
            .finish()
    }
}

impl<N: NoiseSource> Injector<N> {
    pub fn new(name: impl Into<String>, config: InjectorConfig, noise: N) -> Self {
        Self {
            name: name.into(),
            config,
            generator: SignalGenerator::new(noise),
            session: 0,
            filter: None,
            last: None,
            stats: InjectorStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.filter.is_some()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Latest generated sample; stays visible (frozen) after a stop.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last
    }

    pub fn stats(&self) -> InjectorStats {
        self.stats
    }

    /// Begin generation with fresh filter state. Returns the session id ticks
    /// must carry. Starting an active injector keeps the running session.
    pub fn start(&mut self) -> u64 {
        if self.filter.is_some() {
            return self.session;
        }
        self.session = self.session.wrapping_add(1);
        self.filter = Some(FilterState::fresh(
            self.config.filter,
            self.config.base_value,
            self.config.noise_bound,
        ));
        tracing::info!(
            injector = %self.name,
            topic = %self.config.topic,
            session = self.session,
            filter = self.config.filter.as_str(),
            period_ms = self.config.period_ms,
            "injector started"
        );
        self.session
    }

    /// Stop generation and discard filter state. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.filter.take().is_none() {
            return false;
        }
        // Invalidate the session so a tick already in flight is dropped.
        self.session = self.session.wrapping_add(1);
        tracing::info!(injector = %self.name, published = self.stats.published, "injector stopped");
        true
    }

    /// Replace the configuration snapshot. Filter state is discarded; an
    /// active injector restarts under the new snapshot and the new session id
    /// is returned so the caller can re-arm its timer.
    pub fn reconfigure(&mut self, config: InjectorConfig) -> Option<u64> {
        let was_active = self.stop();
        self.config = config;
        was_active.then(|| self.start())
    }

    /// Generate, filter and publish one sample for `session`.
    pub fn on_tick<T: Transport + ?Sized>(
        &mut self,
        session: u64,
        timestamp: i64,
        transport: &mut T,
    ) -> TickOutcome {
        let filter = match self.filter.as_mut() {
            Some(f) if session == self.session => f,
            _ => {
                self.stats.stale_ticks += 1;
                tracing::trace!(injector = %self.name, session, current = self.session, "stale tick ignored");
                return TickOutcome::Stale;
            }
        };

        let raw = self.generator.tick(&self.config);
        let filtered = filter.apply(raw);
        let sample = Sample {
            raw,
            filtered,
            timestamp,
        };
        self.last = Some(sample);

        match publish_sample(transport, &self.config.topic, &sample) {
            Ok(msg) => {
                self.stats.published += 1;
                tracing::debug!(
                    topic = %self.config.topic,
                    raw = msg.raw_value,
                    value = msg.value,
                    "telemetry published"
                );
                TickOutcome::Published(msg)
            }
            Err(e) => {
                self.stats.publish_failures += 1;
                tracing::warn!(topic = %self.config.topic, error = %e, "telemetry publish failed");
                TickOutcome::PublishFailed(e)
            }
        }
    }
}
