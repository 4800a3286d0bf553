//! Single-consumer event loop that owns every injector and actuator.
//!
//! Three independent sources feed the loop: the *control* channel
//! ([`Control`] requests from [`PanelHandle`]s), the *tick* channel (one
//! [`Ticker`] thread per active injector) and the *inbound* channel the
//! transport delivers subscribed messages on. No source is ordered relative
//! to another. The control channel closing means every handle is gone and
//! the loop shuts down. All domain state is touched only
//! from [`Panel::run`] (or the `handle_*` step methods in tests), so no locks
//! are needed.

use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use panel_traits::{Clock, InboundMessage, NoiseSource, Transport};

use crate::actuator::{ActuatorController, ActuatorEvent, ActuatorState, SwitchStatus, ToggleOutcome};
use crate::builder::{Missing, PanelBuilder};
use crate::config::InjectorConfig;
use crate::error::{PanelError, Result};
use crate::injector::{Injector, TickOutcome};
use crate::publisher::{Sample, TelemetryMessage};
use crate::ticker::Ticker;
use crate::util::period_from_ms;

pub type BoxedNoise = Box<dyn NoiseSource + Send>;
pub type BoxedClock = Box<dyn Clock + Send + Sync>;

/// Upper bound on how long the loop sleeps when no deadline is pending.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(250);

/// Messages on the event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Periodic tick for injector `injector`, scheduled under `session`.
    Tick { injector: usize, session: u64 },
    Control(Control),
}

/// Requests from the UI side.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    StartInjector(String),
    StopInjector(String),
    StartAll,
    StopAll,
    ReconfigureInjector(String, InjectorConfig),
    Toggle(String),
    SetStateTopic { switch: String, topic: String },
    SetCommandTopic { switch: String, topic: String },
    Shutdown,
}

/// Notifications for observers (the CLI, tests).
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    InjectorStarted { injector: String, session: u64 },
    InjectorStopped { injector: String },
    Telemetry { injector: String, message: TelemetryMessage },
    PublishFailed { injector: String, error: PanelError },
    CommandSent { switch: String, command: SwitchStatus },
    Actuator { switch: String, event: ActuatorEvent },
    Rejected { error: PanelError },
}

/// Cloneable sender for [`Control`] requests.
#[derive(Debug, Clone)]
pub struct PanelHandle {
    tx: xch::Sender<Control>,
}

impl PanelHandle {
    pub fn send(&self, control: Control) -> core::result::Result<(), PanelError> {
        self.tx.send(control).map_err(|_| PanelError::Stopped)
    }

    pub fn start(&self, injector: &str) -> core::result::Result<(), PanelError> {
        self.send(Control::StartInjector(injector.to_string()))
    }

    pub fn stop(&self, injector: &str) -> core::result::Result<(), PanelError> {
        self.send(Control::StopInjector(injector.to_string()))
    }

    pub fn toggle(&self, switch: &str) -> core::result::Result<(), PanelError> {
        self.send(Control::Toggle(switch.to_string()))
    }

    pub fn set_state_topic(&self, switch: &str, topic: &str) -> core::result::Result<(), PanelError> {
        self.send(Control::SetStateTopic {
            switch: switch.to_string(),
            topic: topic.to_string(),
        })
    }

    pub fn shutdown(&self) -> core::result::Result<(), PanelError> {
        self.send(Control::Shutdown)
    }
}

pub struct Panel<T> {
    pub(crate) transport: T,
    pub(crate) clock: BoxedClock,
    pub(crate) injectors: Vec<Injector<BoxedNoise>>,
    pub(crate) tickers: Vec<Option<Ticker>>,
    pub(crate) switches: Vec<ActuatorController>,
    /// Ticker threads send here; the panel keeps a sender to arm new tickers.
    pub(crate) ticks_tx: xch::Sender<Event>,
    pub(crate) ticks_rx: xch::Receiver<Event>,
    /// Dropped when `run` starts so that only `PanelHandle`s keep the
    /// control channel open.
    pub(crate) control_tx: Option<xch::Sender<Control>>,
    pub(crate) control_rx: xch::Receiver<Control>,
    pub(crate) inbound_rx: xch::Receiver<InboundMessage>,
    pub(crate) observer: Option<xch::Sender<PanelEvent>>,
    pub(crate) manual_ticks: bool,
    pub(crate) idle_poll: Duration,
    pub(crate) attached: bool,
}

impl<T> core::fmt::Debug for Panel<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Panel")
            .field("injectors", &self.injectors)
            .field("switches", &self.switches)
            .field("manual_ticks", &self.manual_ticks)
            .finish()
    }
}

impl Panel<Missing> {
    /// Start building a Panel.
    pub fn builder() -> PanelBuilder<Missing, Missing> {
        PanelBuilder::default()
    }
}

impl<T: Transport> Panel<T> {
    /// A handle for sending control requests. Handles must be taken before
    /// `run`; the loop exits once every handle is dropped.
    pub fn handle(&self) -> PanelHandle {
        let tx = self.control_tx.clone().unwrap_or_else(|| {
            // Control channel already closed; every send reports Stopped
            let (tx, _rx) = xch::bounded(0);
            tx
        });
        PanelHandle { tx }
    }

    pub fn injector(&self, name: &str) -> Option<&Injector<BoxedNoise>> {
        self.injectors.iter().find(|i| i.name() == name)
    }

    pub fn switch(&self, label: &str) -> Option<&ActuatorController> {
        self.switches.iter().find(|s| s.label() == label)
    }

    pub fn switch_state(&self, label: &str) -> Option<ActuatorState> {
        self.switch(label).map(|s| s.state())
    }

    pub fn last_sample(&self, injector: &str) -> Option<Sample> {
        self.injector(injector).and_then(|i| i.last_sample())
    }

    /// Subscribe every switch to its state topic. Called by `run`; idempotent.
    pub fn attach(&mut self) -> Result<()> {
        if self.attached {
            return Ok(());
        }
        for sw in &mut self.switches {
            sw.attach(&mut self.transport)?;
        }
        self.attached = true;
        Ok(())
    }

    /// Run until a `Shutdown` request arrives or every [`PanelHandle`] is dropped.
    pub fn run(mut self) -> Result<()> {
        self.attach()?;
        tracing::info!(
            injectors = self.injectors.len(),
            switches = self.switches.len(),
            "panel runtime started"
        );

        self.control_tx = None;
        let control = self.control_rx.clone();
        let ticks = self.ticks_rx.clone();
        let mut inbound = self.inbound_rx.clone();
        loop {
            let timeout = self.next_wakeup();
            let mut inbound_closed = false;
            let keep_running = xch::select! {
                recv(control) -> c => match c {
                    Ok(c) => self.handle_event(Event::Control(c)),
                    Err(_) => {
                        tracing::info!("every panel handle dropped; shutting down");
                        false
                    }
                },
                recv(ticks) -> ev => match ev {
                    Ok(ev) => self.handle_event(ev),
                    // Unreachable while self.ticks_tx lives
                    Err(_) => false,
                },
                recv(inbound) -> msg => {
                    match msg {
                        Ok(msg) => self.handle_inbound(&msg),
                        Err(_) => inbound_closed = true,
                    }
                    true
                },
                default(timeout) => true,
            };
            if !keep_running {
                break;
            }
            if inbound_closed {
                tracing::warn!("transport inbound channel closed; actuator confirmations disabled");
                inbound = xch::never();
            }
            let now = self.clock.now();
            self.poll_deadlines(now);
        }

        self.shutdown();
        tracing::info!("panel runtime stopped");
        Ok(())
    }

    fn next_wakeup(&self) -> Duration {
        let now = self.clock.now();
        self.switches
            .iter()
            .filter_map(|s| s.deadline())
            .map(|d| d.saturating_duration_since(now))
            .min()
            .map_or(self.idle_poll, |d| d.min(self.idle_poll))
    }

    /// Process one event. Returns false when the loop should exit.
    pub fn handle_event(&mut self, ev: Event) -> bool {
        match ev {
            Event::Tick { injector, session } => {
                self.on_tick(injector, session);
                true
            }
            Event::Control(Control::Shutdown) => false,
            Event::Control(c) => {
                if let Err(error) = self.on_control(c) {
                    tracing::warn!(error = %error, "control request rejected");
                    self.notify(PanelEvent::Rejected { error });
                }
                true
            }
        }
    }

    /// Route an inbound message to every switch; each filters on its own state topic.
    pub fn handle_inbound(&mut self, msg: &InboundMessage) {
        let mut events = Vec::new();
        for sw in &mut self.switches {
            if let Some(event) = sw.on_message(msg) {
                events.push(PanelEvent::Actuator {
                    switch: sw.label().to_string(),
                    event,
                });
            }
        }
        for e in events {
            self.notify(e);
        }
    }

    /// Expire pending commands whose confirmation deadline has passed.
    pub fn poll_deadlines(&mut self, now: Instant) {
        let mut events = Vec::new();
        for sw in &mut self.switches {
            if let Some(event) = sw.poll_timeout(now) {
                events.push(PanelEvent::Actuator {
                    switch: sw.label().to_string(),
                    event,
                });
            }
        }
        for e in events {
            self.notify(e);
        }
    }

    fn on_tick(&mut self, idx: usize, session: u64) {
        let timestamp = self.clock.epoch_ms();
        let Some(inj) = self.injectors.get_mut(idx) else {
            tracing::warn!(injector = idx, "tick for unknown injector");
            return;
        };
        let name = inj.name().to_string();
        match inj.on_tick(session, timestamp, &mut self.transport) {
            TickOutcome::Published(message) => self.notify(PanelEvent::Telemetry {
                injector: name,
                message,
            }),
            TickOutcome::PublishFailed(error) => self.notify(PanelEvent::PublishFailed {
                injector: name,
                error,
            }),
            TickOutcome::Stale => {}
        }
    }

    fn on_control(&mut self, c: Control) -> core::result::Result<(), PanelError> {
        match c {
            Control::StartInjector(name) => {
                let idx = self.injector_index(&name)?;
                self.start_injector(idx);
            }
            Control::StopInjector(name) => {
                let idx = self.injector_index(&name)?;
                self.stop_injector(idx);
            }
            Control::StartAll => {
                for idx in 0..self.injectors.len() {
                    self.start_injector(idx);
                }
            }
            Control::StopAll => {
                for idx in 0..self.injectors.len() {
                    self.stop_injector(idx);
                }
            }
            Control::ReconfigureInjector(name, config) => {
                let idx = self.injector_index(&name)?;
                self.tickers[idx] = None;
                if let Some(session) = self.injectors[idx].reconfigure(config) {
                    self.arm_ticker(idx, session);
                    self.notify(PanelEvent::InjectorStarted {
                        injector: name,
                        session,
                    });
                }
            }
            Control::Toggle(label) => {
                let idx = self.switch_index(&label)?;
                let now = self.clock.now();
                if let ToggleOutcome::Sent(command) =
                    self.switches[idx].toggle(&mut self.transport, now)
                {
                    self.notify(PanelEvent::CommandSent {
                        switch: label,
                        command,
                    });
                }
            }
            Control::SetStateTopic { switch, topic } => {
                let idx = self.switch_index(&switch)?;
                self.switches[idx].set_state_topic(topic, &mut self.transport)?;
            }
            Control::SetCommandTopic { switch, topic } => {
                let idx = self.switch_index(&switch)?;
                self.switches[idx].set_command_topic(topic);
            }
            Control::Shutdown => {}
        }
        Ok(())
    }

    fn start_injector(&mut self, idx: usize) {
        if self.injectors[idx].is_active() {
            return;
        }
        let session = self.injectors[idx].start();
        self.arm_ticker(idx, session);
        self.notify(PanelEvent::InjectorStarted {
            injector: self.injectors[idx].name().to_string(),
            session,
        });
    }

    fn stop_injector(&mut self, idx: usize) {
        // Drop the ticker first so no further ticks are produced; any tick
        // already queued carries the old session and is ignored.
        self.tickers[idx] = None;
        if self.injectors[idx].stop() {
            self.notify(PanelEvent::InjectorStopped {
                injector: self.injectors[idx].name().to_string(),
            });
        }
    }

    fn arm_ticker(&mut self, idx: usize, session: u64) {
        if self.manual_ticks {
            return;
        }
        let period = period_from_ms(self.injectors[idx].config().period_ms);
        self.tickers[idx] = Some(Ticker::spawn(
            self.ticks_tx.clone(),
            Event::Tick {
                injector: idx,
                session,
            },
            period,
        ));
    }

    fn injector_index(&self, name: &str) -> core::result::Result<usize, PanelError> {
        self.injectors
            .iter()
            .position(|i| i.name() == name)
            .ok_or_else(|| PanelError::UnknownInjector(name.to_string()))
    }

    fn switch_index(&self, label: &str) -> core::result::Result<usize, PanelError> {
        self.switches
            .iter()
            .position(|s| s.label() == label)
            .ok_or_else(|| PanelError::UnknownSwitch(label.to_string()))
    }

    fn notify(&self, event: PanelEvent) {
        if let Some(tx) = &self.observer {
            // Observer gone is not an error for the panel
            let _ = tx.send(event);
        }
    }

    fn shutdown(&mut self) {
        for idx in 0..self.injectors.len() {
            self.stop_injector(idx);
        }
        for sw in &mut self.switches {
            sw.detach(&mut self.transport);
        }
        self.attached = false;
    }
}
