//! Actuator toggle reconciled against asynchronous device confirmations.
//!
//! ```text
//!   Off ──toggle / {"status":"ON"}──▶ Pending ──{"status":"ON"}──▶ On
//!   On ──toggle / {"status":"OFF"}──▶ Pending ──{"status":"OFF"}─▶ Off
//!   Pending ──deadline passed──▶ last confirmed state (ConfirmTimedOut)
//! ```
//!
//! The controller never blocks and never reads a clock; the runtime passes
//! `now` in and delivers inbound messages through [`ActuatorController::on_message`].

use std::time::Instant;

use panel_traits::{InboundMessage, Transport};
use serde::{Deserialize, Serialize};

use crate::config::SwitchConfig;
use crate::error::PanelError;
use crate::transport_error::map_transport_error;

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Off,
    On,
    Pending,
}

impl ActuatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            ActuatorState::Off => "OFF",
            ActuatorState::On => "ON",
            ActuatorState::Pending => "PENDING",
        }
    }
}

/// Device status as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchStatus {
    On,
    Off,
}

impl SwitchStatus {
    fn state(self) -> ActuatorState {
        match self {
            SwitchStatus::On => ActuatorState::On,
            SwitchStatus::Off => ActuatorState::Off,
        }
    }
}

/// `{"status":"ON"|"OFF"}`, used for both commands and confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: SwitchStatus,
}

/// Decode a confirmation payload. Anything that is not JSON with a
/// recognised `status` yields `None`; extra fields are tolerated.
pub fn parse_confirmation(payload: &[u8]) -> Option<SwitchStatus> {
    serde_json::from_slice::<StatusMessage>(payload)
        .ok()
        .map(|m| m.status)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The command was handed to the transport (or at least attempted).
    Sent(SwitchStatus),
    /// A previous command is still awaiting confirmation; nothing was sent.
    AlreadyPending,
}

/// State changes worth reporting to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorEvent {
    Changed {
        from: ActuatorState,
        to: ActuatorState,
    },
    /// No confirmation arrived in time; the controller reverted.
    ConfirmTimedOut { reverted_to: ActuatorState },
}

#[derive(Debug)]
pub struct ActuatorController {
    label: String,
    config: SwitchConfig,
    state: ActuatorState,
    /// Last state the device confirmed (or the initial optimistic Off).
    confirmed: ActuatorState,
    deadline: Option<Instant>,
}

impl ActuatorController {
    pub fn new(label: impl Into<String>, config: SwitchConfig) -> Self {
        Self {
            label: label.into(),
            config,
            state: ActuatorState::Off,
            confirmed: ActuatorState::Off,
            deadline: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    /// Deadline of the pending command, if one is bounded.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Subscribe to the current state topic.
    pub fn attach<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<(), PanelError> {
        transport
            .subscribe(&self.config.state_topic)
            .map_err(|e| map_transport_error(e.as_ref()))?;
        tracing::debug!(switch = %self.label, topic = %self.config.state_topic, "subscribed");
        Ok(())
    }

    /// Unsubscribe from the current state topic (best-effort).
    pub fn detach<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if let Err(e) = transport.unsubscribe(&self.config.state_topic) {
            let e = map_transport_error(e.as_ref());
            tracing::warn!(switch = %self.label, error = %e, "unsubscribe failed");
        }
    }

    /// Issue the opposite of the last known state and enter Pending.
    pub fn toggle<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        now: Instant,
    ) -> ToggleOutcome {
        let command = match self.state {
            ActuatorState::Pending => {
                tracing::debug!(switch = %self.label, "toggle ignored while pending");
                return ToggleOutcome::AlreadyPending;
            }
            ActuatorState::Off => SwitchStatus::On,
            ActuatorState::On => SwitchStatus::Off,
        };

        // Serializing a two-variant enum cannot fail; keep the error path anyway.
        match serde_json::to_vec(&StatusMessage { status: command }) {
            Ok(payload) => {
                if let Err(e) = transport.publish(&self.config.command_topic, &payload) {
                    let e = map_transport_error(e.as_ref());
                    tracing::warn!(switch = %self.label, topic = %self.config.command_topic, error = %e, "command publish failed");
                }
            }
            Err(e) => tracing::warn!(switch = %self.label, error = %e, "command encode failed"),
        }

        self.state = ActuatorState::Pending;
        self.deadline = self.config.confirm_timeout.map(|t| now + t);
        tracing::info!(
            switch = %self.label,
            topic = %self.config.command_topic,
            command = ?command,
            "command sent, awaiting confirmation"
        );
        ToggleOutcome::Sent(command)
    }

    /// Apply an inbound message. Messages for other topics and malformed
    /// payloads are ignored.
    pub fn on_message(&mut self, msg: &InboundMessage) -> Option<ActuatorEvent> {
        if msg.topic != self.config.state_topic {
            return None;
        }
        let Some(status) = parse_confirmation(&msg.payload) else {
            tracing::debug!(
                switch = %self.label,
                topic = %msg.topic,
                payload = %String::from_utf8_lossy(&msg.payload),
                "ignoring malformed state message"
            );
            return None;
        };

        let to = status.state();
        self.confirmed = to;
        self.deadline = None;
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        tracing::info!(switch = %self.label, from = from.as_str(), to = to.as_str(), "actuator state confirmed");
        Some(ActuatorEvent::Changed { from, to })
    }

    /// Resolve a pending command whose deadline has passed.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<ActuatorEvent> {
        match self.deadline {
            Some(d) if self.state == ActuatorState::Pending && now >= d => {
                self.deadline = None;
                self.state = self.confirmed;
                tracing::warn!(
                    switch = %self.label,
                    topic = %self.config.state_topic,
                    reverted_to = self.state.as_str(),
                    "no confirmation before deadline"
                );
                Some(ActuatorEvent::ConfirmTimedOut {
                    reverted_to: self.state,
                })
            }
            _ => None,
        }
    }

    /// Move to a new state topic. The old topic stops counting immediately;
    /// a pending command is not reissued.
    pub fn set_state_topic<T: Transport + ?Sized>(
        &mut self,
        topic: impl Into<String>,
        transport: &mut T,
    ) -> Result<(), PanelError> {
        let topic = topic.into();
        if topic == self.config.state_topic {
            return Ok(());
        }
        self.detach(transport);
        let old = std::mem::replace(&mut self.config.state_topic, topic);
        tracing::info!(switch = %self.label, from = %old, to = %self.config.state_topic, "state topic changed");
        self.attach(transport)
    }

    /// Takes effect for the next command.
    pub fn set_command_topic(&mut self, topic: impl Into<String>) {
        self.config.command_topic = topic.into();
    }
}
