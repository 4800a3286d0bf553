//! Simulated actuator devices attached to a [`LoopbackBus`].
//!
//! A device listens on its command topic and, depending on its mode, reports
//! the commanded status on its state topic after a fixed latency. The worker
//! thread is shut down and joined when the device is dropped.
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use panel_traits::Transport;
use serde::{Deserialize, Serialize};

use crate::LoopbackBus;
use crate::error::BusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceMode {
    /// Confirm every command by echoing its status.
    #[default]
    Echo,
    /// Accept commands but never confirm.
    Silent,
}

impl FromStr for DeviceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "echo" => Ok(Self::Echo),
            "silent" => Ok(Self::Silent),
            other => Err(format!("unknown device mode '{other}' (expected echo|silent)")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusDoc {
    status: String,
}

fn decode_command(payload: &[u8]) -> Option<String> {
    let doc: StatusDoc = serde_json::from_slice(payload).ok()?;
    matches!(doc.status.as_str(), "ON" | "OFF").then_some(doc.status)
}

pub struct SimulatedDevice {
    commands: Arc<AtomicU64>,
    stop_tx: Option<xch::Sender<()>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("commands", &self.commands())
            .finish()
    }
}

impl SimulatedDevice {
    /// Connect a device to `bus` and start its worker thread.
    pub fn spawn(
        bus: &LoopbackBus,
        command_topic: &str,
        state_topic: &str,
        mode: DeviceMode,
        latency: Duration,
    ) -> Result<Self, BusError> {
        let (mut client, inbound) = bus.connect();
        client
            .subscribe(command_topic)
            .map_err(|e| match e.downcast::<BusError>() {
                Ok(b) => *b,
                Err(e) => BusError::Rejected(e.to_string()),
            })?;

        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let commands = Arc::new(AtomicU64::new(0));
        let commands_clone = commands.clone();
        let state_topic = state_topic.to_string();

        let join_handle = std::thread::spawn(move || {
            loop {
                let msg = xch::select! {
                    recv(inbound) -> msg => match msg {
                        Ok(m) => m,
                        Err(_) => break,
                    },
                    recv(stop_rx) -> _ => break,
                };
                let Some(status) = decode_command(&msg.payload) else {
                    tracing::debug!(topic = %msg.topic, "device ignored malformed command");
                    continue;
                };
                commands_clone.fetch_add(1, Ordering::Relaxed);
                if mode == DeviceMode::Silent {
                    continue;
                }
                // Wait out the latency, but stop promptly if asked to
                match stop_rx.recv_timeout(latency) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => break,
                }
                let reply = serde_json::json!({ "status": status }).to_string();
                if let Err(e) = client.publish(&state_topic, reply.as_bytes()) {
                    tracing::warn!(topic = %state_topic, error = %e, "device confirmation failed");
                }
            }
            tracing::trace!("device thread exiting");
        });

        tracing::debug!(command_topic, mode = ?mode, "simulated device attached");
        Ok(Self {
            commands,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        })
    }

    /// Number of well-formed commands received.
    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "device thread panicked during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_only_known_commands() {
        assert_eq!(decode_command(br#"{"status":"ON"}"#).as_deref(), Some("ON"));
        assert_eq!(decode_command(br#"{"status":"toggle"}"#), None);
        assert_eq!(decode_command(b"garbage"), None);
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("Echo".parse::<DeviceMode>(), Ok(DeviceMode::Echo));
        assert!("loud".parse::<DeviceMode>().is_err());
    }
}
