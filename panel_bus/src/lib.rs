//! In-process publish/subscribe bus and simulated actuator devices.
//!
//! `LoopbackBus` stands in for a broker the panel is already connected to:
//! every [`BusClient`] implements `panel_traits::Transport` and receives the
//! messages for its subscriptions on its own crossbeam channel. Topic
//! matching is exact; wildcard filters are rejected.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel as xch;
use panel_traits::{BoxError, InboundMessage, Transport};

pub mod device;
pub mod error;

pub use device::{DeviceMode, SimulatedDevice};
use error::BusError;

struct ClientSlot {
    tx: xch::Sender<InboundMessage>,
    /// Topic to subscription count; a topic stays subscribed until every
    /// subscribe has been matched by an unsubscribe.
    subs: BTreeMap<String, usize>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    clients: BTreeMap<u64, ClientSlot>,
    offline: bool,
    reject_publishes: bool,
    delivered: u64,
}

/// Shared broker state. Clones refer to the same bus.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    inner: Arc<Mutex<BusState>>,
}

impl core::fmt::Debug for LoopbackBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let g = self.lock();
        f.debug_struct("LoopbackBus")
            .field("clients", &g.clients.len())
            .field("offline", &g.offline)
            .finish()
    }
}

fn check_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(BusError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register a new client and return it with its inbound channel.
    pub fn connect(&self) -> (BusClient, xch::Receiver<InboundMessage>) {
        let (tx, rx) = xch::unbounded();
        let mut g = self.lock();
        g.next_id += 1;
        let id = g.next_id;
        g.clients.insert(
            id,
            ClientSlot {
                tx,
                subs: BTreeMap::new(),
            },
        );
        tracing::debug!(client = id, "bus client connected");
        (
            BusClient {
                bus: self.clone(),
                id,
            },
            rx,
        )
    }

    /// Simulate losing (or regaining) the broker connection.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make the broker refuse every publish while set.
    pub fn reject_publishes(&self, reject: bool) {
        self.lock().reject_publishes = reject;
    }

    /// Total number of per-subscriber deliveries so far.
    pub fn delivered(&self) -> u64 {
        self.lock().delivered
    }

    /// Publish on behalf of an external party (e.g. a device in a test).
    pub fn inject(&self, topic: &str, payload: &[u8]) -> Result<usize, BusError> {
        check_topic(topic)?;
        Ok(self.route(topic, payload))
    }

    fn route(&self, topic: &str, payload: &[u8]) -> usize {
        let targets: Vec<xch::Sender<InboundMessage>> = {
            let g = self.lock();
            g.clients
                .values()
                .filter(|c| c.subs.contains_key(topic))
                .map(|c| c.tx.clone())
                .collect()
        };
        let mut n = 0;
        for tx in targets {
            // A client whose receiver is gone simply misses the message
            if tx.send(InboundMessage::new(topic, payload)).is_ok() {
                n += 1;
            }
        }
        self.lock().delivered += n as u64;
        tracing::trace!(topic, subscribers = n, "routed");
        n
    }

    fn publish_from(&self, topic: &str, payload: &[u8]) -> Result<(), BusError> {
        check_topic(topic)?;
        {
            let g = self.lock();
            if g.offline {
                return Err(BusError::Disconnected);
            }
            if g.reject_publishes {
                return Err(BusError::Rejected("broker refused publish".into()));
            }
        }
        self.route(topic, payload);
        Ok(())
    }

    fn subscribe(&self, id: u64, topic: &str) -> Result<(), BusError> {
        check_topic(topic)?;
        let mut g = self.lock();
        if g.offline {
            return Err(BusError::Disconnected);
        }
        let slot = g.clients.get_mut(&id).ok_or(BusError::Disconnected)?;
        *slot.subs.entry(topic.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn unsubscribe(&self, id: u64, topic: &str) -> Result<(), BusError> {
        let mut g = self.lock();
        if g.offline {
            return Err(BusError::Disconnected);
        }
        let slot = g.clients.get_mut(&id).ok_or(BusError::Disconnected)?;
        if let Some(n) = slot.subs.get_mut(topic) {
            *n -= 1;
            if *n == 0 {
                slot.subs.remove(topic);
            }
        }
        Ok(())
    }

    /// Whether any client currently listens on `topic`.
    pub fn has_subscriber(&self, topic: &str) -> bool {
        self.lock()
            .clients
            .values()
            .any(|c| c.subs.contains_key(topic))
    }
}

/// One connection to a [`LoopbackBus`]. Dropping it disconnects.
#[derive(Debug)]
pub struct BusClient {
    bus: LoopbackBus,
    id: u64,
}

impl BusClient {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn bus(&self) -> &LoopbackBus {
        &self.bus
    }
}

impl Transport for BusClient {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        Ok(self.bus.publish_from(topic, payload)?)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        Ok(self.bus.subscribe(self.id, topic)?)
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        Ok(self.bus.unsubscribe(self.id, topic)?)
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        self.bus.lock().clients.remove(&self.id);
        tracing::debug!(client = self.id, "bus client disconnected");
    }
}
