//! Capability traits shared by the panel crates.
//!
//! Everything the core needs from the outside world (time, randomness and the
//! pub/sub client) is expressed here so that tests can swap in deterministic
//! doubles.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A message delivered by the transport for a topic the panel subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Handle to an already-connected publish/subscribe client.
///
/// Inbound messages are not returned from these calls; the client delivers
/// them on the channel it was constructed with.
pub trait Transport {
    /// Fire-and-forget publish.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError>;
    fn unsubscribe(&mut self, topic: &str) -> Result<(), BoxError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        (**self).publish(topic, payload)
    }
    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        (**self).subscribe(topic)
    }
    fn unsubscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        (**self).unsubscribe(topic)
    }
}

/// Source of bounded uniform noise for the signal generator.
pub trait NoiseSource {
    /// A value drawn uniformly from the closed interval `[-bound, +bound]`.
    /// `bound` is expected to be finite and non-negative.
    fn uniform(&mut self, bound: f64) -> f64;
}

impl<N: NoiseSource + ?Sized> NoiseSource for Box<N> {
    fn uniform(&mut self, bound: f64) -> f64 {
        (**self).uniform(bound)
    }
}
