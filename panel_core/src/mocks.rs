//! Test and helper doubles for panel_core.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use panel_traits::{BoxError, NoiseSource, Transport};

#[derive(Debug, Default)]
struct Recorded {
    published: Vec<(String, Vec<u8>)>,
    subscriptions: BTreeSet<String>,
    unsubscribed: Vec<String>,
    fail_publish: bool,
}

/// A transport that records every call. Clones share the same record, so a
/// test can keep one handle while the panel owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingTransport {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // A panicked test thread must not hide the record from the others.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Make subsequent publishes fail (true) or succeed (false).
    pub fn fail_publish(&mut self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// Every successful publish as `(topic, payload)`, oldest first.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().published.clone()
    }

    /// Payloads published to one topic, decoded as JSON.
    pub fn published_json(&self, topic: &str) -> Vec<serde_json::Value> {
        self.lock()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, p)| serde_json::from_slice(p).ok())
            .collect()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.lock().subscriptions.contains(topic)
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.lock().unsubscribed.clone()
    }
}

impl Transport for RecordingTransport {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BoxError> {
        let mut g = self.lock();
        if g.fail_publish {
            return Err(Box::new(std::io::Error::other("publish rejected")));
        }
        g.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        self.lock().subscriptions.insert(topic.to_string());
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        let mut g = self.lock();
        g.subscriptions.remove(topic);
        g.unsubscribed.push(topic.to_string());
        Ok(())
    }
}

/// Noise source that replays scripted offsets, then yields 0.
///
/// Offsets are clamped to the requested bound so the generator contract holds.
#[derive(Debug, Clone, Default)]
pub struct ScriptedNoise {
    offsets: VecDeque<f64>,
}

impl ScriptedNoise {
    pub fn new(offsets: impl IntoIterator<Item = f64>) -> Self {
        Self {
            offsets: offsets.into_iter().collect(),
        }
    }

    /// Script offsets that make `base + offset` equal each of `raws`.
    pub fn for_raw_values(base: f64, raws: impl IntoIterator<Item = f64>) -> Self {
        Self::new(raws.into_iter().map(|r| r - base))
    }
}

impl NoiseSource for ScriptedNoise {
    fn uniform(&mut self, bound: f64) -> f64 {
        let next = self.offsets.pop_front().unwrap_or(0.0);
        // clamp panics on a NaN bound
        if !bound.is_finite() {
            return 0.0;
        }
        let b = bound.abs();
        next.clamp(-b, b)
    }
}
