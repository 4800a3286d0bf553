//! Telemetry packaging and the hand-off to the transport.

use panel_traits::Transport;
use serde::{Deserialize, Serialize};

use crate::error::PanelError;
use crate::transport_error::map_transport_error;
use crate::util::round_2dp;

/// One generated reading, kept at full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub raw: f64,
    pub filtered: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Wire format of an outbound telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub sensor_id: String,
    pub timestamp: i64,
    /// Filtered value, 2 decimals.
    pub value: f64,
    /// Unfiltered value, 2 decimals.
    pub raw_value: f64,
}

impl TelemetryMessage {
    pub fn from_sample(topic: &str, sample: &Sample) -> Self {
        Self {
            sensor_id: topic.to_string(),
            timestamp: sample.timestamp,
            value: round_2dp(sample.filtered),
            raw_value: round_2dp(sample.raw),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, PanelError> {
        serde_json::to_vec(self).map_err(|e| PanelError::Encode(e.to_string()))
    }
}

/// Publish one sample to `topic`. Fire-and-forget: nothing is awaited,
/// retried or buffered.
pub fn publish_sample<T: Transport + ?Sized>(
    transport: &mut T,
    topic: &str,
    sample: &Sample,
) -> Result<TelemetryMessage, PanelError> {
    let msg = TelemetryMessage::from_sample(topic, sample);
    let payload = msg.to_json()?;
    transport
        .publish(topic, &payload)
        .map_err(|e| map_transport_error(e.as_ref()))?;
    Ok(msg)
}
