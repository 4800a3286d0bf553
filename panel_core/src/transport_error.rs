//! Maps `Box<dyn Error>` from the transport boundary to typed `PanelError`.
//!
//! The `Transport` trait uses `Box<dyn Error + Send + Sync>` so any client
//! can sit behind it; this module converts those to our typed error enum,
//! with an optional feature-gated path for `panel_bus::BusError` downcasting.

use crate::error::PanelError;

/// Map a transport-boundary error to a typed `PanelError`.
///
/// Attempts to downcast known bus error types first, then falls back
/// to string-based heuristics.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> PanelError {
    #[cfg(feature = "bus-errors")]
    {
        if let Some(bus) = e.downcast_ref::<panel_bus::error::BusError>() {
            return match bus {
                panel_bus::error::BusError::Disconnected => {
                    PanelError::Disconnected(bus.to_string())
                }
                other => PanelError::Transport(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("disconnected") || lower.contains("not connected") {
        PanelError::Disconnected(s)
    } else {
        PanelError::Transport(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_errors_fall_back_to_heuristics() {
        let e: Box<dyn std::error::Error + Send + Sync> = "client not connected".into();
        assert!(matches!(
            map_transport_error(e.as_ref()),
            PanelError::Disconnected(_)
        ));
        let e: Box<dyn std::error::Error + Send + Sync> = "quota exceeded".into();
        assert_eq!(
            map_transport_error(e.as_ref()),
            PanelError::Transport("quota exceeded".into())
        );
    }

    #[cfg(feature = "bus-errors")]
    #[test]
    fn bus_errors_downcast() {
        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(panel_bus::error::BusError::Disconnected);
        assert!(matches!(
            map_transport_error(e.as_ref()),
            PanelError::Disconnected(_)
        ));
    }
}
