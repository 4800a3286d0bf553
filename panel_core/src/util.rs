//! Common time and rounding helpers for panel_core.

use std::time::Duration;

/// Convert a configured period in milliseconds to a `Duration`.
/// - Clamps to at least 1 millisecond so a zero period cannot spin.
#[inline]
pub fn period_from_ms(period_ms: u64) -> Duration {
    Duration::from_millis(period_ms.max(1))
}

/// Round to two decimal digits for external emission.
///
/// Only applied when a value leaves the process; internal state keeps full
/// precision so rounding error does not compound across ticks.
#[inline]
pub fn round_2dp(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_digits() {
        assert_eq!(round_2dp(73.333_333), 73.33);
        assert_eq!(round_2dp(-4.126), -4.13);
        assert_eq!(round_2dp(74.0), 74.0);
    }

    #[test]
    fn period_never_zero() {
        assert_eq!(period_from_ms(0), Duration::from_millis(1));
        assert_eq!(period_from_ms(1000), Duration::from_secs(1));
    }
}
