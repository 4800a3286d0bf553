//! `From` implementations bridging `panel_config` types to `panel_core` types.

use std::time::Duration;

use crate::config::{InjectorConfig, SwitchConfig};
use crate::filter::FilterKind;

impl From<panel_config::FilterCfg> for FilterKind {
    fn from(c: panel_config::FilterCfg) -> Self {
        match c {
            panel_config::FilterCfg::None => Self::None,
            panel_config::FilterCfg::MovingAverage => Self::MovingAverage,
            panel_config::FilterCfg::Kalman => Self::Kalman,
        }
    }
}

impl From<&panel_config::InjectorCfg> for InjectorConfig {
    fn from(c: &panel_config::InjectorCfg) -> Self {
        Self {
            topic: c.topic.clone(),
            base_value: c.base_value,
            noise_bound: c.noise_bound,
            period_ms: c.period_ms,
            filter: c.filter.into(),
        }
    }
}

impl From<&panel_config::SwitchCfg> for SwitchConfig {
    fn from(c: &panel_config::SwitchCfg) -> Self {
        // 0 disables the confirmation bound
        let timeout = (c.confirm_timeout_ms > 0).then(|| Duration::from_millis(c.confirm_timeout_ms));
        Self::new(c.command_topic.clone(), c.state_topic.clone()).with_confirm_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_disables_bound() {
        let mut c = panel_config::SwitchCfg::new("s", "a/cmd", "a/state");
        c.confirm_timeout_ms = 0;
        assert_eq!(SwitchConfig::from(&c).confirm_timeout, None);
        c.confirm_timeout_ms = 250;
        assert_eq!(
            SwitchConfig::from(&c).confirm_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn injector_fields_carry_over() {
        let mut c = panel_config::InjectorCfg::new("t", "sensor/kelembaban");
        c.filter = panel_config::FilterCfg::Kalman;
        let ic = InjectorConfig::from(&c);
        assert_eq!(ic.topic, "sensor/kelembaban");
        assert_eq!(ic.filter, FilterKind::Kalman);
        assert_eq!(ic.period_ms, 1000);
    }
}
