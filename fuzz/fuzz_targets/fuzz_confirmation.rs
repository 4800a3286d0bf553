#![no_main]
use libfuzzer_sys::fuzz_target;
use panel_core::{ActuatorController, ActuatorState, SwitchConfig};
use panel_traits::InboundMessage;

fuzz_target!(|data: &[u8]| {
    let parsed = panel_core::actuator::parse_confirmation(data);

    let mut sw = ActuatorController::new("fuzz", SwitchConfig::new("f/cmd", "f/state"));
    let event = sw.on_message(&InboundMessage::new("f/state", data.to_vec()));
    match parsed {
        // Anything unparseable leaves the state untouched
        None => {
            assert!(event.is_none());
            assert_eq!(sw.state(), ActuatorState::Off);
        }
        Some(_) => assert_ne!(sw.state(), ActuatorState::Pending),
    }

    // Other topics never count
    let mut other = ActuatorController::new("fuzz", SwitchConfig::new("f/cmd", "f/state"));
    assert!(other.on_message(&InboundMessage::new("g/state", data.to_vec())).is_none());
});
