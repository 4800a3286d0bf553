use std::time::{Duration, Instant};

use panel_core::actuator::{ActuatorController, ActuatorEvent, ActuatorState, SwitchStatus, ToggleOutcome};
use panel_core::config::SwitchConfig;
use panel_core::mocks::RecordingTransport;
use panel_traits::InboundMessage;
use rstest::rstest;

const CMD: &str = "device/lampu1/cmd";
const STATE: &str = "device/lampu1/state";

fn controller() -> (ActuatorController, RecordingTransport) {
    let mut t = RecordingTransport::default();
    let mut c = ActuatorController::new("Lampu Teras", SwitchConfig::new(CMD, STATE));
    c.attach(&mut t).unwrap();
    (c, t)
}

fn status(topic: &str, s: &str) -> InboundMessage {
    InboundMessage::new(topic, format!(r#"{{"status":"{s}"}}"#))
}

#[test]
fn toggle_round_trip() {
    let (mut c, mut t) = controller();
    assert!(t.is_subscribed(STATE));
    assert_eq!(c.state(), ActuatorState::Off);

    let now = Instant::now();
    assert_eq!(c.toggle(&mut t, now), ToggleOutcome::Sent(SwitchStatus::On));
    assert_eq!(c.state(), ActuatorState::Pending);
    assert_eq!(t.published(), vec![(CMD.to_string(), br#"{"status":"ON"}"#.to_vec())]);

    let ev = c.on_message(&status(STATE, "ON"));
    assert_eq!(
        ev,
        Some(ActuatorEvent::Changed {
            from: ActuatorState::Pending,
            to: ActuatorState::On
        })
    );
    assert_eq!(c.deadline(), None);

    assert_eq!(c.toggle(&mut t, now), ToggleOutcome::Sent(SwitchStatus::Off));
    assert_eq!(t.published_json(CMD)[1]["status"], "OFF");
    c.on_message(&status(STATE, "OFF"));
    assert_eq!(c.state(), ActuatorState::Off);
}

#[test]
fn toggle_while_pending_sends_nothing() {
    let (mut c, mut t) = controller();
    let now = Instant::now();
    c.toggle(&mut t, now);
    assert_eq!(c.toggle(&mut t, now), ToggleOutcome::AlreadyPending);
    assert_eq!(t.published().len(), 1);
}

#[test]
fn state_topic_switch_isolates_old_topic() {
    let (mut c, mut t) = controller();
    c.toggle(&mut t, Instant::now());
    c.set_state_topic("device/lampu1/status", &mut t).unwrap();
    assert!(!t.is_subscribed(STATE));
    assert!(t.is_subscribed("device/lampu1/status"));
    assert_eq!(t.unsubscribed(), vec![STATE.to_string()]);

    assert_eq!(c.on_message(&status(STATE, "ON")), None);
    assert_eq!(c.state(), ActuatorState::Pending);
    c.on_message(&status("device/lampu1/status", "ON"));
    assert_eq!(c.state(), ActuatorState::On);
    // Pending command was not reissued
    assert_eq!(t.published().len(), 1);
}

#[rstest]
#[case(br#"{"foo":"bar"}"#.as_slice())]
#[case(b"not json".as_slice())]
#[case(br#"{"status":"MAYBE"}"#.as_slice())]
#[case(br#"{"status":1}"#.as_slice())]
#[case(b"".as_slice())]
fn malformed_confirmation_is_ignored(#[case] payload: &[u8]) {
    let (mut c, mut t) = controller();
    c.toggle(&mut t, Instant::now());
    assert_eq!(c.on_message(&InboundMessage::new(STATE, payload.to_vec())), None);
    assert_eq!(c.state(), ActuatorState::Pending);
}

#[test]
fn idle_confirmation_updates_observed_state() {
    let (mut c, _t) = controller();
    let ev = c.on_message(&status(STATE, "ON"));
    assert_eq!(
        ev,
        Some(ActuatorEvent::Changed {
            from: ActuatorState::Off,
            to: ActuatorState::On
        })
    );
    // Repeated status is not a change
    assert_eq!(c.on_message(&status(STATE, "ON")), None);
}

#[test]
fn pending_reverts_on_deadline_and_not_before() {
    let (mut c, mut t) = controller();
    c.on_message(&status(STATE, "ON"));
    let t0 = Instant::now();
    c.toggle(&mut t, t0);
    assert_eq!(c.deadline(), Some(t0 + Duration::from_millis(5000)));

    assert_eq!(c.poll_timeout(t0 + Duration::from_millis(4999)), None);
    assert_eq!(c.state(), ActuatorState::Pending);
    assert_eq!(
        c.poll_timeout(t0 + Duration::from_millis(5000)),
        Some(ActuatorEvent::ConfirmTimedOut {
            reverted_to: ActuatorState::On
        })
    );
    assert_eq!(c.state(), ActuatorState::On);
    assert_eq!(c.poll_timeout(t0 + Duration::from_secs(60)), None);
}

#[test]
fn disabled_timeout_stays_pending() {
    let mut t = RecordingTransport::default();
    let mut c = ActuatorController::new(
        "Pompa Air",
        SwitchConfig::new("device/pompa/cmd", "device/pompa/state").with_confirm_timeout(None),
    );
    let t0 = Instant::now();
    c.toggle(&mut t, t0);
    assert_eq!(c.poll_timeout(t0 + Duration::from_secs(3600)), None);
    assert_eq!(c.state(), ActuatorState::Pending);
}

#[test]
fn failed_command_publish_still_enters_pending() {
    let (mut c, mut t) = controller();
    t.fail_publish(true);
    assert_eq!(c.toggle(&mut t, Instant::now()), ToggleOutcome::Sent(SwitchStatus::On));
    assert_eq!(c.state(), ActuatorState::Pending);
}

#[test]
fn command_topic_change_applies_to_next_command() {
    let (mut c, mut t) = controller();
    c.set_command_topic("device/lampu1/set");
    c.toggle(&mut t, Instant::now());
    assert_eq!(t.published()[0].0, "device/lampu1/set");
}
