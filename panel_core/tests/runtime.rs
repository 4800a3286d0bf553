use std::time::Duration;

use crossbeam_channel as xch;
use panel_bus::{DeviceMode, LoopbackBus, SimulatedDevice};
use panel_core::actuator::{ActuatorEvent, ActuatorState};
use panel_core::config::{InjectorConfig, SwitchConfig};
use panel_core::filter::FilterKind;
use panel_core::mocks::{RecordingTransport, ScriptedNoise};
use panel_core::{Control, Event, Panel, PanelError, PanelEvent};
use panel_traits::InboundMessage;
use panel_traits::clock::manual::ManualClock;

const WAIT: Duration = Duration::from_secs(5);

fn temperature() -> InjectorConfig {
    InjectorConfig {
        filter: FilterKind::MovingAverage,
        ..InjectorConfig::default()
    }
}

fn ctl(c: Control) -> Event {
    Event::Control(c)
}

#[test]
fn manual_ticks_publish_only_for_current_session() {
    let t = RecordingTransport::default();
    let (_in_tx, in_rx) = xch::unbounded();
    let (obs_tx, obs_rx) = xch::unbounded();
    let clock = ManualClock::starting_at(1_000);
    let mut panel = Panel::builder()
        .with_transport(t.clone())
        .with_inbound(in_rx)
        .with_clock(Box::new(clock.clone()))
        .with_observer(obs_tx)
        .manual_ticks()
        .add_injector_with_noise(
            "temperature",
            temperature(),
            ScriptedNoise::for_raw_values(74.0, [70.0, 78.0, 72.0]),
        )
        .build()
        .unwrap();

    assert!(panel.handle_event(ctl(Control::StartInjector("temperature".into()))));
    let s1 = panel.injector("temperature").unwrap().session();
    panel.handle_event(Event::Tick { injector: 0, session: s1 });
    clock.advance(Duration::from_millis(1000));
    panel.handle_event(Event::Tick { injector: 0, session: s1 });

    panel.handle_event(ctl(Control::StopInjector("temperature".into())));
    panel.handle_event(ctl(Control::StopInjector("temperature".into())));
    panel.handle_event(Event::Tick { injector: 0, session: s1 });

    let msgs = t.published_json("sensor/suhu");
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0]["timestamp"], 1_000);
    assert_eq!(msgs[1]["timestamp"], 2_000);
    assert_eq!(msgs[1]["value"], 74.0);

    let events: Vec<PanelEvent> = obs_rx.try_iter().collect();
    let stops = events
        .iter()
        .filter(|e| matches!(e, PanelEvent::InjectorStopped { .. }))
        .count();
    assert_eq!(stops, 1);
    assert_eq!(panel.last_sample("temperature").map(|s| s.raw), Some(78.0));
}

#[test]
fn unknown_names_are_rejected_and_reported() {
    let (_in_tx, in_rx) = xch::unbounded();
    let (obs_tx, obs_rx) = xch::unbounded();
    let mut panel = Panel::builder()
        .with_transport(RecordingTransport::default())
        .with_inbound(in_rx)
        .with_observer(obs_tx)
        .manual_ticks()
        .build()
        .unwrap();
    assert!(panel.handle_event(ctl(Control::Toggle("ghost".into()))));
    assert_eq!(
        obs_rx.try_recv().unwrap(),
        PanelEvent::Rejected {
            error: PanelError::UnknownSwitch("ghost".into())
        }
    );
    assert!(!panel.handle_event(ctl(Control::Shutdown)));
}

#[test]
fn inbound_routing_and_deadlines() {
    let t = RecordingTransport::default();
    let (_in_tx, in_rx) = xch::unbounded();
    let (obs_tx, obs_rx) = xch::unbounded();
    let clock = ManualClock::new();
    let mut panel = Panel::builder()
        .with_transport(t.clone())
        .with_inbound(in_rx)
        .with_clock(Box::new(clock.clone()))
        .with_observer(obs_tx)
        .manual_ticks()
        .add_switch("Lampu Teras", SwitchConfig::new("device/lampu1/cmd", "device/lampu1/state"))
        .add_switch("Pompa Air", SwitchConfig::new("device/pompa/cmd", "device/pompa/state"))
        .build()
        .unwrap();
    panel.attach().unwrap();
    assert!(t.is_subscribed("device/pompa/state"));

    panel.handle_event(ctl(Control::Toggle("Lampu Teras".into())));
    panel.handle_event(ctl(Control::Toggle("Pompa Air".into())));
    panel.handle_inbound(&InboundMessage::new("device/pompa/state", br#"{"status":"ON"}"#.to_vec()));
    assert_eq!(panel.switch_state("Pompa Air"), Some(ActuatorState::On));
    assert_eq!(panel.switch_state("Lampu Teras"), Some(ActuatorState::Pending));

    clock.advance(Duration::from_millis(5_000));
    panel.poll_deadlines(panel_traits::Clock::now(&clock));
    assert_eq!(panel.switch_state("Lampu Teras"), Some(ActuatorState::Off));

    let timed_out: Vec<_> = obs_rx
        .try_iter()
        .filter_map(|e| match e {
            PanelEvent::Actuator {
                switch,
                event: ActuatorEvent::ConfirmTimedOut { reverted_to },
            } => Some((switch, reverted_to)),
            _ => None,
        })
        .collect();
    assert_eq!(timed_out, vec![("Lampu Teras".to_string(), ActuatorState::Off)]);
}

#[test]
fn state_topic_change_through_control() {
    let t = RecordingTransport::default();
    let (_in_tx, in_rx) = xch::unbounded();
    let mut panel = Panel::builder()
        .with_transport(t.clone())
        .with_inbound(in_rx)
        .manual_ticks()
        .add_switch("s", SwitchConfig::new("a/cmd", "a/state"))
        .build()
        .unwrap();
    panel.attach().unwrap();
    panel.handle_event(ctl(Control::Toggle("s".into())));
    panel.handle_event(ctl(Control::SetStateTopic {
        switch: "s".into(),
        topic: "b/state".into(),
    }));
    panel.handle_inbound(&InboundMessage::new("a/state", br#"{"status":"ON"}"#.to_vec()));
    assert_eq!(panel.switch_state("s"), Some(ActuatorState::Pending));
    panel.handle_inbound(&InboundMessage::new("b/state", br#"{"status":"ON"}"#.to_vec()));
    assert_eq!(panel.switch_state("s"), Some(ActuatorState::On));
}

#[test]
fn reconfigure_restarts_with_new_snapshot() {
    let t = RecordingTransport::default();
    let (_in_tx, in_rx) = xch::unbounded();
    let mut panel = Panel::builder()
        .with_transport(t.clone())
        .with_inbound(in_rx)
        .manual_ticks()
        .add_injector_with_noise("temperature", temperature(), ScriptedNoise::default())
        .build()
        .unwrap();
    panel.handle_event(ctl(Control::StartAll));
    let s1 = panel.injector("temperature").unwrap().session();
    let cfg = InjectorConfig {
        topic: "lab/temp".into(),
        ..temperature()
    };
    panel.handle_event(ctl(Control::ReconfigureInjector("temperature".into(), cfg)));
    let s2 = panel.injector("temperature").unwrap().session();
    assert!(s2 > s1);
    panel.handle_event(Event::Tick { injector: 0, session: s1 });
    panel.handle_event(Event::Tick { injector: 0, session: s2 });
    assert!(t.published_json("sensor/suhu").is_empty());
    assert_eq!(t.published_json("lab/temp").len(), 1);
}

#[test]
fn runs_on_loopback_bus_with_echo_device() {
    let bus = LoopbackBus::new();
    let (client, inbound) = bus.connect();
    let _device = SimulatedDevice::spawn(
        &bus,
        "device/lampu1/cmd",
        "device/lampu1/state",
        DeviceMode::Echo,
        Duration::from_millis(10),
    )
    .unwrap();
    let (_watch, watch_rx) = {
        let (mut w, rx) = bus.connect();
        panel_traits::Transport::subscribe(&mut w, "sensor/suhu").unwrap();
        (w, rx)
    };

    let (obs_tx, obs_rx) = xch::unbounded();
    let panel = Panel::builder()
        .with_transport(client)
        .with_inbound(inbound)
        .with_observer(obs_tx)
        .with_seed(Some(42))
        .with_idle_poll(Duration::from_millis(20))
        .add_injector(
            "temperature",
            InjectorConfig {
                period_ms: 10,
                ..temperature()
            },
        )
        .add_switch("Lampu Teras", SwitchConfig::new("device/lampu1/cmd", "device/lampu1/state"))
        .build()
        .unwrap();
    let handle = panel.handle();
    let worker = std::thread::spawn(move || panel.run());

    handle.start("temperature").unwrap();
    for _ in 0..3 {
        let msg = watch_rx.recv_timeout(WAIT).expect("telemetry on bus");
        let v: serde_json::Value = serde_json::from_slice(&msg.payload).unwrap();
        let raw = v["raw_value"].as_f64().unwrap();
        assert!((69.0..=79.0).contains(&raw), "raw {raw} outside base±noise");
    }

    handle.toggle("Lampu Teras").unwrap();
    let confirmed = loop {
        match obs_rx.recv_timeout(WAIT).expect("actuator event") {
            PanelEvent::Actuator {
                event: ActuatorEvent::Changed { to, .. },
                ..
            } => break to,
            _ => continue,
        }
    };
    assert_eq!(confirmed, ActuatorState::On);

    handle.shutdown().unwrap();
    worker.join().unwrap().unwrap();
    assert!(!bus.has_subscriber("device/lampu1/state"));
    assert!(matches!(handle.stop("temperature"), Err(PanelError::Stopped)));
}

#[test]
fn run_exits_once_every_handle_is_dropped() {
    let t = RecordingTransport::default();
    let (_in_tx, in_rx) = xch::unbounded();
    let (obs_tx, obs_rx) = xch::unbounded();
    let panel = Panel::builder()
        .with_transport(t.clone())
        .with_inbound(in_rx)
        .with_observer(obs_tx)
        .with_seed(Some(3))
        .with_idle_poll(Duration::from_millis(10))
        .add_injector(
            "temperature",
            InjectorConfig {
                period_ms: 10,
                ..temperature()
            },
        )
        .add_switch("Pompa Air", SwitchConfig::new("device/pompa/cmd", "device/pompa/state"))
        .build()
        .unwrap();
    let handle = panel.handle();
    let second = handle.clone();
    let (done_tx, done_rx) = xch::bounded(1);
    std::thread::spawn(move || {
        let _ = done_tx.send(panel.run());
    });

    handle.start("temperature").unwrap();
    loop {
        if let PanelEvent::Telemetry { .. } = obs_rx.recv_timeout(WAIT).expect("telemetry") {
            break;
        }
    }

    drop(handle);
    // One live handle keeps the loop (and its ticker) running
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
    drop(second);

    let result = done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("run returns after the last handle is dropped");
    assert!(result.is_ok());
    assert!(!t.is_subscribed("device/pompa/state"));
    assert!(
        obs_rx
            .try_iter()
            .any(|e| matches!(e, PanelEvent::InjectorStopped { ref injector } if injector == "temperature"))
    );
}
