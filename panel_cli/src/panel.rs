//! Panel assembly on the loopback bus and the `run` / `toggle` commands.

use std::time::Duration;

use crossbeam_channel as xch;
use eyre::WrapErr;
use panel_bus::{BusClient, DeviceMode, LoopbackBus, SimulatedDevice};
use panel_config::Config;
use panel_core::error::PanelError;
use panel_core::{
    ActuatorEvent, ActuatorState, InjectorConfig, Panel, PanelEvent, PanelHandle, SwitchConfig,
    TelemetryMessage,
};

/// A built panel plus the simulated side of the bus it talks to.
pub struct Assembly {
    pub panel: Panel<BusClient>,
    pub bus: LoopbackBus,
    /// Kept alive for the lifetime of the panel; dropping joins their threads.
    pub devices: Vec<SimulatedDevice>,
}

pub struct AssembleOpts {
    pub seed: Option<u64>,
    pub mode: DeviceMode,
    pub latency: Duration,
    pub observer: Option<xch::Sender<PanelEvent>>,
    /// Replaces every switch's confirmation timeout; `Some(0)` disables it.
    pub confirm_timeout_ms: Option<u64>,
}

impl Default for AssembleOpts {
    fn default() -> Self {
        Self {
            seed: None,
            mode: DeviceMode::Echo,
            latency: Duration::from_millis(50),
            observer: None,
            confirm_timeout_ms: None,
        }
    }
}

pub fn assemble(cfg: &Config, opts: AssembleOpts) -> eyre::Result<Assembly> {
    let bus = LoopbackBus::new();
    let mut devices = Vec::with_capacity(cfg.switches.len());
    for s in &cfg.switches {
        let dev = SimulatedDevice::spawn(&bus, &s.command_topic, &s.state_topic, opts.mode, opts.latency)
            .wrap_err_with(|| format!("attach simulated device for switch '{}'", s.label))?;
        devices.push(dev);
    }

    let (client, inbound) = bus.connect();
    tracing::info!(
        host = %cfg.connection.host,
        client_id = %cfg.connection.client_id,
        "connected (loopback bus)"
    );

    let mut builder = Panel::builder()
        .with_transport(client)
        .with_inbound(inbound)
        .with_seed(opts.seed.or(cfg.runtime.seed));
    for i in &cfg.injectors {
        builder = builder.add_injector(i.name.clone(), InjectorConfig::from(i));
    }
    for s in &cfg.switches {
        let mut sc = SwitchConfig::from(s);
        if let Some(ms) = opts.confirm_timeout_ms {
            sc = sc.with_confirm_timeout((ms > 0).then(|| Duration::from_millis(ms)));
        }
        builder = builder.add_switch(s.label.clone(), sc);
    }
    if let Some(tx) = opts.observer {
        builder = builder.with_observer(tx);
    }
    let panel = builder.build()?;
    Ok(Assembly {
        panel,
        bus,
        devices,
    })
}

fn spawn_runtime(
    panel: Panel<BusClient>,
) -> (PanelHandle, std::thread::JoinHandle<panel_core::Result<()>>) {
    let handle = panel.handle();
    let join = std::thread::spawn(move || panel.run());
    (handle, join)
}

fn install_ctrlc(handle: &PanelHandle) {
    let h = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("interrupt received; shutting down");
        let _ = h.shutdown();
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }
}

fn join_runtime(join: std::thread::JoinHandle<panel_core::Result<()>>) -> eyre::Result<()> {
    match join.join() {
        Ok(res) => res,
        Err(_) => Err(eyre::eyre!("panel runtime thread panicked")),
    }
}

fn print_telemetry(injector: &str, msg: &TelemetryMessage, json_out: bool) -> eyre::Result<()> {
    if json_out {
        println!("{}", serde_json::to_string(msg)?);
    } else {
        println!(
            "{injector:<12} {:<20} value={:>8.2} raw={:>8.2} ts={}",
            msg.sensor_id, msg.value, msg.raw_value, msg.timestamp
        );
    }
    Ok(())
}

/// Start every injector and print its telemetry until `ticks` messages were
/// seen or the user interrupts.
pub fn run(
    cfg: &Config,
    ticks: Option<u64>,
    seed: Option<u64>,
    mode: DeviceMode,
    latency: Duration,
    json_out: bool,
) -> eyre::Result<()> {
    let (obs_tx, obs_rx) = xch::unbounded();
    let Assembly {
        panel,
        bus: _bus,
        devices: _devices,
    } = assemble(
        cfg,
        AssembleOpts {
            seed,
            mode,
            latency,
            observer: Some(obs_tx),
            confirm_timeout_ms: None,
        },
    )?;
    let (handle, join) = spawn_runtime(panel);
    install_ctrlc(&handle);
    handle.send(panel_core::Control::StartAll)?;

    let mut seen: u64 = 0;
    for ev in &obs_rx {
        match ev {
            PanelEvent::Telemetry { injector, message } => {
                print_telemetry(&injector, &message, json_out)?;
                seen += 1;
                if ticks.is_some_and(|n| seen >= n) {
                    // The runtime may already be gone after an interrupt
                    let _ = handle.shutdown();
                    break;
                }
            }
            PanelEvent::PublishFailed { injector, error } => {
                tracing::warn!(%injector, %error, "telemetry publish failed");
            }
            PanelEvent::InjectorStarted { injector, session } => {
                tracing::info!(%injector, session, "injector started");
            }
            PanelEvent::InjectorStopped { injector } => {
                tracing::info!(%injector, "injector stopped");
            }
            other => tracing::debug!(event = ?other, "panel event"),
        }
    }
    join_runtime(join)?;
    tracing::info!(messages = seen, "run finished");
    Ok(())
}

/// Toggle one switch and wait for the outcome.
pub fn toggle(
    cfg: &Config,
    label: &str,
    mode: DeviceMode,
    latency: Duration,
    timeout_ms: Option<u64>,
    json_out: bool,
) -> eyre::Result<()> {
    let state_topic = cfg
        .switch(label)
        .map(|s| s.state_topic.clone())
        .ok_or_else(|| eyre::Report::new(PanelError::UnknownSwitch(label.to_string())))?;

    let (obs_tx, obs_rx) = xch::unbounded();
    let Assembly {
        panel,
        bus: _bus,
        devices: _devices,
    } = assemble(
        cfg,
        AssembleOpts {
            seed: None,
            mode,
            latency,
            observer: Some(obs_tx),
            confirm_timeout_ms: timeout_ms,
        },
    )?;
    let (handle, join) = spawn_runtime(panel);
    install_ctrlc(&handle);
    handle.toggle(label)?;

    let mut outcome: Option<Result<ActuatorState, PanelError>> = None;
    for ev in &obs_rx {
        match ev {
            PanelEvent::CommandSent { switch, command } if switch == label => {
                tracing::info!(%switch, command = ?command, "command sent");
                if !json_out {
                    println!("{switch}: PENDING");
                }
            }
            PanelEvent::Actuator { switch, event } if switch == label => match event {
                ActuatorEvent::Changed { to, .. } if to != ActuatorState::Pending => {
                    outcome = Some(Ok(to));
                    break;
                }
                ActuatorEvent::ConfirmTimedOut { .. } => {
                    outcome = Some(Err(PanelError::ConfirmTimeout {
                        state_topic: state_topic.clone(),
                    }));
                    break;
                }
                ActuatorEvent::Changed { .. } => {}
            },
            PanelEvent::Rejected { error } => {
                outcome = Some(Err(error));
                break;
            }
            _ => {}
        }
    }
    let _ = handle.shutdown();
    join_runtime(join)?;

    match outcome {
        Some(Ok(state)) => {
            if json_out {
                println!(
                    "{}",
                    serde_json::json!({ "switch": label, "state": state.as_str() })
                );
            } else {
                println!("{label}: {}", state.as_str());
            }
            Ok(())
        }
        Some(Err(e)) => Err(e.into()),
        // Interrupted before the device answered
        None => Err(PanelError::Stopped.into()),
    }
}
