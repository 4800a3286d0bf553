//! Human-readable error descriptions and structured JSON error formatting.

use panel_core::error::{BuildError, PanelError};

/// Exit code for configuration problems (bad TOML, invalid values, bad store).
pub const EXIT_CONFIG: i32 = 2;
/// Exit code when a toggle was not confirmed in time.
pub const EXIT_CONFIRM_TIMEOUT: i32 = 3;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingInbound => {
                "What happened: The panel was built without an inbound message channel.\nLikely causes: The transport connection was not wired into the builder.\nHow to fix: Pass the receiver returned by connect() via with_inbound(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Duplicate names, empty or wildcard topics, or out-of-range values.\nHow to fix: Edit the config file or the settings store, then run `panel self-check`."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PanelError>() {
        return match pe {
            PanelError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: A typo in the TOML or a bad value saved through `panel settings`.\nHow to fix: Fix the value named above, then run `panel self-check`."
            ),
            PanelError::ConfirmTimeout { state_topic } => format!(
                "What happened: The device did not confirm the command on '{state_topic}'.\nLikely causes: Device offline, wrong state topic, or timeout too short.\nHow to fix: Check the switch's state topic, or raise confirm_timeout_ms (--timeout-ms)."
            ),
            PanelError::UnknownSwitch(label) => format!(
                "What happened: No switch is labelled '{label}'.\nLikely causes: Typo in --label or the switch is missing from [[switch]].\nHow to fix: Run `panel settings show` to list the configured switches."
            ),
            PanelError::UnknownInjector(name) => format!(
                "What happened: No injector is named '{name}'.\nLikely causes: Typo in --name or the injector is missing from [[injector]].\nHow to fix: Run `panel settings show` to list the configured injectors."
            ),
            PanelError::Transport(_) | PanelError::Disconnected(_) => format!(
                "What happened: {pe}.\nLikely causes: Broker unreachable or the connection dropped.\nHow to fix: Check the connection settings and retry."
            ),
            PanelError::Encode(_) | PanelError::Stopped => format!(
                "What happened: {pe}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration errors, 3 for confirmation
/// timeouts, 1 for everything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return EXIT_CONFIG;
    }
    match err.downcast_ref::<PanelError>() {
        Some(PanelError::Config(_)) => EXIT_CONFIG,
        Some(PanelError::ConfirmTimeout { .. }) => EXIT_CONFIRM_TIMEOUT,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<PanelError>() {
        Some(PanelError::Config(_)) => "InvalidConfig",
        Some(PanelError::ConfirmTimeout { .. }) => "ConfirmTimeout",
        Some(PanelError::UnknownSwitch(_)) => "UnknownSwitch",
        Some(PanelError::UnknownInjector(_)) => "UnknownInjector",
        Some(PanelError::Transport(_) | PanelError::Disconnected(_)) => "Transport",
        Some(PanelError::Encode(_)) => "Encode",
        Some(PanelError::Stopped) => "Stopped",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    match err.downcast_ref::<PanelError>() {
        Some(PanelError::ConfirmTimeout { state_topic }) => json!({
            "reason": reason_name(err),
            "details": { "state_topic": state_topic },
            "message": msg,
        })
        .to_string(),
        _ => json!({ "reason": reason_name(err), "message": msg }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        let cfg = eyre::Report::new(PanelError::Config("x".into()));
        let timeout = eyre::Report::new(PanelError::ConfirmTimeout {
            state_topic: "a/state".into(),
        });
        let other = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&cfg), 2);
        assert_eq!(exit_code_for_error(&timeout), 3);
        assert_eq!(exit_code_for_error(&other), 1);
        assert_eq!(
            exit_code_for_error(&eyre::Report::new(BuildError::InvalidConfig("dup"))),
            2
        );
    }

    #[test]
    fn json_error_carries_reason_and_topic() {
        let e = eyre::Report::new(PanelError::ConfirmTimeout {
            state_topic: "device/lampu1/state".into(),
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "ConfirmTimeout");
        assert_eq!(v["details"]["state_topic"], "device/lampu1/state");
        assert!(v["message"].as_str().unwrap().contains("What happened"));
    }
}
