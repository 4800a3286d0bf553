#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `panel`: drive the simulator panel from the command line.

mod cli;
mod error_fmt;
mod logging;
mod panel;
mod settings;

use std::time::Duration;

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("warning: failed to install color-eyre: {e}");
    }

    if let Err(err) = real_main(cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        if json {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let loaded = settings::load(cli.config.as_deref(), cli.store.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.effective.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    logging::init(&level, cli.json, &loaded.effective.logging)?;
    tracing::debug!(
        injectors = loaded.effective.injectors.len(),
        switches = loaded.effective.switches.len(),
        persistent = loaded.persistent,
        "configuration loaded"
    );

    match cli.cmd {
        Commands::Run {
            ticks,
            seed,
            device,
            latency_ms,
        } => panel::run(
            &loaded.effective,
            ticks,
            seed,
            device.into(),
            Duration::from_millis(latency_ms),
            cli.json,
        ),
        Commands::Toggle {
            label,
            device,
            latency_ms,
            timeout_ms,
        } => panel::toggle(
            &loaded.effective,
            &label,
            device.into(),
            Duration::from_millis(latency_ms),
            timeout_ms,
            cli.json,
        ),
        Commands::Settings { cmd } => settings::run_settings(loaded, cmd, cli.json),
        Commands::SelfCheck => settings::self_check(&loaded, cli.json),
    }
}
