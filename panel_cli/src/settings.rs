//! Configuration loading and the `settings` / `self-check` commands.

use std::path::{Path, PathBuf};

use panel_config::store::{
    JsonFileStore, MemoryStore, SettingsStore, apply_overrides, save_connection, save_injector,
    save_switch,
};
use panel_config::{Config, FilterCfg, client_id_from_suffix};
use panel_core::error::PanelError;
use serde_json::json;

use crate::cli::{DEFAULT_CONFIG, SettingsCmd};

/// Parsed config file plus the store its overrides live in.
pub struct Loaded {
    /// Config as written in the file (store keys derive from these values).
    pub base: Config,
    /// Config with store overrides applied.
    pub effective: Config,
    pub store: Box<dyn SettingsStore>,
    pub persistent: bool,
}

fn config_error(e: impl std::fmt::Display) -> eyre::Report {
    eyre::Report::new(PanelError::Config(e.to_string()))
}

fn read_config(path: Option<&Path>) -> eyre::Result<Config> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using built-in defaults");
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| config_error(format!("read {}: {e}", path.display())))?;
    toml::from_str::<Config>(&text).map_err(|e| config_error(format!("parse {}: {e}", path.display())))
}

/// Load config and store, apply overrides and validate the result.
pub fn load(config: Option<&Path>, store: Option<&Path>) -> eyre::Result<Loaded> {
    let base = read_config(config)?;
    let (store, persistent): (Box<dyn SettingsStore>, bool) = match store {
        Some(p) => (Box::new(JsonFileStore::open(p).map_err(config_error)?), true),
        None => (Box::new(MemoryStore::new()), false),
    };
    let mut effective = apply_overrides(store.as_ref(), &base).map_err(config_error)?;
    if effective.connection.client_id.trim().is_empty() {
        effective.connection.client_id = client_id_from_suffix(rand::random());
        tracing::debug!(client_id = %effective.connection.client_id, "generated client id");
    }
    effective.validate().map_err(config_error)?;
    Ok(Loaded {
        base,
        effective,
        store,
        persistent,
    })
}

fn mask(secret: Option<&str>) -> Option<&'static str> {
    secret.map(|_| "****")
}

fn show(loaded: &Loaded, json_out: bool) {
    let cfg = &loaded.effective;
    if json_out {
        let v = json!({
            "connection": {
                "host": cfg.connection.host,
                "client_id": cfg.connection.client_id,
                "use_auth": cfg.connection.use_auth,
                "username": cfg.connection.username,
                "password": mask(cfg.connection.password.as_deref()),
            },
            "injectors": cfg.injectors,
            "switches": cfg.switches,
            "persistent": loaded.persistent,
        });
        println!("{v}");
        return;
    }
    let c = &cfg.connection;
    println!("connection: host={} client_id={} use_auth={}", c.host, c.client_id, c.use_auth);
    if c.use_auth {
        println!(
            "  username={} password={}",
            c.username.as_deref().unwrap_or("-"),
            mask(c.password.as_deref()).unwrap_or("-")
        );
    }
    for i in &cfg.injectors {
        println!(
            "injector {}: topic={} base={} noise={} period_ms={} filter={}",
            i.name,
            i.topic,
            i.base_value,
            i.noise_bound,
            i.period_ms,
            i.filter.as_str()
        );
    }
    for s in &cfg.switches {
        println!(
            "switch {}: command_topic={} state_topic={} confirm_timeout_ms={}",
            s.label, s.command_topic, s.state_topic, s.confirm_timeout_ms
        );
    }
}

fn warn_volatile(loaded: &Loaded) {
    if !loaded.persistent {
        tracing::warn!("no --store given; the change is not persisted");
    }
}

#[allow(clippy::too_many_lines)]
pub fn run_settings(mut loaded: Loaded, cmd: SettingsCmd, json_out: bool) -> eyre::Result<()> {
    match cmd {
        SettingsCmd::Show => {
            show(&loaded, json_out);
        }
        SettingsCmd::Connection {
            host,
            client_id,
            use_auth,
            username,
            password,
        } => {
            let mut conn = loaded.effective.connection.clone();
            if let Some(h) = host {
                conn.host = h;
            }
            if let Some(id) = client_id {
                conn.client_id = id;
            }
            if let Some(a) = use_auth {
                conn.use_auth = a;
            }
            if username.is_some() {
                conn.username = username;
            }
            if password.is_some() {
                conn.password = password;
            }
            conn.validate().map_err(config_error)?;
            save_connection(loaded.store.as_mut(), &conn)?;
            warn_volatile(&loaded);
            tracing::info!(host = %conn.host, use_auth = conn.use_auth, "connection settings saved");
            println!("saved connection settings");
        }
        SettingsCmd::Injector {
            name,
            topic,
            base_value,
            noise_bound,
            period_ms,
            filter,
        } => {
            let default = loaded
                .base
                .injector(&name)
                .ok_or_else(|| eyre::Report::new(PanelError::UnknownInjector(name.clone())))?
                .clone();
            let mut cur = loaded
                .effective
                .injector(&name)
                .cloned()
                .unwrap_or_else(|| default.clone());
            if let Some(t) = topic {
                cur.topic = t;
            }
            if let Some(b) = base_value {
                cur.base_value = b;
            }
            if let Some(n) = noise_bound {
                cur.noise_bound = n;
            }
            if let Some(p) = period_ms {
                cur.period_ms = p;
            }
            if let Some(f) = filter {
                cur.filter = f;
            }
            cur.validate().map_err(config_error)?;
            save_injector(loaded.store.as_mut(), &default.topic, &cur)?;
            warn_volatile(&loaded);
            tracing::info!(injector = %name, topic = %cur.topic, filter = cur.filter.as_str(), "injector settings saved");
            println!("saved injector {name}");
        }
        SettingsCmd::Switch {
            label,
            command_topic,
            state_topic,
        } => {
            let mut cur = loaded
                .effective
                .switch(&label)
                .cloned()
                .ok_or_else(|| eyre::Report::new(PanelError::UnknownSwitch(label.clone())))?;
            if let Some(t) = command_topic {
                cur.command_topic = t;
            }
            if let Some(t) = state_topic {
                cur.state_topic = t;
            }
            cur.validate().map_err(config_error)?;
            save_switch(loaded.store.as_mut(), &cur)?;
            warn_volatile(&loaded);
            tracing::info!(switch = %label, command_topic = %cur.command_topic, state_topic = %cur.state_topic, "switch settings saved");
            println!("saved switch {label}");
        }
    }
    Ok(())
}

pub fn self_check(loaded: &Loaded, json_out: bool) -> eyre::Result<()> {
    // Building a panel re-validates names and topics the way the runtime sees them
    let assembly = crate::panel::assemble(
        &loaded.effective,
        crate::panel::AssembleOpts {
            mode: panel_bus::DeviceMode::Silent,
            latency: std::time::Duration::ZERO,
            ..Default::default()
        },
    )?;
    drop(assembly);
    let filters: Vec<FilterCfg> = loaded.effective.injectors.iter().map(|i| i.filter).collect();
    if json_out {
        println!(
            "{}",
            json!({
                "status": "ok",
                "injectors": loaded.effective.injectors.len(),
                "switches": loaded.effective.switches.len(),
                "filters": filters,
            })
        );
    } else {
        println!(
            "OK: {} injector(s), {} switch(es)",
            loaded.effective.injectors.len(),
            loaded.effective.switches.len()
        );
    }
    Ok(())
}
