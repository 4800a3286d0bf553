//! Key/value settings store.
//!
//! Values are JSON documents under string keys. Layout of the keys and the
//! stored document shapes:
//!
//! | key                              | document |
//! |----------------------------------|----------|
//! | `mqtt_settings`                  | `{"host","useAuth","clientId","username"?,"password"?}` |
//! | `injector_settings_<topic>`      | `{"topic","baseValue","noise","intervalMs","filterType"}` |
//! | `switch_settings_<label>`        | `{"cmdTopic","stateTopic"}` |
//!
//! `<topic>` is the injector's topic as written in the config file, so a
//! user can change the publish topic without losing the entry.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Connection, FilterCfg, InjectorCfg, SwitchCfg};

pub const CONNECTION_KEY: &str = "mqtt_settings";

pub fn injector_key(default_topic: &str) -> String {
    format!("injector_settings_{default_topic}")
}

pub fn switch_key(label: &str) -> String {
    format!("switch_settings_{label}")
}

pub trait SettingsStore {
    fn get(&self, key: &str) -> eyre::Result<Option<Value>>;
    fn put(&mut self, key: &str, value: Value) -> eyre::Result<()>;
    fn remove(&mut self, key: &str) -> eyre::Result<()>;
}

/// Volatile store, used by tests and when no `--store` is given.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> eyre::Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Value) -> eyre::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> eyre::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object in a file. Every write rewrites the
/// whole file atomically (write to `*.new`, fsync, rename).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// Open `path`, treating a missing file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(s) if s.trim().is_empty() => BTreeMap::new(),
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| eyre::eyre!("settings store {:?} is not a JSON object: {}", path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(eyre::eyre!("read settings store {:?}: {}", path, e)),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> eyre::Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| eyre::eyre!("write settings store {:?}: {}", self.path, e))
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> eyre::Result<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Value) -> eyre::Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> eyre::Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

// ── Stored document shapes ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConnection {
    pub host: String,
    pub use_auth: bool,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl From<&Connection> for StoredConnection {
    fn from(c: &Connection) -> Self {
        // Credentials are only kept while authentication is enabled
        Self {
            host: c.host.clone(),
            use_auth: c.use_auth,
            client_id: c.client_id.clone(),
            username: c.use_auth.then(|| c.username.clone()).flatten(),
            password: c.use_auth.then(|| c.password.clone()).flatten(),
        }
    }
}

impl From<StoredConnection> for Connection {
    fn from(s: StoredConnection) -> Self {
        Self {
            host: s.host,
            client_id: s.client_id,
            use_auth: s.use_auth,
            username: s.username,
            password: s.password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredInjector {
    pub topic: String,
    pub base_value: f64,
    pub noise: f64,
    pub interval_ms: u64,
    pub filter_type: FilterCfg,
}

impl From<&InjectorCfg> for StoredInjector {
    fn from(c: &InjectorCfg) -> Self {
        Self {
            topic: c.topic.clone(),
            base_value: c.base_value,
            noise: c.noise_bound,
            interval_ms: c.period_ms,
            filter_type: c.filter,
        }
    }
}

impl StoredInjector {
    fn apply_to(self, base: &InjectorCfg) -> InjectorCfg {
        InjectorCfg {
            name: base.name.clone(),
            topic: self.topic,
            base_value: self.base_value,
            noise_bound: self.noise,
            period_ms: self.interval_ms,
            filter: self.filter_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSwitch {
    pub cmd_topic: String,
    pub state_topic: String,
}

impl From<&SwitchCfg> for StoredSwitch {
    fn from(c: &SwitchCfg) -> Self {
        Self {
            cmd_topic: c.command_topic.clone(),
            state_topic: c.state_topic.clone(),
        }
    }
}

// ── Load / save helpers ──────────────────────────────────────────────────────

/// Read and decode `key`. An entry that no longer decodes is logged and
/// treated as absent so a stale store never blocks startup.
fn read_doc<T: DeserializeOwned>(store: &dyn SettingsStore, key: &str) -> eyre::Result<Option<T>> {
    let Some(value) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring undecodable settings entry");
            Ok(None)
        }
    }
}

/// Keep `merged` if it passes `check`; otherwise log and fall back to `default`.
fn valid_or_default<T: Clone>(
    key: &str,
    merged: T,
    default: &T,
    check: impl FnOnce(&T) -> eyre::Result<()>,
) -> T {
    match check(&merged) {
        Ok(()) => merged,
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring invalid settings entry");
            default.clone()
        }
    }
}

fn write_doc<T: Serialize>(store: &mut dyn SettingsStore, key: &str, doc: &T) -> eyre::Result<()> {
    store.put(key, serde_json::to_value(doc)?)
}

/// Stored connection profile, or `fallback` when none is stored.
pub fn load_connection(store: &dyn SettingsStore, fallback: &Connection) -> eyre::Result<Connection> {
    let Some(doc) = read_doc::<StoredConnection>(store, CONNECTION_KEY)? else {
        return Ok(fallback.clone());
    };
    Ok(valid_or_default(CONNECTION_KEY, Connection::from(doc), fallback, |c| {
        // An empty client id is filled in at startup
        let mut c = c.clone();
        if c.client_id.trim().is_empty() {
            c.client_id = crate::client_id_from_suffix(0);
        }
        c.validate()
    }))
}

pub fn save_connection(store: &mut dyn SettingsStore, conn: &Connection) -> eyre::Result<()> {
    write_doc(store, CONNECTION_KEY, &StoredConnection::from(conn))
}

/// Effective settings for `default`, keyed by its configured topic.
pub fn load_injector(store: &dyn SettingsStore, default: &InjectorCfg) -> eyre::Result<InjectorCfg> {
    let key = injector_key(&default.topic);
    Ok(match read_doc::<StoredInjector>(store, &key)? {
        Some(s) => valid_or_default(&key, s.apply_to(default), default, InjectorCfg::validate),
        None => default.clone(),
    })
}

/// Persist `current` under the key derived from `default_topic`.
pub fn save_injector(
    store: &mut dyn SettingsStore,
    default_topic: &str,
    current: &InjectorCfg,
) -> eyre::Result<()> {
    write_doc(store, &injector_key(default_topic), &StoredInjector::from(current))
}

pub fn load_switch(store: &dyn SettingsStore, default: &SwitchCfg) -> eyre::Result<SwitchCfg> {
    let key = switch_key(&default.label);
    Ok(match read_doc::<StoredSwitch>(store, &key)? {
        Some(s) => {
            let merged = SwitchCfg {
                command_topic: s.cmd_topic,
                state_topic: s.state_topic,
                ..default.clone()
            };
            valid_or_default(&key, merged, default, SwitchCfg::validate)
        }
        None => default.clone(),
    })
}

pub fn save_switch(store: &mut dyn SettingsStore, current: &SwitchCfg) -> eyre::Result<()> {
    write_doc(store, &switch_key(&current.label), &StoredSwitch::from(current))
}

/// Apply every stored override to a copy of `cfg`.
pub fn apply_overrides(store: &dyn SettingsStore, cfg: &crate::Config) -> eyre::Result<crate::Config> {
    let mut out = cfg.clone();
    out.connection = load_connection(store, &cfg.connection)?;
    out.injectors = cfg
        .injectors
        .iter()
        .map(|i| load_injector(store, i))
        .collect::<eyre::Result<_>>()?;
    out.switches = cfg
        .switches
        .iter()
        .map(|s| load_switch(store, s))
        .collect::<eyre::Result<_>>()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injector_document_uses_stored_field_names() {
        let cfg = InjectorCfg::new("t", "sensor/suhu");
        let v = serde_json::to_value(StoredInjector::from(&cfg)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "topic": "sensor/suhu",
                "baseValue": 74.0,
                "noise": 5.0,
                "intervalMs": 1000,
                "filterType": "none"
            })
        );
    }

    #[test]
    fn undecodable_entry_falls_back() {
        let mut store = MemoryStore::new();
        store
            .put(&switch_key("Pompa Air"), serde_json::json!({"cmd": 1}))
            .unwrap();
        let def = SwitchCfg::new("Pompa Air", "device/pompa/cmd", "device/pompa/state");
        assert_eq!(load_switch(&store, &def).unwrap(), def);
    }
}
