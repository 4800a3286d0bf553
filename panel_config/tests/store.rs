use panel_config::store::{
    CONNECTION_KEY, JsonFileStore, MemoryStore, SettingsStore, apply_overrides, injector_key,
    load_connection, load_injector, load_switch, save_connection, save_injector, save_switch,
};
use panel_config::{Config, Connection, FilterCfg, InjectorCfg, SwitchCfg};

#[test]
fn missing_keys_fall_back_to_defaults() {
    let store = MemoryStore::new();
    let cfg = Config::default();
    let eff = apply_overrides(&store, &cfg).unwrap();
    assert_eq!(eff, cfg);
}

#[test]
fn injector_round_trips_under_default_topic_key() {
    let mut store = MemoryStore::new();
    let default = InjectorCfg::new("temperature", "sensor/suhu");
    let edited = InjectorCfg {
        topic: "lab/temp".into(),
        base_value: 21.5,
        noise_bound: 0.5,
        period_ms: 250,
        filter: FilterCfg::Kalman,
        ..default.clone()
    };
    save_injector(&mut store, &default.topic, &edited).unwrap();

    assert!(store.get(&injector_key("sensor/suhu")).unwrap().is_some());
    assert_eq!(load_injector(&store, &default).unwrap(), edited);
}

#[test]
fn switch_round_trip_keeps_timeout_from_config() {
    let mut store = MemoryStore::new();
    let mut default = SwitchCfg::new("Lampu Teras", "device/lampu1/cmd", "device/lampu1/state");
    default.confirm_timeout_ms = 1234;
    let edited = SwitchCfg {
        state_topic: "device/lampu1/status".into(),
        ..default.clone()
    };
    save_switch(&mut store, &edited).unwrap();
    let loaded = load_switch(&store, &default).unwrap();
    assert_eq!(loaded.state_topic, "device/lampu1/status");
    assert_eq!(loaded.confirm_timeout_ms, 1234);
}

#[test]
fn credentials_dropped_when_auth_disabled() {
    let mut store = MemoryStore::new();
    let conn = Connection {
        host: "wss://h/mqtt".into(),
        client_id: "mqtt_sim_000001".into(),
        use_auth: false,
        username: Some("u".into()),
        password: Some("p".into()),
    };
    save_connection(&mut store, &conn).unwrap();
    let raw = store.get(CONNECTION_KEY).unwrap().unwrap();
    assert!(raw.get("username").is_none());
    assert!(raw.get("password").is_none());
    assert_eq!(raw["clientId"], "mqtt_sim_000001");

    let loaded = load_connection(&store, &Connection::default()).unwrap();
    assert_eq!(loaded.username, None);
    assert_eq!(loaded.host, "wss://h/mqtt");
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    {
        let mut store = JsonFileStore::open(&path).unwrap();
        save_switch(
            &mut store,
            &SwitchCfg::new("Pompa Air", "x/cmd", "x/state"),
        )
        .unwrap();
    }
    assert!(!path.with_extension("new").exists());

    let store = JsonFileStore::open(&path).unwrap();
    let def = SwitchCfg::new("Pompa Air", "device/pompa/cmd", "device/pompa/state");
    assert_eq!(load_switch(&store, &def).unwrap().command_topic, "x/cmd");
}

#[test]
fn file_store_remove_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let mut store = JsonFileStore::open(&path).unwrap();
    assert!(store.get(CONNECTION_KEY).unwrap().is_none());

    store.put("k", serde_json::json!(1)).unwrap();
    store.remove("k").unwrap();
    let reopened = JsonFileStore::open(&path).unwrap();
    assert!(reopened.get("k").unwrap().is_none());
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "[1,2,3]").unwrap();
    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(format!("{err}").contains("not a JSON object"));
}

#[test]
fn invalid_stored_values_fall_back_to_config() {
    let mut store = MemoryStore::new();
    store
        .put(
            &injector_key("sensor/suhu"),
            serde_json::json!({
                "topic": "sensor/suhu",
                "baseValue": 74.0,
                "noise": 5.0,
                "intervalMs": 0,
                "filterType": "kalman"
            }),
        )
        .unwrap();
    store
        .put(
            &panel_config::store::switch_key("Lampu Teras"),
            serde_json::json!({ "cmdTopic": "device/#", "stateTopic": "device/lampu1/state" }),
        )
        .unwrap();
    store
        .put(
            CONNECTION_KEY,
            serde_json::json!({ "host": "wss://b/mqtt", "useAuth": true, "clientId": "" }),
        )
        .unwrap();

    let cfg = Config::default();
    let eff = apply_overrides(&store, &cfg).unwrap();
    assert_eq!(eff.injectors, cfg.injectors);
    assert_eq!(eff.switches, cfg.switches);
    assert_eq!(eff.connection, cfg.connection);
}

#[test]
fn stored_connection_without_client_id_is_kept() {
    let mut store = MemoryStore::new();
    store
        .put(
            CONNECTION_KEY,
            serde_json::json!({ "host": "wss://other/mqtt", "useAuth": false, "clientId": "" }),
        )
        .unwrap();
    let conn = load_connection(&store, &Connection::default()).unwrap();
    assert_eq!(conn.host, "wss://other/mqtt");
}
