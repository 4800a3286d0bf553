#![no_main]
use libfuzzer_sys::fuzz_target;
use panel_config::store::{MemoryStore, SettingsStore, apply_overrides, injector_key, switch_key};

fuzz_target!(|data: &[u8]| {
    // Arbitrary stored documents must be skipped or applied, never panic.
    let Ok(doc) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let base = panel_config::Config::default();
    let mut store = MemoryStore::new();
    let _ = store.put(panel_config::store::CONNECTION_KEY, doc.clone());
    let _ = store.put(&injector_key("sensor/suhu"), doc.clone());
    let _ = store.put(&switch_key("Lampu Teras"), doc);
    if let Ok(cfg) = apply_overrides(&store, &base) {
        let _ = cfg.validate();
    }
});
