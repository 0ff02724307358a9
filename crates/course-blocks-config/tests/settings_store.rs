// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use course_blocks::ManagerSettings;
use course_blocks_config::{
    load_manager_settings, save_manager_settings, ConfigError, ConfigService, ConfigStore,
    FsConfigStore, MANAGER_SETTINGS_KEY,
};
use course_blocks_dry_tests::InMemoryConfigStore;

fn tuned() -> ManagerSettings {
    ManagerSettings {
        cache_enabled: false,
        reuse_base_structure: true,
        cache_budget_bytes: Some(1 << 20),
    }
}

#[test]
fn fs_store_round_trips_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ConfigService::new(FsConfigStore::with_base(dir.path().join("nested")).expect("store"));
    save_manager_settings(&service, &tuned()).expect("save");
    assert!(dir.path().join("nested").join("block_structure.json").is_file());
    assert_eq!(load_manager_settings(&service).expect("load"), tuned());
}

#[test]
fn fs_store_replaces_document_without_leftovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ConfigService::new(FsConfigStore::with_base(dir.path()).expect("store"));
    save_manager_settings(&service, &ManagerSettings::default()).expect("first save");
    save_manager_settings(&service, &tuned()).expect("second save");
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["block_structure.json".to_owned()]);
    assert_eq!(load_manager_settings(&service).expect("load"), tuned());
}

#[test]
fn missing_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = ConfigService::new(FsConfigStore::with_base(dir.path()).expect("store"));
    assert_eq!(load_manager_settings(&service).expect("load"), ManagerSettings::default());
}

#[test]
fn partial_document_keeps_other_defaults() {
    let store = InMemoryConfigStore::with_entry(MANAGER_SETTINGS_KEY, br#"{"cache_enabled": false}"#);
    let service = ConfigService::new(store);
    let settings = load_manager_settings(&service).expect("load");
    assert!(!settings.cache_enabled);
    assert!(settings.reuse_base_structure);
    assert_eq!(settings.cache_budget_bytes, None);
}

#[test]
fn empty_document_is_treated_as_missing() {
    let service = ConfigService::new(InMemoryConfigStore::with_entry(MANAGER_SETTINGS_KEY, b""));
    assert_eq!(load_manager_settings(&service).expect("load"), ManagerSettings::default());
}

#[test]
fn malformed_document_is_an_error() {
    let service = ConfigService::new(InMemoryConfigStore::with_entry(MANAGER_SETTINGS_KEY, b"{not json"));
    assert!(matches!(load_manager_settings(&service), Err(ConfigError::Serde(_))));
}

#[test]
fn store_failures_propagate() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    store.set_fail_on_save(true);
    assert!(matches!(
        save_manager_settings(&service, &tuned()),
        Err(ConfigError::Other(_))
    ));
    assert_eq!(store.save_count(), 1);
    assert!(store.raw(MANAGER_SETTINGS_KEY).is_none());

    store.set_fail_on_load(true);
    assert!(matches!(load_manager_settings(&service), Err(ConfigError::Other(_))));
}

#[test]
fn saved_settings_are_pretty_json() {
    let store = InMemoryConfigStore::new();
    save_manager_settings(&ConfigService::new(&store), &tuned()).expect("save");
    let raw = store.raw(MANAGER_SETTINGS_KEY).expect("stored");
    let value: serde_json::Value = serde_json::from_slice(&raw).expect("json");
    assert_eq!(value["cache_budget_bytes"], serde_json::json!(1_048_576));
    assert!(raw.contains(&b'\n'));
}

#[test]
fn fs_store_rejects_path_like_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FsConfigStore::with_base(dir.path()).expect("store");
    for key in ["", "../escape", "a/b", ".hidden"] {
        assert!(matches!(store.save_raw(key, b"{}"), Err(ConfigError::Other(_))), "{key:?}");
    }
    assert!(matches!(store.load_raw("absent"), Err(ConfigError::NotFound)));
}
