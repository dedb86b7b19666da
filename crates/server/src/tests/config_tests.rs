use std::{collections::HashMap, fs, path::Path};

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = load_settings_from(Path::new("definitely/missing/server.toml"), env_from(&[]));
    assert_eq!(settings.server_bind, "127.0.0.1:8000");
    assert_eq!(settings.site_header, "Inventory Admin");
    assert_eq!(settings.import_match_key, MatchKey::Id);
    assert_eq!(settings.session_secret, DEV_SESSION_SECRET);
}

#[test]
fn file_values_are_overridden_by_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        r#"
bind_addr = "0.0.0.0:9000"
site_header = "Warehouse"
import_match_key = "name"
session_ttl_seconds = 600
"#,
    )
    .expect("write config");

    let settings = load_settings_from(
        &path,
        env_from(&[
            ("SERVER_BIND", "127.0.0.1:1111"),
            ("APP__BIND_ADDR", "127.0.0.1:2222"),
            ("APP__MAX_UPLOAD_BYTES", "2048"),
        ]),
    );

    assert_eq!(settings.server_bind, "127.0.0.1:2222");
    assert_eq!(settings.site_header, "Warehouse");
    assert_eq!(settings.import_match_key, MatchKey::Name);
    assert_eq!(settings.session_ttl_seconds, 600);
    assert_eq!(settings.max_upload_bytes, 2048);
}

#[test]
fn invalid_values_keep_previous_setting() {
    let settings = load_settings_from(
        Path::new("definitely/missing/server.toml"),
        env_from(&[
            ("APP__IMPORT_MATCH_KEY", "sku"),
            ("APP__SESSION_TTL_SECONDS", "-5"),
            ("APP__MAX_UPLOAD_BYTES", "lots"),
        ]),
    );
    let defaults = Settings::default();
    assert_eq!(settings.import_match_key, defaults.import_match_key);
    assert_eq!(settings.session_ttl_seconds, defaults.session_ttl_seconds);
    assert_eq!(settings.max_upload_bytes, defaults.max_upload_bytes);
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite:inventory.db"), "sqlite://inventory.db");
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}
