use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::warn;
use transfer::MatchKey;

pub const DEV_SESSION_SECRET: &str = "dev-insecure-session-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub site_header: String,
    pub import_match_key: MatchKey,
    pub max_upload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            database_url: "sqlite://./data/inventory.db".into(),
            session_secret: DEV_SESSION_SECRET.into(),
            session_ttl_seconds: 8 * 60 * 60,
            site_header: "Inventory Admin".into(),
            import_match_key: MatchKey::Id,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Defaults, then `server.toml` in the working directory, then the environment.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let value = match value {
                        toml::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    let field = if key == "bind_addr" { "server_bind" } else { key.as_str() };
                    apply(&mut settings, field, value);
                }
            }
            Err(error) => warn!(path = %config_path.display(), %error, "ignoring unreadable config file"),
        }
    }

    // Later names win over earlier ones for the same field.
    const ENV_KEYS: [(&str, &str); 9] = [
        ("SERVER_BIND", "server_bind"),
        ("APP__BIND_ADDR", "server_bind"),
        ("DATABASE_URL", "database_url"),
        ("APP__DATABASE_URL", "database_url"),
        ("APP__SESSION_SECRET", "session_secret"),
        ("APP__SESSION_TTL_SECONDS", "session_ttl_seconds"),
        ("APP__SITE_HEADER", "site_header"),
        ("APP__IMPORT_MATCH_KEY", "import_match_key"),
        ("APP__MAX_UPLOAD_BYTES", "max_upload_bytes"),
    ];
    for (var, field) in ENV_KEYS {
        if let Some(value) = env(var) {
            apply(&mut settings, field, value);
        }
    }

    settings
}

fn apply(settings: &mut Settings, field: &str, value: String) {
    match field {
        "server_bind" => settings.server_bind = value,
        "database_url" => settings.database_url = value,
        "session_secret" => settings.session_secret = value,
        "site_header" => settings.site_header = value,
        "session_ttl_seconds" => match value.trim().parse::<i64>() {
            Ok(ttl) if ttl > 0 => settings.session_ttl_seconds = ttl,
            _ => warn!(%value, "ignoring invalid session_ttl_seconds"),
        },
        "max_upload_bytes" => match value.trim().parse::<usize>() {
            Ok(limit) if limit > 0 => settings.max_upload_bytes = limit,
            _ => warn!(%value, "ignoring invalid max_upload_bytes"),
        },
        "import_match_key" => match value.parse::<MatchKey>() {
            Ok(key) => settings.import_match_key = key,
            Err(error) => warn!(%error, "ignoring invalid import_match_key"),
        },
        other => warn!(key = other, "ignoring unknown setting"),
    }
}

/// Accepts a bare file path as well as a full sqlite URL.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url)
        .replace('\\', "/");
    format!("sqlite://{path}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
