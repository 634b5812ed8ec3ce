use std::{collections::HashMap, fs};

use tracing::warn;

const DEV_AUTH_SECRET: &str = "devsecret";

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub auth_secret: String,
    pub auth_issuer: String,
    pub token_ttl_seconds: i64,
}

impl Settings {
    pub fn uses_dev_secret(&self) -> bool {
        self.auth_secret == DEV_AUTH_SECRET
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/gighub.db".into(),
            auth_secret: DEV_AUTH_SECRET.into(),
            auth_issuer: "gighub".into(),
            token_ttl_seconds: 3600,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    if settings.uses_dev_secret() {
        warn!("auth_secret is the built-in development value; anyone can mint sessions. Set AUTH_SECRET");
    }
    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(cfg) => cfg,
        Err(error) => {
            warn!(%error, "ignoring unreadable server.toml");
            return;
        }
    };

    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("auth_secret") {
        settings.auth_secret = v.clone();
    }
    if let Some(v) = file_cfg.get("auth_issuer") {
        settings.auth_issuer = v.clone();
    }
}

// Later names win: `APP__*` overrides the bare variable.
fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = var(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = var(key) {
            settings.database_url = v;
        }
    }
    for key in ["AUTH_SECRET", "APP__AUTH_SECRET"] {
        if let Some(v) = var(key) {
            settings.auth_secret = v;
        }
    }
    if let Some(v) = var("APP__AUTH_ISSUER") {
        settings.auth_issuer = v;
    }
    if let Some(v) = var("APP__TOKEN_TTL_SECONDS") {
        match v.parse::<i64>() {
            Ok(parsed) if parsed > 0 => settings.token_ttl_seconds = parsed,
            _ => warn!(value = %v, "ignoring invalid APP__TOKEN_TTL_SECONDS"),
        }
    }
}

/// Turns a bare file path or a `sqlite:` path into a `sqlite://` URL.
/// Creating the database directory is left to `Storage::new`.
pub fn normalize_database_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return Settings::default().database_url;
    }
    if raw.contains("://") || raw.starts_with("sqlite::memory:") {
        return raw.to_string();
    }

    let path = raw.strip_prefix("sqlite:").unwrap_or(raw);
    format!("sqlite://{}", path.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
