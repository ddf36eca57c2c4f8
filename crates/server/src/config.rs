use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use realtime::PusherConfig;
use server_api::auth::DEFAULT_TOKEN_TTL_SECONDS;
use tracing::warn;

pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub pusher_app_id: Option<String>,
    pub pusher_key: Option<String>,
    pub pusher_secret: Option<String>,
    pub pusher_cluster: Option<String>,
    pub pusher_host: Option<String>,
    pub local_hub_enabled: bool,
    pub local_hub_capacity: usize,
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5000".into(),
            database_url: "sqlite://./data/team_sync.db".into(),
            jwt_secret: DEV_JWT_SECRET.into(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            bcrypt_cost: 10,
            pusher_app_id: None,
            pusher_key: None,
            pusher_secret: None,
            pusher_cluster: None,
            pusher_host: None,
            local_hub_enabled: true,
            local_hub_capacity: 256,
            cors_allowed_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

/// Keys accepted in `server.toml`, each with the plain environment variable
/// that overrides it. `APP__<KEY>` always works too and wins over both.
const KEYS: &[(&str, &str)] = &[
    ("bind_addr", "SERVER_BIND"),
    ("port", "PORT"),
    ("database_url", "DATABASE_URL"),
    ("jwt_secret", "JWT_SECRET"),
    ("token_ttl_seconds", "JWT_TTL_SECONDS"),
    ("bcrypt_cost", "BCRYPT_COST"),
    ("pusher_app_id", "PUSHER_APP_ID"),
    ("pusher_key", "PUSHER_KEY"),
    ("pusher_secret", "PUSHER_SECRET"),
    ("pusher_cluster", "PUSHER_CLUSTER"),
    ("pusher_host", "PUSHER_HOST"),
    ("local_hub_enabled", "LOCAL_HUB_ENABLED"),
    ("local_hub_capacity", "LOCAL_HUB_CAPACITY"),
    ("cors_allowed_origins", "CORS_ALLOWED_ORIGINS"),
    ("max_body_bytes", "MAX_BODY_BYTES"),
    ("bootstrap_admin_email", "BOOTSTRAP_ADMIN_EMAIL"),
    ("bootstrap_admin_password", "BOOTSTRAP_ADMIN_PASSWORD"),
];

impl Settings {
    fn apply(&mut self, key: &str, value: String) {
        let value = value.trim().to_string();
        match key {
            "bind_addr" => self.server_bind = value,
            "port" => match value.parse::<u16>() {
                Ok(port) => self.server_bind = format!("0.0.0.0:{port}"),
                Err(_) => warn!(%value, "ignoring invalid port"),
            },
            "database_url" => self.database_url = value,
            "jwt_secret" => self.jwt_secret = value,
            "token_ttl_seconds" => parse_into(key, &value, &mut self.token_ttl_seconds),
            "bcrypt_cost" => parse_into(key, &value, &mut self.bcrypt_cost),
            "pusher_app_id" => self.pusher_app_id = non_empty(value),
            "pusher_key" => self.pusher_key = non_empty(value),
            "pusher_secret" => self.pusher_secret = non_empty(value),
            "pusher_cluster" => self.pusher_cluster = non_empty(value),
            "pusher_host" => self.pusher_host = non_empty(value),
            "local_hub_enabled" => parse_into(key, &value, &mut self.local_hub_enabled),
            "local_hub_capacity" => parse_into(key, &value, &mut self.local_hub_capacity),
            "cors_allowed_origins" => {
                self.cors_allowed_origins = value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "max_body_bytes" => parse_into(key, &value, &mut self.max_body_bytes),
            "bootstrap_admin_email" => self.bootstrap_admin_email = non_empty(value),
            "bootstrap_admin_password" => self.bootstrap_admin_password = non_empty(value),
            _ => {}
        }
    }

    /// Pusher is enabled only when all four credentials are present.
    pub fn pusher(&self) -> Option<PusherConfig> {
        Some(PusherConfig {
            app_id: self.pusher_app_id.clone()?,
            key: self.pusher_key.clone()?,
            secret: self.pusher_secret.clone()?,
            cluster: self.pusher_cluster.clone()?,
            host: self.pusher_host.clone(),
        })
    }

    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        Some((
            self.bootstrap_admin_email.as_deref()?,
            self.bootstrap_admin_password.as_deref()?,
        ))
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("server.toml"), |name| std::env::var(name).ok())
}

pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(mut file_cfg) => {
                for &(key, _) in KEYS {
                    let value = match file_cfg.remove(key) {
                        Some(toml::Value::String(s)) => s,
                        Some(toml::Value::Array(items)) => items
                            .iter()
                            .map(|item| match item {
                                toml::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect::<Vec<_>>()
                            .join(","),
                        Some(other) => other.to_string(),
                        None => continue,
                    };
                    settings.apply(key, value);
                }
                for key in file_cfg.keys() {
                    warn!(%key, "ignoring unknown setting");
                }
            }
            Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable config file"),
        }
    }

    for &(key, plain) in KEYS {
        if let Some(v) = env(plain) {
            settings.apply(key, v);
        }
        if let Some(v) = env(&format!("APP__{}", key.to_ascii_uppercase())) {
            settings.apply(key, v);
        }
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

fn parse_into<T: std::str::FromStr>(key: &str, value: &str, slot: &mut T) {
    match value.parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!(key, value, "ignoring invalid setting value"),
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
