use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::error::{AppError, AppResult};
use super::file_service::get_app_data_dir;

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000/";

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_document_timeout() -> u64 {
    120
}

fn default_ingest_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base address of the assistant service.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Safety window for a document request before the UI gives up on it.
    #[serde(default = "default_document_timeout")]
    pub document_timeout_secs: u64,
    #[serde(default = "default_ingest_timeout")]
    pub ingest_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            document_timeout_secs: default_document_timeout(),
            ingest_timeout_secs: default_ingest_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest_timeout_secs)
    }

    /// Resolve a service endpoint (`query/`, `add_source/`, `create/<id>`)
    /// against `server_url`.
    pub fn endpoint(&self, path: &str) -> AppResult<Url> {
        let mut base = parse_server_url(&self.server_url)?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path)?)
    }

    pub fn query_endpoint(&self) -> AppResult<Url> {
        self.endpoint("query/")
    }

    pub fn add_source_endpoint(&self) -> AppResult<Url> {
        self.endpoint("add_source/")
    }

    pub fn create_class_endpoint(&self, class_id: &str) -> AppResult<Url> {
        self.endpoint(&format!("create/{}", class_id))
    }
}

fn parse_server_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(AppError::Config(format!(
            "server URL must use ws:// or wss://, got {}://",
            other
        ))),
    }
}

fn get_config_path() -> AppResult<PathBuf> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn load_config() -> AppResult<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_config(config: &Config) -> AppResult<()> {
    let config_path = get_config_path()?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    Ok(())
}

/// Stored config with environment overrides applied.
pub fn effective_config() -> AppResult<Config> {
    let mut config = load_config()?;
    if let Ok(url) = std::env::var("EXAMLM_SERVER_URL") {
        if !url.trim().is_empty() {
            config.server_url = url;
        }
    }
    Ok(config)
}

pub fn set_server_url(url: &str) -> AppResult<Config> {
    let parsed = parse_server_url(url)?;
    let mut config = load_config().unwrap_or_default();
    config.server_url = parsed.to_string();
    save_config(&config)?;
    Ok(config)
}

pub fn set_document_timeout(secs: u64) -> AppResult<Config> {
    if secs == 0 {
        return Err(AppError::Config("document timeout must be at least one second".into()));
    }
    let mut config = load_config().unwrap_or_default();
    config.document_timeout_secs = secs;
    save_config(&config)?;
    Ok(config)
}
