/*!
common/src/lib.rs

Shared configuration types and helpers for TechPulse.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default + override merging
- Credential lookup and sanitizing for the backend bearer token
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable consulted for the bearer token when `backend.token_env` is unset.
pub const DEFAULT_TOKEN_ENV: &str = "TECHPULSE_JWT_TOKEN";

/// News backend (HTTP) configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base address of the backend, e.g. "http://localhost:8000"
    pub base_url: String,
    /// Name of the environment variable holding the bearer token
    pub token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token_env: None,
            timeout_seconds: Some(30),
        }
    }
}

impl BackendConfig {
    /// Join an API path onto the configured base address.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid backend base_url: {}", self.base_url))?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path.trim_start_matches('/'))
            .with_context(|| format!("Failed to build endpoint for path: {}", path))
    }

    /// Read the bearer token from the environment, treating placeholder values as absent.
    pub fn credential(&self) -> Option<String> {
        let var = self.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
        std::env::var(var).ok().and_then(|v| sanitize_credential(&v))
    }
}

/// Chat socket configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// WebSocket endpoint, e.g. "ws://localhost:8000/ws/chat"
    pub socket_url: String,
    /// Greeting appended to the transcript when the socket opens
    pub welcome_message: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            socket_url: "ws://localhost:8000/ws/chat".to_string(),
            welcome_message: None,
        }
    }
}

/// Where the article handoff slot lives on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandoffConfig {
    pub dir: Option<String>,
}

impl HandoffConfig {
    /// Resolve the handoff directory, falling back to "data".
    pub fn dir(&self) -> PathBuf {
        PathBuf::from(self.dir.as_deref().unwrap_or("data"))
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Normalize a raw credential value. Build tooling tends to stringify missing
/// values, so `""`, `"null"` and `"undefined"` all mean "no credential".
pub fn sanitize_credential(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed {
        "" | "null" | "undefined" => None,
        token => Some(token.to_string()),
    }
}
