//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGATE_*)
//! 2. TOML config file (if OFFGATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGATE_*)
/// 2. TOML config file (if OFFGATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream origin the gateway fronts, e.g. "https://erp.example.com".
    ///
    /// Set via OFFGATE_UPSTREAM environment variable.
    /// Required at startup; there is nothing to proxy without it.
    #[serde(default)]
    pub upstream: Option<String>,

    /// Address the gateway listens on.
    ///
    /// Set via OFFGATE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite store database.
    ///
    /// Set via OFFGATE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Version-tagged store name. Changing it invalidates all previously
    /// captured entries on next activation.
    ///
    /// Set via OFFGATE_STORE_NAME environment variable.
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Shell URL paths precached at startup.
    ///
    /// Set via OFFGATE_SHELL_MANIFEST environment variable as a TOML-style
    /// list, e.g. `OFFGATE_SHELL_MANIFEST='["/", "/index.html"]'`.
    #[serde(default = "default_shell_manifest")]
    pub shell_manifest: Vec<String>,

    /// Shell path served when a document request fails at the network layer.
    ///
    /// Set via OFFGATE_SHELL_FALLBACK environment variable.
    #[serde(default = "default_shell_fallback")]
    pub shell_fallback: String,

    /// User-Agent string for upstream requests.
    ///
    /// Set via OFFGATE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per upstream request.
    ///
    /// Set via OFFGATE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via OFFGATE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgate-store.sqlite")
}

fn default_store_name() -> String {
    "offgate-cache-v1".into()
}

fn default_shell_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into()]
}

fn default_shell_fallback() -> String {
    "/".into()
}

fn default_user_agent() -> String {
    "offgate/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream: None,
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            store_name: default_store_name(),
            shell_manifest: default_shell_manifest(),
            shell_fallback: default_shell_fallback(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFGATE_`
    /// 2. TOML file from `OFFGATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFGATE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that an upstream origin is configured (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no upstream is set.
    pub fn require_upstream(&self) -> Result<&str, ConfigError> {
        self.upstream.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "upstream".into(),
            hint: "Set OFFGATE_UPSTREAM environment variable".into(),
        })
    }
}
