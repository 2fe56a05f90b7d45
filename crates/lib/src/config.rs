//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.parley/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_BASE_URL;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where the client finds the message service.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Reference message service bind settings (`parley serve`).
    #[serde(default)]
    pub server: ServerConfig,
}

/// Client-side settings for the remote message service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Base URL (default "http://127.0.0.1:8000"). Overridden by PARLEY_API_URL env.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Bind address and port for the reference message service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port (default 8000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,

    /// SQLite database file. Relative paths are resolved against the config file's parent.
    /// Omit to use `messages.db` next to the config file.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_server_port() -> u16 {
    8000
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
            database: None,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim().trim_end_matches('/');
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Resolve the message service base URL: env PARLEY_API_URL overrides config. No trailing slash.
pub fn resolve_base_url(config: &Config) -> String {
    std::env::var("PARLEY_API_URL")
        .ok()
        .and_then(|s| non_empty(&s))
        .or_else(|| non_empty(&config.service.base_url))
        .unwrap_or_else(default_base_url)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PARLEY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".parley").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the reference service's database file: `server.database` if set (relative paths
/// resolved against the config file's parent), otherwise `messages.db` in the config directory.
pub fn resolve_database_path(config: &Config, config_path: &Path) -> PathBuf {
    let dir = config_dir(config_path);
    match &config.server.database {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                dir.join(d)
            }
        }
        _ => dir.join("messages.db"),
    }
}

/// Load config from the given path, or the default path (or PARLEY_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn empty_object_parses_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.service.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn camel_case_fields() {
        let config: Config = serde_json::from_str(
            r#"{"service":{"baseUrl":"http://chat.local:9000/"},"server":{"port":9000,"database":"chat.db"}}"#,
        )
        .unwrap();
        assert_eq!(config.service.base_url, "http://chat.local:9000/");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.database, Some(PathBuf::from("chat.db")));
    }

    #[test]
    fn database_path_defaults_next_to_config() {
        let config = Config::default();
        let path = Path::new("/home/user/.parley/config.json");
        assert_eq!(
            resolve_database_path(&config, path),
            PathBuf::from("/home/user/.parley/messages.db")
        );
    }

    #[test]
    fn database_path_override_relative_and_absolute() {
        let mut config = Config::default();
        let path = Path::new("/home/user/.parley/config.json");
        config.server.database = Some(PathBuf::from("data/chat.db"));
        assert_eq!(
            resolve_database_path(&config, path),
            PathBuf::from("/home/user/.parley/data/chat.db")
        );
        config.server.database = Some(PathBuf::from("/var/lib/parley/chat.db"));
        assert_eq!(
            resolve_database_path(&config, path),
            PathBuf::from("/var/lib/parley/chat.db")
        );
    }

    #[test]
    fn non_empty_trims_whitespace_and_slash() {
        assert_eq!(non_empty(" http://h:1/ "), Some("http://h:1".to_string()));
        assert_eq!(non_empty("  "), None);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let path = std::env::temp_dir()
            .join(format!("parley-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.server.port, 8000);
    }
}
