//! Runtime settings.
//!
//! Settings come from a JSON file (`conf.json` unless
//! `LOCATION_LISTENER_CONFIG` points elsewhere) laid out as
//!
//! ```json
//! {
//!   "api": {
//!     "api_urls": { "ztm_bus_tram_url": "...", "ztm_stop_url": "..." },
//!     "api_keys": { "ztm_key": "..." },
//!     "poll_interval_secs": 22
//!   },
//!   "logging": { "file_path": "logs/location_listener.log" },
//!   "export": { "directory": "data" }
//! }
//! ```
//!
//! Every field is optional. `ZTM_API_KEY` overrides the key from the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error};

pub const CONFIG_PATH_ENV: &str = "LOCATION_LISTENER_CONFIG";
pub const API_KEY_ENV: &str = "ZTM_API_KEY";
const DEFAULT_CONFIG_PATH: &str = "conf.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub api_urls: ApiUrls,
    pub api_keys: ApiKeys,
    /// Delay between two successful polls of the same endpoint.
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiUrls {
    pub ztm_bus_tram_url: String,
    pub ztm_stop_url: String,
    pub nominatim_url: String,
    pub ipinfo_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub ztm_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: PathBuf,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_urls: ApiUrls::default(),
            api_keys: ApiKeys::default(),
            poll_interval_secs: 22,
        }
    }
}

impl Default for ApiUrls {
    fn default() -> Self {
        Self {
            ztm_bus_tram_url: "https://api.um.warszawa.pl/api/action/busestrams_get/".to_string(),
            ztm_stop_url: "https://api.um.warszawa.pl/api/action/dbtimetable_get/".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            ipinfo_url: "https://ipinfo.io".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file_path: "logs/location_listener.log".to_string(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data"),
        }
    }
}

impl ApiSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Settings {
    /// Reads settings from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(settings)
    }

    /// Loads the config file named by the environment, falling back to
    /// defaults when it does not exist, then applies env overrides.
    pub fn from_env() -> Result<Self> {
        let path = config_path();
        let mut settings = if path.exists() {
            Self::load(&path)?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                settings.api.api_keys.ztm_key = Some(key);
            }
        }

        Ok(settings)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Looks up `section.subsection.key` in a raw config document.
///
/// Strings are returned as-is, numbers and booleans in their JSON form;
/// `null`, objects and arrays count as missing.
pub fn lookup(doc: &Value, section: &str, subsection: &str, key: &str) -> Option<String> {
    match &doc[section][subsection][key] {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a single value from the config file at `path`.
pub fn load_config_from(
    path: impl AsRef<Path>,
    section: &str,
    subsection: &str,
    key: &str,
) -> Option<String> {
    let path = path.as_ref();
    let doc: Value = match std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?))
    {
        Ok(doc) => doc,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Error in function load_config");
            return None;
        }
    };

    let value = lookup(&doc, section, subsection, key);
    if value.is_none() {
        error!("Value for {key} not found in {section}");
    }
    value
}

/// Reads `section.subsection.key` from the configured file.
///
/// Library entry point for untyped lookups; the CLI reads [`Settings`].
pub fn load_config(section: &str, subsection: &str, key: &str) -> Option<String> {
    load_config_from(config_path(), section, subsection, key)
}

/// Reads `logging.subsection.key` from the configured file.
///
/// Library entry point, like [`load_config`].
pub fn load_logging_config(subsection: &str, key: &str) -> Option<String> {
    load_config("logging", subsection, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_point_at_public_services() {
        let settings = Settings::default();
        assert!(settings.api.api_urls.ztm_bus_tram_url.contains("busestrams_get"));
        assert!(settings.api.api_urls.ztm_stop_url.contains("dbtimetable_get"));
        assert_eq!(settings.api.poll_interval(), Duration::from_secs(22));
        assert!(settings.api.api_keys.ztm_key.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(r#"{"api": {"api_keys": {"ztm_key": "abc"}, "poll_interval_secs": 5}}"#);
        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.api.api_keys.ztm_key.as_deref(), Some("abc"));
        assert_eq!(settings.api.poll_interval_secs, 5);
        assert_eq!(settings.api.api_urls.ipinfo_url, "https://ipinfo.io");
        assert_eq!(settings.export.directory, PathBuf::from("data"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let file = write_config("{not json");
        assert!(Settings::load(file.path()).is_err());
    }

    #[test]
    fn lookup_reads_nested_values() {
        let doc = json!({"api": {"api_keys": {"ztm_key": "k", "nothing": null}, "n": {"x": 3}}});

        assert_eq!(lookup(&doc, "api", "api_keys", "ztm_key").as_deref(), Some("k"));
        assert_eq!(lookup(&doc, "api", "n", "x").as_deref(), Some("3"));
        assert_eq!(lookup(&doc, "api", "api_keys", "nothing"), None);
        assert_eq!(lookup(&doc, "missing", "api_keys", "ztm_key"), None);
    }

    #[test]
    fn load_config_from_missing_file_is_none() {
        assert_eq!(
            load_config_from("/definitely/not/here.json", "api", "api_keys", "ztm_key"),
            None
        );
    }

    #[test]
    fn load_config_from_file() {
        let file = write_config(r#"{"logging": {"handlers": {"level": "DEBUG"}}}"#);
        assert_eq!(
            load_config_from(file.path(), "logging", "handlers", "level").as_deref(),
            Some("DEBUG")
        );
    }
}
