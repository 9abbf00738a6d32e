//! Engine configuration and persisted user settings
//!
//! Paths are resolved by the caller and passed in up front; nothing here
//! discovers directories lazily.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PersistenceError;

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A named remote rule source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterList {
    pub name: String,
    #[serde(alias = "url")]
    pub source_url: String,
    /// Age after which the cached copy is re-downloaded
    #[serde(rename = "updateInterval", with = "duration_ms", default = "default_refresh_interval")]
    pub refresh_interval: Duration,
}

impl FilterList {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>, refresh_interval: Duration) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            refresh_interval,
        }
    }

    /// File stem used for the cached copy and its metadata.
    pub fn cache_key(&self) -> String {
        self.name.to_lowercase()
    }
}

pub fn default_filter_lists() -> Vec<FilterList> {
    vec![
        FilterList::new("EasyList", "https://easylist.to/easylist/easylist.txt", WEEK),
        FilterList::new("EasyPrivacy", "https://easylist.to/easylist/easyprivacy.txt", WEEK),
    ]
}

fn default_refresh_interval() -> Duration {
    WEEK
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

/// Runtime configuration of a [`crate::BlocklistEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub storage_root: PathBuf,
    /// Cached list text, list metadata and `settings.json`
    pub cache_dir: PathBuf,
    /// Custom filter rule files and their `metadata.json`
    pub filters_dir: PathBuf,
    pub filter_lists: Vec<FilterList>,
    pub fetch_timeout: Duration,
}

impl EngineConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        let storage_root = storage_root.into();
        Self {
            cache_dir: storage_root.join("ad-blocker-cache"),
            filters_dir: storage_root.join("ad-blocker-filters"),
            storage_root,
            filter_lists: default_filter_lists(),
            fetch_timeout: Duration::from_secs(default_fetch_timeout_secs()),
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_filters_dir(mut self, filters_dir: impl Into<PathBuf>) -> Self {
        self.filters_dir = filters_dir.into();
        self
    }

    pub fn with_filter_lists(mut self, filter_lists: Vec<FilterList>) -> Self {
        self.filter_lists = filter_lists;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn settings_path(&self) -> PathBuf {
        self.cache_dir.join("settings.json")
    }

    /// Load a JSON config file. Relative directories resolve against
    /// `storageRoot`.
    pub fn from_json_file(path: &Path) -> Result<Self, PersistenceError> {
        let text = std::fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        let file: ConfigFile = serde_json::from_str(&text).map_err(|e| PersistenceError::json(path, e))?;
        Ok(file.into_config())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    storage_root: PathBuf,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    filters_dir: Option<PathBuf>,
    #[serde(default = "default_filter_lists")]
    filter_lists: Vec<FilterList>,
    #[serde(default = "default_fetch_timeout_secs")]
    fetch_timeout_secs: u64,
}

impl ConfigFile {
    fn into_config(self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.storage_root)
            .with_filter_lists(self.filter_lists)
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs));
        if let Some(dir) = self.cache_dir {
            config.cache_dir = self.storage_root.join(dir);
        }
        if let Some(dir) = self.filters_dir {
            config.filters_dir = self.storage_root.join(dir);
        }
        config
    }
}

// =============================================================================
// User Settings
// =============================================================================

/// User-facing settings persisted to `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub custom_filters: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_filters: Vec::new(),
        }
    }
}

/// Validate loosely-typed settings into a fully-populated [`Settings`].
///
/// `enabled` is taken only when it is a boolean and `customFilters` only
/// when it is an array (non-string entries are dropped); everything else
/// falls back to the defaults.
pub fn validate_settings(raw: Option<&Value>) -> Settings {
    let mut validated = Settings::default();

    let Some(obj) = raw.and_then(Value::as_object) else {
        return validated;
    };

    if let Some(enabled) = obj.get("enabled").and_then(Value::as_bool) {
        validated.enabled = enabled;
    }

    if let Some(filters) = obj.get("customFilters").and_then(Value::as_array) {
        validated.custom_filters = filters
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
    }

    validated
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_paths() {
        let config = EngineConfig::new("/data/nuru");
        assert_eq!(config.cache_dir, PathBuf::from("/data/nuru/ad-blocker-cache"));
        assert_eq!(config.filters_dir, PathBuf::from("/data/nuru/ad-blocker-filters"));
        assert_eq!(config.settings_path(), PathBuf::from("/data/nuru/ad-blocker-cache/settings.json"));
        assert_eq!(config.filter_lists.len(), 2);
        assert_eq!(config.filter_lists[0].cache_key(), "easylist");
        assert_eq!(config.filter_lists[1].refresh_interval, WEEK);

        let moved = config.with_filters_dir("/mnt/filters").with_cache_dir("/mnt/cache");
        assert_eq!(moved.filters_dir, PathBuf::from("/mnt/filters"));
        assert_eq!(moved.settings_path(), PathBuf::from("/mnt/cache/settings.json"));
        assert_eq!(moved.storage_root, PathBuf::from("/data/nuru"));
    }

    #[test]
    fn test_validate_settings_defaults() {
        assert_eq!(validate_settings(None), Settings::default());
        assert_eq!(validate_settings(Some(&json!("nope"))), Settings::default());
        assert_eq!(validate_settings(Some(&json!({}))), Settings::default());
    }

    #[test]
    fn test_validate_settings_types() {
        let raw = json!({ "enabled": "false", "customFilters": "||a.com^" });
        assert_eq!(validate_settings(Some(&raw)), Settings::default());

        let raw = json!({ "enabled": false, "customFilters": ["||a.com^", 3, null] });
        assert_eq!(
            validate_settings(Some(&raw)),
            Settings {
                enabled: false,
                custom_filters: vec!["||a.com^".to_string()],
            }
        );
    }

    #[test]
    fn test_filter_list_json() {
        let list: FilterList = serde_json::from_value(json!({
            "name": "Local",
            "url": "file:///tmp/list.txt",
            "updateInterval": 60000
        }))
        .unwrap();
        assert_eq!(list.source_url, "file:///tmp/list.txt");
        assert_eq!(list.refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("blocker.json");
        std::fs::write(
            &path,
            r#"{ "storageRoot": "/srv/nuru", "cacheDir": "cache", "fetchTimeoutSecs": 5, "filterLists": [] }"#,
        )
        .unwrap();

        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/srv/nuru/cache"));
        assert_eq!(config.filters_dir, PathBuf::from("/srv/nuru/ad-blocker-filters"));
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert!(config.filter_lists.is_empty());
    }
}
