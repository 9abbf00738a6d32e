//! User-added filter rules
//!
//! Layout under the filters directory:
//!
//! ```text
//! metadata.json        [{"id": "...", "rule": "...", "enabled": true, "added": <epoch ms>}, ...]
//! custom_1712345678901 raw rule text, one file per entry
//! metadata.<ms>.json.bak  unreadable metadata moved aside at startup
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFilterEntry {
    pub id: String,
    pub rule: String,
    pub enabled: bool,
    /// Creation time, epoch milliseconds
    pub added: u64,
}

/// Ids double as file names, so anything that could escape the directory is
/// rejected.
pub fn is_valid_filter_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with("metadata.")
        && !id.starts_with('.')
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}

/// Next free `custom_<now>` id, suffixed when several filters are added
/// within the same millisecond.
pub fn next_filter_id(existing: &[CustomFilterEntry], now: u64) -> String {
    let base = format!("custom_{}", now);
    let taken = |candidate: &str| existing.iter().any(|e| e.id == candidate);
    if !taken(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[derive(Debug, Clone)]
pub struct CustomFilterStore {
    dir: PathBuf,
}

impl CustomFilterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join("metadata.json")
    }

    pub fn rule_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    pub fn backup_path(&self, now: u64) -> PathBuf {
        self.dir.join(format!("metadata.{}.json.bak", now))
    }

    /// Move an unreadable `metadata.json` aside so later saves start from an
    /// empty list without destroying it.
    pub async fn backup_metadata(&self, now: u64) -> Result<PathBuf, PersistenceError> {
        let from = self.metadata_path();
        let to = self.backup_path(now);
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| PersistenceError::io(from, e))?;
        Ok(to)
    }

    /// Create the directory and an empty `metadata.json` if missing.
    pub async fn ensure_initialized(&self) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?;

        let path = self.metadata_path();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::write(&path, "[]")
                .await
                .map_err(|e| PersistenceError::io(&path, e))?;
            log::info!("Created empty custom filters metadata file");
        }
        Ok(())
    }

    /// Read all entries. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<CustomFilterEntry>, PersistenceError> {
        let path = self.metadata_path();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(path, e)),
        };
        serde_json::from_str(&text).map_err(|e| PersistenceError::json(path, e))
    }

    pub async fn save(&self, entries: &[CustomFilterEntry]) -> Result<(), PersistenceError> {
        let path = self.metadata_path();
        let json = serde_json::to_string_pretty(entries).map_err(|e| PersistenceError::json(&path, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| PersistenceError::io(path, e))
    }

    pub async fn write_rule(&self, entry: &CustomFilterEntry) -> Result<(), PersistenceError> {
        let path = self.rule_path(&entry.id);
        tokio::fs::write(&path, &entry.rule)
            .await
            .map_err(|e| PersistenceError::io(path, e))
    }

    pub async fn remove_rule(&self, id: &str) -> Result<(), PersistenceError> {
        let path = self.rule_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    /// Rule text for an entry: the per-entry file when present, otherwise
    /// the copy kept in metadata.
    pub async fn read_rule(&self, entry: &CustomFilterEntry) -> String {
        match tokio::fs::read_to_string(self.rule_path(&entry.id)).await {
            Ok(text) => text,
            Err(_) => entry.rule.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn entry(id: &str, rule: &str) -> CustomFilterEntry {
        CustomFilterEntry {
            id: id.to_string(),
            rule: rule.to_string(),
            enabled: true,
            added: 1,
        }
    }

    #[test]
    fn test_filter_ids() {
        assert_eq!(next_filter_id(&[], 42), "custom_42");
        let existing = vec![entry("custom_42", "a"), entry("custom_42_1", "b")];
        assert_eq!(next_filter_id(&existing, 42), "custom_42_2");
        assert_eq!(next_filter_id(&existing, 43), "custom_43");
    }

    #[test]
    fn test_valid_filter_ids() {
        assert!(is_valid_filter_id("custom_1712345678901"));
        assert!(!is_valid_filter_id(""));
        assert!(!is_valid_filter_id("../settings.json"));
        assert!(!is_valid_filter_id("a/b"));
        assert!(!is_valid_filter_id("metadata.json"));
        assert!(!is_valid_filter_id("metadata.42.json.bak"));
        assert!(!is_valid_filter_id(".."));
    }

    #[tokio::test]
    async fn initializes_empty_metadata() {
        let dir = TempDir::new().unwrap();
        let store = CustomFilterStore::new(dir.path().join("filters"));

        store.ensure_initialized().await.unwrap();
        assert_eq!(std::fs::read_to_string(store.metadata_path()).unwrap(), "[]");
        assert!(store.load().await.unwrap().is_empty());

        // Existing metadata is left alone
        store.save(&[entry("custom_1", "||a.com^")]).await.unwrap();
        store.ensure_initialized().await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn saves_and_loads_entries() {
        let dir = TempDir::new().unwrap();
        let store = CustomFilterStore::new(dir.path());
        let entries = vec![entry("custom_1", "||a.com^"), entry("custom_2", "/ads/*")];

        store.save(&entries).await.unwrap();
        assert_eq!(store.load().await.unwrap(), entries);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.metadata_path()).unwrap()).unwrap();
        assert_eq!(raw[0]["id"], "custom_1");
        assert_eq!(raw[0]["rule"], "||a.com^");
        assert_eq!(raw[0]["enabled"], true);
        assert_eq!(raw[0]["added"], 1);
    }

    #[tokio::test]
    async fn invalid_metadata_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CustomFilterStore::new(dir.path());
        std::fs::write(store.metadata_path(), r#"{"not": "an array"}"#).unwrap();
        assert!(matches!(store.load().await, Err(PersistenceError::Json { .. })));
    }

    #[tokio::test]
    async fn unreadable_metadata_is_moved_aside() {
        let dir = TempDir::new().unwrap();
        let store = CustomFilterStore::new(dir.path());
        std::fs::write(store.metadata_path(), "[{broken").unwrap();

        let backup = store.backup_metadata(7).await.unwrap();
        assert_eq!(backup, store.backup_path(7));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "[{broken");
        assert!(!store.metadata_path().exists());
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rule_files_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CustomFilterStore::new(dir.path());
        let e = entry("custom_7", "||ads.example.com^");

        store.write_rule(&e).await.unwrap();
        assert_eq!(store.read_rule(&e).await, "||ads.example.com^");

        store.remove_rule("custom_7").await.unwrap();
        assert!(!store.rule_path("custom_7").exists());
        // Falls back to the metadata copy
        assert_eq!(store.read_rule(&e).await, "||ads.example.com^");
        store.remove_rule("custom_7").await.unwrap();
    }
}
