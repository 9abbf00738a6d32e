//! Filter list retrieval with an on-disk cache
//!
//! Each list is cached as `<name>.txt` next to `<name>.meta.json`, which
//! records when it was last downloaded. A fresh cache skips the network; a
//! failed download falls back to whatever copy is on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::FilterList;
use crate::error::{FetchError, PersistenceError};

// =============================================================================
// Sources
// =============================================================================

/// Where raw list text comes from.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP(S) source; `file://` URLs and bare paths are read from disk.
pub struct HttpListSource {
    client: Client,
}

impl HttpListSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("NuruBrowser/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

fn local_path(url: &str) -> Option<&Path> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(Path::new(path));
    }
    if url.contains("://") {
        None
    } else {
        Some(Path::new(url))
    }
}

#[async_trait]
impl ListSource for HttpListSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Some(path) = local_path(url) {
            return tokio::fs::read_to_string(path)
                .await
                .map_err(|source| FetchError::Local {
                    path: path.to_path_buf(),
                    source,
                });
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Persisted alongside each cached list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedListMetadata {
    /// Epoch milliseconds of the last successful download
    #[serde(rename = "lastUpdate", default)]
    pub last_update: u64,
}

impl CachedListMetadata {
    pub fn is_fresh(&self, now: u64, refresh_interval: Duration) -> bool {
        (now.saturating_sub(self.last_update) as u128) < refresh_interval.as_millis()
    }
}

/// Cache directory layout for downloaded lists.
#[derive(Debug, Clone)]
pub struct ListCache {
    dir: PathBuf,
}

impl ListCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cache_path(&self, list: &FilterList) -> PathBuf {
        self.dir.join(format!("{}.txt", list.cache_key()))
    }

    pub fn meta_path(&self, list: &FilterList) -> PathBuf {
        self.dir.join(format!("{}.meta.json", list.cache_key()))
    }

    pub async fn has_text(&self, list: &FilterList) -> bool {
        tokio::fs::try_exists(self.cache_path(list)).await.unwrap_or(false)
    }

    pub async fn read_text(&self, list: &FilterList) -> Result<String, PersistenceError> {
        let path = self.cache_path(list);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PersistenceError::io(path, e))
    }

    pub async fn write_text(&self, list: &FilterList, text: &str) -> Result<(), PersistenceError> {
        let path = self.cache_path(list);
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| PersistenceError::io(path, e))
    }

    /// Missing or unreadable metadata counts as never downloaded.
    pub async fn read_metadata(&self, list: &FilterList) -> CachedListMetadata {
        let path = self.meta_path(list);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(_) => return CachedListMetadata::default(),
        };
        match serde_json::from_str(&text) {
            Ok(meta) => meta,
            Err(e) => {
                error!("Error reading metadata for {}: {}", list.name, e);
                CachedListMetadata::default()
            }
        }
    }

    pub async fn write_metadata(
        &self,
        list: &FilterList,
        meta: CachedListMetadata,
    ) -> Result<(), PersistenceError> {
        let path = self.meta_path(list);
        let json = serde_json::to_string(&meta).map_err(|e| PersistenceError::json(&path, e))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| PersistenceError::io(path, e))
    }

    /// Delete the cached text and metadata of a list.
    pub async fn remove(&self, list: &FilterList) -> Result<(), PersistenceError> {
        for path in [self.cache_path(list), self.meta_path(list)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PersistenceError::io(path, e)),
            }
        }
        Ok(())
    }
}

// =============================================================================
// Fetcher
// =============================================================================

/// How the text of a list was obtained for this load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Cache was fresh; no network access
    Cached,
    /// Downloaded and written to the cache
    Downloaded,
    /// Download failed; the stale cached copy was used
    Stale,
    /// Download failed and no cache exists; list contributes no rules
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct FetchedList {
    pub outcome: FetchOutcome,
    pub text: Option<String>,
}

/// Applies the staleness and fallback policy on top of a [`ListSource`].
pub struct ListFetcher {
    source: Box<dyn ListSource>,
    cache: ListCache,
}

impl ListFetcher {
    pub fn new(source: Box<dyn ListSource>, cache: ListCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &ListCache {
        &self.cache
    }

    pub async fn obtain(&self, list: &FilterList, now: u64) -> FetchedList {
        let has_cache = self.cache.has_text(list).await;
        let meta = self.cache.read_metadata(list).await;

        if has_cache && meta.is_fresh(now, list.refresh_interval) {
            match self.cache.read_text(list).await {
                Ok(text) => {
                    return FetchedList {
                        outcome: FetchOutcome::Cached,
                        text: Some(text),
                    }
                }
                Err(e) => warn!("Cached copy of {} unreadable, downloading: {}", list.name, e),
            }
        }

        info!("Downloading blocklist: {}", list.name);
        match self.source.fetch(&list.source_url).await {
            Ok(text) => {
                if let Err(e) = self.cache.write_text(list, &text).await {
                    error!("Failed to cache {}: {}", list.name, e);
                } else if let Err(e) = self
                    .cache
                    .write_metadata(list, CachedListMetadata { last_update: now })
                    .await
                {
                    error!("Failed to write metadata for {}: {}", list.name, e);
                }
                FetchedList {
                    outcome: FetchOutcome::Downloaded,
                    text: Some(text),
                }
            }
            Err(e) => {
                error!("Error downloading {}: {}", list.name, e);
                if !has_cache {
                    warn!("No cached version of {} available", list.name);
                    return FetchedList {
                        outcome: FetchOutcome::Unavailable,
                        text: None,
                    };
                }
                match self.cache.read_text(list).await {
                    Ok(text) => {
                        warn!("Using stale cached copy of {}", list.name);
                        FetchedList {
                            outcome: FetchOutcome::Stale,
                            text: Some(text),
                        }
                    }
                    Err(e) => {
                        error!("Cached copy of {} unreadable: {}", list.name, e);
                        FetchedList {
                            outcome: FetchOutcome::Unavailable,
                            text: None,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory source: URLs map to bodies; unknown URLs fail with 404.
    #[derive(Clone, Default)]
    pub struct FakeSource {
        pub bodies: Arc<Mutex<HashMap<String, String>>>,
        pub calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        pub fn with(entries: &[(&str, &str)]) -> Self {
            let source = Self::default();
            for (url, body) in entries {
                source.set(url, body);
            }
            source
        }

        pub fn set(&self, url: &str, body: &str) {
            self.bodies.lock().unwrap().insert(url.to_string(), body.to_string());
        }

        pub fn fail(&self, url: &str) {
            self.bodies.lock().unwrap().remove(url);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or(FetchError::Status(404))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::testing::FakeSource;
    use super::*;

    const HOUR_MS: u64 = 60 * 60 * 1000;

    fn list() -> FilterList {
        FilterList::new("EasyList", "https://lists.test/easylist.txt", Duration::from_millis(HOUR_MS))
    }

    fn fetcher(dir: &TempDir, source: &FakeSource) -> ListFetcher {
        ListFetcher::new(Box::new(source.clone()), ListCache::new(dir.path()))
    }

    #[test]
    fn test_metadata_freshness() {
        let meta = CachedListMetadata { last_update: 1_000 };
        assert!(meta.is_fresh(1_000 + HOUR_MS - 1, Duration::from_millis(HOUR_MS)));
        assert!(!meta.is_fresh(1_000 + HOUR_MS, Duration::from_millis(HOUR_MS)));
        assert!(!CachedListMetadata::default().is_fresh(HOUR_MS * 2, Duration::from_millis(HOUR_MS)));
    }

    #[test]
    fn test_metadata_json_shape() {
        let json = serde_json::to_string(&CachedListMetadata { last_update: 42 }).unwrap();
        assert_eq!(json, r#"{"lastUpdate":42}"#);
    }

    #[tokio::test]
    async fn downloads_and_caches() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::with(&[("https://lists.test/easylist.txt", "||ads.test^")]);
        let fetcher = fetcher(&dir, &source);

        let fetched = fetcher.obtain(&list(), 10 * HOUR_MS).await;
        assert_eq!(fetched.outcome, FetchOutcome::Downloaded);
        assert_eq!(fetched.text.as_deref(), Some("||ads.test^"));

        let cache = fetcher.cache();
        assert_eq!(cache.read_text(&list()).await.unwrap(), "||ads.test^");
        assert_eq!(cache.read_metadata(&list()).await.last_update, 10 * HOUR_MS);
        assert!(cache.cache_path(&list()).ends_with("easylist.txt"));
        assert!(cache.meta_path(&list()).ends_with("easylist.meta.json"));
    }

    #[tokio::test]
    async fn fresh_cache_skips_network() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::with(&[("https://lists.test/easylist.txt", "||ads.test^")]);
        let fetcher = fetcher(&dir, &source);

        fetcher.obtain(&list(), 10 * HOUR_MS).await;
        let fetched = fetcher.obtain(&list(), 10 * HOUR_MS + 5).await;

        assert_eq!(fetched.outcome, FetchOutcome::Cached);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn stale_cache_is_refreshed() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::with(&[("https://lists.test/easylist.txt", "||old.test^")]);
        let fetcher = fetcher(&dir, &source);

        fetcher.obtain(&list(), 10 * HOUR_MS).await;
        source.set("https://lists.test/easylist.txt", "||new.test^");
        let fetched = fetcher.obtain(&list(), 12 * HOUR_MS).await;

        assert_eq!(fetched.outcome, FetchOutcome::Downloaded);
        assert_eq!(fetched.text.as_deref(), Some("||new.test^"));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn failed_download_falls_back_to_stale_cache() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::with(&[("https://lists.test/easylist.txt", "||ads.test^")]);
        let fetcher = fetcher(&dir, &source);

        fetcher.obtain(&list(), 10 * HOUR_MS).await;
        source.fail("https://lists.test/easylist.txt");
        let fetched = fetcher.obtain(&list(), 20 * HOUR_MS).await;

        assert_eq!(fetched.outcome, FetchOutcome::Stale);
        assert_eq!(fetched.text.as_deref(), Some("||ads.test^"));
        // Metadata is untouched so the next load retries
        assert_eq!(fetcher.cache().read_metadata(&list()).await.last_update, 10 * HOUR_MS);
    }

    #[tokio::test]
    async fn failed_download_without_cache_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default();
        let fetcher = fetcher(&dir, &source);

        let fetched = fetcher.obtain(&list(), HOUR_MS).await;
        assert_eq!(fetched.outcome, FetchOutcome::Unavailable);
        assert!(fetched.text.is_none());
    }

    #[tokio::test]
    async fn corrupt_metadata_forces_download() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::with(&[("https://lists.test/easylist.txt", "||ads.test^")]);
        let fetcher = fetcher(&dir, &source);

        fetcher.obtain(&list(), 10 * HOUR_MS).await;
        std::fs::write(fetcher.cache().meta_path(&list()), "{not json").unwrap();
        let fetched = fetcher.obtain(&list(), 10 * HOUR_MS + 1).await;

        assert_eq!(fetched.outcome, FetchOutcome::Downloaded);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn remove_deletes_both_files() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::with(&[("https://lists.test/easylist.txt", "||ads.test^")]);
        let fetcher = fetcher(&dir, &source);

        fetcher.obtain(&list(), HOUR_MS).await;
        fetcher.cache().remove(&list()).await.unwrap();
        assert!(!fetcher.cache().has_text(&list()).await);
        assert!(!fetcher.cache().meta_path(&list()).exists());
        // Removing again is not an error
        fetcher.cache().remove(&list()).await.unwrap();
    }

    #[tokio::test]
    async fn http_source_reads_local_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.txt");
        std::fs::write(&path, "||local.test^").unwrap();

        let source = HttpListSource::new(Duration::from_secs(1)).unwrap();
        let url = format!("file://{}", path.display());
        assert_eq!(source.fetch(&url).await.unwrap(), "||local.test^");

        let missing = dir.path().join("missing.txt");
        let err = source.fetch(&missing.display().to_string()).await.unwrap_err();
        assert!(matches!(err, FetchError::Local { .. }));
    }
}
