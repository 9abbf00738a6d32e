//! The blocklist engine: owns the active rule store and everything that
//! rebuilds it.
//!
//! `evaluate` only reads the current store through an [`ArcSwap`], so it
//! never waits on a reload. Reloads build a complete new store and publish
//! it with a single swap.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::Mutex;

use nb_compiler::{ListStats, RuleStoreBuilder};
use nb_core::{RuleCounts, RuleStore, Verdict};

use crate::config::{validate_settings, EngineConfig, Settings};
use crate::custom::{is_valid_filter_id, next_filter_id, CustomFilterEntry, CustomFilterStore};
use crate::error::{EngineError, EngineResult, PersistenceError};
use crate::fetcher::{FetchOutcome, HttpListSource, ListCache, ListFetcher, ListSource};
use crate::now_millis;
use crate::stats::{Statistics, StatisticsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Loading,
            2 => EngineState::Ready,
            _ => EngineState::Uninitialized,
        }
    }
}

/// Result of one configured filter list in a load cycle.
#[derive(Debug, Clone)]
pub struct ListReport {
    pub name: String,
    pub outcome: FetchOutcome,
    pub stats: ListStats,
}

/// Summary of a completed [`BlocklistEngine::load_all`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub lists: Vec<ListReport>,
    /// Combined stats of all enabled custom filters
    pub custom: ListStats,
    /// Totals of the store that was swapped in
    pub counts: RuleCounts,
}

pub struct BlocklistEngine {
    config: EngineConfig,
    fetcher: ListFetcher,
    custom: CustomFilterStore,
    custom_entries: Mutex<Vec<CustomFilterEntry>>,
    store: ArcSwap<RuleStore>,
    enabled: AtomicBool,
    settings: std::sync::Mutex<Settings>,
    state: AtomicU8,
    stats: Statistics,
    reload: Mutex<()>,
    /// Unreadable custom filter metadata could not be moved aside; it is
    /// never overwritten while set.
    custom_read_only: AtomicBool,
}

impl BlocklistEngine {
    pub fn new(config: EngineConfig, source: Box<dyn ListSource>) -> Self {
        let fetcher = ListFetcher::new(source, ListCache::new(&config.cache_dir));
        let custom = CustomFilterStore::new(&config.filters_dir);
        Self {
            config,
            fetcher,
            custom,
            custom_entries: Mutex::new(Vec::new()),
            store: ArcSwap::from_pointee(RuleStore::empty()),
            enabled: AtomicBool::new(true),
            settings: std::sync::Mutex::new(Settings::default()),
            state: AtomicU8::new(EngineState::Uninitialized as u8),
            stats: Statistics::new(now_millis()),
            reload: Mutex::new(()),
            custom_read_only: AtomicBool::new(false),
        }
    }

    /// Engine backed by [`HttpListSource`].
    pub fn with_http(config: EngineConfig) -> EngineResult<Self> {
        let source = HttpListSource::new(config.fetch_timeout)
            .map_err(|e| EngineError::Initialization(e.to_string()))?;
        Ok(Self::new(config, Box::new(source)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn rule_counts(&self) -> RuleCounts {
        self.store.load().counts()
    }

    /// The store `evaluate` currently reads.
    pub fn current_store(&self) -> Arc<RuleStore> {
        self.store.load_full()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Prepare storage, restore settings and custom filters, then load every
    /// list.
    ///
    /// On failure the error is logged and returned, and the engine is left
    /// `Ready` with an empty rule set and blocking disabled.
    pub async fn initialize(&self) -> EngineResult<LoadReport> {
        match self.try_initialize().await {
            Ok(report) => {
                info!("Ad Blocker initialized");
                Ok(report)
            }
            Err(e) => {
                error!("Ad Blocker initialization failed: {}", e);
                self.store.store(Arc::new(RuleStore::empty()));
                self.enabled.store(false, Ordering::Relaxed);
                self.set_state(EngineState::Ready);
                Err(e)
            }
        }
    }

    async fn try_initialize(&self) -> EngineResult<LoadReport> {
        self.set_state(EngineState::Loading);

        let cache_dir = &self.config.cache_dir;
        tokio::fs::create_dir_all(cache_dir)
            .await
            .map_err(|e| EngineError::Initialization(PersistenceError::io(cache_dir, e).to_string()))?;
        self.custom
            .ensure_initialized()
            .await
            .map_err(|e| EngineError::Initialization(e.to_string()))?;

        let settings = self.load_settings().await;
        self.enabled.store(settings.enabled, Ordering::Relaxed);
        *self.settings_guard() = settings;

        let entries = match self.custom.load().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error loading custom filters: {}", e);
                match self.custom.backup_metadata(now_millis()).await {
                    Ok(backup) => warn!("Moved unreadable custom filter metadata to {}", backup.display()),
                    Err(e) => {
                        error!("Custom filter changes will not be saved: {}", e);
                        self.custom_read_only.store(true, Ordering::Relaxed);
                    }
                }
                Vec::new()
            }
        };
        if !entries.is_empty() {
            info!("Found {} custom filters", entries.len());
        }
        *self.custom_entries.lock().await = entries;

        Ok(self.load_all().await)
    }

    async fn load_settings(&self) -> Settings {
        let path = self.config.settings_path();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                error!("Error loading ad blocker settings: {}", PersistenceError::io(path, e));
                return Settings::default();
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(raw) => {
                info!("Loaded saved ad blocker settings");
                validate_settings(Some(&raw))
            }
            Err(e) => {
                error!("Error loading ad blocker settings: {}", PersistenceError::json(path, e));
                Settings::default()
            }
        }
    }

    /// Rebuild the rule store from every configured list plus the enabled
    /// custom filters, then swap it in.
    ///
    /// Reloads run one at a time; a reload requested while another is in
    /// flight waits for it and then runs, so the latest request wins.
    pub async fn load_all(&self) -> LoadReport {
        let _reload = self.reload.lock().await;
        self.set_state(EngineState::Loading);

        let now = now_millis();
        let mut builder = RuleStoreBuilder::new();
        let mut lists = Vec::with_capacity(self.config.filter_lists.len());

        for list in &self.config.filter_lists {
            let fetched = self.fetcher.obtain(list, now).await;
            if fetched.outcome == FetchOutcome::Downloaded {
                self.stats.set_last_update(now);
            }
            let stats = match fetched.text.as_deref() {
                Some(text) => builder.add_list(&list.name, text),
                None => ListStats::default(),
            };
            info!(
                "Loaded {}: {} domains, {} patterns ({:?})",
                list.name, stats.domains, stats.patterns, fetched.outcome
            );
            lists.push(ListReport {
                name: list.name.clone(),
                outcome: fetched.outcome,
                stats,
            });
        }

        let entries = self.custom_entries.lock().await.clone();
        let mut custom = ListStats::default();
        for entry in entries.iter().filter(|e| e.enabled) {
            let text = self.custom.read_rule(entry).await;
            let stats = builder.add_list(&entry.id, &text);
            custom.lines += stats.lines;
            custom.domains += stats.domains;
            custom.patterns += stats.patterns;
            custom.skipped += stats.skipped;
            custom.invalid += stats.invalid;
        }

        let store = builder.build();
        let counts = store.counts();
        self.store.store(Arc::new(store));
        self.set_state(EngineState::Ready);

        info!(
            "Blocklists loaded: {} domains, {} patterns",
            counts.domains, counts.patterns
        );
        LoadReport {
            lists,
            custom,
            counts,
        }
    }

    /// Drop every cached list so the following load downloads them again.
    pub async fn force_update(&self) -> LoadReport {
        let cache = self.fetcher.cache();
        for list in &self.config.filter_lists {
            if let Err(e) = cache.remove(list).await {
                error!("Failed to clear cache for {}: {}", list.name, e);
            }
        }
        let report = self.load_all().await;
        info!("Ad Blocker lists updated");
        report
    }

    // =========================================================================
    // Custom filters
    // =========================================================================

    pub async fn custom_filters(&self) -> Vec<CustomFilterEntry> {
        self.custom_entries.lock().await.clone()
    }

    /// Persist a new rule and rebuild. Returns the new filter id.
    pub async fn add_custom_filter(&self, rule: &str) -> EngineResult<String> {
        if rule.trim().is_empty() {
            return Err(EngineError::InvalidRule);
        }

        let id = {
            let mut entries = self.custom_entries.lock().await;
            let now = now_millis();
            let entry = CustomFilterEntry {
                id: next_filter_id(&entries, now),
                rule: rule.to_string(),
                enabled: true,
                added: now,
            };
            if let Err(e) = self.custom.write_rule(&entry).await {
                error!("Error adding custom filter: {}", e);
            }
            entries.push(entry.clone());
            self.persist_custom(&entries).await;
            entry.id
        };

        info!("Added custom filter: {}", rule);
        self.load_all().await;
        Ok(id)
    }

    pub async fn remove_custom_filter(&self, id: &str) -> EngineResult<()> {
        if !is_valid_filter_id(id) {
            return Err(EngineError::InvalidFilterId);
        }

        let removed = {
            let mut entries = self.custom_entries.lock().await;
            let index = entries
                .iter()
                .position(|e| e.id == id)
                .ok_or_else(|| EngineError::FilterNotFound(id.to_string()))?;
            let removed = entries.remove(index);
            self.persist_custom(&entries).await;
            if let Err(e) = self.custom.remove_rule(id).await {
                error!("Error removing custom filter file: {}", e);
            }
            removed
        };

        info!("Removed custom filter: {}", removed.rule);
        self.load_all().await;
        Ok(())
    }

    pub async fn set_custom_filter_enabled(&self, id: &str, enabled: bool) -> EngineResult<()> {
        if !is_valid_filter_id(id) {
            return Err(EngineError::InvalidFilterId);
        }

        {
            let mut entries = self.custom_entries.lock().await;
            let entry = entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| EngineError::FilterNotFound(id.to_string()))?;
            if entry.enabled == enabled {
                return Ok(());
            }
            entry.enabled = enabled;
            self.persist_custom(&entries).await;
        }

        info!("Custom filter {} {}", id, if enabled { "enabled" } else { "disabled" });
        self.load_all().await;
        Ok(())
    }

    async fn persist_custom(&self, entries: &[CustomFilterEntry]) {
        if self.custom_read_only.load(Ordering::Relaxed) {
            warn!("Custom filter metadata left untouched; changes are kept in memory only");
            return;
        }
        if let Err(e) = self.custom.save(entries).await {
            error!("Error saving custom filter metadata: {}", e);
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Takes effect on the next `evaluate`; no reload.
    ///
    /// `settings.json` is written with blocking I/O on the caller's thread
    /// while the settings lock is held, so concurrent writers persist in
    /// the order they took the lock.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!("Ad Blocker {}", if enabled { "enabled" } else { "disabled" });

        let mut settings = self.settings_guard();
        settings.enabled = enabled;
        self.persist_settings(&settings);
    }

    /// Apply loosely-typed settings from the settings UI.
    pub fn update_settings(&self, raw: &Value) -> Settings {
        self.apply_settings(validate_settings(Some(raw)))
    }

    pub fn reset_to_defaults(&self) -> Settings {
        self.apply_settings(Settings::default())
    }

    pub fn settings(&self) -> Settings {
        self.settings_guard().clone()
    }

    fn apply_settings(&self, validated: Settings) -> Settings {
        self.enabled.store(validated.enabled, Ordering::Relaxed);
        let mut settings = self.settings_guard();
        *settings = validated;
        info!("Ad Blocker settings updated");
        self.persist_settings(&settings);
        settings.clone()
    }

    fn persist_settings(&self, settings: &Settings) {
        if let Err(e) = self.write_settings(settings) {
            error!("Error saving ad blocker settings: {}", e);
        }
    }

    fn write_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        let dir = &self.config.cache_dir;
        std::fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
        let path = self.config.settings_path();
        let json = serde_json::to_string_pretty(settings).map_err(|e| PersistenceError::json(&path, e))?;
        std::fs::write(&path, json).map_err(|e| PersistenceError::io(path, e))
    }

    fn settings_guard(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Decide one outgoing request. Never blocks on I/O.
    ///
    /// While disabled every request is allowed and nothing is counted.
    pub fn evaluate(&self, url: &str) -> Verdict {
        if !self.is_enabled() {
            return Verdict::allow();
        }

        self.stats.inc_total();
        let verdict = self.store.load().evaluate(url);
        if verdict.is_blocked() {
            self.stats.inc_blocked();
            debug!("{}: {}", verdict, url);
        }
        verdict
    }

    pub fn get_statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for BlocklistEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlocklistEngine")
            .field("state", &self.state())
            .field("enabled", &self.is_enabled())
            .field("rules", &self.rule_counts())
            .finish()
    }
}
