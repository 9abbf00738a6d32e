//! Nuru blocklist engine
//!
//! Downloads and caches filter lists, keeps user-added filters on disk and
//! publishes a rule store that the host's request interceptor queries for
//! every outgoing request.
//!
//! ```no_run
//! # async fn run() -> nb_engine::EngineResult<()> {
//! use nb_engine::{BlocklistEngine, EngineConfig, RequestFilter};
//!
//! let engine = BlocklistEngine::with_http(EngineConfig::new("/var/lib/nuru"))?;
//! if let Err(e) = engine.initialize().await {
//!     log::warn!("blocking unavailable: {}", e);
//! }
//! let decision = engine.on_before_request("https://ads.example.com/x.js");
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod custom;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod intercept;
pub mod stats;

pub use config::{default_filter_lists, validate_settings, EngineConfig, FilterList, Settings};
pub use custom::CustomFilterEntry;
pub use engine::{BlocklistEngine, EngineState, ListReport, LoadReport};
pub use error::{EngineError, EngineResult, FetchError, PersistenceError};
pub use fetcher::{FetchOutcome, HttpListSource, ListSource};
pub use intercept::{RequestDecision, RequestFilter};
pub use stats::StatisticsSnapshot;

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock in epoch milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
