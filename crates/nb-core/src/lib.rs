//! Nuru Blocklist Core Library
//!
//! This crate provides the rule store and request matching used by the Nuru
//! Browser ad blocker.
//!
//! # Architecture
//!
//! Filter lists are compiled (by `nb-compiler`) into a [`RuleStore`]: a set of
//! blocked domains plus an ordered list of URL regexes. The store is
//! immutable; matching borrows it and performs no I/O, so it can sit directly
//! behind a synchronous per-request network hook.
//!
//! # Modules
//!
//! - `url`: Fast URL parsing without allocations
//! - `host`: Hostname suffix walking for domain rules
//! - `exempt`: Requests that bypass every rule
//! - `store`: The compiled rule store
//! - `matcher`: Core request matching engine
//! - `types`: Shared type definitions

pub mod exempt;
pub mod host;
pub mod matcher;
pub mod store;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use host::walk_host_suffixes;
pub use matcher::Matcher;
pub use store::RuleStore;
pub use types::{BlockReason, RuleCounts, Verdict};
