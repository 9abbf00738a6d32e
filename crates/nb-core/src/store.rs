//! In-memory rule store
//!
//! A store is built once per load cycle and never mutated afterwards; the
//! engine publishes a new store by swapping an `Arc`, so readers always see a
//! complete rule set.

use std::collections::HashSet;

use regex::Regex;

use crate::host::walk_host_suffixes;
use crate::types::{RuleCounts, Verdict};
use crate::matcher::Matcher;

/// Compiled blocking rules: an exact-match domain set and an ordered list of
/// URL patterns.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    domains: HashSet<String>,
    patterns: Vec<Regex>,
}

impl RuleStore {
    /// Empty store: every request is allowed.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from already-normalized parts. Domains are expected to
    /// be lowercase; patterns keep the given order.
    pub fn new(domains: HashSet<String>, patterns: Vec<Regex>) -> Self {
        Self { domains, patterns }
    }

    pub fn counts(&self) -> RuleCounts {
        RuleCounts {
            domains: self.domains.len(),
            patterns: self.patterns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.patterns.is_empty()
    }

    /// Exact membership test, no suffix walk.
    pub fn contains_domain(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    /// Find the first suffix of `host` present in the domain set.
    /// `host` must already be lowercase.
    pub fn find_blocked_suffix<'h>(&self, host: &'h str) -> Option<&'h str> {
        if self.domains.is_empty() {
            return None;
        }
        walk_host_suffixes(host).find(|suffix| self.domains.contains(*suffix))
    }

    /// Index of the first pattern matching `url`, in insertion order.
    pub fn find_matching_pattern(&self, url: &str) -> Option<usize> {
        self.patterns.iter().position(|pattern| pattern.is_match(url))
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }

    /// Pattern sources in match order.
    pub fn pattern_sources(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }

    /// Evaluate a request URL against this store.
    pub fn evaluate(&self, url: &str) -> Verdict {
        Matcher::new(self).match_url(url)
    }
}
