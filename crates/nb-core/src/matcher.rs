//! Core Matching Engine
//!
//! This is the hot path - every request goes through here.
//! No I/O and no locking: the matcher borrows an immutable [`RuleStore`].

use std::borrow::Cow;

use log::trace;

use crate::exempt::{is_exempt_resource, is_internal_url};
use crate::store::RuleStore;
use crate::types::{BlockReason, Verdict};
use crate::url::ParsedUrl;

// =============================================================================
// Matcher
// =============================================================================

/// Request matcher over a rule store.
pub struct Matcher<'a> {
    store: &'a RuleStore,
}

impl<'a> Matcher<'a> {
    pub fn new(store: &'a RuleStore) -> Self {
        Self { store }
    }

    /// Match a request URL and return the decision.
    ///
    /// Order: browser-internal URLs, URL parsing (fail open), resource
    /// exemptions, domain suffix walk, then URL patterns in insertion order.
    /// Opaque URLs (`data:`, `blob:`, `about:`) have no host and only reach
    /// the pattern rules.
    pub fn match_url(&self, url: &str) -> Verdict {
        if is_internal_url(url) {
            return Verdict::allow();
        }

        let parsed = match ParsedUrl::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!("Allowing unparseable URL {url:?}: {e}");
                return Verdict::allow();
            }
        };

        if is_exempt_resource(url, parsed.path) {
            return Verdict::allow();
        }

        if parsed.has_host() {
            let host = normalize_host(parsed.host);
            if self.store.find_blocked_suffix(&host).is_some() {
                return Verdict::block(BlockReason::Domain);
            }
        }

        if self.store.find_matching_pattern(url).is_some() {
            return Verdict::block(BlockReason::Pattern);
        }

        Verdict::allow()
    }
}

/// Lowercase the host only when it contains uppercase ASCII.
fn normalize_host(host: &str) -> Cow<'_, str> {
    if host.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(host.to_ascii_lowercase())
    } else {
        Cow::Borrowed(host)
    }
}

#[cfg(test)]
mod tests {
    use regex::RegexBuilder;

    use super::*;

    fn store(domains: &[&str], patterns: &[&str]) -> RuleStore {
        RuleStore::new(
            domains.iter().map(|d| d.to_string()).collect(),
            patterns
                .iter()
                .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_domain_and_subdomain_block() {
        let s = store(&["doubleclick.net"], &[]);
        let m = Matcher::new(&s);
        assert_eq!(m.match_url("https://doubleclick.net/pixel"), Verdict::block(BlockReason::Domain));
        assert_eq!(m.match_url("https://sub.doubleclick.net/x"), Verdict::block(BlockReason::Domain));
        assert_eq!(m.match_url("https://www.doubleclick.net/x"), Verdict::block(BlockReason::Domain));
        assert_eq!(m.match_url("https://DoubleClick.NET:443/x"), Verdict::block(BlockReason::Domain));
        assert_eq!(m.match_url("https://example.com/x"), Verdict::allow());
    }

    #[test]
    fn test_pattern_block() {
        let s = store(&[], &["example\\.com/ads.*"]);
        let m = Matcher::new(&s);
        assert_eq!(
            m.match_url("https://example.com/ads/banner.js"),
            Verdict::block(BlockReason::Pattern)
        );
        assert_eq!(m.match_url("https://example.com/content.js"), Verdict::allow());
    }

    #[test]
    fn test_domain_checked_before_patterns() {
        let s = store(&["ads.example.com"], &["ads"]);
        let m = Matcher::new(&s);
        assert_eq!(m.match_url("https://ads.example.com/ads"), Verdict::block(BlockReason::Domain));
    }

    #[test]
    fn test_exemptions_take_priority() {
        let s = store(&["ads.example.com"], &[".*"]);
        let m = Matcher::new(&s);
        assert!(!m.match_url("https://ads.example.com/favicon.ico").blocked);
        assert!(!m.match_url("https://ads.example.com/theme.css").blocked);
        assert!(!m.match_url("https://ads.example.com/fonts/a.woff2").blocked);
        assert!(!m.match_url("file:///tmp/ads.example.com").blocked);
        assert!(!m.match_url("chrome-extension://id/ads.js").blocked);
        assert!(!m.match_url("devtools://devtools/bundled/x.js").blocked);
        assert!(m.match_url("https://ads.example.com/script.js").blocked);
    }

    #[test]
    fn test_malformed_url_fails_open() {
        let s = store(&["example.com"], &[".*"]);
        let m = Matcher::new(&s);
        assert_eq!(m.match_url("not a url at all"), Verdict::allow());
        assert_eq!(m.match_url("https:///nohost"), Verdict::allow());
        assert_eq!(m.match_url(""), Verdict::allow());
    }

    #[test]
    fn test_opaque_urls_reach_pattern_rules() {
        let s = store(&["ads"], &["ads"]);
        let m = Matcher::new(&s);
        assert_eq!(m.match_url("data:text/javascript,ads()"), Verdict::block(BlockReason::Pattern));
        assert_eq!(m.match_url("blob:https://x.com/ads-uuid"), Verdict::block(BlockReason::Pattern));
        assert_eq!(m.match_url("about:ads"), Verdict::block(BlockReason::Pattern));
        assert_eq!(m.match_url("about:blank"), Verdict::allow());
    }

    #[test]
    fn test_opaque_url_exemptions() {
        let s = store(&[], &[".*"]);
        let m = Matcher::new(&s);
        assert!(!m.match_url("data:text/css,body{}").blocked);
        assert!(!m.match_url("data:font/woff2;base64,AAAA").blocked);
        assert!(m.match_url("data:text/javascript,x()").blocked);
    }
}
