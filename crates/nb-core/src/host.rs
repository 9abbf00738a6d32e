//! Hostname suffix walking
//!
//! Domain rules block a host and every subdomain beneath it, so a lookup
//! walks the request host from most specific to least specific:
//!
//! ```
//! use nb_core::host::walk_host_suffixes;
//!
//! let suffixes: Vec<&str> = walk_host_suffixes("a.b.example.com").collect();
//! assert_eq!(suffixes, ["a.b.example.com", "b.example.com", "example.com", "com"]);
//! ```

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator for suffix-walking a host down to its last label.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> HostSuffixIter<'a> {
    pub fn new(host: &'a str) -> Self {
        let host = host.trim_end_matches('.');
        Self {
            current: if host.is_empty() { None } else { Some(host) },
        }
    }
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter::new(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_parent_domain() {
        assert_eq!(get_parent_domain("sub.example.com"), Some("example.com"));
        assert_eq!(get_parent_domain("example.com"), Some("com"));
        assert_eq!(get_parent_domain("com"), None);
        assert_eq!(get_parent_domain(""), None);
        assert_eq!(get_parent_domain("trailing."), None);
    }

    #[test]
    fn test_walk_single_label() {
        let suffixes: Vec<&str> = walk_host_suffixes("localhost").collect();
        assert_eq!(suffixes, ["localhost"]);
    }

    #[test]
    fn test_walk_empty_host() {
        assert_eq!(walk_host_suffixes("").count(), 0);
        assert_eq!(walk_host_suffixes(".").count(), 0);
    }

    #[test]
    fn test_walk_ignores_trailing_dot() {
        let suffixes: Vec<&str> = walk_host_suffixes("ads.example.com.").collect();
        assert_eq!(suffixes, ["ads.example.com", "example.com", "com"]);
    }
}
