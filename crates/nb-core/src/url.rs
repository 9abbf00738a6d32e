//! Fast URL parsing utilities for the hot path
//!
//! These functions avoid allocations and work directly on string slices.
//! Only the pieces the matcher needs are extracted: scheme, hostname and path.

use thiserror::Error;

/// Why a request URL could not be split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL has no scheme")]
    MissingScheme,
    #[error("URL has no host")]
    EmptyHost,
}

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    if colon_pos == 0 {
        return None;
    }

    if bytes.len() > colon_pos + 2
        && bytes[colon_pos + 1] == b'/'
        && bytes[colon_pos + 2] == b'/'
    {
        return Some(colon_pos + 3);
    }

    None
}

/// Split `scheme:rest` at the first colon.
///
/// The scheme must start with an ASCII letter and continue with letters,
/// digits, `+`, `-` or `.`. Covers opaque URLs such as `data:`, `blob:` and
/// `about:` as well as hierarchical ones.
#[inline]
pub fn split_scheme(url: &str) -> Option<(&str, &str)> {
    let colon_pos = url.bytes().position(|b| b == b':')?;
    let scheme = &url[..colon_pos];
    let mut bytes = scheme.bytes();
    if !bytes.next()?.is_ascii_alphabetic() {
        return None;
    }
    if !bytes.all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.') {
        return None;
    }
    Some((scheme, &url[colon_pos + 1..]))
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Skip userinfo
    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'/' || b == b'?' || b == b'#' {
            break;
        }
        if b == b'@' {
            host_start = i + 1;
        }
    }

    // Bracketed IPv6 literal
    if bytes.get(host_start) == Some(&b'[') {
        let close = bytes[host_start..].iter().position(|&b| b == b']')?;
        return Some((host_start, host_start + close + 1));
    }

    let mut host_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(host_start) {
        if b == b'/' || b == b'?' || b == b'#' || b == b':' || b == b'\\' {
            host_end = i;
            break;
        }
    }

    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

// =============================================================================
// Path Extraction
// =============================================================================

/// Extract the path portion of a URL.
#[inline]
pub fn extract_path(url: &str) -> &str {
    let host_end = match get_host_position(url) {
        Some((_, end)) => end,
        None => return "/",
    };

    let bytes = url.as_bytes();

    let mut path_start = None;
    for (i, &b) in bytes.iter().enumerate().skip(host_end) {
        if b == b'/' {
            path_start = Some(i);
            break;
        }
        if b == b'?' || b == b'#' {
            return "/";
        }
    }

    let path_start = match path_start {
        Some(pos) => pos,
        None => return "/",
    };

    let mut path_end = bytes.len();
    for (i, &b) in bytes.iter().enumerate().skip(path_start) {
        if b == b'?' || b == b'#' {
            path_end = i;
            break;
        }
    }

    &url[path_start..path_end]
}

// =============================================================================
// Parsed URL
// =============================================================================

/// Borrowed view of the URL parts used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedUrl<'a> {
    pub scheme: &'a str,
    /// Hostname as written (callers lowercase it when needed); empty for
    /// opaque URLs like `data:` or `blob:`
    pub host: &'a str,
    pub path: &'a str,
}

impl<'a> ParsedUrl<'a> {
    pub fn parse(url: &'a str) -> Result<Self, UrlError> {
        let (scheme, rest) = split_scheme(url).ok_or(UrlError::MissingScheme)?;

        if !rest.starts_with("//") {
            return Ok(Self {
                scheme,
                host: "",
                path: opaque_path(rest),
            });
        }

        let host = extract_host(url).ok_or(UrlError::MissingScheme)?;
        if host.is_empty() {
            return Err(UrlError::EmptyHost);
        }
        Ok(Self {
            scheme,
            host,
            path: extract_path(url),
        })
    }

    pub fn has_host(&self) -> bool {
        !self.host.is_empty()
    }
}

/// Path of an opaque URL: everything after `scheme:` up to the query or
/// fragment.
fn opaque_path(rest: &str) -> &str {
    match rest.find(|c: char| c == '?' || c == '#') {
        Some(end) => &rest[..end],
        None => rest,
    }
}
