//! Requests that are never blocked
//!
//! Browser-internal URLs and a handful of page resources (favicons, web
//! fonts, stylesheets) bypass every block rule. Both checks run before any
//! rule lookup.

/// Browser-internal request: local files, extensions and devtools.
#[inline]
pub fn is_internal_url(url: &str) -> bool {
    url.starts_with("file://")
        || url.starts_with("chrome-extension://")
        || url.contains("devtools://")
        || url.contains("chrome-devtools://")
}

const RESOURCE_MARKERS: [&str; 4] = [
    "/favicon.ico",
    "font-awesome",
    "fonts.googleapis.com",
    "fonts.gstatic.com",
];

/// Page resource that is always allowed: favicons, icon files, font CDNs,
/// and any path mentioning `css` or `font`.
#[inline]
pub fn is_exempt_resource(url: &str, path: &str) -> bool {
    url.ends_with(".ico")
        || RESOURCE_MARKERS.iter().any(|marker| url.contains(marker))
        || path.contains("css")
        || path.contains("font")
}
