//! Filter list parser
//!
//! Accepts the subset of AdBlock Plus syntax the browser supports:
//!
//! - `!comment` and `[Adblock Plus 2.0]` header lines are skipped
//! - `||domain^` adds `domain` to the blocked domain set
//! - lines containing `##` or `#@#` (element hiding) are skipped
//! - anything else is translated into a case-insensitive URL regex

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// A single line that could not be turned into a rule.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        line: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Classification of one filter list line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Lowercased domain from a `||domain^` rule
    Domain(String),
    /// Translated regex source for a URL pattern rule
    Pattern(String),
    /// Blank, comment, header, element hiding or rejected pattern
    Skipped,
}

/// Rules extracted from one filter list, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub domains: Vec<String>,
    /// `(line number, regex source)`; line numbers are 1-based
    pub patterns: Vec<(usize, String)>,
    pub lines: usize,
    pub skipped: usize,
}

impl ParsedList {
    pub fn rule_count(&self) -> usize {
        self.domains.len() + self.patterns.len()
    }
}

pub fn parse_filter_list(text: &str) -> ParsedList {
    let mut parsed = ParsedList::default();

    for (idx, raw_line) in text.split('\n').enumerate() {
        parsed.lines += 1;
        match parse_line(raw_line) {
            ParsedLine::Domain(domain) => parsed.domains.push(domain),
            ParsedLine::Pattern(pattern) => parsed.patterns.push((idx + 1, pattern)),
            ParsedLine::Skipped => parsed.skipped += 1,
        }
    }

    parsed
}

pub fn parse_line(raw_line: &str) -> ParsedLine {
    let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

    if line.trim().is_empty() || is_comment_line(line) {
        return ParsedLine::Skipped;
    }

    if let Some(domain) = parse_domain_rule(line) {
        return if domain.is_empty() {
            ParsedLine::Skipped
        } else {
            ParsedLine::Domain(domain)
        };
    }

    if line.contains("##") || line.contains("#@#") {
        return ParsedLine::Skipped;
    }

    let pattern = translate_pattern(line);
    if pattern.len() > 2 && !pattern.contains('!') && !pattern.contains('#') {
        ParsedLine::Pattern(pattern)
    } else {
        ParsedLine::Skipped
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[')
}

/// `||domain^` -> `domain`, taking everything up to the first `^`.
fn parse_domain_rule(line: &str) -> Option<String> {
    let rest = line.strip_prefix("||")?;
    let end = rest.find('^')?;
    Some(rest[..end].to_lowercase())
}

/// Translate filter syntax into a regex source: `.` is escaped, `*` becomes
/// `.*` and the `^` separator becomes `([?/]|$)`.
pub fn translate_pattern(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    for ch in line.chars() {
        match ch {
            '.' => out.push_str("\\."),
            '*' => out.push_str(".*"),
            '^' => out.push_str("([?/]|$)"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn compile_pattern(line: usize, pattern: &str) -> Result<Regex, ParseError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ParseError::InvalidPattern {
            line,
            pattern: pattern.to_string(),
            source,
        })
}
