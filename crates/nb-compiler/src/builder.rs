use std::collections::HashSet;

use log::warn;
use regex::Regex;

use nb_core::RuleStore;

use crate::parser::{compile_pattern, parse_filter_list, ParsedList};

/// Per-list compile results, reported after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListStats {
    pub lines: usize,
    pub domains: usize,
    pub patterns: usize,
    /// Lines that produced no rule, including patterns that failed to compile
    pub skipped: usize,
    pub invalid: usize,
}

/// Accumulates rules from several lists into one new [`RuleStore`].
///
/// Identical pattern sources are kept once, at their first position, so
/// first-match order is unchanged.
#[derive(Debug, Default)]
pub struct RuleStoreBuilder {
    domains: HashSet<String>,
    patterns: Vec<Regex>,
    seen_patterns: HashSet<String>,
}

impl RuleStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw list text and merge it in.
    pub fn add_list(&mut self, name: &str, text: &str) -> ListStats {
        let parsed = parse_filter_list(text);
        self.add_parsed(name, parsed)
    }

    pub fn add_parsed(&mut self, name: &str, parsed: ParsedList) -> ListStats {
        let mut stats = ListStats {
            lines: parsed.lines,
            domains: parsed.domains.len(),
            skipped: parsed.skipped,
            ..ListStats::default()
        };

        self.domains.extend(parsed.domains);

        for (line, source) in parsed.patterns {
            if self.seen_patterns.contains(&source) {
                stats.patterns += 1;
                continue;
            }
            match compile_pattern(line, &source) {
                Ok(regex) => {
                    self.seen_patterns.insert(source);
                    self.patterns.push(regex);
                    stats.patterns += 1;
                }
                Err(e) => {
                    warn!("Skipping rule in {}: {}", name, e);
                    stats.invalid += 1;
                    stats.skipped += 1;
                }
            }
        }

        stats
    }

    pub fn build(self) -> RuleStore {
        RuleStore::new(self.domains, self.patterns)
    }
}

/// Compile a single list text into a store.
pub fn parse_rule_store(text: &str) -> RuleStore {
    let mut builder = RuleStoreBuilder::new();
    builder.add_list("inline", text);
    builder.build()
}

/// Compile several named list texts into one store.
pub fn build_rule_store<'a, I>(lists: I) -> RuleStore
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut builder = RuleStoreBuilder::new();
    for (name, text) in lists {
        builder.add_list(name, text);
    }
    builder.build()
}
