//! Nuru Filter List Compiler
//!
//! This crate compiles EasyList-style filter lists into a [`nb_core::RuleStore`].

pub mod builder;
pub mod parser;

pub use builder::{build_rule_store, parse_rule_store, ListStats, RuleStoreBuilder};
pub use parser::{parse_filter_list, parse_line, translate_pattern, ParseError, ParsedLine, ParsedList};
