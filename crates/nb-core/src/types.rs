//! Core type definitions for the Nuru blocklist engine
//!
//! These types are shared between the rule store, the list compiler and the
//! engine that publishes decisions to the host's request interceptor.

use std::fmt;

// =============================================================================
// Block Reasons
// =============================================================================

/// Which rule family caused a request to be blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// Hostname (or one of its parent domains) is in the domain set
    Domain,
    /// The full URL matched a compiled URL pattern
    Pattern,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Domain => "domain",
            BlockReason::Pattern => "pattern",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// Final decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Whether the request must be cancelled
    pub blocked: bool,
    /// Rule family that blocked the request (None when allowed)
    pub reason: Option<BlockReason>,
}

impl Verdict {
    /// Request is allowed.
    pub const fn allow() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    /// Request is blocked for the given reason.
    pub const fn block(reason: BlockReason) -> Self {
        Self {
            blocked: true,
            reason: Some(reason),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::allow()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            Some(reason) if self.blocked => write!(f, "BLOCK ({})", reason),
            _ => f.write_str("ALLOW"),
        }
    }
}

// =============================================================================
// Rule Counts
// =============================================================================

/// Size of a rule store, reported after every load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleCounts {
    pub domains: usize,
    pub patterns: usize,
}
