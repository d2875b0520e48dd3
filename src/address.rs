//! Executor address compilation
//!
//! Consoles disagree on how executors are numbered: the standard dialect is
//! zero-based, grandMA is one-based. Every lookup in the bridge goes through
//! [`compile`] so that all of them end up on the same canonical
//! `"<page>.<executor>"` key.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Console addressing convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleDialect {
    /// Zero-based executors, executor 0 is the top-level pageless executor
    #[default]
    Standard,
    /// grandMA consoles, one-based executors
    #[serde(alias = "grandma")]
    Gma,
}

impl ConsoleDialect {
    /// Offset subtracted from a user-facing executor number
    pub fn executor_offset(self) -> i64 {
        match self {
            ConsoleDialect::Standard => 0,
            ConsoleDialect::Gma => 1,
        }
    }
}

impl std::fmt::Display for ConsoleDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsoleDialect::Standard => write!(f, "standard"),
            ConsoleDialect::Gma => write!(f, "gma"),
        }
    }
}

/// Canonical executor address, formatted as `"<page>.<executor>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecKey(String);

impl ExecKey {
    /// Build a key from an already resolved page and executor
    pub fn new(page: u32, executor: u32) -> Self {
        ExecKey(format!("{}.{}", page, executor))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for ExecKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compile a raw (executor, page) pair into its canonical key
///
/// `feedback` selects the feedback-context rules: outside of it, executor 0 on
/// the standard dialect is the top-level executor and always lands on page 0.
/// Inside it, executor 0 follows the usual page defaulting like any other.
pub fn compile(
    raw_executor: i64,
    raw_page: Option<i64>,
    dialect: ConsoleDialect,
    feedback: bool,
) -> ExecKey {
    let executor = raw_executor.saturating_sub(dialect.executor_offset());

    let page = if executor == 0 && !feedback && dialect == ConsoleDialect::Standard {
        0
    } else {
        match raw_page {
            Some(page) if page > 0 => page,
            _ => 1,
        }
    };

    // Keys are built from the parts as text, page and executor never mix.
    ExecKey(format!("{}.{}", page, executor.max(0)))
}

/// Entry of the tracked executor list (`executor[.page]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedExecutor {
    pub executor: i64,
    pub page: Option<i64>,
}

impl TrackedExecutor {
    /// Canonical key of the tracked executor
    ///
    /// Tracked executors are declared like actions, so they compile outside of
    /// the feedback context.
    pub fn key(&self, dialect: ConsoleDialect) -> ExecKey {
        compile(self.executor, self.page, dialect, false)
    }
}

/// Parse a comma separated `executor[.page]` list
///
/// An empty (or whitespace only) list yields no executors.
pub fn parse_tracked_list(list: &str) -> BridgeResult<Vec<TrackedExecutor>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    list.split(',').map(parse_tracked_entry).collect()
}

fn parse_tracked_entry(entry: &str) -> BridgeResult<TrackedExecutor> {
    let entry = entry.trim();
    let invalid = || {
        BridgeError::bad_parameter(
            "tracked_executors",
            entry,
            "expected executor[.page] with decimal digits",
        )
    };

    let (executor, page) = match entry.split_once('.') {
        Some((executor, page)) => (executor, Some(page)),
        None => (entry, None),
    };

    let executor = parse_digits(executor).ok_or_else(invalid)?;
    let page = match page {
        Some(page) => Some(parse_digits(page).ok_or_else(invalid)?),
        None => None,
    };

    Ok(TrackedExecutor { executor, page })
}

fn parse_digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
