//! Feedback evaluation
//!
//! Feedback predicates are evaluated against the last known executor state.
//! Evaluation never fails: with the link down it simply answers from cache.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::address::{compile, ConsoleDialect, ExecKey};
use crate::config::{BoundsConfig, Range};
use crate::error::BridgeError;
use crate::state::{ExecutorState, ExecutorTable, FeedbackClass};

/// Relational operator of fader feedback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl Operator {
    pub fn all() -> &'static [Operator] {
        &[
            Operator::Eq,
            Operator::Ne,
            Operator::Ge,
            Operator::Le,
            Operator::Gt,
            Operator::Lt,
        ]
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }

    /// Compare a possibly unknown value against `rhs`
    ///
    /// An unknown value is unequal to everything and unordered, so only `!=` holds.
    pub fn compare(&self, lhs: Option<f64>, rhs: f64) -> bool {
        let Some(lhs) = lhs else {
            return *self == Operator::Ne;
        };

        match self {
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Lt => lhs < rhs,
        }
    }
}

impl FromStr for Operator {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::all()
            .iter()
            .copied()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| BridgeError::bad_parameter("operator", s, "expected ==, !=, >=, <=, > or <"))
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Feedback predicate as configured on a control surface button
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedbackRequest {
    Active {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
        #[serde(default = "default_true")]
        active: bool,
    },
    Paused {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
        #[serde(default = "default_true")]
        paused: bool,
    },
    Cue {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
        cue: String,
    },
    Fader {
        #[serde(default)]
        exec: i64,
        #[serde(default)]
        page: Option<i64>,
        #[serde(default)]
        operator: Operator,
        fader: f64,
    },
}

fn default_true() -> bool {
    true
}

impl FeedbackRequest {
    /// State field the predicate looks at
    pub fn class(&self) -> FeedbackClass {
        match self {
            FeedbackRequest::Active { .. } => FeedbackClass::Active,
            FeedbackRequest::Paused { .. } => FeedbackClass::Paused,
            FeedbackRequest::Cue { .. } => FeedbackClass::Cue,
            FeedbackRequest::Fader { .. } => FeedbackClass::Fader,
        }
    }

    fn address(&self) -> (i64, Option<i64>) {
        match self {
            FeedbackRequest::Active { exec, page, .. }
            | FeedbackRequest::Paused { exec, page, .. }
            | FeedbackRequest::Cue { exec, page, .. }
            | FeedbackRequest::Fader { exec, page, .. } => (*exec, *page),
        }
    }

    /// Key the predicate resolves to under `dialect`
    pub fn key(&self, dialect: ConsoleDialect) -> ExecKey {
        let (exec, page) = self.address();
        compile(exec, page, dialect, true)
    }

    /// Whether an ingestion that touched `affected` can change the result
    pub fn needs_refresh(&self, affected: &BTreeSet<FeedbackClass>) -> bool {
        affected.contains(&self.class())
    }
}

/// Evaluates feedback predicates against the executor table
///
/// Addresses outside the configured executor and page bounds are answered as
/// unknown without creating a table entry.
pub struct FeedbackEvaluator<'a> {
    table: &'a ExecutorTable,
    dialect: ConsoleDialect,
    executors: Range,
    pages: Range,
}

impl<'a> FeedbackEvaluator<'a> {
    pub fn new(table: &'a ExecutorTable, dialect: ConsoleDialect, bounds: &BoundsConfig) -> Self {
        Self {
            table,
            dialect,
            executors: bounds.executor,
            pages: bounds.page,
        }
    }

    fn in_bounds(&self, request: &FeedbackRequest) -> bool {
        let (exec, page) = request.address();
        // Non-positive pages fall back to page 1
        self.executors.contains(exec)
            && page
                .filter(|p| *p > 0)
                .map_or(true, |p| self.pages.contains(p))
    }

    pub fn evaluate(&self, request: &FeedbackRequest) -> bool {
        let key = request.key(self.dialect);
        let state = if self.in_bounds(request) {
            self.table.get(&key)
        } else {
            ExecutorState::new(key)
        };

        match request {
            FeedbackRequest::Active { active, .. } => state.active == Some(*active),
            FeedbackRequest::Paused { paused, .. } => state.paused == Some(*paused),
            FeedbackRequest::Cue { cue, .. } => match (state.cue, parse_number(cue)) {
                (Some(current), Some(wanted)) => current == wanted,
                _ => false,
            },
            FeedbackRequest::Fader {
                operator, fader, ..
            } => operator.compare(state.fader.map(f64::from), *fader),
        }
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
