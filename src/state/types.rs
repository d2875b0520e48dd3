//! Executor state type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::ExecKey;

/// Live state of one executor, every field stays unset until an event says otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorState {
    /// Canonical address
    pub key: ExecKey,
    pub active: Option<bool>,
    pub paused: Option<bool>,
    /// Last active cue, fractional parts allowed (12.5)
    pub cue: Option<f64>,
    /// Fader position in percent (0-100), rounded on ingest
    pub fader: Option<u8>,
    /// Whether the executor is exposed as named variables
    pub has_variable_binding: bool,
}

impl ExecutorState {
    /// Create a blank entry
    pub fn new(key: ExecKey) -> Self {
        Self {
            key,
            active: None,
            paused: None,
            cue: None,
            fader: None,
            has_variable_binding: false,
        }
    }

    /// Current value of one field as a variable value (`null` when unset)
    pub fn value_of(&self, class: FeedbackClass) -> Value {
        match class {
            FeedbackClass::Active => self.active.map(Value::from).unwrap_or(Value::Null),
            FeedbackClass::Paused => self.paused.map(Value::from).unwrap_or(Value::Null),
            FeedbackClass::Cue => self.cue.map(Value::from).unwrap_or(Value::Null),
            FeedbackClass::Fader => self.fader.map(Value::from).unwrap_or(Value::Null),
        }
    }
}

/// Feedback families, one per executor state field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackClass {
    Active,
    Paused,
    Cue,
    Fader,
}

impl FeedbackClass {
    pub fn all() -> &'static [FeedbackClass] {
        &[
            FeedbackClass::Active,
            FeedbackClass::Paused,
            FeedbackClass::Cue,
            FeedbackClass::Fader,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackClass::Active => "active",
            FeedbackClass::Paused => "paused",
            FeedbackClass::Cue => "cue",
            FeedbackClass::Fader => "fader",
        }
    }

    /// Human readable prefix for variable labels
    fn label(&self) -> &'static str {
        match self {
            FeedbackClass::Active => "Active state of exec",
            FeedbackClass::Paused => "Paused state of exec",
            FeedbackClass::Cue => "Active cue of exec",
            FeedbackClass::Fader => "Fader position of exec",
        }
    }
}

impl std::fmt::Display for FeedbackClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the host variable holding `class` for executor `key`
pub fn variable_name(key: &ExecKey, class: FeedbackClass) -> String {
    format!("{}_{}", key, class)
}

/// Host variable declaration for a tracked executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    pub label: String,
}

impl VariableDefinition {
    /// The four variables exposed for one tracked executor
    pub fn for_executor(key: &ExecKey) -> Vec<VariableDefinition> {
        FeedbackClass::all()
            .iter()
            .map(|class| VariableDefinition {
                name: variable_name(key, *class),
                label: format!("{} {}", class.label(), key),
            })
            .collect()
    }
}

/// New value of a host variable after ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableUpdate {
    pub name: String,
    pub value: Value,
}

impl VariableUpdate {
    pub fn from_state(state: &ExecutorState, class: FeedbackClass) -> Self {
        Self {
            name: variable_name(&state.key, class),
            value: state.value_of(class),
        }
    }
}
