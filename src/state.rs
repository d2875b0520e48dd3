//! Executor state management
//!
//! This module holds the live mirror of every executor the bridge has seen:
//! the per-executor state types and the table that owns them.

mod table;
mod types;

pub use table::ExecutorTable;
pub use types::{ExecutorState, FeedbackClass, VariableDefinition, VariableUpdate};
