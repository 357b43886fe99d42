//! Error types shared by the state tree, the transition referee and the
//! message router.

use crate::config::ConfigViolation;
use crate::core::StateId;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = HsmError> = std::result::Result<T, E>;

/// Result returned by lifecycle hooks, event handlers and message handlers.
pub type HookResult = Result<()>;

/// Errors raised by the state machine runtime.
///
/// Configuration errors (`DuplicateChildName`, `DuplicateEventName`,
/// `ChildNotFound`, `NoParent`, `InvalidStateName`, `InvalidConfig`) are
/// caller misuse and are never retried. `RunawayTransition` is fatal: it
/// points at a cycle in the state graph and must be fixed there.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HsmError {
    #[error("State '{parent}' already has a child named '{name}'")]
    DuplicateChildName { parent: String, name: String },

    #[error("State '{state}' already handles event '{event}'")]
    DuplicateEventName { state: String, event: String },

    #[error("State '{state}' has no child named '{name}'")]
    ChildNotFound { state: String, name: String },

    #[error("State '{state}' has no parent")]
    NoParent { state: String },

    #[error("Unknown state {0}")]
    UnknownState(StateId),

    #[error("Invalid state name '{name}': {reason}")]
    InvalidStateName { name: String, reason: String },

    #[error("Invalid machine config: {}", join_violations(.violations))]
    InvalidConfig { violations: Vec<ConfigViolation> },

    #[error("Machine config could not be parsed: {0}")]
    ConfigParse(String),

    #[error(
        "Runaway transition in '{machine}': {limit} transitions within one tick (stack: {})",
        .trail.join(" > ")
    )]
    RunawayTransition {
        machine: String,
        limit: u32,
        trail: Vec<String>,
    },

    #[error("Machine '{machine}' is not running")]
    NotRunning { machine: String },

    #[error("Machine '{machine}' has no current state")]
    NoCurrentState { machine: String },

    #[error("Machine '{machine}' was terminated")]
    Terminated { machine: String },

    #[error("State '{state}' was destroyed")]
    StateDestroyed { state: String },

    #[error("Event '{event}' expects arguments of type {expected}")]
    EventArgsMismatch {
        event: String,
        expected: &'static str,
    },

    #[error("Handler failed: {0}")]
    Handler(String),
}

impl HsmError {
    /// Failure raised from inside a user callback.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// True for the fatal runaway-transition condition.
    pub fn is_runaway(&self) -> bool {
        matches!(self, Self::RunawayTransition { .. })
    }
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
