//! Machine configuration and its validation.
//!
//! Validation uses Stillwater's `Validation` type so that every problem in a
//! configuration is reported together instead of one at a time.
//!
//! # Example
//!
//! ```rust
//! use canopy::MachineConfig;
//!
//! let config = MachineConfig::new("Guard")
//!     .with_transition_limit(32)
//!     .with_self_transitions(true);
//!
//! assert!(config.validate().is_ok());
//! assert!(MachineConfig::new("").validate().is_err());
//! ```

pub mod violations;

pub use violations::ConfigViolation;

use crate::error::{HsmError, Result};
use serde::{Deserialize, Serialize};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Settings of one state machine instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Name of the root state, also the first segment of every path
    pub name: String,

    /// Transitions allowed per tick; reaching this count is fatal
    pub max_transitions_per_tick: u32,

    /// Whether push/change into the current state re-enters it
    pub can_transit_self: bool,

    /// Separator used to build state paths
    pub path_separator: String,

    /// Number of committed transitions kept in the history (0 disables it)
    pub history_capacity: usize,
}

impl MachineConfig {
    pub const DEFAULT_TRANSITION_LIMIT: u32 = 100;
    pub const DEFAULT_SEPARATOR: &'static str = "/";
    pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_transition_limit(mut self, limit: u32) -> Self {
        self.max_transitions_per_tick = limit;
        self
    }

    pub fn with_self_transitions(mut self, allowed: bool) -> Self {
        self.can_transit_self = allowed;
        self
    }

    pub fn with_path_separator(mut self, separator: impl Into<String>) -> Self {
        self.path_separator = separator.into();
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| HsmError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every rule, accumulating all violations.
    pub fn check(&self) -> Validation<(), NonEmptyVec<ConfigViolation>> {
        let separator_in_name = !self.path_separator.is_empty()
            && self.name.contains(self.path_separator.as_str());

        let checks = vec![
            rule(!self.name.is_empty(), || ConfigViolation::EmptyName),
            rule(self.max_transitions_per_tick > 0, || {
                ConfigViolation::ZeroTransitionLimit
            }),
            rule(!self.path_separator.is_empty(), || {
                ConfigViolation::EmptySeparator
            }),
            rule(!separator_in_name, || ConfigViolation::NameContainsSeparator {
                name: self.name.clone(),
                separator: self.path_separator.clone(),
            }),
        ];

        Validation::all_vec(checks).map(|_| ())
    }

    /// Validate, converting accumulated violations into an [`HsmError`].
    pub fn validate(&self) -> Result<()> {
        match self.check() {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => Err(HsmError::InvalidConfig {
                violations: errors.iter().cloned().collect(),
            }),
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "StateMachine".to_string(),
            max_transitions_per_tick: Self::DEFAULT_TRANSITION_LIMIT,
            can_transit_self: false,
            path_separator: Self::DEFAULT_SEPARATOR.to_string(),
            history_capacity: Self::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

fn rule(
    holds: bool,
    violation: impl FnOnce() -> ConfigViolation,
) -> Validation<(), NonEmptyVec<ConfigViolation>> {
    if holds {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MachineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_transitions_per_tick, 100);
        assert!(!config.can_transit_self);
        assert_eq!(config.path_separator, "/");
    }

    #[test]
    fn validation_accumulates_all_violations() {
        let config = MachineConfig::new("").with_transition_limit(0);

        match config.check() {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| matches!(e, ConfigViolation::EmptyName)));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, ConfigViolation::ZeroTransitionLimit)));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn name_must_not_contain_separator() {
        let err = MachineConfig::new("a/b").validate().unwrap_err();

        match err {
            HsmError::InvalidConfig { violations } => {
                assert_eq!(
                    violations,
                    vec![ConfigViolation::NameContainsSeparator {
                        name: "a/b".to_string(),
                        separator: "/".to_string(),
                    }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_separator_is_reported_once() {
        let err = MachineConfig::new("Agent")
            .with_path_separator("")
            .validate()
            .unwrap_err();

        assert_eq!(
            err,
            HsmError::InvalidConfig {
                violations: vec![ConfigViolation::EmptySeparator]
            }
        );
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = MachineConfig::from_json(r#"{ "name": "Guard", "can_transit_self": true }"#)
            .unwrap();

        assert_eq!(config.name, "Guard");
        assert!(config.can_transit_self);
        assert_eq!(config.max_transitions_per_tick, 100);
        assert_eq!(config.history_capacity, 64);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let result = MachineConfig::from_json("{ name: ");
        assert!(matches!(result, Err(HsmError::ConfigParse(_))));
    }

    #[test]
    fn from_json_validates() {
        let result = MachineConfig::from_json(r#"{ "name": "Guard", "max_transitions_per_tick": 0 }"#);
        assert!(matches!(result, Err(HsmError::InvalidConfig { .. })));
    }
}
