//! Problems found while validating a machine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single configuration problem. Validation reports all of them at once.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ConfigViolation {
    #[error("machine name must not be empty")]
    EmptyName,

    #[error("transition limit must be at least 1")]
    ZeroTransitionLimit,

    #[error("path separator must not be empty")]
    EmptySeparator,

    #[error("machine name '{name}' contains the path separator '{separator}'")]
    NameContainsSeparator { name: String, separator: String },
}
