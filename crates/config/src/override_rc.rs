#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// One entry of the restart override policy. Rules are ordered; the first
/// pattern matching a unit name decides whether it may be restarted. The
/// scan engine records the rules untouched in the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideRule {
    /// Regex on the unit name.
    pub pattern: String,

    /// Whether a matching unit should be restarted.
    pub restart: bool,
}
