#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// What the caller intends to do with the unit list. Opaque to the scan
/// engine; it is carried through so the consumer of a report can act on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    #[default]
    List,
    Interactive,
    Automatic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Ui {
    pub restart_mode: RestartMode,

    /// Answer "no" by default when prompting.
    pub defno: bool,
}
