#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Scan {
    /// Ask the interpreter probers whether a process runs replaced source
    /// files in addition to checking its memory maps.
    pub interpscan: bool,

    /// Compare the running kernel against the images installed on disk.
    pub kernelhints: bool,

    /// Directory holding package-manager hook scripts. Each hook maps a
    /// binary path to a package name and init script candidates.
    pub hook_dir: PathBuf,

    /// Directory scanned for installed kernel images.
    pub boot_dir: PathBuf,

    /// Regexes on the executable path. Matching processes are never
    /// classified and never appear in the report.
    pub blacklist: Vec<String>,

    /// Regexes on unit or init-script names. Matching units are dropped
    /// from the report after attribution.
    pub blacklist_rc: Vec<String>,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            interpscan: true,
            kernelhints: true,
            hook_dir: PathBuf::from("/etc/needrestart-rs/hooks.d"),
            boot_dir: PathBuf::from("/boot"),
            blacklist: Vec::new(),
            blacklist_rc: Vec::new(),
        }
    }
}
