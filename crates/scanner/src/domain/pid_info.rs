#![forbid(unsafe_code)]

use std::path::PathBuf;

/// One process as captured by a single table snapshot. Immutable once
/// built; a pid that disappears afterwards is simply dropped by whoever
/// fails to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidInfo {
    pub pid: i32,
    pub ppid: i32,
    /// Real uid of the process.
    pub uid: u32,
    pub comm: String,
    /// Controlling terminal device path, if the process has one.
    pub tty_path: Option<PathBuf>,
    /// Target of the exe link, with any `(deleted)` marker stripped.
    pub exe: Option<PathBuf>,
    /// Whether the exe link carried a `(deleted)` marker.
    pub exe_deleted: bool,
}
