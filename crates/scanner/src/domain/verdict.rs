#![forbid(unsafe_code)]

use std::path::PathBuf;

/// Why a process was found obsolete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsolescenceReason {
    /// The exe link carries a deleted marker.
    DeletedExe,
    /// An executable mapping's backing file no longer exists.
    MissingBacking(PathBuf),
    /// An executable mapping's backing file no longer matches the map
    /// entry's device/inode identity.
    StaleMapping(PathBuf),
    /// An interpreter prober reported a replaced source file.
    InterpreterSource(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Current,
    Obsolete(ObsolescenceReason),
}
