use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The process table root itself could not be enumerated. Individual
    /// unreadable pids are a race with the live system and are skipped,
    /// never reported here.
    #[error("Failed to read process table from {path}: {source}")]
    ProcTableUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid hook directory: {0}")]
    InvalidHookDir(PathBuf),

    #[error("Failed to perform I/O operation on file: {0}")]
    Io(#[from] std::io::Error),
}
