use std::path::PathBuf;

/// Failures while comparing the running kernel against installed images.
/// All of them are recoverable at the scan level: the caller degrades the
/// verdict to `Unknown` instead of aborting.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read running kernel banner from {path}: {source}")]
    VersionUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No banner matching the grammar in {0}")]
    BannerMissing(PathBuf),

    #[error("Failed to read boot directory {path}: {source}")]
    BootDirUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read kernel image {path}: {source}")]
    ImageUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}
