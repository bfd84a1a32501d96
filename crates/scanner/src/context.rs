#![forbid(unsafe_code)]

use crate::error::Error;
use crate::probes;
use config::Config;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Everything one scan needs that is not a collaborator: filesystem roots,
/// caller identity, compiled patterns, and the caches the scan accumulates.
/// Constructed at scan start, dropped at scan end; nothing persists between
/// scans.
#[derive(Debug)]
pub struct ScanContext {
    /// Root of the per-process kernel views, normally `/proc`.
    pub proc_root: PathBuf,
    /// Root that absolute pidfile references are resolved under, normally `/`.
    pub fs_root: PathBuf,
    pub caller_uid: u32,
    /// Whole-host mode. Unprivileged scans only inspect the caller's own
    /// processes and never attribute units.
    pub privileged: bool,
    pub runlevel: String,
    /// Whether a modern service manager is running (cgroup attribution is
    /// only meaningful then).
    pub has_service_manager: bool,
    pub interpscan: bool,
    /// Passed through to hook scripts.
    pub verbose: bool,
    /// Pids never classified: ourselves and our parent.
    pub ignored: HashSet<i32>,
    /// Exe paths matching any of these are not classified.
    pub blacklist: Vec<Regex>,
    /// Units matching any of these are dropped from the report.
    pub blacklist_rc: Vec<Regex>,
}

impl ScanContext {
    /// Build a context for the live system.
    pub fn detect(config: &Config, verbose: bool) -> Result<Self, Error> {
        let uid = nix::unistd::Uid::effective();
        let me = std::process::id() as i32;
        let parent = nix::unistd::getppid().as_raw();

        Ok(Self {
            proc_root: PathBuf::from("/proc"),
            fs_root: PathBuf::from("/"),
            caller_uid: uid.as_raw(),
            privileged: uid.is_root(),
            runlevel: probes::current_runlevel(),
            has_service_manager: Path::new("/run/systemd/system").is_dir(),
            interpscan: config.scan.interpscan,
            verbose,
            ignored: HashSet::from([me, parent]),
            blacklist: compile(&config.scan.blacklist)?,
            blacklist_rc: compile(&config.scan.blacklist_rc)?,
        })
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, Error> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
