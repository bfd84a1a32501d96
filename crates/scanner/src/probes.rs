#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

/// Per-interpreter source-file discovery. Implementations know how to ask
/// a language runtime which source files a process is executing; the
/// engine only cares whether one of them was replaced.
pub trait InterpreterProber: Send + Sync {
    /// A source file the process runs that no longer matches the disk, if
    /// any. Used for classification.
    fn check(&self, pid: i32, exe: &Path) -> Option<PathBuf>;

    /// The source file the process is actually running, replaced or not.
    /// Used to give hook scripts something better than the interpreter
    /// binary to attribute.
    fn source(&self, pid: i32, exe: &Path) -> Option<PathBuf>;
}

/// No interpreter support; every process is judged by its maps alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterpreterProber;

impl InterpreterProber for NoopInterpreterProber {
    fn check(&self, _pid: i32, _exe: &Path) -> Option<PathBuf> {
        None
    }

    fn source(&self, _pid: i32, _exe: &Path) -> Option<PathBuf> {
        None
    }
}

/// Ask the service manager which unit a pid belongs to.
pub trait ServiceManagerProbe: Send + Sync {
    fn unit_for_pid(&self, pid: i32) -> Option<String>;
}

/// Spawns `systemctl status <pid>` and takes the first `*.service` token
/// of the first status line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemctlProbe;

impl ServiceManagerProbe for SystemctlProbe {
    fn unit_for_pid(&self, pid: i32) -> Option<String> {
        let output = Command::new("systemctl")
            .arg("status")
            .arg(pid.to_string())
            .output()
            .ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let first = stdout.lines().next()?;
        let unit = first
            .split_whitespace()
            .find(|token| token.ends_with(".service"))?;
        trace!(pid, unit, "service manager probe hit");
        Some(unit.to_string())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopServiceManagerProbe;

impl ServiceManagerProbe for NoopServiceManagerProbe {
    fn unit_for_pid(&self, _pid: i32) -> Option<String> {
        None
    }
}

/// Current runlevel as reported by the `runlevel` utility; `2` when that
/// fails or reports `unknown`.
pub fn current_runlevel() -> String {
    let fallback = || "2".to_string();
    let Ok(output) = Command::new("runlevel").output() else {
        debug!("runlevel utility unavailable, assuming runlevel 2");
        return fallback();
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.split_whitespace().last() {
        Some(level) if level != "unknown" => level.to_string(),
        _ => fallback(),
    }
}
