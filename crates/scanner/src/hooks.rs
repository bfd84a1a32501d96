#![forbid(unsafe_code)]

use crate::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::trace;

/// One fact emitted by a hook script, parsed from a `KIND|VALUE` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFact {
    /// `PACKAGE|<name>` — informational.
    Package(String),
    /// `RC|<path>` — an init script candidate for the binary.
    InitScript(PathBuf),
}

impl HookFact {
    pub fn parse(line: &str) -> Option<Self> {
        let (kind, value) = line.split_once('|')?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match kind {
            "PACKAGE" => Some(HookFact::Package(value.to_string())),
            "RC" => Some(HookFact::InitScript(PathBuf::from(value))),
            _ => None,
        }
    }
}

/// Maps a binary path to package and init-script facts via external hook
/// scripts, one per package manager.
pub trait HookRunner: Send + Sync {
    /// Hook scripts in invocation order.
    fn scripts(&self) -> &[PathBuf];

    /// Run one hook against a binary path and parse its output. A failed
    /// hook is recoverable: the caller moves on to the next one.
    fn run(&self, script: &Path, exe: &Path, verbose: bool) -> Result<Vec<HookFact>, Error>;
}

/// Runs the hook scripts found in a directory, in naturally-sorted name
/// order (`9-local` before `10-dpkg`).
#[derive(Debug, Clone)]
pub struct ShellHookRunner {
    scripts: Vec<PathBuf>,
}

impl ShellHookRunner {
    pub fn new(dir: &Path) -> Result<Self, Error> {
        if !dir.is_dir() {
            return Err(Error::InvalidHookDir(dir.to_path_buf()));
        }
        let mut scripts = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                scripts.push(path);
            }
        }
        scripts.sort_by(|a, b| {
            let a = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let b = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            kernel::natural_cmp(&a, &b)
        });
        Ok(Self { scripts })
    }
}

impl HookRunner for ShellHookRunner {
    fn scripts(&self) -> &[PathBuf] {
        &self.scripts
    }

    fn run(&self, script: &Path, exe: &Path, verbose: bool) -> Result<Vec<HookFact>, Error> {
        let mut command = Command::new(script);
        if verbose {
            command.arg("-v");
        }
        command.arg(exe);
        let output = command.output()?;
        trace!(script = %script.display(), exe = %exe.display(), status = ?output.status, "hook ran");

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(HookFact::parse).collect())
    }
}

/// A runner with no hooks; attribution falls through to `Unknown`.
#[derive(Debug, Default, Clone)]
pub struct NoopHookRunner;

impl HookRunner for NoopHookRunner {
    fn scripts(&self) -> &[PathBuf] {
        &[]
    }

    fn run(&self, _script: &Path, _exe: &Path, _verbose: bool) -> Result<Vec<HookFact>, Error> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn parses_hook_lines() {
        assert_eq!(
            HookFact::parse("PACKAGE|openssh-server"),
            Some(HookFact::Package("openssh-server".into()))
        );
        assert_eq!(
            HookFact::parse("RC|/etc/init.d/ssh"),
            Some(HookFact::InitScript("/etc/init.d/ssh".into()))
        );
        assert_eq!(HookFact::parse("NOISE|x"), None);
        assert_eq!(HookFact::parse("RC|"), None);
        assert_eq!(HookFact::parse("no separator"), None);
    }

    #[test]
    fn scripts_are_naturally_sorted() {
        let dir = tempdir().unwrap();
        for name in ["10-dpkg", "9-local", "20-rpm"] {
            fs::write(dir.path().join(name), "#!/bin/sh\n").unwrap();
        }
        let runner = ShellHookRunner::new(dir.path()).unwrap();
        let names: Vec<_> = runner
            .scripts()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["9-local", "10-dpkg", "20-rpm"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = ShellHookRunner::new(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::InvalidHookDir(_)));
    }

    #[test]
    fn runs_a_hook_and_parses_its_output() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("10-test");
        fs::write(
            &script,
            "#!/bin/sh\necho \"PACKAGE|demo\"\necho \"RC|/etc/init.d/demo\"\necho \"garbage\"\n",
        )
        .unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let runner = ShellHookRunner::new(dir.path()).unwrap();
        let facts = runner.run(&script, Path::new("/usr/sbin/demo"), false).unwrap();
        assert_eq!(
            facts,
            vec![
                HookFact::Package("demo".into()),
                HookFact::InitScript("/etc/init.d/demo".into()),
            ]
        );
    }
}
