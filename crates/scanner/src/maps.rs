#![forbid(unsafe_code)]

use crate::device;
use crate::domain::{FileIdent, Mapping, ObsolescenceReason, Verdict};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
#[cfg_attr(not(test), allow(unused_imports))]
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Pseudo-paths that never participate in obsolescence checks: SysV
/// shared-memory handles, direct-rendering handles, device nodes, and the
/// kernel's async-I/O pseudo files.
const SKIP_PREFIXES: &[&str] = &["/SYSV", "/drm", "/dev/", "/[aio]"];

/// A mapping whose backing file is gone is not evidence of an upgrade when
/// the file lived under a scratch path convention.
const SCRATCH_PREFIXES: &[&str] = &["/tmp/", "/var/tmp/", "/run/", "/dev/shm/", "/memfd:"];

const DELETED_SUFFIX: &str = " (deleted)";

enum MapCheck {
    Keep,
    Obsolete(ObsolescenceReason),
    Inconclusive,
}

/// Reads one pid's file-backed memory mappings and compares each against
/// the on-disk file it claims to map.
#[derive(Debug, Clone)]
pub struct MapScanner {
    proc_root: PathBuf,
}

impl MapScanner {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// `None` when the pid vanished (its map table is unreadable). The
    /// first obsolete mapping decides; the rest of the table is not read.
    pub fn scan(&self, pid: i32) -> Option<Verdict> {
        let path = self.proc_root.join(pid.to_string()).join("maps");
        let text = fs::read_to_string(path).ok()?;

        for line in text.lines() {
            let Some(mapping) = Mapping::parse(line) else {
                trace!(pid, line, "skipping unparsable map line");
                continue;
            };
            match check_mapping(pid, &mapping) {
                MapCheck::Keep => continue,
                MapCheck::Obsolete(reason) => return Some(Verdict::Obsolete(reason)),
                // We do not report obsolescence we cannot prove.
                MapCheck::Inconclusive => return Some(Verdict::Current),
            }
        }
        Some(Verdict::Current)
    }
}

fn check_mapping(pid: i32, mapping: &Mapping) -> MapCheck {
    let Some(path) = &mapping.path else {
        return MapCheck::Keep;
    };
    if mapping.inode == 0 || !mapping.is_executable() {
        return MapCheck::Keep;
    }

    let text = path.to_string_lossy();
    if SKIP_PREFIXES.iter().any(|prefix| text.starts_with(prefix)) {
        return MapCheck::Keep;
    }

    let backing = text.strip_suffix(DELETED_SUFFIX).unwrap_or(&text);
    match fs::metadata(backing) {
        Err(err) if err.kind() == ErrorKind::NotFound => {
            if SCRATCH_PREFIXES.iter().any(|prefix| backing.starts_with(prefix)) {
                MapCheck::Keep
            } else {
                MapCheck::Obsolete(ObsolescenceReason::MissingBacking(PathBuf::from(backing)))
            }
        }
        Err(err) => {
            debug!(pid, backing, %err, "stat failed, map scan inconclusive");
            MapCheck::Inconclusive
        }
        Ok(meta) => {
            let ident = FileIdent {
                dev: meta.dev(),
                inode: meta.ino(),
            };
            if mapping.inode == ident.inode && device::matches(&mapping.dev, ident.dev) {
                MapCheck::Keep
            } else {
                trace!(
                    pid,
                    backing,
                    map_dev = %mapping.dev,
                    map_inode = mapping.inode,
                    disk_dev = ident.dev,
                    disk_inode = ident.inode,
                    "mapping does not match disk",
                );
                MapCheck::Obsolete(ObsolescenceReason::StaleMapping(PathBuf::from(backing)))
            }
        }
    }
}
