#![forbid(unsafe_code)]

use crate::domain::PidInfo;
use crate::error::Error;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

const DELETED_SUFFIX: &str = " (deleted)";
const DELETED_PREFIX: &str = "(deleted) ";

/// A frozen snapshot of every visible process, keyed by pid so iteration
/// is in ascending numeric order.
#[derive(Debug, Default)]
pub struct ProcTable {
    entries: BTreeMap<i32, PidInfo>,
}

impl ProcTable {
    /// Enumerate `proc_root` once. Pids that vanish while being read are
    /// dropped; kernel threads (no exe link) are excluded.
    pub fn snapshot(proc_root: &Path) -> Result<Self, Error> {
        let dir = fs::read_dir(proc_root).map_err(|source| Error::ProcTableUnreadable {
            path: proc_root.to_path_buf(),
            source,
        })?;

        let mut entries = BTreeMap::new();
        for entry in dir {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            match read_pid(proc_root, pid) {
                Some(info) => {
                    entries.insert(pid, info);
                }
                None => trace!(pid, "skipping pid (vanished, kernel thread, or unreadable)"),
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, pid: i32) -> Option<&PidInfo> {
        self.entries.get(&pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i32, &PidInfo)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_pid(proc_root: &Path, pid: i32) -> Option<PidInfo> {
    let dir = proc_root.join(pid.to_string());

    let stat = fs::read_to_string(dir.join("stat")).ok()?;
    let (comm, ppid, tty_nr) = parse_stat(&stat)?;

    let status = fs::read_to_string(dir.join("status")).ok()?;
    let uid = parse_uid(&status)?;

    let target = fs::read_link(dir.join("exe")).ok()?;
    let (exe, exe_deleted) = split_deleted_marker(&target);

    Some(PidInfo {
        pid,
        ppid,
        uid,
        comm,
        tty_path: tty_path(tty_nr),
        exe: Some(exe),
        exe_deleted,
    })
}

/// `stat` is `pid (comm) state ppid pgrp session tty_nr ...`; comm may
/// itself contain spaces and parentheses, so it is delimited by the first
/// `(` and the last `)`.
fn parse_stat(text: &str) -> Option<(String, i32, u64)> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    let comm = text.get(open + 1..close)?.to_string();

    let mut fields = text.get(close + 1..)?.split_whitespace();
    let _state = fields.next()?;
    let ppid: i32 = fields.next()?.parse().ok()?;
    let _pgrp = fields.next()?;
    let _session = fields.next()?;
    let tty_nr: i64 = fields.next()?.parse().ok()?;

    Some((comm, ppid, tty_nr.max(0) as u64))
}

/// First value of the `Uid:` line (the real uid).
fn parse_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

fn split_deleted_marker(target: &Path) -> (PathBuf, bool) {
    let text = target.to_string_lossy();
    if let Some(stripped) = text.strip_suffix(DELETED_SUFFIX) {
        return (PathBuf::from(stripped), true);
    }
    if let Some(stripped) = text.strip_prefix(DELETED_PREFIX) {
        return (PathBuf::from(stripped), true);
    }
    (target.to_path_buf(), false)
}

/// Decode a `tty_nr` device number into the conventional device path.
fn tty_path(tty_nr: u64) -> Option<PathBuf> {
    if tty_nr == 0 {
        return None;
    }
    let major = (tty_nr >> 8) & 0xfff;
    let minor = (tty_nr & 0xff) | ((tty_nr >> 12) & !0xff);
    let path = match major {
        4 if minor < 64 => format!("/dev/tty{minor}"),
        4 => format!("/dev/ttyS{}", minor - 64),
        136..=143 => format!("/dev/pts/{}", (major - 136) * 256 + minor),
        _ => return None,
    };
    Some(PathBuf::from(path))
}
