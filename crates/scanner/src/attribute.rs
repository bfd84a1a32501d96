#![forbid(unsafe_code)]

use crate::context::ScanContext;
use crate::domain::{ControllableUnit, PidInfo};
use crate::hooks::{HookFact, HookRunner};
use crate::lsb::{self, ScriptVerdict};
use crate::probes::{InterpreterProber, ServiceManagerProbe};
use crate::proc_table::ProcTable;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

static SESSION_SCOPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"user-(\d+)\.slice/session-([^/.]+)\.scope").expect("session scope pattern")
});

/// Where an obsolete pid ends up in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Session { uid: u32, session_id: String },
    Units(Vec<ControllableUnit>),
    Unknown,
}

enum CgroupHit {
    Service(String),
    Session { uid: u32, session_id: String },
}

/// Maps an obsolete pid to the entity an operator can restart. The match
/// order is the contract: controlling terminal, then the pivoted ancestor
/// against pid-1 roots, the cgroup view, the service-manager probe, and
/// finally the hook scripts.
pub struct Attributor<'a> {
    ctx: &'a ScanContext,
    table: &'a ProcTable,
    hooks: &'a dyn HookRunner,
    interp: &'a dyn InterpreterProber,
    probe: &'a dyn ServiceManagerProbe,
}

impl<'a> Attributor<'a> {
    pub fn new(
        ctx: &'a ScanContext,
        table: &'a ProcTable,
        hooks: &'a dyn HookRunner,
        interp: &'a dyn InterpreterProber,
        probe: &'a dyn ServiceManagerProbe,
    ) -> Self {
        Self {
            ctx,
            table,
            hooks,
            interp,
            probe,
        }
    }

    pub fn attribute(&self, info: &'a PidInfo) -> Attribution {
        if let Some(tty) = &info.tty_path {
            return Attribution::Session {
                uid: info.uid,
                session_id: tty.display().to_string(),
            };
        }

        let candidate = self.pivot(info);
        trace!(pid = info.pid, candidate = candidate.pid, "pivoted to ancestor");

        // Unprivileged scans never attribute units; a session found in the
        // cgroup view is the only thing left to report.
        if !self.ctx.privileged {
            if self.ctx.has_service_manager
                && let Some(CgroupHit::Session { uid, session_id }) = self.cgroup_hit(candidate.pid)
            {
                return Attribution::Session { uid, session_id };
            }
            return Attribution::Unknown;
        }

        if candidate.pid == 1
            && let Some(exe) = &candidate.exe
        {
            if exe.starts_with("/lib/systemd") || exe.starts_with("/usr/lib/systemd") {
                return Attribution::Units(vec![ControllableUnit::ServiceManagerRoot]);
            }
            if exe == Path::new("/sbin/init") {
                return Attribution::Units(vec![ControllableUnit::LegacyInit]);
            }
        }

        if self.ctx.has_service_manager {
            match self.cgroup_hit(candidate.pid) {
                Some(CgroupHit::Service(name)) => {
                    return Attribution::Units(vec![ControllableUnit::ServiceUnit(name)]);
                }
                Some(CgroupHit::Session { uid, session_id }) => {
                    return Attribution::Session { uid, session_id };
                }
                None => {}
            }

            if let Some(name) = self.probe.unit_for_pid(candidate.pid) {
                return Attribution::Units(vec![ControllableUnit::ServiceUnit(name)]);
            }
        }

        if let Some(units) = self.from_hooks(candidate) {
            return Attribution::Units(units);
        }

        debug!(pid = info.pid, comm = %info.comm, "no attribution found");
        Attribution::Unknown
    }

    /// Walk to the nearest ancestor still visible to the caller: under a
    /// privileged scan the ancestor whose parent is pid 1, under an
    /// unprivileged scan the last ancestor owned by the caller. Reused
    /// pids can make the parent chain cyclic; the visited set terminates
    /// the walk.
    fn pivot(&self, info: &'a PidInfo) -> &'a PidInfo {
        let mut current = info;
        let mut visited = HashSet::new();
        while visited.insert(current.pid) {
            if current.pid == 1 || current.ppid <= 1 {
                break;
            }
            let Some(parent) = self.table.get(current.ppid) else {
                break;
            };
            if !self.ctx.privileged && parent.uid != self.ctx.caller_uid {
                break;
            }
            current = parent;
        }
        current
    }

    /// First extraction from the service-manager controller lines of the
    /// candidate's cgroup view: a trailing `<name>.service` segment, or a
    /// `user-<uid>.slice/session-<n>.scope` pair.
    fn cgroup_hit(&self, pid: i32) -> Option<CgroupHit> {
        let path = self.ctx.proc_root.join(pid.to_string()).join("cgroup");
        let text = fs::read_to_string(path).ok()?;

        for line in text.lines() {
            let mut parts = line.splitn(3, ':');
            let (Some(_id), Some(controllers), Some(group)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let managed =
                controllers.is_empty() || controllers.split(',').any(|c| c == "name=systemd");
            if !managed {
                continue;
            }

            if let Some(last) = group.rsplit('/').next()
                && let Some(stem) = last.strip_suffix(".service")
                && !stem.is_empty()
            {
                return Some(CgroupHit::Service(last.to_string()));
            }
            if let Some(caps) = SESSION_SCOPE_RE.captures(group)
                && let Ok(uid) = caps[1].parse()
            {
                return Some(CgroupHit::Session {
                    uid,
                    session_id: format!("session #{}", &caps[2]),
                });
            }
        }
        None
    }

    /// Ask each hook about the candidate's binary (or the interpreter
    /// source it runs) until one yields an attribution. A pidfile-confirmed
    /// script wins outright; otherwise every plausible script from that
    /// hook is promoted.
    fn from_hooks(&self, candidate: &PidInfo) -> Option<Vec<ControllableUnit>> {
        let exe = candidate.exe.as_ref()?;
        let target: PathBuf = if self.ctx.interpscan {
            self.interp
                .source(candidate.pid, exe)
                .unwrap_or_else(|| exe.clone())
        } else {
            exe.clone()
        };

        for script in self.hooks.scripts() {
            let facts = match self.hooks.run(script, &target, self.ctx.verbose) {
                Ok(facts) => facts,
                Err(err) => {
                    warn!(hook = %script.display(), %err, "hook failed");
                    continue;
                }
            };

            let mut candidates = Vec::new();
            let mut confirmed = None;
            for fact in facts {
                match fact {
                    HookFact::Package(name) => {
                        trace!(pid = candidate.pid, package = %name, "hook package fact");
                    }
                    HookFact::InitScript(path) => {
                        match lsb::evaluate(
                            &path,
                            &self.ctx.runlevel,
                            &self.ctx.fs_root,
                            candidate.pid,
                        ) {
                            ScriptVerdict::Confirmed => {
                                confirmed = Some(path);
                                break;
                            }
                            ScriptVerdict::Candidate => candidates.push(path),
                            ScriptVerdict::Ignored => {}
                        }
                    }
                }
            }

            if let Some(path) = confirmed {
                return Some(vec![ControllableUnit::InitScript(path)]);
            }
            if !candidates.is_empty() {
                return Some(
                    candidates
                        .into_iter()
                        .map(ControllableUnit::InitScript)
                        .collect(),
                );
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHookRunner;
    use crate::probes::{NoopInterpreterProber, NoopServiceManagerProbe};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn context(dir: &Path) -> ScanContext {
        ScanContext {
            proc_root: dir.join("proc"),
            fs_root: dir.to_path_buf(),
            caller_uid: 0,
            privileged: true,
            runlevel: "2".into(),
            has_service_manager: true,
            interpscan: false,
            verbose: false,
            ignored: HashSet::new(),
            blacklist: Vec::new(),
            blacklist_rc: Vec::new(),
        }
    }

    fn pid(pid: i32, ppid: i32, uid: u32, exe: &str) -> PidInfo {
        PidInfo {
            pid,
            ppid,
            uid,
            comm: format!("p{pid}"),
            tty_path: None,
            exe: Some(PathBuf::from(exe)),
            exe_deleted: false,
        }
    }

    fn table_of(infos: Vec<PidInfo>, dir: &Path) -> ProcTable {
        // Snapshot from a synthetic proc root so the table is built the
        // same way the engine builds it.
        use std::os::unix::fs::symlink;
        let proc_root = dir.join("proc");
        for info in &infos {
            let pid_dir = proc_root.join(info.pid.to_string());
            fs::create_dir_all(&pid_dir).unwrap();
            fs::write(
                pid_dir.join("stat"),
                format!(
                    "{} ({}) S {} {} {} 0 0",
                    info.pid, info.comm, info.ppid, info.pid, info.pid
                ),
            )
            .unwrap();
            fs::write(
                pid_dir.join("status"),
                format!("Uid:\t{}\t{}\t{}\t{}\n", info.uid, info.uid, info.uid, info.uid),
            )
            .unwrap();
            symlink(info.exe.as_ref().unwrap(), pid_dir.join("exe")).unwrap();
        }
        ProcTable::snapshot(&proc_root).unwrap()
    }

    fn attributor<'a>(ctx: &'a ScanContext, table: &'a ProcTable) -> Attributor<'a> {
        static HOOKS: NoopHookRunner = NoopHookRunner;
        static INTERP: NoopInterpreterProber = NoopInterpreterProber;
        static PROBE: NoopServiceManagerProbe = NoopServiceManagerProbe;
        Attributor::new(ctx, table, &HOOKS, &INTERP, &PROBE)
    }

    #[test]
    fn controlling_tty_wins() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(vec![pid(1, 0, 0, "/usr/lib/systemd/systemd")], dir.path());
        let mut info = pid(400, 1, 1000, "/usr/bin/app");
        info.tty_path = Some(PathBuf::from("/dev/pts/2"));

        let attribution = attributor(&ctx, &table).attribute(&info);
        assert_eq!(
            attribution,
            Attribution::Session {
                uid: 1000,
                session_id: "/dev/pts/2".into()
            }
        );
    }

    #[test]
    fn pivot_climbs_to_child_of_init() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(
            vec![
                pid(1, 0, 0, "/usr/lib/systemd/systemd"),
                pid(10, 1, 0, "/usr/sbin/daemon"),
                pid(11, 10, 0, "/usr/sbin/daemon"),
                pid(12, 11, 0, "/usr/sbin/worker"),
            ],
            dir.path(),
        );
        let attributor = attributor(&ctx, &table);
        let candidate = attributor.pivot(table.get(12).unwrap());
        assert_eq!(candidate.pid, 10);
    }

    #[test]
    fn pivot_survives_pid_cycles() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(
            vec![pid(30, 31, 0, "/usr/bin/a"), pid(31, 30, 0, "/usr/bin/b")],
            dir.path(),
        );
        let attributor = attributor(&ctx, &table);
        // Terminates despite the ppid cycle.
        let candidate = attributor.pivot(table.get(30).unwrap());
        assert!(candidate.pid == 30 || candidate.pid == 31);
    }

    #[test]
    fn service_manager_root_for_pid_one() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(vec![pid(1, 0, 0, "/usr/lib/systemd/systemd")], dir.path());
        let attribution = attributor(&ctx, &table).attribute(table.get(1).unwrap());
        assert_eq!(
            attribution,
            Attribution::Units(vec![ControllableUnit::ServiceManagerRoot])
        );
    }

    #[test]
    fn legacy_init_for_pid_one() {
        let dir = tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.has_service_manager = false;
        let table = table_of(vec![pid(1, 0, 0, "/sbin/init")], dir.path());
        let attribution = attributor(&ctx, &table).attribute(table.get(1).unwrap());
        assert_eq!(
            attribution,
            Attribution::Units(vec![ControllableUnit::LegacyInit])
        );
    }

    #[test]
    fn cgroup_service_segment_is_extracted() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(
            vec![
                pid(1, 0, 0, "/usr/lib/systemd/systemd"),
                pid(100, 1, 0, "/usr/sbin/foo"),
            ],
            dir.path(),
        );
        fs::write(
            dir.path().join("proc/100/cgroup"),
            "12:pids:/system.slice/other\n1:name=systemd:/system.slice/foo.service\n",
        )
        .unwrap();

        let attribution = attributor(&ctx, &table).attribute(table.get(100).unwrap());
        assert_eq!(
            attribution,
            Attribution::Units(vec![ControllableUnit::ServiceUnit("foo.service".into())])
        );
    }

    #[test]
    fn unified_hierarchy_lines_count_as_managed() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(
            vec![
                pid(1, 0, 0, "/usr/lib/systemd/systemd"),
                pid(100, 1, 0, "/usr/sbin/foo"),
            ],
            dir.path(),
        );
        fs::write(
            dir.path().join("proc/100/cgroup"),
            "0::/system.slice/foo.service\n",
        )
        .unwrap();

        let attribution = attributor(&ctx, &table).attribute(table.get(100).unwrap());
        assert_eq!(
            attribution,
            Attribution::Units(vec![ControllableUnit::ServiceUnit("foo.service".into())])
        );
    }

    #[test]
    fn session_scope_becomes_a_session() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let table = table_of(
            vec![
                pid(1, 0, 0, "/usr/lib/systemd/systemd"),
                pid(100, 1, 1000, "/usr/bin/app"),
            ],
            dir.path(),
        );
        fs::write(
            dir.path().join("proc/100/cgroup"),
            "0::/user.slice/user-1000.slice/session-4.scope\n",
        )
        .unwrap();

        let attribution = attributor(&ctx, &table).attribute(table.get(100).unwrap());
        assert_eq!(
            attribution,
            Attribution::Session {
                uid: 1000,
                session_id: "session #4".into()
            }
        );
    }

    #[test]
    fn unprivileged_scans_never_yield_units() {
        let dir = tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.privileged = false;
        ctx.caller_uid = 1000;
        let table = table_of(
            vec![
                pid(1, 0, 0, "/usr/lib/systemd/systemd"),
                pid(100, 1, 1000, "/usr/bin/app"),
            ],
            dir.path(),
        );
        fs::write(
            dir.path().join("proc/100/cgroup"),
            "1:name=systemd:/system.slice/foo.service\n",
        )
        .unwrap();

        let attribution = attributor(&ctx, &table).attribute(table.get(100).unwrap());
        assert_eq!(attribution, Attribution::Unknown);
    }
}
