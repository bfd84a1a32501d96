#![forbid(unsafe_code)]

use crate::domain::ControllableUnit;
use config::OverrideRule;
use kernel::KernelVerdict;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use tracing::debug;

/// Everything one scan found. Owned aggregates only; nothing references
/// the process table snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub units: BTreeSet<ControllableUnit>,
    /// uid → session id → comm → pids.
    pub user_sessions: BTreeMap<u32, BTreeMap<String, BTreeMap<String, BTreeSet<i32>>>>,
    pub kernel: Option<KernelVerdict>,
    /// The restart override policy, recorded untouched for the caller.
    pub overrides: Vec<OverrideRule>,
    /// Obsolete pids no attribution matched.
    pub unattributed: usize,
}

impl Report {
    pub fn new(overrides: Vec<OverrideRule>) -> Self {
        Self {
            overrides,
            ..Self::default()
        }
    }

    pub fn add_session(&mut self, uid: u32, session_id: String, comm: String, pid: i32) {
        self.user_sessions
            .entry(uid)
            .or_default()
            .entry(session_id)
            .or_default()
            .entry(comm)
            .or_default()
            .insert(pid);
    }

    /// Insert a unit, applying the unit blacklist and the duplicate
    /// rules: a bare name never coexists with its `.service` form, and an
    /// init script never coexists with a service unit of the same name.
    /// Returns whether the unit ended up in the set.
    pub fn insert_unit(&mut self, unit: ControllableUnit, blacklist: &[Regex]) -> bool {
        debug_assert!(!matches!(
            unit,
            ControllableUnit::UserSession { .. } | ControllableUnit::Unknown
        ));

        let label = unit.label();
        if blacklist.iter().any(|re| re.is_match(&label)) {
            debug!(unit = %unit, "unit is blacklisted");
            return false;
        }

        match &unit {
            ControllableUnit::ServiceUnit(name) => {
                if let Some(stem) = name.strip_suffix(".service") {
                    self.units
                        .remove(&ControllableUnit::ServiceUnit(stem.to_string()));
                    self.units.retain(|existing| {
                        !matches!(existing, ControllableUnit::InitScript(path)
                            if path.file_name().and_then(|n| n.to_str()) == Some(stem))
                    });
                } else if self
                    .units
                    .contains(&ControllableUnit::ServiceUnit(format!("{name}.service")))
                {
                    return false;
                }
            }
            ControllableUnit::InitScript(path) => {
                if let Some(stem) = path.file_name().and_then(|n| n.to_str())
                    && (self
                        .units
                        .contains(&ControllableUnit::ServiceUnit(stem.to_string()))
                        || self
                            .units
                            .contains(&ControllableUnit::ServiceUnit(format!("{stem}.service"))))
                {
                    debug!(script = %path.display(), "init script shadowed by service unit");
                    return false;
                }
            }
            _ => {}
        }

        self.units.insert(unit)
    }

    /// One line per fact, machine-parsable.
    pub fn write_batch(&self, out: &mut impl Write, version: &str) -> io::Result<()> {
        writeln!(out, "NEEDRESTART-VER: {version}")?;

        if let Some(kernel) = &self.kernel {
            if let Some(current) = kernel.current() {
                writeln!(out, "NEEDRESTART-KCUR: {current}")?;
            }
            if let Some(expected) = kernel.expected() {
                writeln!(out, "NEEDRESTART-KEXP: {expected}")?;
            }
            writeln!(out, "NEEDRESTART-KSTA: {}", kernel.status_code())?;
        }

        for unit in &self.units {
            writeln!(out, "NEEDRESTART-SVC: {unit}")?;
        }

        for sessions in self.user_sessions.values() {
            for comms in sessions.values() {
                for (comm, pids) in comms {
                    for pid in pids {
                        writeln!(out, "NEEDRESTART-PID: {comm}[{pid}]")?;
                    }
                }
            }
        }
        Ok(())
    }
}
