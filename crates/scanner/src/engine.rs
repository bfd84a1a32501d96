#![forbid(unsafe_code)]

use crate::attribute::{Attribution, Attributor};
use crate::classify::classify;
use crate::context::ScanContext;
use crate::domain::Verdict;
use crate::error::Error;
use crate::hooks::HookRunner;
use crate::maps::MapScanner;
use crate::probes::{InterpreterProber, ServiceManagerProbe};
use crate::proc_table::ProcTable;
use crate::progress::Progress;
use crate::report::Report;
use config::Config;
use kernel::KernelScanner;
use tracing::{debug, trace};

/// The pluggable collaborators one scan composes. Injected by the caller;
/// the engine holds no global registry.
pub struct Collaborators {
    pub hooks: Box<dyn HookRunner>,
    pub interp: Box<dyn InterpreterProber>,
    pub service_manager: Box<dyn ServiceManagerProbe>,
    pub progress: Box<dyn Progress>,
}

/// Runs one scan: snapshot, classify every pid in ascending order,
/// attribute the obsolete ones, then (optionally) compare kernels.
/// Strictly sequential; the attributor's first-match order is part of the
/// contract.
pub struct ScanEngine {
    config: Config,
    ctx: ScanContext,
    collab: Collaborators,
}

impl ScanEngine {
    /// Engine for the live system.
    pub fn new(config: Config, verbose: bool, collab: Collaborators) -> Result<Self, Error> {
        let ctx = ScanContext::detect(&config, verbose)?;
        Ok(Self {
            config,
            ctx,
            collab,
        })
    }

    /// Engine over an explicit context (synthetic roots, fixed runlevel).
    pub fn with_context(config: Config, ctx: ScanContext, collab: Collaborators) -> Self {
        Self {
            config,
            ctx,
            collab,
        }
    }

    pub fn run(&mut self) -> Result<Report, Error> {
        let table = ProcTable::snapshot(&self.ctx.proc_root)?;
        let maps = MapScanner::new(self.ctx.proc_root.clone());
        let mut report = Report::new(self.config.override_rc.clone());

        self.collab
            .progress
            .prep(table.len(), "Scanning processes for outdated binaries");

        let mut obsolete = Vec::new();
        for (pid, info) in table.iter() {
            self.collab.progress.step(&info.comm);
            if self.ctx.ignored.contains(pid) {
                trace!(pid = *pid, "ignoring own process tree");
                continue;
            }
            match classify(&self.ctx, &maps, self.collab.interp.as_ref(), info) {
                None => trace!(pid = *pid, "pid vanished during classification"),
                Some(Verdict::Current) => {}
                Some(Verdict::Obsolete(reason)) => {
                    debug!(pid = *pid, comm = %info.comm, ?reason, "process is obsolete");
                    obsolete.push(*pid);
                }
            }
        }
        self.collab.progress.fin();

        let attributor = Attributor::new(
            &self.ctx,
            &table,
            self.collab.hooks.as_ref(),
            self.collab.interp.as_ref(),
            self.collab.service_manager.as_ref(),
        );
        for pid in obsolete {
            let Some(info) = table.get(pid) else { continue };
            match attributor.attribute(info) {
                Attribution::Session { uid, session_id } => {
                    report.add_session(uid, session_id, info.comm.clone(), pid);
                }
                Attribution::Units(units) => {
                    for unit in units {
                        report.insert_unit(unit, &self.ctx.blacklist_rc);
                    }
                }
                Attribution::Unknown => {
                    report.unattributed += 1;
                }
            }
        }

        if self.config.scan.kernelhints {
            let verdict = KernelScanner::new(&self.config.scan.boot_dir)
                .with_version_path(self.ctx.proc_root.join("version"))
                .scan();
            report.kernel = Some(verdict);
        }

        Ok(report)
    }
}
