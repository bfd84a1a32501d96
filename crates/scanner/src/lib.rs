#![forbid(unsafe_code)]

mod attribute;
mod classify;
mod context;
pub mod device;
pub mod domain;
mod engine;
mod error;
mod hooks;
pub mod lsb;
mod maps;
mod probes;
mod proc_table;
mod progress;
mod report;

pub use attribute::{Attribution, Attributor};
pub use classify::classify;
pub use context::ScanContext;
pub use domain::{ControllableUnit, FileIdent, Mapping, ObsolescenceReason, PidInfo, Verdict};
pub use engine::{Collaborators, ScanEngine};
pub use error::Error;
pub use hooks::{HookFact, HookRunner, NoopHookRunner, ShellHookRunner};
pub use maps::MapScanner;
pub use probes::{
    InterpreterProber, NoopInterpreterProber, NoopServiceManagerProbe, ServiceManagerProbe,
    SystemctlProbe, current_runlevel,
};
pub use proc_table::ProcTable;
pub use progress::{NoopProgress, Progress};
pub use report::Report;
