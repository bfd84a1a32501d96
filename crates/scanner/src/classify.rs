#![forbid(unsafe_code)]

use crate::context::ScanContext;
use crate::domain::{ObsolescenceReason, PidInfo, Verdict};
use crate::maps::MapScanner;
use crate::probes::InterpreterProber;
use tracing::trace;

/// Classify one pid. `None` means the pid vanished mid-scan and
/// contributes nothing.
///
/// The exe blacklist is consulted before anything else so that a
/// blacklisted process can never surface in a report, not even through
/// its deleted exe link.
pub fn classify(
    ctx: &ScanContext,
    maps: &MapScanner,
    interp: &dyn InterpreterProber,
    info: &PidInfo,
) -> Option<Verdict> {
    if !ctx.privileged && info.uid != ctx.caller_uid {
        return Some(Verdict::Current);
    }

    if let Some(exe) = &info.exe {
        let text = exe.to_string_lossy();
        if ctx.blacklist.iter().any(|re| re.is_match(&text)) {
            trace!(pid = info.pid, exe = %text, "exe is blacklisted");
            return Some(Verdict::Current);
        }
    }

    if info.exe_deleted {
        return Some(Verdict::Obsolete(ObsolescenceReason::DeletedExe));
    }

    match maps.scan(info.pid)? {
        Verdict::Obsolete(reason) => return Some(Verdict::Obsolete(reason)),
        Verdict::Current => {}
    }

    if ctx.interpscan
        && let Some(exe) = &info.exe
        && let Some(source) = interp.check(info.pid, exe)
    {
        return Some(Verdict::Obsolete(ObsolescenceReason::InterpreterSource(
            source,
        )));
    }

    Some(Verdict::Current)
}
