use config::{Config, OverrideRule};
use kernel::KernelVerdict;
use regex::Regex;
use scanner::{Progress, Report};
use std::io::{self, IsTerminal, Write};
use tracing::warn;

/// Progress counter on stderr. Only draws on a terminal and never under
/// verbosity, where the log lines would clobber it.
#[derive(Debug, Default)]
pub struct TermProgress {
    label: String,
    total: usize,
    count: usize,
    draw: bool,
    verbose: bool,
}

impl TermProgress {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }
}

impl Progress for TermProgress {
    fn prep(&mut self, total: usize, label: &str) {
        self.total = total;
        self.count = 0;
        self.label = label.to_string();
        self.draw = !self.verbose && io::stderr().is_terminal();
    }

    fn step(&mut self, _detail: &str) {
        self.count += 1;
        if self.draw {
            eprint!("\r{} [{}/{}]", self.label, self.count, self.total);
        }
    }

    fn fin(&mut self) {
        if self.draw {
            eprint!("\r\x1b[K");
        }
    }
}

/// Render the human-readable report.
pub fn render_list(out: &mut impl Write, report: &Report, config: &Config) -> io::Result<()> {
    match &report.kernel {
        Some(KernelVerdict::UpToDate) => writeln!(out, "Running kernel is up to date.")?,
        Some(KernelVerdict::AbiUpgrade { current, expected }) => writeln!(
            out,
            "Pending kernel ABI upgrade: {current} was rebuilt (expected {expected})."
        )?,
        Some(KernelVerdict::VersionUpgrade { current, expected }) => writeln!(
            out,
            "Pending kernel upgrade: running {current}, installed {expected}."
        )?,
        Some(KernelVerdict::Unknown) => writeln!(out, "Could not determine kernel status.")?,
        None => {}
    }

    if report.units.is_empty() {
        writeln!(out, "No services need to be restarted.")?;
    } else {
        let overrides = compile_overrides(&report.overrides);
        writeln!(out, "Services to be restarted:")?;
        for unit in &report.units {
            if restart_allowed(&overrides, &unit.label(), config.ui.defno) {
                writeln!(out, "  {unit}")?;
            } else {
                writeln!(out, "  {unit} (restart skipped)")?;
            }
        }
    }

    if report.unattributed > 0 {
        writeln!(
            out,
            "{} obsolete process(es) could not be attributed to a unit.",
            report.unattributed
        )?;
    }

    if !report.user_sessions.is_empty() {
        writeln!(out, "User sessions running outdated binaries:")?;
        for (uid, sessions) in &report.user_sessions {
            for (session, comms) in sessions {
                let procs: Vec<String> = comms
                    .iter()
                    .map(|(comm, pids)| {
                        let pids: Vec<String> = pids.iter().map(i32::to_string).collect();
                        format!("{comm}[{}]", pids.join(","))
                    })
                    .collect();
                writeln!(out, "  uid {uid} @ {session}: {}", procs.join(" "))?;
            }
        }
    }

    Ok(())
}

fn compile_overrides(rules: &[OverrideRule]) -> Vec<(Regex, bool)> {
    rules
        .iter()
        .filter_map(|rule| match Regex::new(&rule.pattern) {
            Ok(re) => Some((re, rule.restart)),
            Err(err) => {
                warn!(pattern = %rule.pattern, %err, "ignoring invalid override pattern");
                None
            }
        })
        .collect()
}

/// First matching override rule decides; without one the default answer
/// applies.
fn restart_allowed(rules: &[(Regex, bool)], label: &str, defno: bool) -> bool {
    for (re, restart) in rules {
        if re.is_match(label) {
            return *restart;
        }
    }
    !defno
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scanner::ControllableUnit;

    fn render(report: &Report, config: &Config) -> String {
        let mut out = Vec::new();
        render_list(&mut out, report, config).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn lists_units_sessions_and_kernel() {
        let mut report = Report::default();
        report.kernel = Some(KernelVerdict::VersionUpgrade {
            current: "5.10.0-9-amd64".into(),
            expected: "5.10.0-10-amd64".into(),
        });
        report.insert_unit(ControllableUnit::ServiceUnit("ssh.service".into()), &[]);
        report.add_session(1000, "/dev/pts/2".into(), "vim".into(), 400);

        let text = render(&report, &Config::default());
        assert_eq!(
            text,
            "Pending kernel upgrade: running 5.10.0-9-amd64, installed 5.10.0-10-amd64.\n\
             Services to be restarted:\n  ssh.service\n\
             User sessions running outdated binaries:\n  uid 1000 @ /dev/pts/2: vim[400]\n"
        );
    }

    #[test]
    fn override_rules_mark_skipped_units() {
        let mut report = Report::default();
        report.overrides.push(OverrideRule {
            pattern: "^dbus".into(),
            restart: false,
        });
        report.insert_unit(ControllableUnit::ServiceUnit("dbus.service".into()), &[]);
        report.insert_unit(ControllableUnit::ServiceUnit("ssh.service".into()), &[]);

        let text = render(&report, &Config::default());
        assert!(text.contains("dbus.service (restart skipped)"));
        assert!(text.contains("  ssh.service\n"));
    }

    #[test]
    fn defno_flips_the_default_answer() {
        let mut config = Config::default();
        config.ui.defno = true;
        let mut report = Report::default();
        report.insert_unit(ControllableUnit::ServiceUnit("ssh.service".into()), &[]);

        let text = render(&report, &config);
        assert!(text.contains("ssh.service (restart skipped)"));
    }

    #[test]
    fn empty_report_still_says_so() {
        let text = render(&Report::default(), &Config::default());
        assert_eq!(text, "No services need to be restarted.\n");
    }
}
