#![forbid(unsafe_code)]

//! LSB init-script header evaluation.
//!
//! Hook scripts hand us init-script candidates; the header decides how
//! much we trust each one. A script whose `Default-Start` covers the
//! current runlevel and whose body references a pidfile containing the
//! candidate pid is a confirmed match. A script with a matching runlevel
//! but no usable pidfile, or with a broken header, stays a last-resort
//! candidate. A script for other runlevels is ignored.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

const BEGIN_MARKER: &str = "### BEGIN INIT INFO";
const END_MARKER: &str = "### END INIT INFO";

const RECOGNISED_TAGS: &[&str] = &[
    "provides",
    "required-start",
    "required-stop",
    "should-start",
    "should-stop",
    "default-start",
    "default-stop",
    "short-description",
    "description",
];

static PIDFILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:/var)?/run/[0-9A-Za-z._/-]+\.pid").expect("pidfile pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptVerdict {
    /// Runlevel matches and a referenced pidfile contains the pid.
    Confirmed,
    /// Plausible but unproven; used only when nothing confirms.
    Candidate,
    /// Not started in the current runlevel.
    Ignored,
}

/// Evaluate one init script against a candidate pid. Pidfile references
/// are resolved under `fs_root` so synthetic trees can supply their own
/// `/run`.
pub fn evaluate(script: &Path, runlevel: &str, fs_root: &Path, pid: i32) -> ScriptVerdict {
    let text = match fs::read_to_string(script) {
        Ok(text) => text,
        Err(err) => {
            warn!(script = %script.display(), %err, "init script unreadable");
            return ScriptVerdict::Candidate;
        }
    };

    let Some(header) = parse_header(&text) else {
        debug!(script = %script.display(), "no LSB header block");
        return ScriptVerdict::Candidate;
    };
    if !header.recognised {
        warn!(script = %script.display(), "LSB header block has no recognised tags");
        return ScriptVerdict::Candidate;
    }

    if !header.default_start.iter().any(|level| *level == runlevel) {
        return ScriptVerdict::Ignored;
    }

    for reference in PIDFILE_RE.find_iter(header.body) {
        let path = reference.as_str();
        let normalized = path.strip_prefix("/var").unwrap_or(path);
        let rebased = fs_root.join(normalized.trim_start_matches('/'));
        let Ok(content) = fs::read_to_string(&rebased) else {
            continue;
        };
        let recorded = content
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<i32>().ok());
        if recorded == Some(pid) {
            trace!(script = %script.display(), pidfile = path, pid, "pidfile confirms script");
            return ScriptVerdict::Confirmed;
        }
    }

    ScriptVerdict::Candidate
}

struct Header<'a> {
    default_start: Vec<&'a str>,
    recognised: bool,
    body: &'a str,
}

fn parse_header(text: &str) -> Option<Header<'_>> {
    let (_, after_begin) = text.split_once(BEGIN_MARKER)?;
    let (header, body) = after_begin
        .split_once(END_MARKER)
        .unwrap_or((after_begin, ""));

    let mut default_start = Vec::new();
    let mut recognised = false;
    for line in header.lines() {
        let Some(comment) = line.trim_start().strip_prefix('#') else {
            continue;
        };
        let Some((tag, value)) = comment.split_once(':') else {
            continue;
        };
        let tag = tag.trim().to_ascii_lowercase();
        if RECOGNISED_TAGS.contains(&tag.as_str()) {
            recognised = true;
        }
        if tag == "default-start" {
            default_start = value.split_whitespace().collect();
        }
    }

    Some(Header {
        default_start,
        recognised,
        body,
    })
}
