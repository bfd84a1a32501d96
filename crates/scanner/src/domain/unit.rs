#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;

/// The smallest named entity the operator can ask the service manager or
/// init system to restart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ControllableUnit {
    /// The service manager itself (pid 1 under its binary path).
    ServiceManagerRoot,
    /// A traditional init as pid 1.
    LegacyInit,
    /// A named service unit, usually `<name>.service`.
    ServiceUnit(String),
    /// A legacy init script.
    InitScript(PathBuf),
    /// A process belonging to a login session rather than a unit.
    UserSession { uid: u32, session_id: String },
    Unknown,
}

impl ControllableUnit {
    /// The name unit blacklist patterns match against. Init scripts match
    /// by file name, everything else by its display name.
    pub fn label(&self) -> String {
        match self {
            ControllableUnit::InitScript(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ControllableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllableUnit::ServiceManagerRoot => write!(f, "systemd-manager"),
            ControllableUnit::LegacyInit => write!(f, "sysvinit"),
            ControllableUnit::ServiceUnit(name) => write!(f, "{name}"),
            ControllableUnit::InitScript(path) => write!(f, "{}", path.display()),
            ControllableUnit::UserSession { uid, session_id } => {
                write!(f, "session {session_id} (uid {uid})")
            }
            ControllableUnit::Unknown => write!(f, "unknown"),
        }
    }
}
