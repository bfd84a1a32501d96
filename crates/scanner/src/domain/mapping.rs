#![forbid(unsafe_code)]

use std::path::PathBuf;

/// One line of a pid's memory-map view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub perms: String,
    /// Device id exactly as the kernel printed it (`hh:hh`). Kept textual:
    /// the encoding the kernel chose is compared against the candidate
    /// encodings of the stat result, not parsed back into a number.
    pub dev: String,
    pub inode: u64,
    /// Backing path, possibly still carrying a trailing ` (deleted)`.
    pub path: Option<PathBuf>,
}

impl Mapping {
    /// Parse one map line: `vaddr-range perms offset dev inode [path]`.
    /// The path may contain spaces; everything after the inode belongs to
    /// it. Returns `None` for lines that do not match the shape (the
    /// caller skips them).
    pub fn parse(line: &str) -> Option<Self> {
        let (_vaddr, rest) = split_token(line)?;
        let (perms, rest) = split_token(rest)?;
        let (_offset, rest) = split_token(rest)?;
        let (dev, rest) = split_token(rest)?;
        let (inode, rest) = split_token(rest)?;

        if !dev.contains(':') {
            return None;
        }
        let inode: u64 = inode.parse().ok()?;

        let path = rest.trim();
        let path = (!path.is_empty()).then(|| PathBuf::from(path));

        Some(Self {
            perms: perms.to_string(),
            dev: dev.to_string(),
            inode,
            path,
        })
    }

    pub fn is_executable(&self) -> bool {
        self.perms.contains('x')
    }
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// The `(dev, inode)` identity of an on-disk file as observed by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdent {
    pub dev: u64,
    pub inode: u64,
}
