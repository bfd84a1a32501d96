#![forbid(unsafe_code)]

//! Textual encodings of a filesystem device id.
//!
//! The kernel's map output prints the device as `hh:hh`, but which
//! major/minor split it uses depends on the kernel version. A stat result
//! is therefore compared against every candidate encoding of its device
//! number rather than a single canonical one.

/// The candidate `hh:hh` encodings of a numeric device id.
pub fn encodings(dev: u64) -> [String; 3] {
    let modern_major = ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff);
    let modern_minor = (dev & 0xff) | ((dev >> 12) & !0xff);
    let traditional_major = dev >> 8;
    let traditional_minor = dev & 0xff;
    [
        format!("{modern_major:02x}:{modern_minor:02x}"),
        format!("{traditional_major:02x}:{traditional_minor:02x}"),
        // Platforms that report no device id for file-backed maps.
        "00:00".to_string(),
    ]
}

/// Whether a map entry's textual device id matches a stat'd device number.
///
/// Any `00:`-prefixed id is accepted outright: anonymous or virtual block
/// devices (overlay and other copy-on-write filesystems) report a device
/// in the map table that corresponds to no stat result, and rejecting
/// them would report every process on such a filesystem as obsolete.
pub fn matches(dev_text: &str, dev: u64) -> bool {
    dev_text.starts_with("00:") || encodings(dev).iter().any(|candidate| candidate == dev_text)
}
