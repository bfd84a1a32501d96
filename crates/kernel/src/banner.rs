#![forbid(unsafe_code)]

use regex::Regex;
use std::io::Read;
use std::sync::LazyLock;

/// A kernel version banner: the release token plus the full banner text it
/// was found in, starting at the release token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub release: String,
    pub line: String,
}

impl Banner {
    /// Whitespace-delimited tokens of the banner text.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.line.split_whitespace()
    }
}

/// Banner grammar: a release token starting with a digit, the builder
/// address in parentheses, then build metadata to end of line.
static GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9][0-9A-Za-z._+-]*) \([^()\s]+@[^()\s]+\) .+").expect("banner grammar")
});

/// Find the first substring of `text` matching the banner grammar.
///
/// Works both on `/proc/version` content (the `Linux version ` prefix is
/// simply not part of the match) and on lines pulled out of image files.
pub fn parse_banner(text: &str) -> Option<Banner> {
    let found = GRAMMAR.captures(text)?;
    let whole = found.get(0)?;
    Some(Banner {
        release: found.get(1)?.as_str().to_string(),
        line: whole.as_str().trim_end().to_string(),
    })
}

const BANNER_NEEDLE: &[u8] = b"Linux version ";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b, 0x08];

/// Longest banner line we will pull out of an image.
const LINE_CAP: usize = 512;

/// Cap on inflated payload size; kernels decompress to well under this.
const INFLATE_CAP: usize = 256 * 1024 * 1024;

/// Extract the version banner embedded in a kernel image.
///
/// The raw bytes are searched first; compressed images additionally have
/// every gzip member inflated and searched. Returns `None` when no string
/// in the image matches the banner grammar.
pub fn image_banner(data: &[u8]) -> Option<Banner> {
    if let Some(banner) = banner_in_bytes(data) {
        return Some(banner);
    }
    let mut from = 0;
    while let Some(pos) = find(&data[from..], GZIP_MAGIC) {
        let offset = from + pos;
        let inflated = inflate(&data[offset..]);
        if let Some(banner) = banner_in_bytes(&inflated) {
            return Some(banner);
        }
        from = offset + 1;
    }
    None
}

fn banner_in_bytes(data: &[u8]) -> Option<Banner> {
    let mut from = 0;
    while let Some(pos) = find(&data[from..], BANNER_NEEDLE) {
        let start = from + pos + BANNER_NEEDLE.len();
        let line: Vec<u8> = data[start..]
            .iter()
            .copied()
            .take(LINE_CAP)
            .take_while(|&b| b != b'\n' && b != 0 && (0x20..0x7f).contains(&b))
            .collect();
        if let Ok(text) = std::str::from_utf8(&line)
            && let Some(banner) = parse_banner(text)
        {
            return Some(banner);
        }
        from = start;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Inflate a gzip member starting at the beginning of `data`. Trailing
/// garbage after the member ends the read; whatever inflated so far is
/// returned.
fn inflate(data: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&buf[..n]);
                if out.len() >= INFLATE_CAP {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    out
}
