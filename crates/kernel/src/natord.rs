#![forbid(unsafe_code)]

use std::cmp::Ordering;

/// Compare two strings in natural order: alternating numeric and
/// non-numeric runs, where numeric runs compare by integer value and
/// non-numeric runs compare lexicographically.
///
/// This is the ordering used both for kernel release tokens (so
/// `5.10.0-9-amd64` sorts below `5.10.0-10-amd64`) and for hook script
/// file names.
///
/// # Examples
///
/// ```
/// # use kernel::natural_cmp;
/// # use std::cmp::Ordering;
/// assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
/// assert_eq!(natural_cmp("5.10.0-9", "5.10.0-10"), Ordering::Less);
/// assert_eq!(natural_cmp("5.9.0", "5.10.0"), Ordering::Less);
/// assert_eq!(natural_cmp("a", "b"), Ordering::Less);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Runs::new(a);
    let mut right = Runs::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.numeric, y.numeric) {
                    (true, true) => cmp_numeric(x.text, y.text),
                    _ => x.text.cmp(y.text),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Compare two ASCII digit runs by integer value without parsing into a
/// fixed-width integer (runs may be arbitrarily long).
fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

struct Runs<'a> {
    rest: &'a str,
}

struct Run<'a> {
    text: &'a str,
    numeric: bool,
}

impl<'a> Runs<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Runs<'a> {
    type Item = Run<'a>;

    fn next(&mut self) -> Option<Run<'a>> {
        let first = self.rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != numeric)
            .unwrap_or(self.rest.len());
        let (run, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(Run { text: run, numeric })
    }
}
