#![forbid(unsafe_code)]

/// Opaque progress sink. The engine reports one step per table entry
/// against a fixed total; how (and whether) that is drawn is up to the
/// implementation.
pub trait Progress: Send {
    fn prep(&mut self, total: usize, label: &str);
    fn step(&mut self, detail: &str);
    fn fin(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl Progress for NoopProgress {
    fn prep(&mut self, _total: usize, _label: &str) {}
    fn step(&mut self, _detail: &str) {}
    fn fin(&mut self) {}
}
