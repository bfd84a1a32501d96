#![forbid(unsafe_code)]

mod mapping;
mod pid_info;
mod unit;
mod verdict;

pub use mapping::{FileIdent, Mapping};
pub use pid_info::PidInfo;
pub use unit::ControllableUnit;
pub use verdict::{ObsolescenceReason, Verdict};
