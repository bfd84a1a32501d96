#![forbid(unsafe_code)]

mod banner;
mod error;
mod natord;
mod scan;

pub use banner::{Banner, parse_banner};
pub use error::Error;
pub use natord::natural_cmp;
pub use scan::{KernelScanner, KernelVerdict};
