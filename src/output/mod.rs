//! Capture of child output into the log.

mod capture;
mod line;
mod sink;

pub use capture::*;
pub use line::*;
pub use sink::*;
