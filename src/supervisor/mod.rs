//! Supervision of a single child: backoff, signals, process control and the
//! loop that ties them together.

mod backoff;
mod child;
mod runner;
mod signals;
mod state;

pub use backoff::*;
pub use child::*;
pub use runner::*;
pub use signals::*;
pub use state::*;
