//! Configuration module.

mod duration;
mod error;
mod loader;
mod types;

pub use duration::*;
pub use error::*;
pub use loader::*;
pub use types::*;
