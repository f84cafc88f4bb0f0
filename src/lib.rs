//! kitd - Supervise a single command: restart it with backoff, log its
//! output, relay signals to it.

pub mod config;
pub mod daemon;
pub mod output;
pub mod supervisor;
