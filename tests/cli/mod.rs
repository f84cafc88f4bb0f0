//! Command-line tests against the built binary.

mod binary_test;
