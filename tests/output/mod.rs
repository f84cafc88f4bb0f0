//! Output capture tests.

mod capture_test;
