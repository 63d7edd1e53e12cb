//! Test suites for the daemon lifecycle.

mod support;
mod unit;
