//! Test suites for the demo host.
