//! Entry point for the `fallen-demo` daemon host.
//!
//! Delegates to [`fallen_demo::run`], which loads configuration, applies it to
//! the daemon and executes one lifecycle command. The standard handles are not
//! locked here: the daemon's log output shares standard error and may outlive
//! a detach.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    fallen_demo::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
