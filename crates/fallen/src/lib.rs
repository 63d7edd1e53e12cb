//! Conventional Unix daemon behaviour for host applications.
//!
//! `fallen` detaches a process from its terminal, redirects its standard
//! streams, guards it with a PID file and turns SIGINT/SIGTERM into an orderly
//! shutdown. The host supplies the main loop and optional hooks; the library
//! supplies the lifecycle around them.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fallen::{Fallen, Hooks};
//!
//! # fn main() -> Result<(), fallen::LifecycleError> {
//! let mut daemon = Fallen::from_current_dir()?
//!     .with_hooks(Hooks::new().after_stop(|| eprintln!("bye")));
//! daemon.set_pid_file("/tmp/example.pid")?;
//! daemon.set_stdout("example.log")?;
//! let outcome = daemon.start(|shutdown| {
//!     shutdown.wait(Duration::from_millis(200));
//!     Ok::<(), std::io::Error>(())
//! })?;
//! std::process::exit(i32::from(outcome.exit_code()));
//! # }
//! ```
//!
//! ## Process coordination
//!
//! A controlling invocation (`stop`, `restart`) and the running daemon share
//! nothing but the PID file and the OS process table:
//!
//! 1. `start` reads the PID file and probes the recorded identifier with the
//!    null signal. A live process refuses the start (exit code 2); a dead one
//!    marks the file stale and it is overwritten.
//! 2. `stop` reads the PID file and sends SIGINT. Delivery removes the file
//!    (exit code 0); a missing process leaves it in place (exit code 3); no
//!    file at all yields exit code 1.
//! 3. The daemon's signal handlers only raise a [`ShutdownToken`]. The run
//!    loop returns, and the shutdown path (hooks, PID file removal) runs in
//!    ordinary execution context.
//!
//! Refusals are returned as [`Outcome`] values; the library never exits the
//! process itself.

mod config;
mod hooks;
mod lifecycle;
mod outcome;
mod process;
mod reporter;

pub use config::{DaemonConfig, LaunchMode, StdStream};
pub use hooks::{HookPoint, Hooks};
pub use lifecycle::Fallen;
pub use outcome::{Outcome, Status};
pub use process::{
    DaemonizeError, Daemonizer, Delivery, LifecycleError, PidFile, PidFileError, ProcessControl,
    ProcessRecord, ProcessTable, RedirectError, ShutdownError, ShutdownToken, SignalRouter,
    StreamRedirector, SystemDaemonizer, SystemProcessTable, SystemSignalRouter,
    SystemStreamRedirector,
};
pub use reporter::{LifecycleState, StateReporter, StructuredStateReporter};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

#[cfg(test)]
mod tests;
