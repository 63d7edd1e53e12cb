//! Process-level collaborators: detachment, streams, PID files and signals.

pub(crate) mod daemonizer;
mod errors;
mod files;
pub(crate) mod pid_file;
pub(crate) mod probe;
pub(crate) mod shutdown;
pub(crate) mod streams;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use errors::LifecycleError;
pub use pid_file::{PidFile, PidFileError, ProcessRecord};
pub use probe::{Delivery, ProcessTable, SystemProcessTable};
pub use shutdown::{ShutdownError, ShutdownToken, SignalRouter, SystemSignalRouter};
pub use streams::{RedirectError, StreamRedirector, SystemStreamRedirector};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Bundle of process-level collaborators used by the lifecycle controller.
///
/// Production code uses [`ProcessControl::system`]; tests swap individual
/// pieces through the `with_*` builders.
pub struct ProcessControl {
    pub(crate) daemonizer: Box<dyn Daemonizer>,
    pub(crate) redirector: Box<dyn StreamRedirector>,
    pub(crate) processes: Box<dyn ProcessTable>,
    pub(crate) signals: Box<dyn SignalRouter>,
}

impl ProcessControl {
    /// Collaborators backed by the operating system.
    #[must_use]
    pub fn system() -> Self {
        Self {
            daemonizer: Box::new(SystemDaemonizer::new()),
            redirector: Box::new(SystemStreamRedirector::new()),
            processes: Box::new(SystemProcessTable::new()),
            signals: Box::new(SystemSignalRouter::new()),
        }
    }

    /// Replaces the daemoniser.
    #[must_use]
    pub fn with_daemonizer(mut self, daemonizer: impl Daemonizer + 'static) -> Self {
        self.daemonizer = Box::new(daemonizer);
        self
    }

    /// Replaces the stream redirector.
    #[must_use]
    pub fn with_redirector(mut self, redirector: impl StreamRedirector + 'static) -> Self {
        self.redirector = Box::new(redirector);
        self
    }

    /// Replaces the process table used for probing and signalling.
    #[must_use]
    pub fn with_processes(mut self, processes: impl ProcessTable + 'static) -> Self {
        self.processes = Box::new(processes);
        self
    }

    /// Replaces the signal router.
    #[must_use]
    pub fn with_signals(mut self, signals: impl SignalRouter + 'static) -> Self {
        self.signals = Box::new(signals);
        self
    }
}

impl Default for ProcessControl {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for ProcessControl {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("ProcessControl").finish_non_exhaustive()
    }
}
