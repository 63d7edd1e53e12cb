//! Detaches the host process from its controlling terminal.

use std::ffi::OsStr;
use std::path::Path;

use daemonize_me::Daemon;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background, keeping `working_dir` as
    /// the current directory of the surviving child.
    fn daemonize(&self, working_dir: &Path) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that delegates to `daemonize-me`.
///
/// The backend forks, starts a new session and lets the parent exit, so only
/// the detached child returns from [`Daemonizer::daemonize`]. Standard streams
/// are pointed at the null device by the backend; the lifecycle controller
/// reapplies any configured redirects afterwards.
///
/// The detached process keeps the host's name unless one is given through
/// [`SystemDaemonizer::named`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemDaemonizer {
    name: Option<String>,
}

impl SystemDaemonizer {
    /// Builds a daemoniser that leaves the process name alone.
    #[must_use]
    pub const fn new() -> Self {
        Self { name: None }
    }

    /// Builds a daemoniser that renames the detached process to `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// Name given to the detached process, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, working_dir: &Path) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            working_dir = %working_dir.display(),
            name = self.name(),
            "daemonising into background"
        );
        let mut daemon = Daemon::new().work_dir(working_dir);
        if let Some(name) = self.name() {
            daemon = daemon.name(OsStr::new(name));
        }
        daemon.start()?;
        info!(
            target: PROCESS_TARGET,
            pid = std::process::id(),
            "daemon process detached; continuing in child"
        );
        Ok(())
    }
}
