//! Defines the unified error surface for lifecycle commands.
//!
//! Refusals ("already running", "no PID file", "stale process") are reported
//! as [`crate::Outcome`] values; everything here is an unexpected failure.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use super::daemonizer::DaemonizeError;
use super::pid_file::PidFileError;
use super::shutdown::ShutdownError;
use super::streams::RedirectError;

/// Errors surfaced while configuring, starting, stopping or running a daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A configured path could not be made absolute.
    #[error("failed to resolve path '{path}': {source}")]
    ResolvePath {
        /// Path as supplied by the host.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Changing the working directory failed.
    #[error("failed to change working directory to '{path}': {source}")]
    WorkingDirectory {
        /// Resolved directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reopening a standard stream failed.
    #[error("failed to redirect standard stream: {source}")]
    Redirect {
        /// Underlying redirect error.
        #[source]
        source: RedirectError,
    },
    /// Reading, writing or removing the PID file failed.
    #[error("pid file operation failed: {source}")]
    PidFile {
        /// Underlying PID file error.
        #[source]
        source: PidFileError,
    },
    /// Delivering the interrupt failed for a reason other than a missing process.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target identifier.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Daemonisation failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Installing the shutdown signal handlers failed.
    #[error("failed to route shutdown signals: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The host's run loop reported an error.
    #[error("daemon run loop failed: {source}")]
    Run {
        /// Error returned by the run loop.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl From<RedirectError> for LifecycleError {
    fn from(source: RedirectError) -> Self {
        Self::Redirect { source }
    }
}

impl From<PidFileError> for LifecycleError {
    fn from(source: PidFileError) -> Self {
        Self::PidFile { source }
    }
}

impl From<DaemonizeError> for LifecycleError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<ShutdownError> for LifecycleError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
