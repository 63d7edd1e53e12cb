//! Structured results of lifecycle commands and their exit-code contract.
//!
//! Refusals are not errors: they are expected answers to "start" and "stop"
//! requests and each maps onto a fixed process exit code. The caller decides
//! whether to terminate; the library never exits on its own.

use std::fmt;
use std::io::{self, Write};
use std::process::ExitCode;

/// Result of `start`, `stop` or `restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command completed.
    Success,
    /// `start` refused: the PID file names a live process.
    AlreadyRunning {
        /// Identifier recorded in the PID file.
        pid: u32,
    },
    /// `stop` refused: no PID file is configured or present.
    NoPidFile,
    /// `stop` found a PID file whose process no longer exists.
    StaleProcess {
        /// Identifier recorded in the PID file.
        pid: u32,
    },
}

impl Outcome {
    /// Conventional exit status for the outcome.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::NoPidFile => 1,
            Self::AlreadyRunning { .. } => 2,
            Self::StaleProcess { .. } => 3,
        }
    }

    /// Returns `true` for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Writes the one-line diagnostic for refusals; successes write nothing.
    pub fn report<W: Write>(self, mut writer: W) -> io::Result<()> {
        if self.is_success() {
            return Ok(());
        }
        writeln!(writer, "{self}")?;
        writer.flush()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => formatter.write_str("ok"),
            Self::AlreadyRunning { pid } => {
                write!(formatter, "Daemon is already running with PID {pid}")
            }
            Self::NoPidFile => formatter.write_str("Couldn't find a PID file"),
            Self::StaleProcess { pid } => write!(formatter, "No daemon is running with PID {pid}"),
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        Self::from(outcome.exit_code())
    }
}

/// What the PID file and process table say about the configured daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No PID file is configured, present, or it records nothing.
    NotRunning,
    /// The recorded process is alive.
    Running {
        /// Identifier recorded in the PID file.
        pid: u32,
    },
    /// The PID file outlived its process.
    Stale {
        /// Identifier recorded in the PID file.
        pid: u32,
    },
}

impl fmt::Display for Status {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => formatter.write_str("daemon is not running"),
            Self::Running { pid } => write!(formatter, "daemon is running with PID {pid}"),
            Self::Stale { pid } => write!(formatter, "stale PID file records dead PID {pid}"),
        }
    }
}
