//! PID file persistence.
//!
//! The PID file is the only cross-process record of a running daemon. It holds
//! a single decimal process identifier; readers trim surrounding whitespace so
//! files written by other tools with a trailing newline are accepted.

use std::fmt;
use std::fs;
use std::io;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::PROCESS_TARGET;
use super::files::atomic_write;

/// Identifier recorded in a PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessRecord {
    pid: u32,
}

impl ProcessRecord {
    /// Wraps a process identifier.
    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self { pid }
    }

    /// Record for the calling process.
    #[must_use]
    pub fn current() -> Self {
        Self::new(std::process::id())
    }

    /// Recorded identifier.
    #[must_use]
    pub const fn pid(self) -> u32 {
        self.pid
    }
}

impl FromStr for ProcessRecord {
    type Err = ParseIntError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        text.trim().parse().map(Self::new)
    }
}

impl fmt::Display for ProcessRecord {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.pid)
    }
}

/// Errors raised while touching the PID file.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    Write {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading the PID file failed.
    #[error("failed to read pid file '{path}': {source}")]
    Read {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The PID file holds something other than a process identifier.
    #[error("pid file '{path}' contains '{content}', not a process id: {source}")]
    Parse {
        /// PID file path.
        path: PathBuf,
        /// Trimmed file content.
        content: String,
        /// Underlying parse error.
        #[source]
        source: ParseIntError,
    },
    /// Removing the PID file failed.
    #[error("failed to remove pid file '{path}': {source}")]
    Remove {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Handle on the optional PID file path.
///
/// Every operation is a no-op (or reports "absent") when no path is
/// configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidFile {
    path: Option<PathBuf>,
}

impl PidFile {
    /// Handle for `path`, or a disabled handle when `None`.
    #[must_use]
    pub const fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Configured path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns `true` when a path is configured and a file exists there.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().is_some_and(Path::exists)
    }

    /// Creates or replaces the file with the decimal identifier.
    pub fn write(&self, record: ProcessRecord) -> Result<(), PidFileError> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        atomic_write(path, record.to_string().as_bytes()).map_err(|source| {
            PidFileError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        info!(
            target: PROCESS_TARGET,
            pid = record.pid(),
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }

    /// Reads the recorded identifier.
    ///
    /// Returns `None` when no path is configured, the file is missing, or it
    /// contains only whitespace.
    pub fn read(&self) -> Result<Option<ProcessRecord>, PidFileError> {
        let Some(path) = self.path() else {
            return Ok(None);
        };
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PidFileError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<ProcessRecord>()
            .map(Some)
            .map_err(|source| PidFileError::Parse {
                path: path.to_path_buf(),
                content: trimmed.to_owned(),
                source,
            })
    }

    /// Removes the file if present. Repeated calls succeed.
    pub fn delete(&self) -> Result<(), PidFileError> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(target: PROCESS_TARGET, file = %path.display(), "pid file removed");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PidFileError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Removes the file only while it still names `owner`.
    ///
    /// A file naming another process, or holding something that is not an
    /// identifier, is left alone. Returns `true` when the file was removed.
    pub fn release(&self, owner: ProcessRecord) -> Result<bool, PidFileError> {
        let current = match self.read() {
            Ok(current) => current,
            Err(PidFileError::Parse { path, content, .. }) => {
                warn!(
                    target: PROCESS_TARGET,
                    file = %path.display(),
                    content = %content,
                    "pid file holds no identifier; left in place"
                );
                return Ok(false);
            }
            Err(error) => return Err(error),
        };
        match current {
            Some(record) if record == owner => {
                self.delete()?;
                Ok(true)
            }
            Some(record) => {
                debug!(
                    target: PROCESS_TARGET,
                    owner = owner.pid(),
                    recorded = record.pid(),
                    "pid file belongs to another process; left in place"
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
