//! Daemon configuration held by the lifecycle controller.
//!
//! The configuration records where the daemon works, where it keeps its PID
//! file, and which files replace the standard streams. Values are resolved to
//! absolute paths as they are set so later changes of working directory do
//! not alter their meaning.

use std::env;
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use strum::{Display, EnumString};

/// Standard stream that can be redirected to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StdStream {
    /// Standard input, reopened for reading.
    Stdin,
    /// Standard output, reopened for appending.
    Stdout,
    /// Standard error, reopened for appending.
    Stderr,
}

impl StdStream {
    /// All three standard streams in descriptor order.
    pub const ALL: [Self; 3] = [Self::Stdin, Self::Stdout, Self::Stderr];

    /// File descriptor backing the stream.
    #[must_use]
    pub const fn descriptor(self) -> RawFd {
        match self {
            Self::Stdin => 0,
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }

    /// Returns `true` for streams the daemon writes to.
    #[must_use]
    pub const fn is_output(self) -> bool {
        !matches!(self, Self::Stdin)
    }
}

/// Whether `start` detaches from the controlling terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    #[default]
    Background,
    /// Remain attached to the terminal; primarily used for debugging and tests.
    Foreground,
}

/// Paths and launch settings consulted by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    working_dir: PathBuf,
    pid_file: Option<PathBuf>,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    mode: LaunchMode,
}

impl DaemonConfig {
    /// Captures the current working directory with nothing else configured.
    pub fn from_current_dir() -> io::Result<Self> {
        Ok(Self::new(env::current_dir()?))
    }

    /// Builds a configuration rooted at `working_dir`.
    ///
    /// The directory is recorded as given; callers wanting the process to
    /// move there should use [`crate::Fallen::chdir`].
    #[must_use]
    pub const fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            pid_file: None,
            stdin: None,
            stdout: None,
            stderr: None,
            mode: LaunchMode::Background,
        }
    }

    /// Directory the daemon runs from.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_path()
    }

    /// Path of the PID file, when one is configured.
    #[must_use]
    pub fn pid_file(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    /// Redirect target for `stream`, when one is configured.
    #[must_use]
    pub fn stream(&self, stream: StdStream) -> Option<&Path> {
        match stream {
            StdStream::Stdin => self.stdin.as_deref(),
            StdStream::Stdout => self.stdout.as_deref(),
            StdStream::Stderr => self.stderr.as_deref(),
        }
    }

    /// Launch mode used by `start`.
    #[must_use]
    pub const fn mode(&self) -> LaunchMode {
        self.mode
    }

    pub(crate) fn set_working_dir(&mut self, path: PathBuf) {
        self.working_dir = path;
    }

    pub(crate) fn set_pid_file(&mut self, path: PathBuf) {
        self.pid_file = Some(path);
    }

    pub(crate) fn set_stream(&mut self, stream: StdStream, path: PathBuf) {
        let slot = match stream {
            StdStream::Stdin => &mut self.stdin,
            StdStream::Stdout => &mut self.stdout,
            StdStream::Stderr => &mut self.stderr,
        };
        *slot = Some(path);
    }

    pub(crate) const fn set_mode(&mut self, mode: LaunchMode) {
        self.mode = mode;
    }
}

/// Resolves `path` against the current working directory.
///
/// Absolute inputs are returned unchanged apart from normalisation; the path
/// does not need to exist.
pub(crate) fn resolve(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}
