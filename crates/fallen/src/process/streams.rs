//! Reopens the standard streams onto files.
//!
//! Redirection happens at the descriptor level with `dup2(2)`, so anything
//! writing to descriptors 0–2 (including child processes and foreign code)
//! follows the new target. Rust's own `stdout` handle is line buffered; it is
//! flushed on both sides of the swap so no output lands in the wrong file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::unistd::dup2;
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;
use crate::config::StdStream;

const NULL_DEVICE: &str = "/dev/null";

/// Abstraction over standard stream redirection.
pub trait StreamRedirector: Send + Sync {
    /// Reopens `stream` onto `target`: read mode for stdin, create + append
    /// for stdout and stderr.
    fn redirect(&self, stream: StdStream, target: &Path) -> Result<(), RedirectError>;

    /// Points `stream` at the null device.
    fn silence(&self, stream: StdStream) -> Result<(), RedirectError>;
}

/// Errors raised while swapping a standard stream.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// The redirect target could not be opened.
    #[error("failed to open '{path}' for {stream}: {source}")]
    Open {
        /// Stream being redirected.
        stream: StdStream,
        /// Target path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Duplicating the target onto the stream descriptor failed.
    #[error("failed to reopen {stream}: {source}")]
    Duplicate {
        /// Stream being redirected.
        stream: StdStream,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Pending output could not be flushed before the swap.
    #[error("failed to flush {stream}: {source}")]
    Flush {
        /// Stream being flushed.
        stream: StdStream,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Redirector operating on the real process descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemStreamRedirector;

impl SystemStreamRedirector {
    /// Builds a new system redirector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn swap(stream: StdStream, file: &File) -> Result<(), RedirectError> {
        flush(stream)?;
        dup2(file.as_raw_fd(), stream.descriptor())
            .map_err(|source| RedirectError::Duplicate { stream, source })?;
        flush(stream)
    }
}

impl StreamRedirector for SystemStreamRedirector {
    fn redirect(&self, stream: StdStream, target: &Path) -> Result<(), RedirectError> {
        let mut options = OpenOptions::new();
        if stream.is_output() {
            options.create(true).append(true);
        } else {
            options.read(true);
        }
        let file = options.open(target).map_err(|source| RedirectError::Open {
            stream,
            path: target.to_path_buf(),
            source,
        })?;
        Self::swap(stream, &file)?;
        info!(
            target: PROCESS_TARGET,
            stream = %stream,
            file = %target.display(),
            "standard stream redirected"
        );
        Ok(())
    }

    fn silence(&self, stream: StdStream) -> Result<(), RedirectError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(NULL_DEVICE)
            .map_err(|source| RedirectError::Open {
                stream,
                path: PathBuf::from(NULL_DEVICE),
                source,
            })?;
        Self::swap(stream, &file)?;
        debug!(target: PROCESS_TARGET, stream = %stream, "standard stream silenced");
        Ok(())
    }
}

fn flush(stream: StdStream) -> Result<(), RedirectError> {
    let result = match stream {
        StdStream::Stdin => Ok(()),
        StdStream::Stdout => io::stdout().flush(),
        StdStream::Stderr => io::stderr().flush(),
    };
    result.map_err(|source| RedirectError::Flush { stream, source })
}
