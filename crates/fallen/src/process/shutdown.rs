//! Routes SIGINT and SIGTERM to a shutdown flag.
//!
//! Signal handlers only store `true` into an atomic flag. The lifecycle
//! controller and the host's run loop observe the flag in ordinary execution
//! context, where hooks and file removal are safe.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Signals routed to the shutdown path.
pub const SHUTDOWN_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Shared flag raised when shutdown has been requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    /// Builds a token with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown; the run loop returns once it observes this.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Blocks until shutdown is requested, checking every `poll`.
    pub fn wait(&self, poll: Duration) {
        while !self.is_requested() {
            thread::sleep(poll);
        }
    }

    /// Blocks for at most `timeout`; returns whether shutdown was requested.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(poll.min(deadline - now));
        }
        true
    }

    pub(crate) fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }
}

/// Abstraction over shutdown signal installation.
pub trait SignalRouter: Send + Sync {
    /// Arranges for the shutdown signals to raise `token`.
    ///
    /// Calling this more than once must not install duplicate handlers.
    fn install(&self, token: &ShutdownToken) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal routers.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Router that registers real signal handlers through `signal-hook`.
#[derive(Debug, Default)]
pub struct SystemSignalRouter {
    installed: AtomicBool,
}

impl SystemSignalRouter {
    /// Builds a router with no handlers installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            installed: AtomicBool::new(false),
        }
    }

    /// Returns `true` after a successful [`SignalRouter::install`].
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}

impl SignalRouter for SystemSignalRouter {
    fn install(&self, token: &ShutdownToken) -> Result<(), ShutdownError> {
        if self.installed.swap(true, Ordering::SeqCst) {
            debug!(target: PROCESS_TARGET, "signal handlers already installed");
            return Ok(());
        }
        for signal in SHUTDOWN_SIGNALS {
            if let Err(source) = signal_hook::flag::register(signal, token.flag()) {
                self.installed.store(false, Ordering::SeqCst);
                return Err(ShutdownError::Install { source });
            }
        }
        info!(
            target: PROCESS_TARGET,
            signals = ?SHUTDOWN_SIGNALS,
            "shutdown signal handlers installed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const POLL: Duration = Duration::from_millis(5);

    #[rstest]
    fn clones_share_the_flag() {
        let token = ShutdownToken::new();
        let observer = token.clone();
        assert!(!observer.is_requested());
        token.request();
        assert!(observer.is_requested());
        token.reset();
        assert!(!observer.is_requested());
    }

    #[rstest]
    fn wait_timeout_expires_without_request() {
        let token = ShutdownToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(20), POLL));
    }

    #[rstest]
    fn wait_returns_after_request_from_another_thread() {
        let token = ShutdownToken::new();
        let trigger = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.request();
        });
        assert!(token.wait_timeout(Duration::from_secs(5), POLL));
        handle.join().expect("trigger thread should finish");
    }
}
