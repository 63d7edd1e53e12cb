//! Liveness probes and signal delivery against the OS process table.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::debug;

use super::PROCESS_TARGET;

/// Result of delivering the interrupt signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The kernel accepted the signal.
    Delivered,
    /// No process holds the identifier.
    NoSuchProcess,
}

/// Abstraction over the process table used for cross-process coordination.
pub trait ProcessTable: Send + Sync {
    /// Sends the null signal to `pid`. Only "no such process" counts as dead;
    /// permission errors and other failures count as alive.
    fn is_alive(&self, pid: u32) -> bool;

    /// Sends SIGINT to `pid`.
    fn interrupt(&self, pid: u32) -> Result<Delivery, Errno>;
}

/// Process table backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    /// Builds a new system process table.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        let Some(target) = target(pid) else {
            return false;
        };
        match kill(target, None) {
            Err(Errno::ESRCH) => false,
            Ok(()) => true,
            Err(errno) => {
                debug!(
                    target: PROCESS_TARGET,
                    pid,
                    errno = %errno,
                    "liveness probe inconclusive; treating process as alive"
                );
                true
            }
        }
    }

    fn interrupt(&self, pid: u32) -> Result<Delivery, Errno> {
        let Some(target) = target(pid) else {
            return Ok(Delivery::NoSuchProcess);
        };
        match kill(target, Signal::SIGINT) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(Errno::ESRCH) => Ok(Delivery::NoSuchProcess),
            Err(errno) => Err(errno),
        }
    }
}

/// Converts a recorded identifier into a single-process target.
///
/// `0` and values outside `pid_t` would address process groups or nothing at
/// all, so they never name a process.
fn target(pid: u32) -> Option<Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
}
