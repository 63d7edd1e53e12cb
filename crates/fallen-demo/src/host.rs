//! Applies the demo configuration to a daemon and supplies its run loop.

use std::convert::Infallible;
use std::time::Duration;

use fallen::{Fallen, Hooks, LifecycleError, ProcessControl, ShutdownToken, SystemDaemonizer};
use tracing::info;

use crate::DEMO_TARGET;
use crate::cli::Command;
use crate::config::DemoConfig;

/// Interval between heartbeat log lines while the daemon runs.
pub(crate) const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);
/// Name the detached daemon takes in the process table.
pub(crate) const PROCESS_NAME: &str = env!("CARGO_PKG_NAME");

/// Builds a daemon controller from `config`.
///
/// Stream targets are applied only for commands that run the daemon, so
/// `stop` and `status` keep reporting on the invoking terminal.
pub(crate) fn configure(config: &DemoConfig, command: Command) -> Result<Fallen, LifecycleError> {
    let mut daemon = Fallen::from_current_dir()?
        .with_control(ProcessControl::system().with_daemonizer(daemonizer()))
        .with_hooks(logging_hooks());
    if let Some(dir) = config.working_dir.as_deref() {
        daemon.chdir(dir)?;
    }
    if let Some(pid_file) = config.pid_file.as_deref() {
        daemon.set_pid_file(pid_file)?;
    }
    daemon.set_launch_mode(config.launch_mode());
    if command.runs_daemon() {
        for (stream, target) in config.streams() {
            daemon.set_stream(stream, target.as_std_path())?;
        }
    }
    Ok(daemon)
}

pub(crate) fn daemonizer() -> SystemDaemonizer {
    SystemDaemonizer::named(PROCESS_NAME)
}

fn logging_hooks() -> Hooks {
    Hooks::new()
        .before_start(|| info!(target: DEMO_TARGET, "daemon starting"))
        .after_start(|| info!(target: DEMO_TARGET, pid = std::process::id(), "daemon started"))
        .before_stop(|| info!(target: DEMO_TARGET, "daemon stopping"))
        .after_stop(|| info!(target: DEMO_TARGET, "daemon stopped"))
}

/// Run loop: logs a heartbeat until shutdown is requested.
pub(crate) fn heartbeat(shutdown: &ShutdownToken) -> Result<(), Infallible> {
    let mut beats: u64 = 0;
    while !shutdown.wait_timeout(HEARTBEAT_INTERVAL, SHUTDOWN_POLL) {
        beats = beats.saturating_add(1);
        info!(target: DEMO_TARGET, beats, "heartbeat");
    }
    info!(target: DEMO_TARGET, beats, "run loop finished");
    Ok(())
}
