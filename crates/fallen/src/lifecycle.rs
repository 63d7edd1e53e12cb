//! Lifecycle controller: `start`, `stop`, `restart` and the shutdown path.
//!
//! A [`Fallen`] value owns everything one daemon needs: configuration, hooks,
//! process collaborators and the in-process running flag. Independent
//! processes coordinate only through the PID file and signal delivery.
//!
//! `start` checks the PID file and writes its own identifier in two separate
//! steps. Two `start` calls racing on the same PID file can both pass the
//! check; nothing here takes an exclusive lock.

use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DaemonConfig, LaunchMode, StdStream, resolve};
use crate::hooks::{HookPoint, Hooks};
use crate::outcome::{Outcome, Status};
use crate::process::{
    Delivery, LifecycleError, PidFile, ProcessControl, ProcessRecord, ShutdownToken,
};
use crate::reporter::{LifecycleState, StateReporter, StructuredStateReporter};
use crate::LIFECYCLE_TARGET;

/// Daemon context handed to every lifecycle operation.
pub struct Fallen {
    config: DaemonConfig,
    pid_file: PidFile,
    hooks: Hooks,
    control: ProcessControl,
    reporter: Arc<dyn StateReporter>,
    state: LifecycleState,
    running: bool,
    recorded: Option<ProcessRecord>,
    shutdown: ShutdownToken,
}

impl Fallen {
    /// Builds a controller for `config` backed by the operating system.
    #[must_use]
    pub fn new(config: DaemonConfig) -> Self {
        let pid_file = PidFile::new(config.pid_file().map(Path::to_path_buf));
        Self {
            config,
            pid_file,
            hooks: Hooks::new(),
            control: ProcessControl::system(),
            reporter: Arc::new(StructuredStateReporter::new()),
            state: LifecycleState::Stopped,
            running: false,
            recorded: None,
            shutdown: ShutdownToken::new(),
        }
    }

    /// Builds a controller rooted at the current working directory.
    pub fn from_current_dir() -> Result<Self, LifecycleError> {
        let config =
            DaemonConfig::from_current_dir().map_err(|source| LifecycleError::ResolvePath {
                path: ".".into(),
                source,
            })?;
        Ok(Self::new(config))
    }

    /// Installs the host's lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replaces the process collaborators.
    #[must_use]
    pub fn with_control(mut self, control: ProcessControl) -> Self {
        self.control = control;
        self
    }

    /// Replaces the state reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn StateReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Handle on the configured PID file.
    #[must_use]
    pub const fn pid_file(&self) -> &PidFile {
        &self.pid_file
    }

    /// Token raised by the shutdown signals; clones observe the same flag.
    #[must_use]
    pub const fn shutdown_token(&self) -> &ShutdownToken {
        &self.shutdown
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// This process's belief about whether it is running as the daemon.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Resolves `path`, makes it the process working directory and records it.
    ///
    /// Paths set afterwards resolve relative to the new directory.
    pub fn chdir(&mut self, path: impl AsRef<Path>) -> Result<(), LifecycleError> {
        let resolved = resolve_path(path.as_ref())?;
        std::env::set_current_dir(&resolved).map_err(|source| {
            LifecycleError::WorkingDirectory {
                path: resolved.clone(),
                source,
            }
        })?;
        info!(
            target: LIFECYCLE_TARGET,
            working_dir = %resolved.display(),
            "working directory changed"
        );
        self.config.set_working_dir(resolved);
        Ok(())
    }

    /// Resolves and records the PID file path without touching the file.
    pub fn set_pid_file(&mut self, path: impl AsRef<Path>) -> Result<(), LifecycleError> {
        let resolved = resolve_path(path.as_ref())?;
        self.pid_file = PidFile::new(Some(resolved.clone()));
        self.config.set_pid_file(resolved);
        Ok(())
    }

    /// Reopens standard input for reading from `path`.
    pub fn set_stdin(&mut self, path: impl AsRef<Path>) -> Result<(), LifecycleError> {
        self.set_stream(StdStream::Stdin, path.as_ref())
    }

    /// Reopens standard output for appending to `path`.
    pub fn set_stdout(&mut self, path: impl AsRef<Path>) -> Result<(), LifecycleError> {
        self.set_stream(StdStream::Stdout, path.as_ref())
    }

    /// Reopens standard error for appending to `path`.
    pub fn set_stderr(&mut self, path: impl AsRef<Path>) -> Result<(), LifecycleError> {
        self.set_stream(StdStream::Stderr, path.as_ref())
    }

    /// Resolves `path`, reopens `stream` onto it at once and records it.
    pub fn set_stream(&mut self, stream: StdStream, path: &Path) -> Result<(), LifecycleError> {
        let resolved = resolve_path(path)?;
        self.control.redirector.redirect(stream, &resolved)?;
        self.config.set_stream(stream, resolved);
        Ok(())
    }

    /// Chooses whether `start` detaches from the terminal.
    pub const fn set_launch_mode(&mut self, mode: LaunchMode) {
        self.config.set_mode(mode);
    }

    /// Detaches from the controlling terminal.
    ///
    /// Streams without a configured target are pointed at the null device;
    /// configured ones keep their files.
    pub fn daemonize(&mut self) -> Result<(), LifecycleError> {
        self.control
            .daemonizer
            .daemonize(self.config.working_dir())?;
        for stream in StdStream::ALL {
            match self.config.stream(stream) {
                Some(target) => self.control.redirector.redirect(stream, target)?,
                None => self.control.redirector.silence(stream)?,
            }
        }
        Ok(())
    }

    /// Starts the daemon and runs `run` until it returns.
    ///
    /// Refuses with [`Outcome::AlreadyRunning`] when the PID file names a live
    /// process; nothing else happens in that case. A stale PID file is
    /// overwritten. Once `run` returns, the shutdown path runs if it has not
    /// already, and any error from `run` is reported after cleanup.
    pub fn start<F, E>(&mut self, run: F) -> Result<Outcome, LifecycleError>
    where
        F: FnOnce(&ShutdownToken) -> Result<(), E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        if let Some(pid) = self.live_pid()? {
            return Ok(self.refuse(Outcome::AlreadyRunning { pid }));
        }

        if let Err(error) = self.enter_running() {
            if self.running {
                self.interrupt()?;
            } else {
                self.transition(LifecycleState::Stopped);
            }
            return Err(error);
        }

        let token = self.shutdown.clone();
        let result = run(&token).map_err(|source| LifecycleError::Run {
            source: source.into(),
        });
        if token.is_requested() {
            info!(target: LIFECYCLE_TARGET, "shutdown requested by signal");
        }
        let cleanup = if self.running {
            self.interrupt()
        } else {
            Ok(())
        };
        result?;
        cleanup?;
        Ok(Outcome::Success)
    }

    /// Shutdown path: `before_stop`, clear the running flag, remove the PID
    /// file, `after_stop`.
    ///
    /// The PID file is removed only while it still names the identifier this
    /// controller wrote (or, if it wrote none, the calling process). A file
    /// already taken over by a successor is left in place.
    pub fn interrupt(&mut self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::Stopping);
        self.hooks.invoke(HookPoint::BeforeStop);
        self.running = false;
        let owner = self.recorded.take().unwrap_or_else(ProcessRecord::current);
        self.pid_file.release(owner)?;
        self.hooks.invoke(HookPoint::AfterStop);
        self.transition(LifecycleState::Stopped);
        Ok(())
    }

    /// Asks the daemon recorded in the PID file to shut down.
    ///
    /// Returns [`Outcome::NoPidFile`] without side effects when there is no
    /// record. When the recorded process is gone the result is
    /// [`Outcome::StaleProcess`] and the PID file is left in place; a later
    /// `start` replaces it.
    pub fn stop(&mut self) -> Result<Outcome, LifecycleError> {
        let Some(record) = self.pid_file.read()? else {
            return Ok(self.refuse(Outcome::NoPidFile));
        };
        let pid = record.pid();
        self.hooks.invoke(HookPoint::BeforeStop);
        match self.control.processes.interrupt(pid) {
            Ok(Delivery::Delivered) => {
                info!(target: LIFECYCLE_TARGET, pid, "interrupt delivered to daemon");
                self.pid_file.release(record)?;
                self.hooks.invoke(HookPoint::AfterStop);
                Ok(Outcome::Success)
            }
            Ok(Delivery::NoSuchProcess) => Ok(self.refuse(Outcome::StaleProcess { pid })),
            Err(source) => Err(LifecycleError::Signal { pid, source }),
        }
    }

    /// `stop` followed by `start`.
    ///
    /// A refused `stop` ends the restart and its outcome is returned; `start`
    /// is not attempted.
    pub fn restart<F, E>(&mut self, run: F) -> Result<Outcome, LifecycleError>
    where
        F: FnOnce(&ShutdownToken) -> Result<(), E>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let stopped = self.stop()?;
        if !stopped.is_success() {
            return Ok(stopped);
        }
        self.start(run)
    }

    /// Reports what the PID file and process table say, without side effects.
    pub fn status(&self) -> Result<Status, LifecycleError> {
        let Some(record) = self.pid_file.read()? else {
            return Ok(Status::NotRunning);
        };
        let pid = record.pid();
        if self.control.processes.is_alive(pid) {
            Ok(Status::Running { pid })
        } else {
            Ok(Status::Stale { pid })
        }
    }

    fn enter_running(&mut self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::Starting);
        self.shutdown.reset();
        if self.config.mode() == LaunchMode::Background {
            self.daemonize()?;
        }
        self.hooks.invoke(HookPoint::BeforeStart);
        let record = ProcessRecord::current();
        self.pid_file.write(record)?;
        self.recorded = Some(record);
        self.running = true;
        self.control.signals.install(&self.shutdown)?;
        self.transition(LifecycleState::Running);
        self.hooks.invoke(HookPoint::AfterStart);
        Ok(())
    }

    fn live_pid(&self) -> Result<Option<u32>, LifecycleError> {
        let Some(record) = self.pid_file.read()? else {
            return Ok(None);
        };
        let pid = record.pid();
        if self.control.processes.is_alive(pid) {
            return Ok(Some(pid));
        }
        warn!(
            target: LIFECYCLE_TARGET,
            pid,
            "pid file is stale; it will be replaced"
        );
        Ok(None)
    }

    fn refuse(&self, outcome: Outcome) -> Outcome {
        self.reporter.refused(outcome);
        outcome
    }

    fn transition(&mut self, to: LifecycleState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.reporter.transition(from, to);
        }
    }
}

impl std::fmt::Debug for Fallen {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Fallen")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("state", &self.state)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

fn resolve_path(path: &Path) -> Result<std::path::PathBuf, LifecycleError> {
    resolve(path).map_err(|source| LifecycleError::ResolvePath {
        path: path.to_path_buf(),
        source,
    })
}
