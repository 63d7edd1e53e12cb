//! Log output for the demo host.
//!
//! The subscriber is installed before the lifecycle command runs, which for
//! `start` and `restart` is before the process detaches. Everything is
//! written to standard error, so the daemon's log lands wherever `--stderr`
//! points once redirection happens, and on the null device when it is
//! unset in background mode. Colour is decided up front from that final
//! destination, not from the terminal the command was typed into.

use std::io::{self, IsTerminal};

use fallen::LaunchMode;
use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use crate::DEMO_TARGET;
use crate::config::{DemoConfig, LogFormat};

static INSTALLED: OnceCell<LogSettings> = OnceCell::new();

/// Resolved log settings for one invocation of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    filter: String,
    format: LogFormat,
    colour: bool,
}

impl LogSettings {
    /// Derives settings from `config`.
    ///
    /// `runs_daemon` is set for commands that keep running as the daemon;
    /// only those can detach or move standard error. `stderr_is_terminal`
    /// describes standard error as inherited from the caller.
    #[must_use]
    pub fn resolve(config: &DemoConfig, runs_daemon: bool, stderr_is_terminal: bool) -> Self {
        let leaves_terminal = runs_daemon
            && (config.stderr.is_some() || config.launch_mode() == LaunchMode::Background);
        Self {
            filter: config.log_filter().to_owned(),
            format: config.log_format(),
            colour: stderr_is_terminal && !leaves_terminal,
        }
    }

    /// Filter directive handed to [`EnvFilter`].
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Whether ANSI colour codes are emitted.
    #[must_use]
    pub const fn colour(&self) -> bool {
        self.colour
    }
}

/// Proof that the global subscriber is in place.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    settings: &'static LogSettings,
}

impl TelemetryHandle {
    /// Settings of the subscriber that was actually installed.
    #[must_use]
    pub const fn settings(&self) -> &'static LogSettings {
        self.settings
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directive does not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber for `config` on first use.
///
/// The first successful call wins for the life of the process; later calls
/// return a handle describing the settings already in force.
pub fn initialise(
    config: &DemoConfig,
    runs_daemon: bool,
) -> Result<TelemetryHandle, TelemetryError> {
    let settings = INSTALLED.get_or_try_init(|| {
        let resolved = LogSettings::resolve(config, runs_daemon, io::stderr().is_terminal());
        install(&resolved)?;
        Ok::<_, TelemetryError>(resolved)
    })?;
    Ok(TelemetryHandle { settings })
}

fn install(settings: &LogSettings) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(settings.filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let base = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(settings.colour())
        .with_timer(UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match settings.format() {
        LogFormat::Json => Box::new(base.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(base.compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    debug!(
        target: DEMO_TARGET,
        format = %settings.format(),
        filter = settings.filter(),
        colour = settings.colour(),
        "telemetry installed"
    );
    Ok(())
}
