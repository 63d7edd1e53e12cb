//! Configuration for the demo host, layered by `ortho_config`.
//!
//! Values come from `FALLEN_*` environment variables, an optional
//! configuration file and the leading command-line flags, in the loader's
//! usual precedence order.

use camino::{Utf8Path, Utf8PathBuf};
use fallen::{LaunchMode, StdStream};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Log filter used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Settings applied to the daemon before a lifecycle command runs.
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "FALLEN")]
pub struct DemoConfig {
    /// Directory the process changes into before the command runs.
    pub working_dir: Option<Utf8PathBuf>,
    /// Location of the PID file guarding the daemon.
    pub pid_file: Option<Utf8PathBuf>,
    /// File the daemon reads standard input from.
    pub stdin: Option<Utf8PathBuf>,
    /// File standard output is appended to.
    pub stdout: Option<Utf8PathBuf>,
    /// File standard error, and therefore the daemon log, is appended to.
    pub stderr: Option<Utf8PathBuf>,
    /// Keeps the daemon attached to the invoking terminal.
    #[ortho_config(default = false)]
    pub foreground: bool,
    /// `tracing` filter directive.
    pub log_filter: Option<String>,
    /// Log line format.
    pub log_format: Option<LogFormat>,
}

impl DemoConfig {
    /// Returns the configured log filter, falling back to [`DEFAULT_LOG_FILTER`].
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Returns the configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_default()
    }

    /// Returns whether `start` should detach from the terminal.
    #[must_use]
    pub const fn launch_mode(&self) -> LaunchMode {
        if self.foreground {
            LaunchMode::Foreground
        } else {
            LaunchMode::Background
        }
    }

    /// Iterates over the standard streams that have a configured target.
    pub fn streams(&self) -> impl Iterator<Item = (StdStream, &Utf8Path)> {
        [
            (StdStream::Stdin, &self.stdin),
            (StdStream::Stdout, &self.stdout),
            (StdStream::Stderr, &self.stderr),
        ]
        .into_iter()
        .filter_map(|(stream, target)| target.as_deref().map(|path| (stream, path)))
    }
}
