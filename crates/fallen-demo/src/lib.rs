//! Command-line host for the `fallen` daemon lifecycle.
//!
//! `fallen-demo [config flags] <start|stop|restart|status>` configures a
//! daemon from flags, `FALLEN_*` environment variables and an optional
//! configuration file, then runs a single lifecycle command. The daemon's
//! work is a heartbeat logged once per second until SIGINT or SIGTERM.
//!
//! Exit codes follow the lifecycle outcome: 0 on success, 1 when `stop` finds
//! no PID file, 2 when `start` finds a live daemon and 3 when `stop` finds a
//! stale PID file. Unexpected failures also exit with 1 and print the error.

mod cli;
pub mod config;
mod errors;
mod host;
pub mod telemetry;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use fallen::Outcome;
use ortho_config::OrthoConfig;
use tracing::info;

use crate::cli::{Cli, Command, split_arguments};
use crate::config::DemoConfig;
use crate::errors::AppError;

pub(crate) const DEMO_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

/// Runs the demo host using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match execute(&args, stdout, stderr) {
        Ok(exit_code) => exit_code,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W, E>(args: &[OsString], stdout: &mut W, stderr: &mut E) -> Result<ExitCode, AppError>
where
    W: Write,
    E: Write,
{
    let split = split_arguments(args);
    let cli = Cli::try_parse_from(&split.command).map_err(AppError::CliUsage)?;
    let config = DemoConfig::load_from_iter(split.config).map_err(AppError::LoadConfiguration)?;
    telemetry::initialise(&config, cli.command.runs_daemon())?;

    let mut daemon = host::configure(&config, cli.command)?;
    info!(target: DEMO_TARGET, command = %cli.command, "executing lifecycle command");
    match cli.command {
        Command::Start => finish(daemon.start(host::heartbeat)?, stderr),
        Command::Stop => finish(daemon.stop()?, stderr),
        Command::Restart => finish(daemon.restart(host::heartbeat)?, stderr),
        Command::Status => {
            let status = daemon.status()?;
            writeln!(stdout, "{status}").map_err(AppError::Output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn finish<E: Write>(outcome: Outcome, stderr: &mut E) -> Result<ExitCode, AppError> {
    outcome.report(stderr).map_err(AppError::Output)?;
    Ok(ExitCode::from(outcome))
}

#[cfg(test)]
mod tests;
