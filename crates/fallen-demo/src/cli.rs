//! Command-line parsing for the demo host.
//!
//! Configuration flags are routed to `ortho_config`; the first token that is
//! not a configuration flag starts the lifecycle command, which `clap` parses.

use std::ffi::{OsStr, OsString};

use clap::{Parser, Subcommand};
use strum::Display;

/// Flags owned by the configuration loader, with whether each takes a value.
pub(crate) const CONFIG_CLI_FLAGS: &[(&str, bool)] = &[
    ("--working-dir", true),
    ("--pid-file", true),
    ("--stdin", true),
    ("--stdout", true),
    ("--stderr", true),
    ("--foreground", false),
    ("--log-filter", true),
    ("--log-format", true),
];

/// Command-line interface left after configuration flags are removed.
#[derive(Parser, Debug)]
#[command(name = "fallen-demo", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Lifecycle command to execute.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Lifecycle commands understood by the demo host.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Command {
    /// Starts the daemon unless one is already running.
    Start,
    /// Interrupts the daemon recorded in the PID file.
    Stop,
    /// Stops the running daemon, then starts a new one.
    Restart,
    /// Reports whether the recorded daemon is alive.
    Status,
}

impl Command {
    /// Commands that end up executing the daemon's run loop in this process.
    pub(crate) const fn runs_daemon(self) -> bool {
        matches!(self, Self::Start | Self::Restart)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    CONFIG_CLI_FLAGS
        .iter()
        .find(|(known, _)| *known == flag)
        .map_or(FlagAction::Skip, |(_, takes_value)| FlagAction::Include {
            needs_value: *takes_value && !inline_value,
        })
}

/// Arguments for the configuration loader and for the command parser.
///
/// Both vectors start with the program name.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config: Vec<OsString>,
    pub(crate) command: Vec<OsString>,
}

/// Splits leading configuration flags from the lifecycle command.
///
/// Configuration flags must precede the command; anything after the first
/// non-configuration token belongs to the command parser.
pub(crate) fn split_arguments(args: &[OsString]) -> ArgumentSplit {
    let mut remaining = args.iter().cloned();
    let Some(program) = remaining.next() else {
        return ArgumentSplit::default();
    };
    let mut split = ArgumentSplit {
        config: vec![program.clone()],
        command: vec![program],
    };

    let mut pending_value = false;
    for argument in remaining.by_ref() {
        if pending_value {
            split.config.push(argument);
            pending_value = false;
            continue;
        }
        match classify(&argument) {
            FlagAction::Include { needs_value } => {
                split.config.push(argument);
                pending_value = needs_value;
            }
            FlagAction::Skip => {
                split.command.push(argument);
                break;
            }
        }
    }
    split.command.extend(remaining);
    split
}
