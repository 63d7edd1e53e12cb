//! Structured reporting for lifecycle transitions.

use std::sync::Arc;

use strum::{Display, EnumString};

use crate::outcome::Outcome;

/// States of the in-process lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// Not running; initial and final state.
    Stopped,
    /// Proceed sequence of `start` under way.
    Starting,
    /// `run` is executing.
    Running,
    /// Shutdown path under way.
    Stopping,
}

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait StateReporter: Send + Sync {
    /// Invoked on every state change.
    fn transition(&self, from: LifecycleState, to: LifecycleState);

    /// Invoked when a command ends in a refusal rather than a success.
    fn refused(&self, outcome: Outcome);
}

impl<T> StateReporter for Arc<T>
where
    T: StateReporter + ?Sized,
{
    fn transition(&self, from: LifecycleState, to: LifecycleState) {
        (**self).transition(from, to);
    }

    fn refused(&self, outcome: Outcome) {
        (**self).refused(outcome);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredStateReporter;

impl StructuredStateReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StateReporter for StructuredStateReporter {
    fn transition(&self, from: LifecycleState, to: LifecycleState) {
        tracing::info!(
            target: crate::LIFECYCLE_TARGET,
            event = "transition",
            from = %from,
            state = %to,
            "lifecycle state changed"
        );
    }

    fn refused(&self, outcome: Outcome) {
        tracing::warn!(
            target: crate::LIFECYCLE_TARGET,
            event = "refused",
            exit_code = outcome.exit_code(),
            reason = %outcome,
            "lifecycle command refused"
        );
    }
}
