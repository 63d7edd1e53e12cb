//! Host-supplied callbacks invoked around lifecycle transitions.

use std::fmt;

use strum::{Display, EnumString};

/// Point in the lifecycle at which a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum HookPoint {
    /// Before the PID file is written during `start`.
    BeforeStart,
    /// After signal routing is installed, just before `run`.
    AfterStart,
    /// First step of the shutdown path and of `stop`.
    BeforeStop,
    /// Last step of the shutdown path and of a successful `stop`.
    AfterStop,
}

type Callback = Box<dyn FnMut() + Send>;

/// Optional lifecycle callbacks; unset hooks do nothing.
#[derive(Default)]
pub struct Hooks {
    before_start: Option<Callback>,
    after_start: Option<Callback>,
    before_stop: Option<Callback>,
    after_stop: Option<Callback>,
}

impl Hooks {
    /// Builds an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback run before the PID file is written.
    #[must_use]
    pub fn before_start(self, hook: impl FnMut() + Send + 'static) -> Self {
        self.with(HookPoint::BeforeStart, hook)
    }

    /// Registers the callback run just before `run` is entered.
    #[must_use]
    pub fn after_start(self, hook: impl FnMut() + Send + 'static) -> Self {
        self.with(HookPoint::AfterStart, hook)
    }

    /// Registers the callback that opens the shutdown path.
    #[must_use]
    pub fn before_stop(self, hook: impl FnMut() + Send + 'static) -> Self {
        self.with(HookPoint::BeforeStop, hook)
    }

    /// Registers the callback that closes the shutdown path.
    #[must_use]
    pub fn after_stop(self, hook: impl FnMut() + Send + 'static) -> Self {
        self.with(HookPoint::AfterStop, hook)
    }

    /// Replaces the callback for `point`.
    #[must_use]
    pub fn with(mut self, point: HookPoint, hook: impl FnMut() + Send + 'static) -> Self {
        *self.slot(point) = Some(Box::new(hook));
        self
    }

    /// Returns `true` when a callback is registered for `point`.
    #[must_use]
    pub fn is_set(&self, point: HookPoint) -> bool {
        match point {
            HookPoint::BeforeStart => self.before_start.is_some(),
            HookPoint::AfterStart => self.after_start.is_some(),
            HookPoint::BeforeStop => self.before_stop.is_some(),
            HookPoint::AfterStop => self.after_stop.is_some(),
        }
    }

    pub(crate) fn invoke(&mut self, point: HookPoint) {
        if let Some(hook) = self.slot(point).as_mut() {
            tracing::debug!(target: crate::LIFECYCLE_TARGET, hook = %point, "invoking hook");
            hook();
        }
    }

    const fn slot(&mut self, point: HookPoint) -> &mut Option<Callback> {
        match point {
            HookPoint::BeforeStart => &mut self.before_start,
            HookPoint::AfterStart => &mut self.after_start,
            HookPoint::BeforeStop => &mut self.before_stop,
            HookPoint::AfterStop => &mut self.after_stop,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Hooks")
            .field("before_start", &self.is_set(HookPoint::BeforeStart))
            .field("after_start", &self.is_set(HookPoint::AfterStart))
            .field("before_stop", &self.is_set(HookPoint::BeforeStop))
            .field("after_stop", &self.is_set(HookPoint::AfterStop))
            .finish()
    }
}
