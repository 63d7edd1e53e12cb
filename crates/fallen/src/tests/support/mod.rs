//! Recording test doubles for the process collaborators.
//!
//! Every double appends to one shared [`EventLog`] so tests can assert on the
//! relative order of hooks, stream changes, signal installation and state
//! transitions.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nix::errno::Errno;
use tempfile::TempDir;

use crate::{
    DaemonConfig, DaemonizeError, Daemonizer, Delivery, Fallen, HookPoint, Hooks, LaunchMode,
    LifecycleState, Outcome, ProcessControl, ProcessTable, RedirectError, ShutdownError,
    ShutdownToken, SignalRouter, StateReporter, StdStream, StreamRedirector,
};

/// Observable side effect recorded by a double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Hook(HookPoint),
    Daemonized(PathBuf),
    Redirected(StdStream, PathBuf),
    Silenced(StdStream),
    Probed(u32),
    Interrupted(u32),
    SignalsInstalled,
    Transition(LifecycleState),
    Refused(Outcome),
    RunEntered,
}

/// Shared, ordered event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn record(&self, event: Event) {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.count(event) > 0
    }

    pub fn hooks(&self) -> Vec<HookPoint> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Hook(point) => Some(point),
                _ => None,
            })
            .collect()
    }

    /// Index of the first occurrence of `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Hooks that record their invocation.
pub fn recording_hooks(log: &EventLog) -> Hooks {
    let mut hooks = Hooks::new();
    for point in [
        HookPoint::BeforeStart,
        HookPoint::AfterStart,
        HookPoint::BeforeStop,
        HookPoint::AfterStop,
    ] {
        let recorder = log.clone();
        hooks = hooks.with(point, move || recorder.record(Event::Hook(point)));
    }
    hooks
}

#[derive(Debug, Clone)]
pub struct RecordingDaemonizer {
    log: EventLog,
}

impl Daemonizer for RecordingDaemonizer {
    fn daemonize(&self, working_dir: &Path) -> Result<(), DaemonizeError> {
        self.log.record(Event::Daemonized(working_dir.to_path_buf()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordingRedirector {
    log: EventLog,
}

impl StreamRedirector for RecordingRedirector {
    fn redirect(&self, stream: StdStream, target: &Path) -> Result<(), RedirectError> {
        self.log
            .record(Event::Redirected(stream, target.to_path_buf()));
        Ok(())
    }

    fn silence(&self, stream: StdStream) -> Result<(), RedirectError> {
        self.log.record(Event::Silenced(stream));
        Ok(())
    }
}

/// Process table with a scripted set of live identifiers.
#[derive(Debug, Clone)]
pub struct FakeProcessTable {
    log: EventLog,
    live: Arc<Mutex<HashSet<u32>>>,
    denied: Arc<Mutex<HashSet<u32>>>,
}

impl FakeProcessTable {
    pub fn mark_live(&self, pid: u32) {
        self.live.lock().expect("live set poisoned").insert(pid);
    }

    /// Makes `pid` alive but refuse signals with `EPERM`.
    pub fn deny(&self, pid: u32) {
        self.mark_live(pid);
        self.denied.lock().expect("denied set poisoned").insert(pid);
    }
}

impl ProcessTable for FakeProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        self.log.record(Event::Probed(pid));
        self.live.lock().expect("live set poisoned").contains(&pid)
    }

    fn interrupt(&self, pid: u32) -> Result<Delivery, Errno> {
        self.log.record(Event::Interrupted(pid));
        if self.denied.lock().expect("denied set poisoned").contains(&pid) {
            return Err(Errno::EPERM);
        }
        if self.live.lock().expect("live set poisoned").remove(&pid) {
            Ok(Delivery::Delivered)
        } else {
            Ok(Delivery::NoSuchProcess)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingSignalRouter {
    log: EventLog,
}

impl SignalRouter for RecordingSignalRouter {
    fn install(&self, _token: &ShutdownToken) -> Result<(), ShutdownError> {
        self.log.record(Event::SignalsInstalled);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordingStateReporter {
    log: EventLog,
}

impl StateReporter for RecordingStateReporter {
    fn transition(&self, _from: LifecycleState, to: LifecycleState) {
        self.log.record(Event::Transition(to));
    }

    fn refused(&self, outcome: Outcome) {
        self.log.record(Event::Refused(outcome));
    }
}

/// Temporary directory plus fully recorded collaborators.
pub struct Harness {
    dir: TempDir,
    pub log: EventLog,
    pub processes: FakeProcessTable,
}

impl Harness {
    pub fn new() -> Self {
        let log = EventLog::default();
        Self {
            dir: TempDir::new().expect("failed to create temporary directory"),
            processes: FakeProcessTable {
                log: log.clone(),
                live: Arc::default(),
                denied: Arc::default(),
            },
            log,
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn pid_path(&self) -> PathBuf {
        self.dir.path().join("daemon.pid")
    }

    pub fn seed_pid_file(&self, content: &str) {
        fs::write(self.pid_path(), content).expect("failed to seed pid file");
    }

    pub fn pid_file_content(&self) -> Option<String> {
        fs::read_to_string(self.pid_path()).ok()
    }

    pub fn control(&self) -> ProcessControl {
        ProcessControl::system()
            .with_daemonizer(RecordingDaemonizer {
                log: self.log.clone(),
            })
            .with_redirector(RecordingRedirector {
                log: self.log.clone(),
            })
            .with_processes(self.processes.clone())
            .with_signals(RecordingSignalRouter {
                log: self.log.clone(),
            })
    }

    /// Controller in foreground mode without a PID file.
    pub fn bare_daemon(&self) -> Fallen {
        let mut config = DaemonConfig::new(self.dir.path().to_path_buf());
        config.set_mode(LaunchMode::Foreground);
        Fallen::new(config)
            .with_control(self.control())
            .with_hooks(recording_hooks(&self.log))
            .with_reporter(Arc::new(RecordingStateReporter {
                log: self.log.clone(),
            }))
    }

    /// Controller in foreground mode with the harness PID file configured.
    pub fn daemon(&self) -> Fallen {
        let mut daemon = self.bare_daemon();
        daemon
            .set_pid_file(self.pid_path())
            .expect("pid file path should resolve");
        daemon
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Run loop that records entry, captures the PID file content and then
/// behaves as though a shutdown signal arrived.
pub fn signalled_run(
    log: &EventLog,
    pid_path: PathBuf,
    seen: Arc<Mutex<Option<String>>>,
) -> impl FnOnce(&ShutdownToken) -> Result<(), std::io::Error> + use<> {
    let recorder = log.clone();
    move |token: &ShutdownToken| {
        recorder.record(Event::RunEntered);
        *seen.lock().expect("seen mutex poisoned") = fs::read_to_string(&pid_path).ok();
        token.request();
        Ok(())
    }
}
