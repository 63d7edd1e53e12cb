//! Unit tests for the lifecycle controller.

use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mockall::mock;
use nix::errno::Errno;
use rstest::{fixture, rstest};
use signal_hook::consts::signal::SIGTERM;

use crate::{
    DaemonConfig, Delivery, Fallen, HookPoint, Hooks, LaunchMode, LifecycleError, LifecycleState,
    Outcome, ProcessControl, ProcessTable, ShutdownToken, SignalRouter, Status, StdStream,
    SystemSignalRouter,
};

use super::support::{Event, Harness, signalled_run};

mock! {
    pub Processes {}

    impl ProcessTable for Processes {
        fn is_alive(&self, pid: u32) -> bool;
        fn interrupt(&self, pid: u32) -> Result<Delivery, Errno>;
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

fn noop_run(token: &ShutdownToken) -> Result<(), std::io::Error> {
    token.request();
    Ok(())
}

fn untouchable(harness: &Harness) -> Fallen {
    // An expectation-free mock panics on any probe or signal.
    harness
        .bare_daemon()
        .with_control(harness.control().with_processes(MockProcesses::new()))
}

#[rstest]
fn start_without_pid_file_never_probes_and_runs(harness: Harness) {
    let mut daemon = untouchable(&harness);
    let entered = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&entered);

    let outcome = daemon
        .start(move |token: &ShutdownToken| {
            *flag.lock().expect("flag mutex poisoned") = true;
            token.request();
            Ok::<(), std::io::Error>(())
        })
        .expect("start should succeed");

    assert_eq!(outcome, Outcome::Success);
    assert!(*entered.lock().expect("flag mutex poisoned"));
    assert!(std::fs::read_dir(harness.dir()).expect("read dir").next().is_none());
}

#[rstest]
fn start_refuses_when_recorded_process_is_alive(harness: Harness) {
    harness.seed_pid_file("4242\n");
    harness.processes.mark_live(4242);
    let mut daemon = harness.daemon();
    let seen = Arc::new(Mutex::new(None));

    let outcome = daemon
        .start(signalled_run(&harness.log, harness.pid_path(), seen))
        .expect("start should return an outcome");

    assert_eq!(outcome, Outcome::AlreadyRunning { pid: 4242 });
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(harness.pid_file_content().as_deref(), Some("4242\n"));
    assert!(harness.log.hooks().is_empty());
    assert!(!harness.log.contains(&Event::RunEntered));
    assert!(!harness.log.contains(&Event::SignalsInstalled));
    assert_eq!(daemon.state(), LifecycleState::Stopped);
}

#[rstest]
fn start_replaces_stale_pid_file(harness: Harness) {
    harness.seed_pid_file("999999");
    let mut daemon = harness.daemon();
    let seen = Arc::new(Mutex::new(None));

    let outcome = daemon
        .start(signalled_run(
            &harness.log,
            harness.pid_path(),
            Arc::clone(&seen),
        ))
        .expect("start should succeed");

    assert_eq!(outcome, Outcome::Success);
    let recorded = seen.lock().expect("seen mutex poisoned").clone();
    assert_eq!(recorded, Some(std::process::id().to_string()));
    assert_eq!(
        harness.log.hooks(),
        vec![
            HookPoint::BeforeStart,
            HookPoint::AfterStart,
            HookPoint::BeforeStop,
            HookPoint::AfterStop,
        ]
    );
}

#[rstest]
fn proceed_sequence_orders_hooks_around_pid_and_signals(harness: Harness) {
    let mut daemon = harness.daemon();
    let seen = Arc::new(Mutex::new(None));

    daemon
        .start(signalled_run(&harness.log, harness.pid_path(), seen))
        .expect("start should succeed");

    let log = &harness.log;
    let before_start = log.position(&Event::Hook(HookPoint::BeforeStart));
    let installed = log.position(&Event::SignalsInstalled);
    let after_start = log.position(&Event::Hook(HookPoint::AfterStart));
    let run = log.position(&Event::RunEntered);
    assert!(before_start < installed, "signals install after before_start");
    assert!(installed < after_start, "after_start follows signal routing");
    assert!(after_start < run, "run follows after_start");
    assert_eq!(log.count(&Event::SignalsInstalled), 1);
}

#[rstest]
fn shutdown_path_removes_pid_file_and_clears_running(harness: Harness) {
    let mut daemon = harness.daemon();
    let seen = Arc::new(Mutex::new(None));

    daemon
        .start(signalled_run(&harness.log, harness.pid_path(), seen))
        .expect("start should succeed");

    assert!(harness.pid_file_content().is_none());
    assert_eq!(harness.log.count(&Event::Hook(HookPoint::AfterStop)), 1);
    assert!(!daemon.is_running());
    assert_eq!(daemon.state(), LifecycleState::Stopped);
    assert_eq!(
        harness
            .log
            .events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Transition(state) => Some(state),
                _ => None,
            })
            .collect::<Vec<_>>(),
        vec![
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]
    );
}

#[rstest]
fn run_errors_surface_after_cleanup(harness: Harness) {
    let mut daemon = harness.daemon();

    let error = daemon
        .start(|_token: &ShutdownToken| Err(std::io::Error::other("loop exploded")))
        .expect_err("run failure should propagate");

    assert!(matches!(error, LifecycleError::Run { .. }));
    assert!(error.to_string().contains("loop exploded"));
    assert!(harness.pid_file_content().is_none());
    assert_eq!(harness.log.count(&Event::Hook(HookPoint::AfterStop)), 1);
    assert!(!daemon.is_running());
}

#[rstest]
fn shutdown_leaves_a_successors_pid_file_in_place(harness: Harness) {
    let mut daemon = harness.daemon();
    let pid_path = harness.pid_path();

    let outcome = daemon
        .start(move |token: &ShutdownToken| {
            // A restarted daemon takes the file over while this one winds down.
            std::fs::write(&pid_path, "4242")?;
            token.request();
            Ok::<(), std::io::Error>(())
        })
        .expect("start should succeed");

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(harness.pid_file_content().as_deref(), Some("4242"));
    assert_eq!(harness.log.count(&Event::Hook(HookPoint::AfterStop)), 1);
    assert_eq!(daemon.state(), LifecycleState::Stopped);
}

#[rstest]
fn explicit_interrupt_removes_only_this_process_record(harness: Harness) {
    let mut daemon = harness.daemon();

    harness.seed_pid_file("4242");
    daemon.interrupt().expect("interrupt should succeed");
    assert_eq!(harness.pid_file_content().as_deref(), Some("4242"));

    harness.seed_pid_file(&std::process::id().to_string());
    daemon.interrupt().expect("interrupt should succeed");
    assert!(harness.pid_file_content().is_none());
}

#[rstest]
fn stop_keeps_a_record_replaced_after_it_was_read(harness: Harness) {
    harness.seed_pid_file("4242");
    harness.processes.mark_live(4242);
    let pid_path = harness.pid_path();
    let mut daemon = harness.daemon().with_hooks(Hooks::new().before_stop(move || {
        std::fs::write(&pid_path, "5151").expect("replace pid file");
    }));

    let outcome = daemon.stop().expect("stop should succeed");

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(harness.pid_file_content().as_deref(), Some("5151"));
}

#[rstest]
fn stop_without_pid_file_touches_nothing(harness: Harness) {
    let mut daemon = untouchable(&harness);

    let outcome = daemon.stop().expect("stop should return an outcome");

    assert_eq!(outcome, Outcome::NoPidFile);
    assert_eq!(outcome.exit_code(), 1);
    assert!(harness.log.hooks().is_empty());
}

#[rstest]
fn stop_of_stale_daemon_keeps_pid_file(harness: Harness) {
    harness.seed_pid_file("999999");
    let mut daemon = harness.daemon();

    let outcome = daemon.stop().expect("stop should return an outcome");

    assert_eq!(outcome, Outcome::StaleProcess { pid: 999_999 });
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(harness.pid_file_content().as_deref(), Some("999999"));
    assert_eq!(harness.log.hooks(), vec![HookPoint::BeforeStop]);
}

#[rstest]
fn stop_of_live_daemon_signals_and_removes_pid_file(harness: Harness) {
    harness.seed_pid_file("4242");
    harness.processes.mark_live(4242);
    let mut daemon = harness.daemon();

    let outcome = daemon.stop().expect("stop should succeed");

    assert_eq!(outcome, Outcome::Success);
    assert!(harness.log.contains(&Event::Interrupted(4242)));
    assert!(harness.pid_file_content().is_none());
    assert_eq!(
        harness.log.hooks(),
        vec![HookPoint::BeforeStop, HookPoint::AfterStop]
    );
}

#[rstest]
fn stop_surfaces_signal_failures(harness: Harness) {
    harness.seed_pid_file("4242");
    harness.processes.deny(4242);
    let mut daemon = harness.daemon();

    let error = daemon.stop().expect_err("EPERM should be an error");

    assert!(matches!(
        error,
        LifecycleError::Signal {
            pid: 4242,
            source: Errno::EPERM
        }
    ));
    assert_eq!(harness.pid_file_content().as_deref(), Some("4242"));
}

#[rstest]
fn restart_stops_before_starting(harness: Harness) {
    harness.seed_pid_file("4242");
    harness.processes.mark_live(4242);
    let mut daemon = harness.daemon();
    let seen = Arc::new(Mutex::new(None));

    let outcome = daemon
        .restart(signalled_run(
            &harness.log,
            harness.pid_path(),
            Arc::clone(&seen),
        ))
        .expect("restart should succeed");

    assert_eq!(outcome, Outcome::Success);
    let interrupted = harness.log.position(&Event::Interrupted(4242));
    let run = harness.log.position(&Event::RunEntered);
    assert!(interrupted.is_some() && interrupted < run);
    assert_eq!(
        seen.lock().expect("seen mutex poisoned").clone(),
        Some(std::process::id().to_string())
    );
}

#[rstest]
#[case::no_pid_file(None, Outcome::NoPidFile)]
#[case::stale(Some("999999"), Outcome::StaleProcess { pid: 999_999 })]
fn restart_halts_on_refused_stop(
    harness: Harness,
    #[case] seed: Option<&str>,
    #[case] expected: Outcome,
) {
    if let Some(content) = seed {
        harness.seed_pid_file(content);
    }
    let mut daemon = harness.daemon();
    let seen = Arc::new(Mutex::new(None));

    let outcome = daemon
        .restart(signalled_run(&harness.log, harness.pid_path(), seen))
        .expect("restart should return an outcome");

    assert_eq!(outcome, expected);
    assert!(!harness.log.contains(&Event::RunEntered));
    assert!(!harness.log.contains(&Event::Hook(HookPoint::BeforeStart)));
}

#[rstest]
fn background_start_daemonizes_before_hooks(harness: Harness) {
    let mut daemon = harness.daemon();
    daemon.set_launch_mode(LaunchMode::Background);
    let log_path = harness.dir().join("daemon.log");
    daemon.set_stdout(&log_path).expect("stdout should redirect");

    daemon.start(noop_run).expect("start should succeed");

    let log = &harness.log;
    let daemonized = log.position(&Event::Daemonized(harness.dir().to_path_buf()));
    let before_start = log.position(&Event::Hook(HookPoint::BeforeStart));
    assert!(daemonized.is_some() && daemonized < before_start);
    assert_eq!(log.count(&Event::Redirected(StdStream::Stdout, log_path)), 2);
    assert!(log.contains(&Event::Silenced(StdStream::Stdin)));
    assert!(log.contains(&Event::Silenced(StdStream::Stderr)));
    assert!(!log.contains(&Event::Silenced(StdStream::Stdout)));
}

#[rstest]
fn foreground_start_skips_daemonizer(harness: Harness) {
    let mut daemon = harness.daemon();
    daemon.start(noop_run).expect("start should succeed");
    assert!(
        !harness
            .log
            .events()
            .iter()
            .any(|event| matches!(event, Event::Daemonized(_)))
    );
}

#[rstest]
fn stream_setters_redirect_immediately_with_absolute_paths(harness: Harness) {
    let mut daemon = harness.bare_daemon();
    let cwd = env::current_dir().expect("current dir");

    daemon.set_stderr("logs/err.log").expect("stderr should redirect");
    daemon.set_stdin("input.txt").expect("stdin should redirect");

    let expected = cwd.join("logs/err.log");
    assert!(
        harness
            .log
            .contains(&Event::Redirected(StdStream::Stderr, expected.clone()))
    );
    assert_eq!(daemon.config().stream(StdStream::Stderr), Some(expected.as_path()));
    assert_eq!(
        daemon.config().stream(StdStream::Stdin),
        Some(cwd.join("input.txt").as_path())
    );
    assert!(daemon.config().stream(StdStream::Stdout).is_none());
}

#[rstest]
fn chdir_records_the_resolved_directory(harness: Harness) {
    let mut daemon = harness.bare_daemon();
    let cwd = env::current_dir().expect("current dir");

    daemon.chdir(".").expect("chdir to current dir should succeed");

    assert_eq!(daemon.config().working_dir(), cwd.as_path());
}

#[rstest]
fn set_pid_file_resolves_without_io(harness: Harness) {
    let mut daemon = harness.bare_daemon();
    let cwd = env::current_dir().expect("current dir");

    daemon.set_pid_file("run/app.pid").expect("path should resolve");

    assert_eq!(daemon.pid_file().path(), Some(cwd.join("run/app.pid").as_path()));
    assert!(!cwd.join("run/app.pid").exists());
}

#[rstest]
fn status_reflects_pid_file_and_liveness(harness: Harness) {
    let daemon = harness.daemon();
    assert_eq!(daemon.status().expect("status"), Status::NotRunning);

    harness.seed_pid_file("999999");
    assert_eq!(daemon.status().expect("status"), Status::Stale { pid: 999_999 });

    harness.seed_pid_file("4242");
    harness.processes.mark_live(4242);
    assert_eq!(daemon.status().expect("status"), Status::Running { pid: 4242 });
}

#[rstest]
fn refusals_are_reported(harness: Harness) {
    let mut daemon = harness.daemon();
    daemon.stop().expect("stop outcome");
    assert!(harness.log.contains(&Event::Refused(Outcome::NoPidFile)));
}

#[rstest]
fn system_router_installs_once_and_raises_token() {
    let router = SystemSignalRouter::new();
    let token = ShutdownToken::new();

    router.install(&token).expect("first install");
    router.install(&token).expect("second install is a no-op");
    assert!(router.is_installed());

    signal_hook::low_level::raise(SIGTERM).expect("raise SIGTERM");
    assert!(token.wait_timeout(Duration::from_secs(2), Duration::from_millis(5)));
}

#[rstest]
fn new_controller_starts_stopped() {
    let daemon = Fallen::new(DaemonConfig::new(env::temp_dir()))
        .with_control(ProcessControl::system());
    assert_eq!(daemon.state(), LifecycleState::Stopped);
    assert!(!daemon.is_running());
    assert!(daemon.pid_file().path().is_none());
}
