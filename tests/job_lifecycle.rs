// tests/job_lifecycle.rs

mod common;

use std::fs;
use std::time::Duration;

use nix::unistd::{getpgid, Pid};
use taskmaster::errors::TaskmasterError;
use taskmaster::job::ProcessState;
use taskmaster::types::AutorestartMode;
use taskmaster_test_utils::builders::ProgramConfigBuilder;
use taskmaster_test_utils::{init_tracing, wait_until, with_timeout};
use tempfile::tempdir;

#[tokio::test]
async fn start_reaches_running_and_stop_resets_group() {
    init_tracing();
    let job = common::job("sleeper", ProgramConfigBuilder::new("sleep 30").build());

    assert_eq!(job.states(), vec![ProcessState::Stopped]);
    assert_eq!(job.pgid(), 0);

    with_timeout(job.start()).await.unwrap();
    assert_eq!(job.state(0), ProcessState::Running);
    assert_ne!(job.pgid(), 0);
    assert!(job.status(0).unwrap().pid.is_some());

    with_timeout(job.stop()).await.unwrap();
    assert_eq!(job.state(0), ProcessState::Stopped);
    assert_eq!(job.pgid(), 0);
    assert!(!job.is_running());
    assert!(job.status(0).unwrap().pid.is_none());
}

#[tokio::test]
async fn instances_share_one_process_group() {
    init_tracing();
    let job = common::job(
        "web",
        ProgramConfigBuilder::new("sleep 30").numprocs(2).build(),
    );

    with_timeout(job.start()).await.unwrap();
    assert_eq!(job.states(), vec![ProcessState::Running; 2]);

    let pgid = job.pgid();
    for id in 0..2 {
        let pid = job.status(id).unwrap().pid.unwrap();
        let group = getpgid(Some(Pid::from_raw(pid as i32))).unwrap();
        assert_eq!(group.as_raw(), pgid, "instance {id} is in the wrong group");
    }
    assert_eq!(job.status_lines(), "[web_0]: RUNNING\n[web_1]: RUNNING");

    with_timeout(job.stop()).await.unwrap();
    assert_eq!(job.states(), vec![ProcessState::Stopped; 2]);
}

#[tokio::test]
async fn start_is_idempotent() {
    init_tracing();
    let job = common::job("once", ProgramConfigBuilder::new("sleep 30").build());

    with_timeout(job.start()).await.unwrap();
    let pid = job.status(0).unwrap().pid;

    with_timeout(job.start()).await.unwrap();
    assert_eq!(job.status(0).unwrap().pid, pid, "second start must not respawn");

    with_timeout(job.stop()).await.unwrap();
}

#[tokio::test]
async fn stop_on_stopped_job_is_a_no_op() {
    init_tracing();
    let job = common::job("idle", ProgramConfigBuilder::new("sleep 30").build());
    with_timeout(job.stop()).await.unwrap();
    assert_eq!(job.state(0), ProcessState::Stopped);
}

#[tokio::test]
async fn early_exits_back_off_until_fatal() {
    init_tracing();
    let job = common::job(
        "flaky",
        ProgramConfigBuilder::new("exit 1")
            .startsecs(1)
            .startretries(3)
            .build(),
    );

    with_timeout(job.start()).await.unwrap();

    let fatal = wait_until(Duration::from_secs(10), || job.state(0) == ProcessState::Fatal).await;
    assert!(fatal, "expected FATAL, got {}", job.state(0));

    let status = job.status(0).unwrap();
    assert_eq!(status.backoffs, 3);
    assert_eq!(status.retries, 3);
    assert_eq!(status.last_exit, Some(1));
    assert!(!status.running);
}

#[tokio::test]
async fn spawn_failure_reports_not_running() {
    init_tracing();
    let job = common::job(
        "nowhere",
        ProgramConfigBuilder::new("true")
            .directory("/definitely/not/a/dir")
            .startretries(1)
            .build(),
    );

    let result = with_timeout(job.start()).await;
    assert!(matches!(result, Err(TaskmasterError::ProcessNotRunning)));
    assert_eq!(job.state(0), ProcessState::Fatal);
    assert_eq!(job.pgid(), 0);
}

#[tokio::test]
async fn unexpected_exit_is_restarted() {
    init_tracing();
    let dir = tempdir().unwrap();
    let marker = dir.path().join("runs");
    let job = common::job(
        "crashy",
        ProgramConfigBuilder::new(&format!("echo run >> {}; sleep 0.2; exit 1", marker.display()))
            .autorestart(AutorestartMode::Unexpected)
            .build(),
    );

    with_timeout(job.start()).await.unwrap();

    let restarted = wait_until(Duration::from_secs(5), || {
        fs::read_to_string(&marker)
            .map(|s| s.lines().count() >= 2)
            .unwrap_or(false)
    })
    .await;
    assert!(restarted, "exit 1 is unexpected and must be restarted");

    with_timeout(job.stop()).await.unwrap();
    assert_eq!(job.state(0), ProcessState::Stopped);
}

#[tokio::test]
async fn expected_exit_is_not_restarted() {
    init_tracing();
    let dir = tempdir().unwrap();
    let marker = dir.path().join("runs");
    let job = common::job(
        "clean",
        ProgramConfigBuilder::new(&format!("echo run >> {}; exit 2", marker.display()))
            .autorestart(AutorestartMode::Unexpected)
            .exitcodes(&[2])
            .build(),
    );

    with_timeout(job.start()).await.unwrap();

    let exited = wait_until(Duration::from_secs(5), || !job.is_running()).await;
    assert!(exited);
    assert_eq!(job.state(0), ProcessState::Exited);
    assert_eq!(job.status(0).unwrap().last_exit, Some(2));

    tokio::time::sleep(Duration::from_millis(300)).await;
    let runs = fs::read_to_string(&marker).unwrap();
    assert_eq!(runs.lines().count(), 1);
}

#[tokio::test]
async fn restart_replaces_the_process() {
    init_tracing();
    let job = common::job("again", ProgramConfigBuilder::new("sleep 30").build());

    with_timeout(job.start()).await.unwrap();
    let before = job.status(0).unwrap().pid;

    with_timeout(job.restart()).await.unwrap();
    let after = job.status(0).unwrap().pid;

    assert_eq!(job.state(0), ProcessState::Running);
    assert!(after.is_some());
    assert_ne!(before, after);

    with_timeout(job.stop()).await.unwrap();
}

#[tokio::test]
async fn environment_directory_and_umask_reach_the_child() {
    init_tracing();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.log");
    let job = common::job(
        "envy",
        ProgramConfigBuilder::new("echo \"$GREETING $(pwd) $(umask)\"; sleep 30")
            .env("GREETING=hello")
            .directory(dir.path().to_str().unwrap())
            .umask("077")
            .stdout_logfile(out.to_str().unwrap())
            .build(),
    );

    with_timeout(job.start()).await.unwrap();

    let written = wait_until(Duration::from_secs(5), || {
        fs::read_to_string(&out).map(|s| !s.is_empty()).unwrap_or(false)
    })
    .await;
    assert!(written);

    let line = fs::read_to_string(&out).unwrap();
    let canonical = dir.path().canonicalize().unwrap();
    assert!(line.starts_with("hello "), "{line:?}");
    assert!(line.contains(canonical.to_str().unwrap()), "{line:?}");
    assert!(line.trim_end().ends_with("077"), "{line:?}");

    with_timeout(job.stop()).await.unwrap();
}

#[tokio::test]
async fn stopping_a_fatal_job_signals_nothing() {
    init_tracing();
    let job = common::job(
        "gone",
        ProgramConfigBuilder::new("exit 1")
            .startsecs(1)
            .startretries(1)
            .build(),
    );

    with_timeout(job.start()).await.unwrap();
    let fatal = wait_until(Duration::from_secs(5), || job.state(0) == ProcessState::Fatal).await;
    assert!(fatal);

    // The group id is still recorded but has no live member.
    assert!(!job.is_running());
    assert_eq!(job.live_group(), None);

    with_timeout(job.stop()).await.unwrap();
    assert_eq!(job.pgid(), 0);
    assert_eq!(job.state(0), ProcessState::Fatal);
}

#[tokio::test]
async fn live_group_tracks_running_members() {
    init_tracing();
    let job = common::job("alive", ProgramConfigBuilder::new("sleep 30").build());
    assert_eq!(job.live_group(), None);

    with_timeout(job.start()).await.unwrap();
    assert_eq!(job.live_group(), Some(job.pgid()));

    with_timeout(job.stop()).await.unwrap();
    assert_eq!(job.live_group(), None);
}

#[tokio::test]
async fn signal_errors_are_reported() {
    use nix::errno::Errno;
    use nix::sys::signal::Signal;
    use taskmaster::job::process::signal_group;

    // killpg rejects negative group ids with EINVAL without sending anything.
    match signal_group(-42, Signal::SIGTERM) {
        Err(TaskmasterError::SignalError { pgid, errno }) => {
            assert_eq!(pgid, -42);
            assert_eq!(errno, Errno::EINVAL);
        }
        other => panic!("Expected SignalError, got: {:?}", other),
    }

    // A group that has already exited counts as stopped.
    let mut child = tokio::process::Command::new("true")
        .process_group(0)
        .spawn()
        .unwrap();
    let pid = child.id().unwrap() as i32;
    child.wait().await.unwrap();
    assert!(signal_group(pid, Signal::SIGKILL).is_ok());
}
