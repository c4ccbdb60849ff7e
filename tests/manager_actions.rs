// tests/manager_actions.rs

mod common;

use taskmaster::job::ProcessState;
use taskmaster::manager::{ActionError, JobManager};
use taskmaster_test_utils::builders::ProgramConfigBuilder;
use taskmaster_test_utils::static_source::StaticConfigSource;
use taskmaster_test_utils::{init_tracing, with_timeout};
use tokio_util::task::TaskTracker;

fn two_sleepers(autostart: bool) -> taskmaster::config::ConfigFile {
    common::config(vec![
        (
            "api",
            ProgramConfigBuilder::new("sleep 30").autostart(autostart).build(),
        ),
        (
            "web",
            ProgramConfigBuilder::new("sleep 30")
                .numprocs(2)
                .autostart(autostart)
                .build(),
        ),
    ])
}

#[tokio::test]
async fn status_start_stop_round() {
    init_tracing();
    let source = StaticConfigSource::new(two_sleepers(false));
    let tracker = TaskTracker::new();
    let (manager, handle) = JobManager::init(source, tracker.clone()).unwrap();
    let run = tokio::spawn(manager.run());

    let status = with_timeout(handle.execute("status", &["all"])).await.unwrap();
    assert_eq!(
        status,
        "[api]: STOPPED\n[web_0]: STOPPED\n[web_1]: STOPPED"
    );

    let started = with_timeout(handle.execute("start", &["all"])).await.unwrap();
    assert_eq!(started, "api: started\nweb: started");

    let status = with_timeout(handle.execute("status", &["web"])).await.unwrap();
    assert_eq!(status, "[web_0]: RUNNING\n[web_1]: RUNNING");

    let stopped = with_timeout(handle.execute("stop", &["api"])).await.unwrap();
    assert_eq!(stopped, "api: stopped");

    let quit = with_timeout(handle.execute("quit", &[])).await.unwrap();
    assert_eq!(quit, "stopped all jobs");
    with_timeout(run).await.unwrap().unwrap();

    tracker.close();
    with_timeout(tracker.wait()).await;
}

#[tokio::test]
async fn argument_errors() {
    init_tracing();
    let source = StaticConfigSource::new(two_sleepers(false));
    let (manager, handle) = JobManager::init(source, TaskTracker::new()).unwrap();
    let run = tokio::spawn(manager.run());

    assert_eq!(
        handle.execute("start", &[]).await,
        Err(ActionError::WrongArgCount)
    );
    assert_eq!(
        handle.execute("status", &["api", "web"]).await,
        Err(ActionError::WrongArgCount)
    );
    assert_eq!(
        handle.execute("stop", &["ghost"]).await,
        Err(ActionError::UnknownJob("ghost".to_string()))
    );
    assert_eq!(
        handle.execute("launch", &["api"]).await,
        Err(ActionError::UnknownCommand("launch".to_string()))
    );
    assert_eq!(
        handle.execute("reload", &["api"]).await,
        Err(ActionError::NoArgsExpected("reload".to_string()))
    );
    assert_eq!(
        ActionError::UnknownJob("ghost".to_string()).to_string(),
        "job is not recognized: ghost"
    );

    with_timeout(handle.execute("quit", &[])).await.unwrap();
    with_timeout(run).await.unwrap().unwrap();

    assert_eq!(
        handle.execute("status", &["all"]).await,
        Err(ActionError::Closed)
    );
}

#[tokio::test]
async fn autostart_runs_before_first_action() {
    init_tracing();
    let source = StaticConfigSource::new(two_sleepers(true));
    let (manager, handle) = JobManager::init(source, TaskTracker::new()).unwrap();
    let api = manager.job("api").unwrap();
    let run = tokio::spawn(manager.run());

    let status = with_timeout(handle.execute("status", &["all"])).await.unwrap();
    assert_eq!(
        status,
        "[api]: RUNNING\n[web_0]: RUNNING\n[web_1]: RUNNING"
    );

    with_timeout(handle.execute("quit", &[])).await.unwrap();
    with_timeout(run).await.unwrap().unwrap();
    assert_eq!(api.state(0), ProcessState::Stopped);
}

#[tokio::test]
async fn reload_restarts_only_changed_jobs() {
    init_tracing();
    let source = StaticConfigSource::new(two_sleepers(true));
    let (manager, handle) = JobManager::init(source.clone(), TaskTracker::new()).unwrap();
    let api = manager.job("api").unwrap();
    let web = manager.job("web").unwrap();
    let run = tokio::spawn(manager.run());

    with_timeout(handle.execute("status", &["all"])).await.unwrap();
    let api_pid = api.status(0).unwrap().pid;
    let web_pids: Vec<_> = (0..2).map(|i| web.status(i).unwrap().pid).collect();

    source.set(common::config(vec![
        ("api", ProgramConfigBuilder::new("sleep 30").autostart(true).build()),
        (
            "web",
            ProgramConfigBuilder::new("sleep 30")
                .numprocs(2)
                .env("MODE=changed")
                .autostart(true)
                .build(),
        ),
    ]));

    let reply = with_timeout(handle.execute("reload", &[])).await.unwrap();
    assert_eq!(reply, "configuration reloaded");

    assert_eq!(api.status(0).unwrap().pid, api_pid, "api was untouched");
    for i in 0..2 {
        let pid = web.status(i).unwrap().pid;
        assert!(pid.is_some());
        assert_ne!(pid, web_pids[i], "web_{i} should have been restarted");
    }

    with_timeout(handle.execute("quit", &[])).await.unwrap();
    with_timeout(run).await.unwrap().unwrap();
}

#[tokio::test]
async fn reload_adds_removes_and_resizes_jobs() {
    init_tracing();
    let source = StaticConfigSource::new(two_sleepers(true));
    let (manager, handle) = JobManager::init(source.clone(), TaskTracker::new()).unwrap();
    let api = manager.job("api").unwrap();
    let run = tokio::spawn(manager.run());
    with_timeout(handle.execute("status", &["all"])).await.unwrap();

    source.set(common::config(vec![
        (
            "web",
            ProgramConfigBuilder::new("sleep 30").numprocs(3).build(),
        ),
        ("worker", ProgramConfigBuilder::new("sleep 30").build()),
    ]));

    let reply = with_timeout(handle.execute("reload", &[])).await.unwrap();
    assert_eq!(reply, "configuration reloaded");

    assert_eq!(api.state(0), ProcessState::Stopped, "removed job is stopped");
    assert_eq!(
        handle.execute("status", &["api"]).await,
        Err(ActionError::UnknownJob("api".to_string()))
    );

    let status = with_timeout(handle.execute("status", &["all"])).await.unwrap();
    assert_eq!(
        status,
        "[web_0]: RUNNING\n[web_1]: RUNNING\n[web_2]: RUNNING\n[worker]: RUNNING"
    );

    with_timeout(handle.execute("quit", &[])).await.unwrap();
    with_timeout(run).await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_reload_keeps_current_jobs() {
    init_tracing();
    let source = StaticConfigSource::new(two_sleepers(false));
    let (manager, handle) = JobManager::init(source.clone(), TaskTracker::new()).unwrap();
    let run = tokio::spawn(manager.run());

    source.break_source();
    match with_timeout(handle.execute("reload", &[])).await {
        Err(ActionError::Config(msg)) => assert!(msg.contains("unavailable")),
        other => panic!("Expected Config error, got: {:?}", other),
    }

    let status = with_timeout(handle.execute("status", &["all"])).await.unwrap();
    assert_eq!(status.lines().count(), 3);

    with_timeout(handle.execute("quit", &[])).await.unwrap();
    with_timeout(run).await.unwrap().unwrap();
}

#[tokio::test]
async fn status_reports_fatal_jobs() {
    init_tracing();
    let source = StaticConfigSource::new(common::config(vec![
        ("web", ProgramConfigBuilder::new("sleep 30").autostart(true).build()),
        (
            "worker",
            ProgramConfigBuilder::new("exit 1")
                .startsecs(1)
                .startretries(1)
                .autostart(true)
                .build(),
        ),
    ]));
    let (manager, handle) = JobManager::init(source, TaskTracker::new()).unwrap();
    let worker = manager.job("worker").unwrap();
    let run = tokio::spawn(manager.run());

    let fatal = taskmaster_test_utils::wait_until(std::time::Duration::from_secs(5), || {
        worker.state(0) == ProcessState::Fatal
    })
    .await;
    assert!(fatal);

    let status = with_timeout(handle.execute("status", &["all"])).await.unwrap();
    assert_eq!(status, "[web]: RUNNING\n[worker]: FATAL");

    match with_timeout(handle.execute("start", &["nosuchjob"])).await {
        Err(e) => assert_eq!(e.to_string(), "job is not recognized: nosuchjob"),
        Ok(text) => panic!("Expected error, got: {text}"),
    }

    with_timeout(handle.execute("quit", &[])).await.unwrap();
    with_timeout(run).await.unwrap().unwrap();
}
