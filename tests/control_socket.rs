// tests/control_socket.rs

mod common;

use taskmaster::manager::JobManager;
use taskmaster::server::codec::{encode, parse_request, FrameBuffer, ProtocolError};
use taskmaster::server::{Client, Server};
use taskmaster_test_utils::builders::ProgramConfigBuilder;
use taskmaster_test_utils::static_source::StaticConfigSource;
use taskmaster_test_utils::{init_tracing, with_timeout};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[test]
fn frames_survive_partial_reads() {
    let mut frames = FrameBuffer::default();

    frames.push(b"sta");
    assert_eq!(frames.next_frame(), None);

    frames.push(b"tus all\rstop");
    assert_eq!(frames.next_frame().as_deref(), Some("status all"));
    assert_eq!(frames.next_frame(), None);
    assert_eq!(frames.pending(), 4);

    frames.push(b" web\r\r");
    assert_eq!(frames.next_frame().as_deref(), Some("stop web"));
    assert_eq!(frames.next_frame().as_deref(), Some(""));
    assert_eq!(frames.pending(), 0);
}

#[test]
fn requests_split_on_whitespace() {
    let req = parse_request("  restart   web ").unwrap();
    assert_eq!(req.verb, "restart");
    assert_eq!(req.args, vec!["web".to_string()]);

    assert_eq!(parse_request("   "), Err(ProtocolError::Empty));
    assert_eq!(encode("ok"), b"ok\r".to_vec());
}

#[tokio::test]
async fn serves_commands_and_cleans_up() {
    init_tracing();
    let dir = tempdir().unwrap();
    let socket = dir.path().join("taskmaster.sock");

    let source = StaticConfigSource::new(common::config(vec![(
        "api",
        ProgramConfigBuilder::new("sleep 30").build(),
    )]));
    let tracker = TaskTracker::new();
    let (manager, handle) = JobManager::init(source, tracker.clone()).unwrap();
    let run = tokio::spawn(manager.run());

    // A leftover socket file from a crashed daemon must not block bind.
    let stale = std::os::unix::net::UnixListener::bind(&socket).unwrap();
    drop(stale);

    let shutdown = CancellationToken::new();
    let server = Server::bind(&socket, handle.clone(), shutdown.clone()).unwrap();
    let serving = tokio::spawn(server.run());

    let mut client = with_timeout(Client::connect(&socket)).await.unwrap();
    assert_eq!(
        with_timeout(client.send("status api")).await.unwrap(),
        "[api]: STOPPED"
    );
    assert_eq!(
        with_timeout(client.send("start api")).await.unwrap(),
        "api: started"
    );
    assert_eq!(with_timeout(client.send("")).await.unwrap(), "empty command");
    assert_eq!(
        with_timeout(client.send("start")).await.unwrap(),
        "command accepts 1 argument only"
    );
    assert_eq!(
        with_timeout(client.send("quit")).await.unwrap(),
        "stopped all jobs"
    );

    with_timeout(run).await.unwrap().unwrap();
    shutdown.cancel();
    with_timeout(serving).await.unwrap().unwrap();
    assert!(!socket.exists(), "socket file must be removed");

    tracker.close();
    with_timeout(tracker.wait()).await;
}

#[test]
fn refuses_to_replace_a_regular_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-a-socket");
    std::fs::write(&path, "data").unwrap();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let source = StaticConfigSource::new(common::config(vec![(
            "api",
            ProgramConfigBuilder::new("sleep 30").build(),
        )]));
        let (_manager, handle) = JobManager::init(source, TaskTracker::new()).unwrap();
        assert!(Server::bind(&path, handle, CancellationToken::new()).is_err());
    });
    assert!(path.exists());
}
