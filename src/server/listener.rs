// src/server/listener.rs

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, TaskmasterError};
use crate::manager::{Command, ManagerHandle};
use crate::server::codec::{encode, parse_request, FrameBuffer};

/// How long open connections get to flush their last reply at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a failed `accept`.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// Unix-socket front end for the coordinator.
#[derive(Debug)]
pub struct Server {
    path: PathBuf,
    listener: UnixListener,
    handle: ManagerHandle,
    shutdown: CancellationToken,
}

impl Server {
    /// Bind the socket at `path`, replacing a stale socket file.
    pub fn bind(
        path: impl AsRef<Path>,
        handle: ManagerHandle,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale_socket(&path)?;
        let listener = UnixListener::bind(&path)?;
        info!(socket = %path.display(), "control socket listening");
        Ok(Self {
            path,
            listener,
            handle,
            shutdown,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until the shutdown token fires, then close every
    /// connection and remove the socket file.
    pub async fn run(self) -> Result<()> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        debug!("client connected");
                        connections.spawn(handle_connection(
                            stream,
                            self.handle.clone(),
                            self.shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_RETRY).await;
                    }
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Ok(Err(e)) = finished {
                        warn!(error = %e, "connection closed with error");
                    }
                }
            }
        }

        info!(open = connections.len(), "closing control socket");
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            connections.shutdown().await;
        }

        drop(self.listener);
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(socket = %self.path.display(), error = %e, "failed to remove socket file");
            }
        }
        Ok(())
    }
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            warn!(socket = %path.display(), "removing stale socket file");
            fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(TaskmasterError::ConfigError(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Serve one client: read frames, forward them, write replies.
async fn handle_connection(
    stream: UnixStream,
    handle: ManagerHandle,
    shutdown: CancellationToken,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut frames = FrameBuffer::default();
    let mut buf = [0u8; 1024];

    loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => break,
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            debug!(pending = frames.pending(), "client disconnected");
            break;
        }
        frames.push(&buf[..n]);

        while let Some(line) = frames.next_frame() {
            let reply = match parse_request(&line) {
                Ok(request) => {
                    debug!(verb = %request.verb, args = ?request.args, "request");
                    match handle
                        .submit(Command::parse(&request.verb), request.args)
                        .await
                    {
                        Ok(text) => text,
                        Err(e) => e.to_string(),
                    }
                }
                Err(e) => e.to_string(),
            };
            writer.write_all(&encode(&reply)).await?;
        }
    }

    Ok(())
}
