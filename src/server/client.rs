// src/server/client.rs

use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::errors::{Result, TaskmasterError};
use crate::server::codec::{encode, FrameBuffer};

/// Connection to a running daemon.
#[derive(Debug)]
pub struct Client {
    stream: UnixStream,
    frames: FrameBuffer,
}

impl Client {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        Ok(Self {
            stream,
            frames: FrameBuffer::default(),
        })
    }

    /// Send one command line and wait for the reply frame.
    pub async fn send(&mut self, line: &str) -> Result<String> {
        self.stream.write_all(&encode(line)).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<String> {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(frame) = self.frames.next_frame() {
                return Ok(frame);
            }
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(TaskmasterError::IoError(std::io::Error::from(
                    std::io::ErrorKind::UnexpectedEof,
                )));
            }
            self.frames.push(&buf[..n]);
        }
    }
}
