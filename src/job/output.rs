// src/job/output.rs

//! Live-swappable destinations for a job's stdout/stderr.
//!
//! Children always get piped stdio. A pump task copies each pipe into the
//! job's `LogSink`, so the sink's target can be replaced on reload while the
//! child keeps writing to the same pipe.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// Anything a sink can forward bytes to.
pub trait OutputWriter: Send {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl<W: Write + Send> OutputWriter for W {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)?;
        self.flush()
    }
}

/// Which daemon stream a sink falls back to when no file is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// Where a sink currently writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Inherit(StdStream),
    File(PathBuf),
}

impl LogTarget {
    pub fn from_config(path: Option<&Path>, fallback: StdStream) -> Self {
        match path {
            Some(p) => LogTarget::File(p.to_path_buf()),
            None => LogTarget::Inherit(fallback),
        }
    }

    fn open(&self) -> io::Result<Box<dyn OutputWriter>> {
        match self {
            LogTarget::Inherit(StdStream::Stdout) => Ok(Box::new(io::stdout())),
            LogTarget::Inherit(StdStream::Stderr) => Ok(Box::new(io::stderr())),
            LogTarget::File(path) => Ok(Box::new(open_log_file(path)?)),
        }
    }
}

/// Open a log file for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

struct SinkInner {
    target: Option<LogTarget>,
    writer: Option<Box<dyn OutputWriter>>,
}

/// Indirection between a child's pipe and its current destination.
pub struct LogSink {
    inner: Mutex<SinkInner>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("target", &self.target())
            .finish_non_exhaustive()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    /// A sink with no destination yet; writes fail until `retarget`.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                target: None,
                writer: None,
            }),
        }
    }

    pub fn target(&self) -> Option<LogTarget> {
        self.inner.lock().ok().and_then(|g| g.target.clone())
    }

    /// Point the sink at `target`, opening it if it differs from the current
    /// one. A failed open leaves the previous destination in place.
    pub fn retarget(&self, target: &LogTarget) -> io::Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        if inner.target.as_ref() == Some(target) && inner.writer.is_some() {
            return Ok(());
        }
        let writer = target.open()?;
        inner.writer = Some(writer);
        inner.target = Some(target.clone());
        Ok(())
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log sink lock poisoned"))?;
        match inner.writer.as_mut() {
            Some(w) => w.write_bytes(buf),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }
}

/// Copy everything from `reader` into `sink` until EOF.
pub async fn pump<R>(job: String, mut reader: R, sink: std::sync::Arc<LogSink>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.write(&buf[..n]) {
                    warn!(job = %job, error = %e, "dropping child output");
                }
            }
            Err(e) => {
                debug!(job = %job, error = %e, "output pipe closed with error");
                break;
            }
        }
    }
}
