// src/job/state.rs

//! Per-instance lifecycle tags and the status record each worker updates.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Lifecycle state of one process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessState {
    #[default]
    Stopped,
    Starting,
    Running,
    Backoff,
    Stopping,
    Exited,
    Fatal,
    Unknown,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Stopped => "STOPPED",
            ProcessState::Starting => "STARTING",
            ProcessState::Running => "RUNNING",
            ProcessState::Backoff => "BACKOFF",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Exited => "EXITED",
            ProcessState::Fatal => "FATAL",
            ProcessState::Unknown => "UNKNOWN",
        }
    }

    /// States from which a `Start` request launches a new worker.
    pub fn is_startable(self) -> bool {
        matches!(
            self,
            ProcessState::Stopped | ProcessState::Exited | ProcessState::Fatal
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessState {
    type Err = std::convert::Infallible;

    /// Unrecognised names map to `Unknown` rather than failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "STOPPED" => ProcessState::Stopped,
            "STARTING" => ProcessState::Starting,
            "RUNNING" => ProcessState::Running,
            "BACKOFF" => ProcessState::Backoff,
            "STOPPING" => ProcessState::Stopping,
            "EXITED" => ProcessState::Exited,
            "FATAL" => ProcessState::Fatal,
            _ => ProcessState::Unknown,
        })
    }
}

/// Everything the supervisor knows about one instance.
///
/// Guarded by a `std::sync::Mutex` inside `Job`; never held across `.await`.
#[derive(Debug, Clone, Default)]
pub struct InstanceStatus {
    pub state: ProcessState,
    /// True while a worker task owns this slot.
    pub running: bool,
    /// Consecutive failed start attempts.
    pub retries: u32,
    /// Total BACKOFF transitions since the worker was launched.
    pub backoffs: u32,
    /// Pid of the live child, if any.
    pub pid: Option<u32>,
    /// Wall-clock time of the last STARTING → RUNNING transition.
    pub started_at: Option<SystemTime>,
    /// Exit code of the last child that exited on its own.
    pub last_exit: Option<i32>,
}
