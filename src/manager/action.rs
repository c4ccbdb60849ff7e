// src/manager/action.rs

//! Request/response envelope between callers and the coordinator.
//!
//! Callers (socket connections, the signal bridge, tests) never touch the
//! job table. They enqueue an [`Action`] through a [`ManagerHandle`] and
//! await its single-fire reply.

use std::fmt;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Control verbs understood by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Restart,
    Status,
    Reload,
    Quit,
    /// Anything else; answered with an "unknown command" error.
    Unknown(String),
}

impl Command {
    pub fn parse(verb: &str) -> Self {
        match verb {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "restart" => Command::Restart,
            "status" => Command::Status,
            "reload" => Command::Reload,
            "quit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Restart => "restart",
            Command::Status => "status",
            Command::Reload => "reload",
            Command::Quit => "quit",
            Command::Unknown(verb) => verb,
        }
    }

    /// Word used in success replies, e.g. `web: started`.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Command::Start => "started",
            Command::Stop => "stopped",
            Command::Restart => "restarted",
            Command::Reload => "reloaded",
            Command::Quit => "quit",
            Command::Status | Command::Unknown(_) => "done",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an action failed. The `Display` text is what clients see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("command accepts 1 argument only")]
    WrongArgCount,

    #[error("{0} takes no arguments")]
    NoArgsExpected(String),

    #[error("job is not recognized: {0}")]
    UnknownJob(String),

    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("reload failed: {0}")]
    Config(String),

    #[error("{0}")]
    Job(String),

    #[error("daemon is shutting down")]
    ShuttingDown,

    #[error("coordinator is not running")]
    Closed,
}

pub type ActionResult = Result<String, ActionError>;

/// One queued control command.
#[derive(Debug)]
pub struct Action {
    pub command: Command,
    pub args: Vec<String>,
    reply: oneshot::Sender<ActionResult>,
}

impl Action {
    pub fn new(command: Command, args: Vec<String>) -> (Self, oneshot::Receiver<ActionResult>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                command,
                args,
                reply,
            },
            rx,
        )
    }

    /// Deliver the result. A caller that stopped waiting is ignored.
    pub fn respond(self, result: ActionResult) {
        let _ = self.reply.send(result);
    }
}

/// Cloneable sender side of the coordinator's action queue.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    tx: mpsc::Sender<Action>,
}

impl ManagerHandle {
    pub(crate) fn new(tx: mpsc::Sender<Action>) -> Self {
        Self { tx }
    }

    /// Enqueue `command` and wait for the coordinator's reply.
    pub async fn submit(&self, command: Command, args: Vec<String>) -> ActionResult {
        let (action, rx) = Action::new(command, args);
        self.tx.send(action).await.map_err(|_| ActionError::Closed)?;
        rx.await.map_err(|_| ActionError::Closed)?
    }

    /// Same as [`submit`](Self::submit), taking the verb as text.
    pub async fn execute(&self, verb: &str, args: &[&str]) -> ActionResult {
        let args = args.iter().map(|s| s.to_string()).collect();
        self.submit(Command::parse(verb), args).await
    }
}
