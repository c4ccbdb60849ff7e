// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Default location of the control socket, shared by daemon and client.
pub const DEFAULT_SOCKET: &str = "/tmp/taskmaster.sock";

/// Command-line arguments for `taskmasterd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskmasterd",
    version,
    about = "Supervise a set of programs and control them over a local socket.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Re-read on `reload` and on SIGHUP.
    #[arg(long, value_name = "PATH", default_value = "taskmaster.toml")]
    pub config: String,

    /// Path of the control socket.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SOCKET)]
    pub socket: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKMASTER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the programs, but don't start anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Command-line arguments for `taskmasterctl`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskmasterctl",
    version,
    about = "Send control commands to a running taskmasterd.",
    long_about = None
)]
pub struct CtlArgs {
    /// Path of the daemon's control socket.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SOCKET)]
    pub socket: String,

    /// Command to send, e.g. `status all`. Reads commands from stdin when
    /// omitted.
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
