// src/logging/mod.rs

//! Logging setup for `taskmasterd` using `tracing` + `tracing-subscriber`.
//!
//! Every event is written to STDERR and mirrored to the local syslog daemon
//! when its socket is reachable (see [`syslog`]).
//!
//! Filter priority:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `TASKMASTER_LOG`: a level name, or full `EnvFilter` directives such as
//!    `taskmaster::job=debug,info`
//! 3. default to `info`
//!
//! Supervised programs without a log file inherit the daemon's stdout, so
//! our own output stays off it.

pub mod syslog;

use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;
use self::syslog::{SyslogLayer, SYSLOG_SOCKET};

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "TASKMASTER_LOG";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = resolve_filter(cli_level, env.as_deref());

    let (syslog, syslog_error) = match SyslogLayer::connect(SYSLOG_SOCKET) {
        Ok(layer) => (Some(layer), None),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_writer(std::io::stderr),
        )
        .with(syslog)
        .try_init()?;

    if let Some(e) = syslog_error {
        tracing::warn!(socket = SYSLOG_SOCKET, error = %e, "syslog unavailable; logging to stderr only");
    }
    Ok(())
}

/// Build the event filter from the CLI level and the raw `TASKMASTER_LOG`
/// value. Unparseable directives fall back to `info`.
pub fn resolve_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(level_name(lvl));
    }

    env.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            if raw.eq_ignore_ascii_case("warning") {
                "warn".to_string()
            } else {
                raw.to_lowercase()
            }
        })
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
