// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{AutorestartMode, StopSignal};

/// Reserved target name meaning "every job". No program may use it.
pub const ALL_JOBS: &str = "all";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [program.web]
/// command = "python3 -m http.server 8080"
/// numprocs = 2
/// autorestart = "unexpected"
/// exitcodes = [0, 2]
/// stdout_logfile = "/tmp/web.out"
///
/// [program.worker]
/// command = "./worker --queue jobs"
/// directory = "/srv/worker"
/// environment = ["RUST_LOG=info", "QUEUE=jobs"]
/// stopsignal = "INT"
/// ```
///
/// This is the unvalidated shape; use `ConfigFile::try_from` (or
/// `load_and_validate`) to obtain checked `ProgramSpec`s.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// All programs from `[program.<name>]`, keyed by job name.
    #[serde(default)]
    pub program: BTreeMap<String, ProgramConfig>,
}

/// `[program.<name>]` section, with serde defaults applied.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramConfig {
    /// Shell command line to run.
    pub command: String,

    /// Number of replicas to run.
    #[serde(default = "default_numprocs")]
    pub numprocs: usize,

    /// Start the job when the daemon boots.
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    #[serde(default)]
    pub autorestart: AutorestartMode,

    /// Exit codes considered "expected" by `autorestart = "unexpected"`.
    #[serde(default = "default_exitcodes")]
    pub exitcodes: Vec<i32>,

    /// Seconds an instance must stay up to count as started.
    #[serde(default = "default_startsecs")]
    pub startsecs: u64,

    /// Failed start attempts before the instance is marked FATAL.
    #[serde(default = "default_startretries")]
    pub startretries: u32,

    #[serde(default)]
    pub stopsignal: StopSignal,

    /// Grace period before the stop signal is sent.
    #[serde(default = "default_stopwaitsecs")]
    pub stopwaitsecs: u64,

    /// Empty or absent means the daemon's own stdout.
    #[serde(default)]
    pub stdout_logfile: Option<String>,

    /// Empty or absent means the daemon's own stderr.
    #[serde(default)]
    pub stderr_logfile: Option<String>,

    #[serde(default)]
    pub directory: Option<String>,

    /// `KEY=VALUE` entries layered over the daemon's environment.
    #[serde(default)]
    pub environment: Vec<String>,

    /// Octal umask applied by the wrapping shell.
    #[serde(default = "default_umask")]
    pub umask: String,
}

fn default_numprocs() -> usize {
    1
}

fn default_autostart() -> bool {
    true
}

fn default_exitcodes() -> Vec<i32> {
    vec![0]
}

fn default_startsecs() -> u64 {
    1
}

fn default_startretries() -> u32 {
    3
}

fn default_stopwaitsecs() -> u64 {
    10
}

fn default_umask() -> String {
    "022".to_string()
}

/// Validated description of one job.
///
/// Immutable for the duration of one reload cycle; `Job` keeps its own copy
/// and overwrites it on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSpec {
    pub command: String,
    pub directory: Option<PathBuf>,
    pub environment: Vec<String>,
    pub numprocs: usize,
    pub autostart: bool,
    pub stdout_logfile: Option<PathBuf>,
    pub stderr_logfile: Option<PathBuf>,
    pub umask: String,
    pub startsecs: u64,
    pub startretries: u32,
    pub autorestart: AutorestartMode,
    /// Always contains 0.
    pub exitcodes: Vec<i32>,
    pub stopsignal: StopSignal,
    pub stopwaitsecs: u64,
}

impl ProgramSpec {
    /// Environment entries split into `(key, value)` pairs.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.environment
            .iter()
            .filter_map(|entry| entry.split_once('='))
    }
}

/// Validated configuration: every program passed field validation and none
/// is named `all`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub program: BTreeMap<String, ProgramSpec>,
}

impl ConfigFile {
    /// Build without validation. Only `TryFrom<RawConfigFile>` calls this.
    pub(crate) fn new_unchecked(program: BTreeMap<String, ProgramSpec>) -> Self {
        Self { program }
    }
}
