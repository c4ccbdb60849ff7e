#![allow(dead_code)]

use std::collections::BTreeMap;

use taskmaster::config::{ConfigFile, ProgramConfig, RawConfigFile};
use taskmaster::types::{AutorestartMode, StopSignal};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                program: BTreeMap::new(),
            },
        }
    }

    pub fn with_program(mut self, name: &str, program: ProgramConfig) -> Self {
        self.config.program.insert(name.to_string(), program);
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProgramConfig`.
///
/// Starts from the same defaults the TOML loader applies, except that
/// `startsecs` is 0 and `stopwaitsecs` is 1 so tests do not idle.
pub struct ProgramConfigBuilder {
    program: ProgramConfig,
}

impl ProgramConfigBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            program: ProgramConfig {
                command: command.to_string(),
                numprocs: 1,
                autostart: false,
                autorestart: AutorestartMode::Unexpected,
                exitcodes: vec![0],
                startsecs: 0,
                startretries: 3,
                stopsignal: StopSignal::Term,
                stopwaitsecs: 1,
                stdout_logfile: None,
                stderr_logfile: None,
                directory: None,
                environment: vec![],
                umask: "022".to_string(),
            },
        }
    }

    pub fn numprocs(mut self, n: usize) -> Self {
        self.program.numprocs = n;
        self
    }

    pub fn autostart(mut self, val: bool) -> Self {
        self.program.autostart = val;
        self
    }

    pub fn autorestart(mut self, mode: AutorestartMode) -> Self {
        self.program.autorestart = mode;
        self
    }

    pub fn exitcodes(mut self, codes: &[i32]) -> Self {
        self.program.exitcodes = codes.to_vec();
        self
    }

    pub fn startsecs(mut self, secs: u64) -> Self {
        self.program.startsecs = secs;
        self
    }

    pub fn startretries(mut self, n: u32) -> Self {
        self.program.startretries = n;
        self
    }

    pub fn stopsignal(mut self, signal: StopSignal) -> Self {
        self.program.stopsignal = signal;
        self
    }

    pub fn stopwaitsecs(mut self, secs: u64) -> Self {
        self.program.stopwaitsecs = secs;
        self
    }

    pub fn stdout_logfile(mut self, path: &str) -> Self {
        self.program.stdout_logfile = Some(path.to_string());
        self
    }

    pub fn stderr_logfile(mut self, path: &str) -> Self {
        self.program.stderr_logfile = Some(path.to_string());
        self
    }

    pub fn directory(mut self, path: &str) -> Self {
        self.program.directory = Some(path.to_string());
        self
    }

    pub fn env(mut self, entry: &str) -> Self {
        self.program.environment.push(entry.to_string());
        self
    }

    pub fn umask(mut self, mask: &str) -> Self {
        self.program.umask = mask.to_string();
        self
    }

    pub fn build(self) -> ProgramConfig {
        self.program
    }
}
