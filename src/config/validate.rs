// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::model::{ConfigFile, ProgramConfig, ProgramSpec, RawConfigFile, ALL_JOBS};
use crate::errors::{Result, TaskmasterError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TaskmasterError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_programs(&raw)?;

        let mut programs = BTreeMap::new();
        for (name, program) in raw.program {
            validate_name(&name)?;
            let spec = ProgramSpec::try_from_config(&name, program)?;
            programs.insert(name, spec);
        }

        Ok(ConfigFile::new_unchecked(programs))
    }
}

impl ProgramSpec {
    fn try_from_config(name: &str, cfg: ProgramConfig) -> Result<Self> {
        if cfg.command.trim().is_empty() {
            return Err(config_error(name, "command must not be empty"));
        }
        if cfg.numprocs == 0 {
            return Err(config_error(name, "numprocs must be >= 1 (got 0)"));
        }
        if cfg.startretries == 0 {
            return Err(config_error(name, "startretries must be >= 1 (got 0)"));
        }
        validate_umask(name, &cfg.umask)?;
        for entry in cfg.environment.iter() {
            match entry.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(config_error(
                        name,
                        &format!("environment entry '{entry}' must look like KEY=VALUE"),
                    ));
                }
            }
        }
        for code in cfg.exitcodes.iter() {
            if !(0..=255).contains(code) {
                return Err(config_error(
                    name,
                    &format!("exit code {code} is outside 0..=255"),
                ));
            }
        }

        let mut exitcodes = cfg.exitcodes;
        if !exitcodes.contains(&0) {
            exitcodes.push(0);
        }

        Ok(ProgramSpec {
            command: cfg.command,
            directory: non_empty_path(cfg.directory),
            environment: cfg.environment,
            numprocs: cfg.numprocs,
            autostart: cfg.autostart,
            stdout_logfile: non_empty_path(cfg.stdout_logfile),
            stderr_logfile: non_empty_path(cfg.stderr_logfile),
            umask: cfg.umask,
            startsecs: cfg.startsecs,
            startretries: cfg.startretries,
            autorestart: cfg.autorestart,
            exitcodes,
            stopsignal: cfg.stopsignal,
            stopwaitsecs: cfg.stopwaitsecs,
        })
    }
}

fn ensure_has_programs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.program.is_empty() {
        return Err(TaskmasterError::ConfigError(
            "config must contain at least one [program.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name == ALL_JOBS {
        return Err(TaskmasterError::ConfigError(format!(
            "'{ALL_JOBS}' is a reserved name, please use another program name"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(TaskmasterError::ConfigError(format!(
            "program name '{name}' must not contain whitespace"
        )));
    }
    Ok(())
}

fn validate_umask(name: &str, umask: &str) -> Result<()> {
    match u32::from_str_radix(umask, 8) {
        Ok(value) if value <= 0o777 && !umask.is_empty() => Ok(()),
        _ => Err(config_error(
            name,
            &format!("umask '{umask}' must be an octal value between 000 and 777"),
        )),
    }
}

fn non_empty_path(value: Option<String>) -> Option<PathBuf> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn config_error(program: &str, msg: &str) -> TaskmasterError {
    TaskmasterError::ConfigError(format!("program '{program}': {msg}"))
}
