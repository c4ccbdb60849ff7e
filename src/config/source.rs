// src/config/source.rs

//! Where the coordinator reads configuration from.
//!
//! The manager asks its `ConfigSource` for a fresh `ConfigFile` at boot and
//! on every `reload`. Production uses [`FileConfigSource`]; tests can provide
//! an in-memory source whose contents they swap between reloads.

use std::path::{Path, PathBuf};

use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::errors::Result;

pub trait ConfigSource: Send + Sync {
    /// Produce a validated configuration.
    fn load(&self) -> Result<ConfigFile>;

    /// Human-readable origin, used in log lines.
    fn describe(&self) -> String;
}

/// Reads and validates a TOML file on every call.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<ConfigFile> {
        load_and_validate(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
