use std::sync::{Arc, Mutex};

use taskmaster::config::{ConfigFile, ConfigSource};
use taskmaster::errors::{Result, TaskmasterError};

/// In-memory config source.
///
/// Clones share the same slot, so a test can keep one clone, hand the other
/// to a `JobManager`, and swap the config before sending `reload`.
#[derive(Clone)]
pub struct StaticConfigSource {
    current: Arc<Mutex<Option<ConfigFile>>>,
}

impl StaticConfigSource {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            current: Arc::new(Mutex::new(Some(config))),
        }
    }

    /// Replace what the next `load` returns.
    pub fn set(&self, config: ConfigFile) {
        *self.current.lock().unwrap() = Some(config);
    }

    /// Make the next `load` fail, as an unreadable file would.
    pub fn break_source(&self) {
        *self.current.lock().unwrap() = None;
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> Result<ConfigFile> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TaskmasterError::ConfigError("config source unavailable".to_string()))
    }

    fn describe(&self) -> String {
        "in-memory config".to_string()
    }
}
