#![allow(dead_code)]

use std::sync::Arc;

use taskmaster::config::{ConfigFile, ProgramConfig, ProgramSpec};
use taskmaster::job::Job;
use tokio_util::task::TaskTracker;
use taskmaster_test_utils::builders::ConfigFileBuilder;

/// Validate a single program and return its spec.
pub fn spec(program: ProgramConfig) -> ProgramSpec {
    let mut cfg = ConfigFileBuilder::new().with_program("job", program).build();
    cfg.program.remove("job").expect("program present")
}

/// Build a stopped job named `name` on a fresh tracker.
pub fn job(name: &str, program: ProgramConfig) -> Arc<Job> {
    Job::new(name, spec(program), TaskTracker::new())
}

/// Config with the given programs.
pub fn config(programs: Vec<(&str, ProgramConfig)>) -> ConfigFile {
    programs
        .into_iter()
        .fold(ConfigFileBuilder::new(), |b, (name, p)| b.with_program(name, p))
        .build()
}
