// src/job/process.rs

//! OS-level helpers: building the child command and signalling groups.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProgramSpec;
use crate::errors::{Result, TaskmasterError};

/// Build the shell invocation for one instance.
///
/// `pgid == 0` puts the child in a new group whose id is its own pid; any
/// other value joins that existing group.
pub fn build_command(spec: &ProgramSpec, pgid: i32) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(format!("umask {} && {}", spec.umask, spec.command));

    // The child inherits the daemon's environment; spec entries win.
    cmd.envs(spec.env_pairs());

    if let Some(dir) = &spec.directory {
        cmd.current_dir(dir);
    }

    cmd.process_group(pgid)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    cmd
}

/// Send `signal` to every process in group `pgid`.
///
/// A group that no longer exists is treated as already stopped.
pub fn signal_group(pgid: i32, signal: Signal) -> Result<()> {
    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pgid, ?signal, "process group already gone");
            Ok(())
        }
        Err(errno) => Err(TaskmasterError::SignalError { pgid, errno }),
    }
}

/// Exit code used for policy decisions. Signal deaths map to `128 + signo`
/// like a shell would report them.
pub fn exit_code(status: &ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}
