// src/job/instance.rs

//! Per-instance worker: the STARTING / RUNNING / BACKOFF / EXITED loop.
//!
//! One worker runs per launched instance. It owns the child process for its
//! slot, classifies every exit against the stability window and the
//! autorestart policy, and reports its first outcome on `ready` so that
//! `Job::start` knows when the initial spawn attempt is over.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::job::process::exit_code;
use crate::job::state::ProcessState;
use crate::job::Job;

/// Pause between failed start attempts.
pub const BACKOFF_DELAY: Duration = Duration::from_secs(1);

/// What to do after a failed start attempt.
enum AfterFailure {
    Retry,
    Stop,
}

pub(crate) async fn run_worker(job: Arc<Job>, id: usize, ready: oneshot::Sender<bool>) {
    let mut ready = Some(ready);

    loop {
        if !job.begin_attempt(id) {
            debug!(job = %job.name(), instance = id, "stop requested before spawn");
            break;
        }

        let spec = job.spec();
        let mut child = match job.spawn_instance(id, &spec) {
            Ok(child) => child,
            Err(err) => {
                error!(job = %job.name(), instance = id, error = %err, "spawn failed");
                match after_failure(&job, id).await {
                    AfterFailure::Retry => continue,
                    AfterFailure::Stop => break,
                }
            }
        };

        let started = Instant::now();
        if let Some(tx) = ready.take() {
            let _ = tx.send(true);
        }

        let code = match child.wait().await {
            Ok(status) => exit_code(&status),
            Err(err) => {
                error!(job = %job.name(), instance = id, error = %err, "waiting for child failed");
                -1
            }
        };
        job.record_exit(id, code);

        if job.state(id) == ProcessState::Stopping {
            debug!(job = %job.name(), instance = id, code, "child exited while stopping");
            break;
        }

        let spec = job.spec();
        if started.elapsed() < Duration::from_secs(spec.startsecs) {
            warn!(
                job = %job.name(),
                instance = id,
                code,
                startsecs = spec.startsecs,
                "exited before the start window elapsed"
            );
            match after_failure(&job, id).await {
                AfterFailure::Retry => continue,
                AfterFailure::Stop => break,
            }
        }

        job.mark_exited(id);
        let restart = spec.autorestart.should_restart(code, &spec.exitcodes);
        info!(
            job = %job.name(),
            instance = id,
            code,
            autorestart = ?spec.autorestart,
            restart,
            "process exited"
        );
        if !restart {
            break;
        }
    }

    job.finish_worker(id);
    if let Some(tx) = ready.take() {
        let _ = tx.send(false);
    }
}

/// Count a failed attempt and wait out the backoff delay.
async fn after_failure(job: &Arc<Job>, id: usize) -> AfterFailure {
    match job.record_backoff(id) {
        ProcessState::Backoff => {}
        ProcessState::Fatal => {
            error!(job = %job.name(), instance = id, "too many start retries; giving up");
            return AfterFailure::Stop;
        }
        _ => return AfterFailure::Stop,
    }

    job.backoff_sleep(BACKOFF_DELAY).await;

    if job.state(id) == ProcessState::Stopping {
        AfterFailure::Stop
    } else {
        AfterFailure::Retry
    }
}
