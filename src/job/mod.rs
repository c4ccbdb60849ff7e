// src/job/mod.rs

//! Supervised jobs.
//!
//! A [`Job`] groups `numprocs` process instances under one name. All of its
//! instances share a single process group so that a stop can signal them as
//! a unit. Start and stop are each serialized by a job-local gate, so two
//! callers can never interleave their updates of the group id or of the
//! per-instance status records.
//!
//! - [`state`] holds the lifecycle tags and the status record.
//! - [`instance`] is the per-instance worker loop (retry/backoff policy).
//! - [`output`] is the live-swappable stdout/stderr indirection.
//! - [`process`] builds commands and signals process groups.

pub mod instance;
pub mod output;
pub mod process;
pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use nix::sys::signal::Signal;
use tokio::process::Child;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ProgramSpec;
use crate::errors::{Result, TaskmasterError};

use self::output::{pump, LogSink, LogTarget, StdStream};
use self::process::{build_command, signal_group};
pub use self::state::{InstanceStatus, ProcessState};

/// Interval at which `stop` checks whether every instance has gone away.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A named, possibly multi-instance supervised program.
pub struct Job {
    name: String,
    spec: Mutex<ProgramSpec>,
    instances: Vec<Mutex<InstanceStatus>>,
    /// Shared process-group id, 0 while unassigned. Also held across
    /// `spawn` so that two instances never form two groups.
    group: Mutex<i32>,
    start_gate: tokio::sync::Mutex<()>,
    stop_gate: tokio::sync::Mutex<()>,
    /// Wakes workers sleeping in BACKOFF when a stop begins.
    stop_requested: Notify,
    stdout: Arc<LogSink>,
    stderr: Arc<LogSink>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("pgid", &self.pgid())
            .field("states", &self.states())
            .finish_non_exhaustive()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Job {
    /// Create a stopped job. Workers are spawned on `tracker` so that the
    /// daemon can wait for all of them at shutdown.
    pub fn new(name: impl Into<String>, spec: ProgramSpec, tracker: TaskTracker) -> Arc<Self> {
        let instances = (0..spec.numprocs)
            .map(|_| Mutex::new(InstanceStatus::default()))
            .collect();

        Arc::new(Self {
            name: name.into(),
            spec: Mutex::new(spec),
            instances,
            group: Mutex::new(0),
            start_gate: tokio::sync::Mutex::new(()),
            stop_gate: tokio::sync::Mutex::new(()),
            stop_requested: Notify::new(),
            stdout: Arc::new(LogSink::new()),
            stderr: Arc::new(LogSink::new()),
            tracker,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current program spec.
    pub fn spec(&self) -> ProgramSpec {
        lock(&self.spec).clone()
    }

    pub fn numprocs(&self) -> usize {
        self.instances.len()
    }

    pub fn pgid(&self) -> i32 {
        *lock(&self.group)
    }

    pub fn state(&self, id: usize) -> ProcessState {
        self.instances
            .get(id)
            .map(|slot| lock(slot).state)
            .unwrap_or(ProcessState::Unknown)
    }

    pub fn states(&self) -> Vec<ProcessState> {
        self.instances.iter().map(|slot| lock(slot).state).collect()
    }

    pub fn status(&self, id: usize) -> Option<InstanceStatus> {
        self.instances.get(id).map(|slot| lock(slot).clone())
    }

    /// True while any instance still has a worker.
    pub fn is_running(&self) -> bool {
        self.instances.iter().any(|slot| lock(slot).running)
    }

    /// Current destinations of the stdout/stderr sinks.
    pub fn log_targets(&self) -> (Option<LogTarget>, Option<LogTarget>) {
        (self.stdout.target(), self.stderr.target())
    }

    /// `[name]: STATE`, or one `[name_i]: STATE` line per instance.
    pub fn status_lines(&self) -> String {
        let states = self.states();
        if states.len() == 1 {
            return format!("[{}]: {}", self.name, states[0]);
        }
        states
            .iter()
            .enumerate()
            .map(|(i, state)| format!("[{}_{}]: {}", self.name, i, state))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn with_instance<R>(&self, id: usize, f: impl FnOnce(&mut InstanceStatus) -> R) -> R {
        f(&mut lock(&self.instances[id]))
    }

    /// Start every instance that is not already running or stopping.
    ///
    /// When no process group exists yet, the first eligible instance is
    /// launched alone and awaited so that its pid becomes the group id; the
    /// remaining instances then join that group concurrently. Returns once
    /// every launched worker has reported its first outcome.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let _gate = self.start_gate.lock().await;
        let mut pending = Vec::new();

        for id in 0..self.instances.len() {
            let claimed = self.with_instance(id, |st| {
                if st.running || !st.state.is_startable() {
                    return false;
                }
                st.running = true;
                st.retries = 0;
                st.backoffs = 0;
                true
            });
            if !claimed {
                debug!(job = %self.name, instance = id, "already running; skipping start");
                continue;
            }

            let leader = self.pgid() == 0;
            let ready = self.launch_worker(id);

            if leader {
                let reached_running = ready.await.unwrap_or(false);
                if !reached_running {
                    warn!(job = %self.name, instance = id, "group leader never reached RUNNING");
                    for rx in pending {
                        let _ = rx.await;
                    }
                    return Err(TaskmasterError::ProcessNotRunning);
                }
                debug!(job = %self.name, pgid = self.pgid(), "process group established");
                continue;
            }

            pending.push(ready);
        }

        for rx in pending {
            let _ = rx.await;
        }
        Ok(())
    }

    fn launch_worker(self: &Arc<Self>, id: usize) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let job = Arc::clone(self);
        let span = info_span!("worker", job = %self.name, instance = id);
        self.tracker
            .spawn(async move { instance::run_worker(job, id, tx).await }.instrument(span));
        rx
    }

    /// Stop every instance and release the process group.
    ///
    /// The whole group receives SIGKILL first. If some instance is still
    /// around after `stopwaitsecs`, the configured stop signal is sent as a
    /// second attempt. A group with no live member is never signalled, since
    /// its id may already belong to someone else.
    ///
    /// A failed signal is logged and returned once the group id has been
    /// released; instances it could not reach stay STOPPING until their
    /// workers see the child exit.
    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        let _gate = self.stop_gate.lock().await;

        if self.pgid() == 0 && !self.is_running() {
            return Ok(());
        }

        for slot in self.instances.iter() {
            let mut st = lock(slot);
            if st.running {
                st.state = ProcessState::Stopping;
            }
        }
        self.stop_requested.notify_waiters();

        let spec = self.spec();
        let mut failure = None;
        self.signal_live_group(Signal::SIGKILL, &mut failure);

        let deadline = Instant::now() + Duration::from_secs(spec.stopwaitsecs);
        while self.is_running() && Instant::now() < deadline {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }

        if self.is_running() && failure.is_none() {
            warn!(
                job = %self.name,
                signal = %spec.stopsignal,
                "instances still running after grace period; sending stop signal"
            );
            self.signal_live_group(spec.stopsignal.as_signal(), &mut failure);
            if failure.is_none() {
                while self.is_running() {
                    tokio::time::sleep(STOP_POLL_INTERVAL).await;
                }
            }
        }

        *lock(&self.group) = 0;

        match failure {
            Some(e) => {
                error!(job = %self.name, error = %e, "stop incomplete");
                Err(e)
            }
            None => {
                info!(job = %self.name, "stopped");
                Ok(())
            }
        }
    }

    /// Process-group id, if some instance still has a live process in it.
    pub fn live_group(&self) -> Option<i32> {
        let group = lock(&self.group);
        let alive = self.instances.iter().any(|slot| lock(slot).pid.is_some());
        (*group != 0 && alive).then_some(*group)
    }

    fn signal_live_group(&self, signal: Signal, failure: &mut Option<TaskmasterError>) {
        let Some(pgid) = self.live_group() else {
            debug!(job = %self.name, ?signal, "no live process; nothing to signal");
            return;
        };
        info!(job = %self.name, pgid, ?signal, "signalling process group");
        if let Err(e) = signal_group(pgid, signal) {
            warn!(job = %self.name, pgid, ?signal, error = %e, "signal failed");
            if failure.is_none() {
                *failure = Some(e);
            }
        }
    }

    pub async fn restart(self: &Arc<Self>) -> Result<()> {
        self.stop().await?;
        self.start().await
    }

    /// Apply a new spec in place.
    ///
    /// A restart is needed when the command, directory, umask or environment
    /// changed. Log destinations are swapped live whatever that decision is,
    /// and every other field is simply overwritten. When a restart is needed
    /// and the job is running, it is spawned in the background and its handle
    /// returned so the caller can wait for it.
    pub fn reload(self: &Arc<Self>, new: ProgramSpec) -> Option<JoinHandle<Result<()>>> {
        let (restart, stdout_changed, stderr_changed) = {
            let mut cur = lock(&self.spec);
            let restart = needs_restart(&cur, &new);
            let stdout_changed = cur.stdout_logfile != new.stdout_logfile;
            let stderr_changed = cur.stderr_logfile != new.stderr_logfile;
            let numprocs = cur.numprocs;
            *cur = ProgramSpec { numprocs, ..new };
            (restart, stdout_changed, stderr_changed)
        };

        let spec = self.spec();
        if stdout_changed {
            self.retarget_sink(&self.stdout, spec.stdout_logfile.as_deref(), StdStream::Stdout);
        }
        if stderr_changed {
            self.retarget_sink(&self.stderr, spec.stderr_logfile.as_deref(), StdStream::Stderr);
        }

        if restart && self.is_running() {
            info!(job = %self.name, "program changed; restarting");
            let job = Arc::clone(self);
            return Some(self.tracker.spawn(async move { job.restart().await }));
        }

        debug!(job = %self.name, restart, "reloaded without restart");
        None
    }

    fn retarget_sink(&self, sink: &LogSink, path: Option<&std::path::Path>, fallback: StdStream) {
        // Sinks that were never opened pick the new target up on next spawn.
        if sink.target().is_none() {
            return;
        }
        let target = LogTarget::from_config(path, fallback);
        if let Err(e) = sink.retarget(&target) {
            warn!(job = %self.name, ?target, error = %e, "failed to switch log destination");
        } else {
            info!(job = %self.name, ?target, "log destination switched");
        }
    }

    // ---- worker hooks -------------------------------------------------

    /// Enter STARTING unless a stop is in progress.
    pub(crate) fn begin_attempt(&self, id: usize) -> bool {
        self.with_instance(id, |st| {
            if st.state == ProcessState::Stopping {
                return false;
            }
            st.state = ProcessState::Starting;
            true
        })
    }

    /// Spawn the child for instance `id`, joining or creating the group.
    pub(crate) fn spawn_instance(&self, id: usize, spec: &ProgramSpec) -> Result<Child> {
        self.stdout.retarget(&LogTarget::from_config(
            spec.stdout_logfile.as_deref(),
            StdStream::Stdout,
        ))?;
        self.stderr.retarget(&LogTarget::from_config(
            spec.stderr_logfile.as_deref(),
            StdStream::Stderr,
        ))?;

        let (mut child, pid) = {
            let mut group = lock(&self.group);
            if *group != 0 && !self.other_instance_alive(id) {
                debug!(job = %self.name, pgid = *group, "no live member left; starting a new group");
                *group = 0;
            }

            let mut cmd = build_command(spec, *group);
            let child = cmd.spawn().map_err(|source| TaskmasterError::SpawnError {
                command: spec.command.clone(),
                source,
            })?;
            let pid = child.id().unwrap_or(0);
            if *group == 0 {
                *group = pid as i32;
            }
            self.with_instance(id, |st| st.pid = Some(pid));
            (child, pid)
        };

        if let Some(out) = child.stdout.take() {
            self.tracker
                .spawn(pump(self.name.clone(), out, Arc::clone(&self.stdout)));
        }
        if let Some(err) = child.stderr.take() {
            self.tracker
                .spawn(pump(self.name.clone(), err, Arc::clone(&self.stderr)));
        }

        let stopping = self.with_instance(id, |st| {
            if st.state == ProcessState::Stopping {
                return true;
            }
            st.state = ProcessState::Running;
            st.started_at = Some(SystemTime::now());
            false
        });

        if stopping {
            debug!(job = %self.name, instance = id, pid, "spawned during stop; killing");
            let _ = child.start_kill();
        } else {
            info!(job = %self.name, instance = id, pid, pgid = self.pgid(), "process running");
        }

        Ok(child)
    }

    fn other_instance_alive(&self, id: usize) -> bool {
        self.instances
            .iter()
            .enumerate()
            .any(|(i, slot)| i != id && lock(slot).pid.is_some())
    }

    pub(crate) fn record_exit(&self, id: usize, code: i32) {
        self.with_instance(id, |st| {
            st.pid = None;
            st.last_exit = Some(code);
        });
    }

    /// Count one failed attempt. Returns BACKOFF, FATAL once the retry
    /// limit is reached, or STOPPING if a stop pre-empted the retry.
    pub(crate) fn record_backoff(&self, id: usize) -> ProcessState {
        let limit = lock(&self.spec).startretries;
        self.with_instance(id, |st| {
            if st.state == ProcessState::Stopping {
                return st.state;
            }
            st.state = ProcessState::Backoff;
            st.backoffs += 1;
            st.retries += 1;
            if st.retries >= limit {
                st.state = ProcessState::Fatal;
            }
            st.state
        })
    }

    pub(crate) async fn backoff_sleep(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.stop_requested.notified() => {}
        }
    }

    pub(crate) fn mark_exited(&self, id: usize) {
        self.with_instance(id, |st| {
            st.state = ProcessState::Exited;
            st.retries = 0;
        });
    }

    pub(crate) fn finish_worker(&self, id: usize) {
        self.with_instance(id, |st| {
            match st.state {
                ProcessState::Backoff => st.state = ProcessState::Fatal,
                ProcessState::Stopping => st.state = ProcessState::Stopped,
                _ => {}
            }
            st.pid = None;
            st.running = false;
        });
        debug!(job = %self.name, instance = id, state = %self.state(id), "worker finished");
    }
}

/// True when switching from `cur` to `new` requires restarting the job.
pub fn needs_restart(cur: &ProgramSpec, new: &ProgramSpec) -> bool {
    cur.command != new.command
        || cur.directory != new.directory
        || cur.umask != new.umask
        || !same_environment(&cur.environment, &new.environment)
}

/// Compare two environment lists as multisets.
pub fn same_environment(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for entry in a {
        *counts.entry(entry.as_str()).or_default() += 1;
    }
    for entry in b {
        *counts.entry(entry.as_str()).or_default() -= 1;
    }
    counts.values().all(|&c| c == 0)
}
