// src/manager/coordinator.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigFile, ConfigSource, ProgramSpec, ALL_JOBS};
use crate::errors::{Result, TaskmasterError};
use crate::job::Job;
use crate::manager::action::{Action, ActionError, ActionResult, Command, ManagerHandle};

/// Capacity of the action queue.
const ACTION_QUEUE_LEN: usize = 16;

type JobOutcome = (String, Result<()>);

/// Coordinator actor: owns the job table and applies actions one at a time.
///
/// Generic over the [`ConfigSource`] consulted at boot and on `reload`.
pub struct JobManager<S: ConfigSource> {
    jobs: BTreeMap<String, Arc<Job>>,
    source: S,
    actions: mpsc::Receiver<Action>,
    tracker: TaskTracker,
}

impl<S: ConfigSource> std::fmt::Debug for JobManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<S: ConfigSource> JobManager<S> {
    /// Load configuration and build one stopped job per program.
    ///
    /// Any configuration error is returned; the daemon must not start.
    pub fn init(source: S, tracker: TaskTracker) -> Result<(Self, ManagerHandle)> {
        let config = source.load()?;
        info!(source = %source.describe(), programs = config.program.len(), "configuration loaded");

        let jobs = build_jobs(config, &tracker);
        let (tx, rx) = mpsc::channel(ACTION_QUEUE_LEN);

        Ok((
            Self {
                jobs,
                source,
                actions: rx,
                tracker,
            },
            ManagerHandle::new(tx),
        ))
    }

    /// Look up a job. Mostly useful before `run` takes ownership.
    pub fn job(&self, name: &str) -> Option<Arc<Job>> {
        self.jobs.get(name).cloned()
    }

    pub fn job_names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Main loop.
    ///
    /// - Starts every `autostart` job, one after another.
    /// - Then consumes actions until `quit` (or until every handle is gone).
    pub async fn run(mut self) -> Result<()> {
        info!("job manager started");
        self.autostart().await;

        while let Some(action) = self.actions.recv().await {
            debug!(command = %action.command, args = ?action.args, "action received");

            match action.command.clone() {
                Command::Quit if action.args.is_empty() => {
                    self.quit(action).await;
                    return Ok(());
                }
                Command::Quit => {
                    action.respond(Err(ActionError::NoArgsExpected("quit".to_string())));
                }
                Command::Reload => {
                    let result = self.reload(&action.args).await;
                    action.respond(result);
                }
                command @ (Command::Start | Command::Stop | Command::Restart) => {
                    let result = self.apply(&command, &action.args).await;
                    action.respond(result);
                }
                Command::Status => {
                    let result = self.status(&action.args);
                    action.respond(result);
                }
                Command::Unknown(verb) => {
                    warn!(%verb, "unknown command");
                    action.respond(Err(ActionError::UnknownCommand(verb)));
                }
            }
        }

        info!("action queue closed; stopping all jobs");
        self.stop_all().await;
        Ok(())
    }

    async fn autostart(&self) {
        for job in self.jobs.values() {
            if !job.spec().autostart {
                continue;
            }
            info!(job = %job.name(), "autostarting");
            if let Err(e) = job.start().await {
                error!(job = %job.name(), error = %e, "autostart failed");
            }
        }
    }

    async fn quit(&mut self, action: Action) {
        info!("quit requested");
        self.stop_all().await;

        self.actions.close();
        while let Ok(pending) = self.actions.try_recv() {
            pending.respond(Err(ActionError::ShuttingDown));
        }

        action.respond(Ok("stopped all jobs".to_string()));
        info!("job manager finished");
    }

    /// Stop every job, one at a time.
    async fn stop_all(&self) {
        for job in self.jobs.values() {
            info!(job = %job.name(), "stopping");
            if let Err(e) = job.stop().await {
                error!(job = %job.name(), error = %e, "stop failed");
            }
        }
    }

    /// Resolve the single target argument into jobs.
    fn resolve(&self, args: &[String]) -> std::result::Result<Vec<Arc<Job>>, ActionError> {
        let [target] = args else {
            return Err(ActionError::WrongArgCount);
        };
        if target == ALL_JOBS {
            return Ok(self.jobs.values().cloned().collect());
        }
        self.jobs
            .get(target)
            .cloned()
            .map(|job| vec![job])
            .ok_or_else(|| ActionError::UnknownJob(target.clone()))
    }

    /// Run start/stop/restart on every target concurrently and wait for all.
    async fn apply(&self, command: &Command, args: &[String]) -> ActionResult {
        let targets = self.resolve(args)?;

        let mut tasks = JoinSet::new();
        for job in targets {
            let command = command.clone();
            info!(job = %job.name(), %command, "dispatching");
            tasks.spawn(async move {
                let result = match command {
                    Command::Start => job.start().await,
                    Command::Stop => job.stop().await,
                    Command::Restart => job.restart().await,
                    _ => Ok(()),
                };
                (job.name().to_string(), result)
            });
        }

        let (done, failures) = collect(tasks, command.past_tense()).await;
        if failures.is_empty() {
            Ok(done.join("\n"))
        } else {
            Err(ActionError::Job(failures.join("\n")))
        }
    }

    fn status(&self, args: &[String]) -> ActionResult {
        let targets = self.resolve(args)?;
        Ok(targets
            .iter()
            .map(|job| job.status_lines())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Re-read configuration and reconcile the job table with it.
    ///
    /// - Jobs gone from the config are stopped and removed.
    /// - Existing jobs get `Job::reload`; a changed `numprocs` replaces the
    ///   job instead.
    /// - New jobs are created and started.
    ///
    /// Everything runs concurrently and is awaited before replying. A config
    /// that fails to load leaves the table untouched.
    async fn reload(&mut self, args: &[String]) -> ActionResult {
        if !args.is_empty() {
            return Err(ActionError::NoArgsExpected("reload".to_string()));
        }

        warn!(source = %self.source.describe(), "reloading configuration");
        let config = self.source.load().map_err(|e| {
            error!(error = %e, "reload aborted; keeping current configuration");
            ActionError::Config(e.to_string())
        })?;

        let mut tasks: JoinSet<JobOutcome> = JoinSet::new();

        let removed: Vec<String> = self
            .jobs
            .keys()
            .filter(|name| !config.program.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            if let Some(job) = self.jobs.remove(&name) {
                info!(job = %name, "removed from configuration; stopping");
                tasks.spawn(async move { (name, job.stop().await) });
            }
        }

        for (name, spec) in config.program {
            match self.jobs.get(&name).cloned() {
                Some(job) if job.numprocs() == spec.numprocs => {
                    tasks.spawn(async move {
                        let result = match job.reload(spec) {
                            Some(restart) => restart
                                .await
                                .unwrap_or_else(|e| Err(TaskmasterError::Other(e.into()))),
                            None => Ok(()),
                        };
                        (name, result)
                    });
                }
                Some(old) => {
                    info!(
                        job = %name,
                        from = old.numprocs(),
                        to = spec.numprocs,
                        "numprocs changed; replacing job"
                    );
                    let job = self.insert_job(&name, spec);
                    tasks.spawn(async move {
                        let result = match old.stop().await {
                            Ok(()) => job.start().await,
                            Err(e) => Err(e),
                        };
                        (name, result)
                    });
                }
                None => {
                    info!(job = %name, "new program; starting");
                    let job = self.insert_job(&name, spec);
                    tasks.spawn(async move { (name, job.start().await) });
                }
            }
        }

        let (_, failures) = collect(tasks, Command::Reload.past_tense()).await;
        if failures.is_empty() {
            Ok("configuration reloaded".to_string())
        } else {
            Err(ActionError::Job(failures.join("\n")))
        }
    }

    fn insert_job(&mut self, name: &str, spec: ProgramSpec) -> Arc<Job> {
        let job = Job::new(name, spec, self.tracker.clone());
        self.jobs.insert(name.to_string(), Arc::clone(&job));
        job
    }
}

fn build_jobs(config: ConfigFile, tracker: &TaskTracker) -> BTreeMap<String, Arc<Job>> {
    config
        .program
        .into_iter()
        .map(|(name, spec)| {
            let job = Job::new(name.clone(), spec, tracker.clone());
            (name, job)
        })
        .collect()
}

/// Wait for every per-job task. Returns sorted success and failure lines.
async fn collect(mut tasks: JoinSet<JobOutcome>, verb: &str) -> (Vec<String>, Vec<String>) {
    let mut done = Vec::new();
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(()))) => done.push(format!("{name}: {verb}")),
            Ok((name, Err(e))) => {
                error!(job = %name, error = %e, "job operation failed");
                failures.push(format!("{name}: {e}"));
            }
            Err(e) => {
                error!(error = %e, "job task panicked");
                failures.push(format!("internal error: {e}"));
            }
        }
    }

    done.sort();
    failures.sort();
    (done, failures)
}
