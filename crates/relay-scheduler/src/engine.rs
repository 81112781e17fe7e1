use std::{
    any::Any,
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Duration,
};

use futures_util::FutureExt;

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, SchedulerError},
    task::{JobContext, Task},
    types::{JobInfo, JobState},
};

type Registry = Arc<RwLock<HashMap<String, JobEntry>>>;

struct JobEntry {
    interval: Duration,
    task: Arc<dyn Task>,
    state: JobState,
    /// Identifies the loop that currently owns this entry. Bumped on every
    /// Idle → Running transition.
    generation: u64,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl JobEntry {
    fn info(&self, name: &str) -> JobInfo {
        JobInfo {
            name: name.to_string(),
            interval_ms: u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            running: self.state == JobState::Running,
        }
    }
}

/// In-memory registry of named periodic jobs.
///
/// Control operations take the registry lock only for short synchronous
/// sections; the lock is never held across an `.await`. Starting a job spawns
/// a Tokio task, so those operations must run inside a Tokio runtime.
pub struct Scheduler {
    jobs: Registry,
    generations: AtomicU64,
    /// Loops of removed jobs that may still be finishing an invocation.
    /// Drained by `stop`.
    retired: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            generations: AtomicU64::new(0),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Register an Idle job. Does not start it.
    pub fn add_job(
        &self,
        name: impl Into<String>,
        interval: Duration,
        task: impl Task + 'static,
    ) -> Result<()> {
        let name = name.into();
        if interval < Duration::from_millis(1) {
            return Err(SchedulerError::InvalidInterval {
                name,
                interval_ms: interval.as_millis(),
            });
        }

        let mut jobs = self.write();
        if jobs.contains_key(&name) {
            return Err(SchedulerError::AlreadyExists { name });
        }
        info!(job = %name, interval_ms = interval.as_millis() as u64, "job added");
        jobs.insert(
            name,
            JobEntry {
                interval,
                task: Arc::new(task),
                state: JobState::Idle,
                generation: 0,
                cancel: None,
                handle: None,
            },
        );
        Ok(())
    }

    /// Start every Idle job. Returns how many were started.
    pub fn start(&self) -> usize {
        let mut jobs = self.write();
        let mut started = 0;
        for (name, entry) in jobs.iter_mut() {
            if entry.state == JobState::Idle {
                self.launch(name, entry);
                started += 1;
            }
        }
        info!(started, total = jobs.len(), "scheduler started");
        started
    }

    pub fn start_job(&self, name: &str) -> Result<()> {
        let mut jobs = self.write();
        let entry = jobs.get_mut(name).ok_or_else(|| not_found(name))?;
        if entry.state == JobState::Running {
            return Err(SchedulerError::AlreadyRunning {
                name: name.to_string(),
            });
        }
        self.launch(name, entry);
        Ok(())
    }

    /// Signal the job's loop to exit and return without waiting for it.
    ///
    /// The job reports Running until its loop has actually exited.
    pub fn stop_job(&self, name: &str) -> Result<()> {
        let jobs = self.read();
        let entry = jobs.get(name).ok_or_else(|| not_found(name))?;
        if entry.state != JobState::Running {
            return Err(SchedulerError::NotRunning {
                name: name.to_string(),
            });
        }
        if let Some(token) = &entry.cancel {
            token.cancel();
        }
        info!(job = %name, "stop signal sent");
        Ok(())
    }

    /// Stop the job if it is running, wait for its loop to exit, then start
    /// it again with a fresh cancellation token.
    pub async fn restart_job(&self, name: &str) -> Result<()> {
        let previous = {
            let mut jobs = self.write();
            let entry = jobs.get_mut(name).ok_or_else(|| not_found(name))?;
            if let Some(token) = &entry.cancel {
                token.cancel();
            }
            entry.handle.take().map(|h| (entry.generation, h))
        };

        if let Some((generation, handle)) = previous {
            join_loop(name, handle).await;
            mark_idle(&self.jobs, name, generation);
        }

        let mut jobs = self.write();
        let entry = jobs.get_mut(name).ok_or_else(|| not_found(name))?;
        if entry.state == JobState::Running {
            // Someone else started it while we were waiting.
            return Err(SchedulerError::AlreadyRunning {
                name: name.to_string(),
            });
        }
        self.launch(name, entry);
        info!(job = %name, "job restarted");
        Ok(())
    }

    /// Unregister a job, cancelling its loop if it runs. Does not wait, but
    /// a later `stop` still waits for that loop to exit.
    pub fn remove_job(&self, name: &str) -> Result<()> {
        let entry = self.write().remove(name).ok_or_else(|| not_found(name))?;
        if let Some(token) = entry.cancel {
            token.cancel();
        }
        if let Some(handle) = entry.handle {
            let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
            retired.retain(|(_, h)| !h.is_finished());
            retired.push((name.to_string(), handle));
        }
        info!(job = %name, "job removed");
        Ok(())
    }

    pub fn is_job_running(&self, name: &str) -> Result<bool> {
        let jobs = self.read();
        let entry = jobs.get(name).ok_or_else(|| not_found(name))?;
        Ok(entry.state == JobState::Running)
    }

    pub fn job_info(&self, name: &str) -> Result<JobInfo> {
        let jobs = self.read();
        let entry = jobs.get(name).ok_or_else(|| not_found(name))?;
        Ok(entry.info(name))
    }

    /// All registered jobs, sorted by name.
    pub fn list_jobs(&self) -> Vec<JobInfo> {
        let mut infos: Vec<JobInfo> = self
            .read()
            .iter()
            .map(|(name, entry)| entry.info(name))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Cancel every running job and wait until all of their loops have
    /// exited, including loops of jobs removed while running. Jobs stay
    /// registered and can be started again.
    pub async fn stop(&self) {
        let running: Vec<(String, u64, JoinHandle<()>)> = {
            let mut jobs = self.write();
            jobs.iter_mut()
                .filter_map(|(name, entry)| {
                    if let Some(token) = &entry.cancel {
                        token.cancel();
                    }
                    entry
                        .handle
                        .take()
                        .map(|h| (name.clone(), entry.generation, h))
                })
                .collect()
        };

        let retired = std::mem::take(
            &mut *self.retired.lock().unwrap_or_else(PoisonError::into_inner),
        );

        info!(jobs = running.len(), removed = retired.len(), "stopping scheduler");
        for (name, generation, handle) in running {
            join_loop(&name, handle).await;
            mark_idle(&self.jobs, &name, generation);
        }
        for (name, handle) in retired {
            join_loop(&name, handle).await;
        }
        info!("scheduler stopped");
    }

    // --- private helpers ---------------------------------------------------

    /// Idle → Running. Caller holds the write lock.
    fn launch(&self, name: &str, entry: &mut JobEntry) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();
        let ctx = JobContext {
            job_name: name.to_string(),
            cancellation_token: token.clone(),
        };

        entry.state = JobState::Running;
        entry.generation = generation;
        entry.cancel = Some(token);
        entry.handle = Some(tokio::spawn(run_loop(
            Arc::clone(&self.jobs),
            ctx,
            entry.interval,
            Arc::clone(&entry.task),
            generation,
        )));
        info!(job = %name, generation, "job started");
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(name: &str) -> SchedulerError {
    SchedulerError::NotFound {
        name: name.to_string(),
    }
}

/// Ticks until cancelled. The first tick fires one interval after start.
async fn run_loop(
    jobs: Registry,
    ctx: JobContext,
    period: Duration,
    task: Arc<dyn Task>,
    generation: u64,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancellation_token.cancelled() => break,
            _ = ticker.tick() => {
                debug!(job = %ctx.job_name, "executing job");
                // A panicking invocation counts as a failed one; the loop
                // keeps ticking and still marks the job Idle on exit.
                match AssertUnwindSafe(task.run(&ctx)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(job = %ctx.job_name, "job run failed: {e:#}"),
                    Err(panic) => error!(
                        job = %ctx.job_name,
                        "job run panicked: {}",
                        panic_message(panic.as_ref())
                    ),
                }
            }
        }
    }

    mark_idle(&jobs, &ctx.job_name, generation);
    info!(job = %ctx.job_name, "job loop exited");
}

/// Running → Idle, unless a newer loop has taken the entry over.
fn mark_idle(jobs: &Registry, name: &str, generation: u64) {
    let mut jobs = jobs.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = jobs.get_mut(name) {
        if entry.generation == generation && entry.state == JobState::Running {
            entry.state = JobState::Idle;
            entry.cancel = None;
            entry.handle = None;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn join_loop(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(job = %name, "job loop ended abnormally: {e}");
    }
}
