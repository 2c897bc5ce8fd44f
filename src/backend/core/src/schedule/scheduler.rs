//! Registry of recurring jobs and their runners.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{RunnerState, ScheduleContainer, ScheduledJob, ScheduledJobRunner};

struct ScheduledEntry {
    job: Arc<dyn ScheduledJob>,
    container: ScheduleContainer,
    runners: Vec<Arc<ScheduledJobRunner>>,
}

/// Registered jobs plus the runtime runners are spawned on, set by `start`.
#[derive(Default)]
struct Registry {
    entries: HashMap<String, ScheduledEntry>,
    runtime: Option<Handle>,
}

/// Owns every declared recurring job for the life of the process.
///
/// Declarations sharing a job name are coalesced into one container; each
/// slot of the container gets its own runner once the scheduler starts.
pub struct JobScheduler {
    registry: Mutex<Registry>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Mutex::new(Registry::default()),
            handles: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Register `job` on `schedule`.
    ///
    /// A second registration under the same name appends its slots to the
    /// existing container. After [`start`](Self::start) new slots are spawned
    /// immediately on the runtime `start` ran in, so this may be called from
    /// any thread.
    pub fn schedule(&self, job: Arc<dyn ScheduledJob>, schedule: ScheduleContainer) {
        let name = job.name().to_string();
        let mut registry = self.registry.lock();
        let Registry { entries, runtime } = &mut *registry;

        let entry = entries.entry(name.clone()).or_insert_with(|| ScheduledEntry {
            job: job.clone(),
            container: ScheduleContainer::new(),
            runners: Vec::new(),
        });
        let first_new_slot = entry.container.len();
        entry.container.merge(schedule);

        tracing::info!(
            schedule = %name,
            slots = entry.container.len(),
            "Recurring job registered"
        );

        if let Some(runtime) = runtime {
            let new_descriptors: Vec<_> = entry.container.descriptors()[first_new_slot..].to_vec();
            for (offset, descriptor) in new_descriptors.into_iter().enumerate() {
                let runner = Arc::new(ScheduledJobRunner::new(
                    entry.job.clone(),
                    first_new_slot + offset,
                    descriptor,
                ));
                entry.runners.push(runner.clone());
                self.spawn(runtime, runner);
            }
        }
    }

    /// Spawn one runner per registered slot on the current Tokio runtime.
    ///
    /// Must be called from within a runtime. Calling it again is a no-op.
    pub fn start(&self) {
        let mut registry = self.registry.lock();
        if registry.runtime.is_some() {
            return;
        }
        let runtime = Handle::current();

        let mut total = 0;
        for entry in registry.entries.values_mut() {
            for (slot, descriptor) in entry.container.descriptors().iter().enumerate() {
                let runner = Arc::new(ScheduledJobRunner::new(entry.job.clone(), slot, descriptor.clone()));
                entry.runners.push(runner.clone());
                self.spawn(&runtime, runner);
                total += 1;
            }
        }
        registry.runtime = Some(runtime);

        tracing::info!(jobs = registry.entries.len(), runners = total, "Job scheduler started");
    }

    fn spawn(&self, runtime: &Handle, runner: Arc<ScheduledJobRunner>) {
        let shutdown = self.shutdown.subscribe();
        let handle = runtime.spawn(async move { runner.run(shutdown).await });
        self.handles.lock().push(handle);
    }

    /// Stop re-arming and wait for every runner to finish.
    ///
    /// Firings already in progress run to completion.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Schedule runner panicked");
            }
        }
        tracing::info!("Job scheduler stopped");
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.registry.lock().entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of slots registered under `name`.
    pub fn slot_count(&self, name: &str) -> usize {
        self.registry.lock().entries.get(name).map_or(0, |e| e.container.len())
    }

    /// Current state of every runner for `name`.
    pub fn states(&self, name: &str) -> Vec<RunnerState> {
        self.registry
            .lock()
            .entries
            .get(name)
            .map(|e| e.runners.iter().map(|r| r.state()).collect())
            .unwrap_or_default()
    }

    /// Total firings across all slots of `name`.
    pub fn firings(&self, name: &str) -> u64 {
        self.registry
            .lock()
            .entries
            .get(name)
            .map_or(0, |e| e.runners.iter().map(|r| r.firings()).sum())
    }

    /// The next `count` fire dates for `name`, merged across slots.
    ///
    /// Uses the live runner state when running so interval slots that have
    /// already fired are previewed from their steady cadence.
    pub fn upcoming(&self, name: &str, count: usize) -> Vec<DateTime<Utc>> {
        let now = Utc::now();
        let registry = self.registry.lock();
        let Some(entry) = registry.entries.get(name) else {
            return Vec::new();
        };

        let mut dates: Vec<_> = if entry.runners.is_empty() {
            entry.container.upcoming(now, count).unwrap_or_default()
        } else {
            entry
                .runners
                .iter()
                .flat_map(|r| r.upcoming(now, count))
                .collect()
        };
        dates.sort();
        dates.truncate(count);
        dates
    }
}
