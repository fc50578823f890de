// src/scheduler.rs
//! Named background jobs with independent schedules. The one hard
//! concurrency invariant lives here: a job's `is_running` flag must be
//! false right before its body starts and true for the whole execution,
//! and a tick that observes a running job skips with no side effects.
//! Body failures are caught at this boundary and recorded, never
//! propagated; a failing job cannot crash the process or block other jobs.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Counts a completed job run reports back to the operator.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed_sources: usize,
    pub deleted: usize,
}

impl RunSummary {
    pub fn merge(&mut self, other: &RunSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed_sources += other.failed_sources;
        self.deleted += other.deleted;
    }
}

pub type JobResult = anyhow::Result<RunSummary>;
type JobFuture = Pin<Box<dyn Future<Output = JobResult> + Send>>;
type JobBody = Arc<dyn Fn() -> JobFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Fixed interval, anchored at process start.
    Every { hours: u64 },
    /// Once a day at a fixed UTC hour.
    DailyAt { hour: u8 },
}

impl Schedule {
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Every { hours } => now + ChronoDuration::hours(*hours as i64),
            Schedule::DailyAt { hour } => {
                // Config load rejects hours past 23; clamp so a hand-built
                // schedule can never panic here either.
                let today = now
                    .date_naive()
                    .and_hms_opt(u32::from(*hour).min(23), 0, 0)
                    .expect("hour below 24")
                    .and_utc();
                if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                }
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Schedule::Every { hours } => format!("every {hours}h"),
            Schedule::DailyAt { hour } => format!("daily at {hour:02}:00 UTC"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub description: String,
    pub schedule: String,
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_summary: Option<RunSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The guard was held by an in-flight run; nothing happened.
    AlreadyRunning,
    Completed { summary: RunSummary },
    Failed { error: String },
    UnknownJob,
}

#[derive(Debug)]
struct JobState {
    is_running: bool,
    last_run_at: Option<DateTime<Utc>>,
    next_run_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_summary: Option<RunSummary>,
}

struct Job {
    id: String,
    description: String,
    schedule: Schedule,
    state: Mutex<JobState>,
    body: JobBody,
}

/// Releases the run guard and recomputes `next_run_at` even if the body
/// panics; the flag representation is a mutex-guarded state struct, the
/// contract is "skip if already running".
struct RunGuard {
    job: Arc<Job>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut st = self.job.state.lock().expect("job state lock poisoned");
        st.is_running = false;
        st.next_run_at = Some(self.job.schedule.next_after(Utc::now()));
    }
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, Arc<Job>>>,
    /// Registration order, used by the "all" sentinel and status listing.
    order: Mutex<Vec<String>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&self, job_id: &str, description: &str, schedule: Schedule, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        let job = Arc::new(Job {
            id: job_id.to_string(),
            description: description.to_string(),
            schedule,
            state: Mutex::new(JobState {
                is_running: false,
                last_run_at: None,
                next_run_at: Some(schedule.next_after(Utc::now())),
                last_error: None,
                last_summary: None,
            }),
            body: Arc::new(move || Box::pin(body()) as JobFuture),
        });
        self.jobs
            .lock()
            .expect("scheduler lock poisoned")
            .insert(job_id.to_string(), job);
        self.order
            .lock()
            .expect("scheduler lock poisoned")
            .push(job_id.to_string());
        info!(job = job_id, schedule = %schedule.describe(), "job registered");
    }

    fn job(&self, job_id: &str) -> Option<Arc<Job>> {
        self.jobs
            .lock()
            .expect("scheduler lock poisoned")
            .get(job_id)
            .cloned()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.order.lock().expect("scheduler lock poisoned").clone()
    }

    /// One guarded execution of a job, shared by timer ticks and manual
    /// triggers. Skips without side effects when a run is in flight.
    pub async fn tick(&self, job_id: &str) -> TickOutcome {
        let Some(job) = self.job(job_id) else {
            warn!(job = job_id, "tick for unknown job");
            return TickOutcome::UnknownJob;
        };

        {
            let mut st = job.state.lock().expect("job state lock poisoned");
            if st.is_running {
                info!(job = job_id, "already running, skipping tick");
                return TickOutcome::AlreadyRunning;
            }
            st.is_running = true;
            st.last_run_at = Some(Utc::now());
        }
        let guard = RunGuard { job: job.clone() };

        let started = std::time::Instant::now();
        let result = (job.body)().await;
        let elapsed_ms = started.elapsed().as_millis();
        drop(guard);

        counter!("pipeline_job_runs_total", "job" => job.id.clone()).increment(1);
        gauge!("pipeline_job_last_run_ts", "job" => job.id.clone())
            .set(Utc::now().timestamp() as f64);

        let mut st = job.state.lock().expect("job state lock poisoned");
        match result {
            Ok(summary) => {
                info!(job = job_id, ?summary, elapsed_ms, "job completed");
                st.last_summary = Some(summary);
                st.last_error = None;
                TickOutcome::Completed { summary }
            }
            Err(e) => {
                error!(job = job_id, error = ?e, elapsed_ms, "job failed");
                let msg = format!("{e:#}");
                st.last_error = Some(msg.clone());
                TickOutcome::Failed { error: msg }
            }
        }
    }

    /// Operator entry point: run one job by id, or every registered job in
    /// registration order for the "all" sentinel. Reuses the guarded path,
    /// so manual and scheduled runs share the overlap-prevention invariant.
    pub async fn run_manually(&self, task: &str) -> Vec<(String, TickOutcome)> {
        let ids = if task == "all" {
            self.job_ids()
        } else {
            vec![task.to_string()]
        };
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = self.tick(&id).await;
            results.push((id, outcome));
        }
        results
    }

    pub fn status(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.lock().expect("scheduler lock poisoned");
        self.job_ids()
            .iter()
            .filter_map(|id| jobs.get(id))
            .map(|job| {
                let st = job.state.lock().expect("job state lock poisoned");
                JobStatus {
                    job_id: job.id.clone(),
                    description: job.description.clone(),
                    schedule: job.schedule.describe(),
                    is_running: st.is_running,
                    last_run_at: st.last_run_at,
                    next_run_at: st.next_run_at,
                    last_error: st.last_error.clone(),
                    last_summary: st.last_summary,
                }
            })
            .collect()
    }

    /// Spawn one ticker task per registered job. Cadences are independent;
    /// different jobs may overlap in wall-clock time, only same-job overlap
    /// is prevented (by `tick` itself).
    pub fn spawn_all(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        self.job_ids()
            .into_iter()
            .map(|id| {
                let sched = self.clone();
                tokio::spawn(async move {
                    loop {
                        let Some(next) = sched
                            .job(&id)
                            .and_then(|j| j.state.lock().expect("job state lock poisoned").next_run_at)
                        else {
                            return;
                        };
                        let wait = (next - Utc::now())
                            .to_std()
                            .unwrap_or(std::time::Duration::ZERO);
                        tokio::time::sleep(wait).await;
                        sched.tick(&id).await;
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Timelike;

    #[test]
    fn out_of_range_daily_hour_is_clamped_not_panicking() {
        let now = Utc::now();
        let next = Schedule::DailyAt { hour: 24 }.next_after(now);
        assert!(next > now);
        assert_eq!(next.hour(), 23);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn daily_schedule_rolls_to_tomorrow() {
        let now = Utc::now();
        let sched = Schedule::DailyAt {
            hour: now.hour() as u8,
        };
        let next = sched.next_after(now);
        assert!(next > now);
        assert_eq!(next.hour(), now.hour());
        assert_eq!(next.minute(), 0);
    }

    #[tokio::test]
    async fn failure_is_caught_and_recorded() {
        let scheduler = Scheduler::new();
        scheduler.register("broken", "always fails", Schedule::Every { hours: 1 }, || async {
            Err(anyhow!("upstream exploded"))
        });

        let outcome = scheduler.tick("broken").await;
        assert!(matches!(outcome, TickOutcome::Failed { .. }));

        let status = &scheduler.status()[0];
        assert!(!status.is_running);
        assert!(status.last_error.as_deref().unwrap().contains("upstream exploded"));

        // next tick is not blocked by the failure
        let again = scheduler.tick("broken").await;
        assert!(matches!(again, TickOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn unknown_job_is_reported_not_panicked() {
        let scheduler = Scheduler::new();
        assert_eq!(scheduler.tick("nope").await, TickOutcome::UnknownJob);
    }

    #[tokio::test]
    async fn manual_all_runs_jobs_in_registration_order() {
        let scheduler = Scheduler::new();
        scheduler.register("first", "", Schedule::Every { hours: 1 }, || async {
            Ok(RunSummary { inserted: 1, ..Default::default() })
        });
        scheduler.register("second", "", Schedule::Every { hours: 1 }, || async {
            Ok(RunSummary { inserted: 2, ..Default::default() })
        });

        let results = scheduler.run_manually("all").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "first");
        assert_eq!(results[1].0, "second");
        assert!(matches!(
            &results[1].1,
            TickOutcome::Completed { summary } if summary.inserted == 2
        ));
    }
}
