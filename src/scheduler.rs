// Named recurring jobs driven by six-field cron patterns
// (sec min hour day-of-month month day-of-week)

use std::{
    collections::HashMap, future::Future, panic::AssertUnwindSafe, str::FromStr, time::Duration,
};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;

#[derive(Debug, Clone)]
pub struct CronSchedule {
    pattern: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn parse(pattern: &str) -> Result<Self, SchedulerError> {
        let schedule =
            cron::Schedule::from_str(pattern).map_err(|e| SchedulerError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        if schedule.upcoming(Utc).next().is_none() {
            return Err(SchedulerError::NeverFires(pattern.to_string()));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            schedule,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    // First firing strictly after `now`
    pub fn next_after(&self, now: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(now).next()
    }

    /// Next firing after both `now` and the `previous` firing, so a timer that
    /// wakes before the wall clock reaches `previous` cannot fire it twice.
    pub fn next_firing(
        &self,
        now: &DateTime<Utc>,
        previous: Option<&DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        match previous {
            Some(previous) if previous > now => self.next_after(previous),
            _ => self.next_after(now),
        }
    }
}

struct ScheduledJob {
    pattern: String,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new job. Fails if a live job already uses `name`.
    pub fn start<F, Fut>(&self, name: &str, pattern: &str, task: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule = CronSchedule::parse(pattern)?;
        let mut jobs = self.jobs.lock();

        if jobs.get(name).is_some_and(|job| !job.handle.is_finished()) {
            return Err(SchedulerError::JobExists(name.to_string()));
        }

        jobs.insert(name.to_string(), Self::spawn_job(name, schedule, task));
        info!("Scheduled job {} with pattern {:?}", name, pattern);
        Ok(())
    }

    /// Registers a job, stopping any previous job of the same name first.
    /// The pattern is validated before the previous job is touched.
    pub fn replace<F, Fut>(&self, name: &str, pattern: &str, task: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let schedule = CronSchedule::parse(pattern)?;
        let job = Self::spawn_job(name, schedule, task);

        match self.jobs.lock().insert(name.to_string(), job) {
            Some(previous) => {
                previous.handle.abort();
                info!(
                    "Replaced job {} (pattern {:?} -> {:?})",
                    name, previous.pattern, pattern
                );
            }
            None => info!("Scheduled job {} with pattern {:?}", name, pattern),
        }

        Ok(())
    }

    pub fn stop(&self, name: &str) -> bool {
        match self.jobs.lock().remove(name) {
            Some(job) => {
                job.handle.abort();
                info!("Stopped job {}", name);
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        for (name, job) in self.jobs.lock().drain() {
            job.handle.abort();
            info!("Stopped job {}", name);
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.jobs
            .lock()
            .get(name)
            .is_some_and(|job| !job.handle.is_finished())
    }

    pub fn pattern(&self, name: &str) -> Option<String> {
        self.jobs.lock().get(name).map(|job| job.pattern.clone())
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn spawn_job<F, Fut>(name: &str, schedule: CronSchedule, task: F) -> ScheduledJob
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_name = name.to_string();
        let pattern = schedule.pattern().to_string();

        let handle = tokio::spawn(async move {
            let mut previous: Option<DateTime<Utc>> = None;
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_firing(&now, previous.as_ref()) else {
                    warn!("Job {} has no upcoming run, stopping", job_name);
                    break;
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

                debug!(
                    "Next run of job {} at {} (in {:.1}s)",
                    job_name,
                    next.format("%Y-%m-%d %H:%M:%S UTC"),
                    wait.as_secs_f64()
                );

                tokio::time::sleep(wait).await;
                previous = Some(next);

                // a panicking run must not kill the schedule
                if AssertUnwindSafe(task()).catch_unwind().await.is_err() {
                    error!("Run of job {} panicked", job_name);
                }
            }
        });

        ScheduledJob { pattern, handle }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.handle.abort();
        }
    }
}
