use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::translate::GenerationOptions;
use super::job::{progress_percent, Job, JobId, JobStatus};

/// What a worker needs from the record to run an admitted job
#[derive(Debug, Clone)]
pub struct JobParams {
    pub source_lang: String,
    pub target_lang: String,
    pub generate: GenerationOptions,
}

/// Outcome of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// Already finished; the status is left alone
    Finished(JobStatus),
    NotFound,
}

/// Shared job table.
///
/// Every state change goes through one of the methods below, each of which
/// holds the record's entry lock for the whole check-and-write, so a worker
/// and a cancelling caller never interleave on the same job.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    /// Snapshot of the job
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.get(id).map(|e| e.value().clone())
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.get(id).map(|e| e.value().status)
    }

    pub fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|e| e.value().status == status).count()
    }

    /// `queued -> running`. Returns `None` if the job was cancelled or
    /// purged while it waited.
    pub fn admit(&self, id: &JobId) -> Option<JobParams> {
        let mut job = self.jobs.get_mut(id)?;
        if job.status != JobStatus::Queued {
            return None;
        }
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        Some(JobParams {
            source_lang: job.source_lang.clone(),
            target_lang: job.target_lang.clone(),
            generate: job.generate.clone(),
        })
    }

    pub fn set_total_units(&self, id: &JobId, total: usize) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.status == JobStatus::Running {
                job.total_units = Some(total);
            }
        }
    }

    /// Record finished chunks; progress never moves backwards
    pub fn record_progress(&self, id: &JobId, completed: usize, total: usize) {
        if let Some(mut job) = self.jobs.get_mut(id) {
            if job.status == JobStatus::Running {
                job.progress = job.progress.max(progress_percent(completed, total));
            }
        }
    }

    /// True when the worker should stop: cancelled, or gone from the store
    pub fn should_stop(&self, id: &JobId) -> bool {
        !matches!(self.status(id), Some(JobStatus::Running))
    }

    /// `running -> done`. Returns false if the job left `running` first.
    pub fn complete(&self, id: &JobId, result: String, ttl: Option<Duration>) -> bool {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return false;
        };
        if job.status != JobStatus::Running {
            return false;
        }
        job.status = JobStatus::Done;
        job.progress = 100;
        job.result = Some(result);
        job.finished_at = Some(Utc::now());
        job.expires_at = ttl.map(|ttl| Instant::now() + ttl);
        true
    }

    /// `running -> error`. Returns false if the job left `running` first.
    pub fn fail(&self, id: &JobId, error: String, ttl: Option<Duration>) -> bool {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return false;
        };
        if job.status != JobStatus::Running {
            return false;
        }
        job.status = JobStatus::Error;
        job.error = Some(error);
        job.finished_at = Some(Utc::now());
        job.expires_at = ttl.map(|ttl| Instant::now() + ttl);
        true
    }

    /// Mark a queued or running job cancelled and schedule its purge
    pub fn cancel(&self, id: &JobId, grace: Duration) -> CancelOutcome {
        let Some(mut job) = self.jobs.get_mut(id) else {
            return CancelOutcome::NotFound;
        };
        let status = job.status;
        match status {
            JobStatus::Queued | JobStatus::Running => {
                job.status = JobStatus::Cancelled;
                job.result = None;
                job.finished_at = Some(Utc::now());
                job.expires_at = Some(Instant::now() + grace);
                CancelOutcome::Cancelled
            }
            JobStatus::Cancelled => CancelOutcome::Cancelled,
            finished => CancelOutcome::Finished(finished),
        }
    }

    /// Drop every job whose expiry is at or before `now`
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|id, job| match job.expires_at {
            Some(expires_at) if expires_at <= now => {
                debug!(job_id = %id, status = %job.status, "Purging expired job");
                false
            }
            _ => true,
        });
        before.saturating_sub(self.jobs.len())
    }

    /// Purge expired jobs every `every` until the returned task is aborted
    pub fn start_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut timer = interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                let purged = store.sweep_expired(Instant::now());
                if purged > 0 {
                    info!(purged, remaining = store.len(), "Swept expired jobs");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(store: &JobStore) -> JobId {
        let job = Job::new("en", "zh", GenerationOptions::new());
        let id = job.id.clone();
        store.insert(job);
        id
    }

    #[test]
    fn admit_only_once() {
        let store = JobStore::new();
        let id = queued(&store);
        assert!(store.admit(&id).is_some());
        assert_eq!(store.status(&id), Some(JobStatus::Running));
        assert!(store.admit(&id).is_none());
    }

    #[test]
    fn cancelled_while_queued_is_never_admitted() {
        let store = JobStore::new();
        let id = queued(&store);
        assert_eq!(store.cancel(&id, Duration::from_secs(30)), CancelOutcome::Cancelled);
        assert!(store.admit(&id).is_none());
        assert_eq!(store.status(&id), Some(JobStatus::Cancelled));
        assert!(store.get(&id).unwrap().started_at.is_none());
    }

    #[test]
    fn progress_is_monotonic_and_finishes_at_100() {
        let store = JobStore::new();
        let id = queued(&store);
        store.admit(&id);
        store.set_total_units(&id, 3);
        store.record_progress(&id, 2, 3);
        store.record_progress(&id, 1, 3);
        assert_eq!(store.get(&id).unwrap().progress, 66);

        assert!(store.complete(&id, "done".into(), None));
        let job = store.get(&id).unwrap();
        assert_eq!(job.progress, 100);
        assert_eq!(job.result.as_deref(), Some("done"));
        assert_eq!(job.total_units, Some(3));
    }

    #[test]
    fn late_worker_writes_do_not_override_cancel() {
        let store = JobStore::new();
        let id = queued(&store);
        store.admit(&id);
        store.record_progress(&id, 1, 4);
        store.cancel(&id, Duration::from_secs(30));

        store.record_progress(&id, 4, 4);
        assert!(!store.complete(&id, "late".into(), None));
        assert!(!store.fail(&id, "late".into(), None));

        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.progress, 25);
        assert!(job.result.is_none() && job.error.is_none());
        assert!(store.should_stop(&id));
    }

    #[test]
    fn cancel_leaves_finished_jobs_alone() {
        let store = JobStore::new();
        let id = queued(&store);
        store.admit(&id);
        store.fail(&id, "boom".into(), None);
        assert_eq!(
            store.cancel(&id, Duration::from_secs(30)),
            CancelOutcome::Finished(JobStatus::Error)
        );
        assert_eq!(store.get(&id).unwrap().error.as_deref(), Some("boom"));
        assert_eq!(store.cancel(&JobId::from("missing"), Duration::ZERO), CancelOutcome::NotFound);
    }

    #[test]
    fn cancelled_jobs_are_purged_after_grace() {
        let store = JobStore::new();
        let cancelled = queued(&store);
        let kept = queued(&store);
        store.cancel(&cancelled, Duration::from_secs(30));

        let now = Instant::now();
        assert_eq!(store.sweep_expired(now), 0);
        assert!(store.get(&cancelled).is_some());

        assert_eq!(store.sweep_expired(now + Duration::from_secs(31)), 1);
        assert!(store.get(&cancelled).is_none());
        assert!(store.get(&kept).is_some());
    }

    #[test]
    fn finished_ttl_expires_done_jobs() {
        let store = JobStore::new();
        let id = queued(&store);
        store.admit(&id);
        store.complete(&id, "ok".into(), Some(Duration::from_secs(60)));
        assert_eq!(store.sweep_expired(Instant::now() + Duration::from_secs(61)), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_cancelled_job_after_grace() {
        let store = JobStore::new();
        let cancelled = queued(&store);
        let kept = queued(&store);
        store.cancel(&cancelled, Duration::from_secs(30));

        let sweeper = store.start_sweeper(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(store.status(&cancelled), Some(JobStatus::Cancelled));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(store.get(&cancelled).is_none());
        assert_eq!(store.status(&kept), Some(JobStatus::Queued));

        sweeper.abort();
    }
}
