use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::translate::{GenerationOptions, TranslatorInterface};
use super::job::{Job, JobId, JobStatus};
use super::pipeline::translate_with_progress;
use super::store::{CancelOutcome, JobStore};

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_concurrent: usize,
    pub max_chunk_chars: usize,
    pub cancel_grace: Duration,
    pub finished_ttl: Option<Duration>,
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            max_chunk_chars: config.max_chunk_chars,
            cancel_grace: config.cancel_grace(),
            finished_ttl: config.finished_ttl(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is shut down")]
    Closed,
}

/// Waiting work; the text rides in the message, not in the job record
struct QueuedJob {
    id: JobId,
    text: String,
}

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<QueuedJob>>>;

/// Bounded-concurrency translation queue.
///
/// `max_concurrent` workers pull from one FIFO channel, so at most that many
/// jobs are ever `running`, and a worker that finishes a job takes the next
/// one straight away.
pub struct JobQueue {
    store: JobStore,
    sender: mpsc::UnboundedSender<QueuedJob>,
    settings: QueueSettings,
    workers: Vec<JoinHandle<()>>,
}

impl JobQueue {
    pub fn start(
        settings: QueueSettings,
        store: JobStore,
        translator: Arc<dyn TranslatorInterface>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));

        let workers = (0..settings.max_concurrent)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    receiver.clone(),
                    store.clone(),
                    translator.clone(),
                    settings.clone(),
                ))
            })
            .collect();

        info!(workers = settings.max_concurrent, "Started job queue");

        Self {
            store,
            sender,
            settings,
            workers,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Record a new `queued` job and hand it to the workers. Never waits on
    /// translation work.
    pub fn submit(
        &self,
        text: String,
        source_lang: &str,
        target_lang: &str,
        generate: GenerationOptions,
    ) -> Result<JobId, QueueError> {
        let job = Job::new(source_lang, target_lang, generate);
        let id = job.id.clone();
        self.store.insert(job);

        if self.sender.send(QueuedJob { id: id.clone(), text }).is_err() {
            self.store.remove(&id);
            return Err(QueueError::Closed);
        }

        info!(job_id = %id, source = %source_lang, target = %target_lang, "Job queued");
        Ok(id)
    }

    pub fn cancel(&self, id: &JobId) -> CancelOutcome {
        let outcome = self.store.cancel(id, self.settings.cancel_grace);
        match outcome {
            CancelOutcome::Cancelled => info!(job_id = %id, "Job cancelled"),
            CancelOutcome::Finished(status) => {
                debug!(job_id = %id, %status, "Cancel ignored for finished job")
            }
            CancelOutcome::NotFound => debug!(job_id = %id, "Cancel for unknown job"),
        }
        outcome
    }

    pub fn queued_count(&self) -> usize {
        self.store.count_with_status(JobStatus::Queued)
    }

    pub fn running_count(&self) -> usize {
        self.store.count_with_status(JobStatus::Running)
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn worker_loop(
    worker: usize,
    receiver: SharedReceiver,
    store: JobStore,
    translator: Arc<dyn TranslatorInterface>,
    settings: QueueSettings,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(queued) = next else {
            debug!(worker, "Job channel closed, worker exiting");
            break;
        };
        run_job(worker, queued, &store, &translator, &settings).await;
    }
}

async fn run_job(
    worker: usize,
    queued: QueuedJob,
    store: &JobStore,
    translator: &Arc<dyn TranslatorInterface>,
    settings: &QueueSettings,
) {
    let QueuedJob { id, text } = queued;

    let Some(params) = store.admit(&id) else {
        info!(job_id = %id, "Skipping job cancelled before it started");
        return;
    };
    info!(job_id = %id, worker, "Job running");

    // Own task so a panicking translator only takes this job down
    let task = tokio::spawn({
        let store = store.clone();
        let translator = translator.clone();
        let id = id.clone();
        let max_chunk_chars = settings.max_chunk_chars;
        async move {
            translate_with_progress(&store, translator.as_ref(), &id, &text, &params, max_chunk_chars)
                .await
        }
    });

    let failure = match task.await {
        Ok(Ok(Some(result))) => {
            if store.complete(&id, result, settings.finished_ttl) {
                info!(job_id = %id, "Job done");
            } else {
                debug!(job_id = %id, "Job left running before its result was stored");
            }
            return;
        }
        Ok(Ok(None)) => {
            info!(job_id = %id, "Job stopped after cancellation");
            return;
        }
        Ok(Err(e)) => format!("{:#}", e),
        Err(e) => format!("translation task failed: {}", e),
    };

    error!(job_id = %id, error = %failure, "Job failed");
    if !store.fail(&id, failure, settings.finished_ttl) {
        warn!(job_id = %id, "Failure not recorded, job was no longer running");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::testing::{EchoTranslator, GatedTranslator};
    use std::sync::atomic::Ordering;

    fn settings(max_concurrent: usize) -> QueueSettings {
        QueueSettings {
            max_concurrent,
            max_chunk_chars: 450,
            cancel_grace: Duration::from_secs(30),
            finished_ttl: None,
        }
    }

    fn submit(queue: &JobQueue, text: &str) -> JobId {
        queue
            .submit(text.to_string(), "en", "zh", GenerationOptions::new())
            .unwrap()
    }

    /// Poll until `check` holds, asserting the concurrency bound on the way
    async fn wait_until(queue: &JobQueue, mut check: impl FnMut(&JobStore) -> bool) {
        let limit = queue.settings().max_concurrent;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                assert!(queue.running_count() <= limit);
                if check(queue.store()) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn status_is(id: &JobId, status: JobStatus) -> impl FnMut(&JobStore) -> bool + '_ {
        move |store| store.status(id) == Some(status)
    }

    #[tokio::test]
    async fn runs_job_to_completion() {
        let translator = Arc::new(EchoTranslator::default());
        let queue = JobQueue::start(settings(2), JobStore::new(), translator.clone());

        let text = "Hello world. How are you?\n\nGoodbye.";
        let id = submit(&queue, text);
        wait_until(&queue, status_is(&id, JobStatus::Done)).await;

        let job = queue.store().get(&id).unwrap();
        assert_eq!(job.result.as_deref(), Some(text));
        assert_eq!(job.progress, 100);
        assert_eq!(job.total_units, Some(3));
        assert!(job.error.is_none());
        // the blank line never reaches the translator
        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn third_job_waits_for_a_free_worker() {
        let translator = Arc::new(GatedTranslator::new());
        let queue = JobQueue::start(settings(2), JobStore::new(), translator.clone());

        let first = submit(&queue, "one.");
        let second = submit(&queue, "two.");
        let third = submit(&queue, "three.");

        wait_until(&queue, |store| {
            store.status(&first) == Some(JobStatus::Running)
                && store.status(&second) == Some(JobStatus::Running)
        })
        .await;
        assert_eq!(queue.store().status(&third), Some(JobStatus::Queued));
        assert_eq!(queue.running_count(), 2);

        translator.release(1);
        wait_until(&queue, status_is(&third, JobStatus::Running)).await;
        let finished = [&first, &second]
            .iter()
            .filter(|id| queue.store().status(id) == Some(JobStatus::Done))
            .count();
        assert_eq!(finished, 1);

        translator.release(2);
        for id in [&first, &second, &third] {
            wait_until(&queue, status_is(id, JobStatus::Done)).await;
        }
        assert_eq!(
            queue.store().get(&third).unwrap().result.as_deref(),
            Some("THREE.")
        );
    }

    #[tokio::test]
    async fn cancelled_queued_job_never_runs() {
        let translator = Arc::new(GatedTranslator::new());
        let queue = JobQueue::start(settings(1), JobStore::new(), translator.clone());

        let blocker = submit(&queue, "busy.");
        let waiting = submit(&queue, "never.");
        wait_until(&queue, status_is(&blocker, JobStatus::Running)).await;

        assert_eq!(queue.cancel(&waiting), CancelOutcome::Cancelled);
        translator.release(10);
        wait_until(&queue, status_is(&blocker, JobStatus::Done)).await;
        // give the worker a chance to pick up the cancelled job
        tokio::time::sleep(Duration::from_millis(50)).await;

        let job = queue.store().get(&waiting).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.started_at.is_none());
        assert_eq!(translator.started(), 1);
    }

    #[tokio::test]
    async fn running_job_stops_at_next_chunk() {
        let translator = Arc::new(GatedTranslator::new());
        let queue = JobQueue::start(settings(1), JobStore::new(), translator.clone());

        let id = submit(&queue, "a.\nb.\nc.");
        wait_until(&queue, |_| translator.started() == 1).await;

        assert_eq!(queue.cancel(&id), CancelOutcome::Cancelled);
        translator.release(10);

        let follow_up = submit(&queue, "next.");
        wait_until(&queue, status_is(&follow_up, JobStatus::Done)).await;

        let job = queue.store().get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.result.is_none());
        assert_eq!(job.total_units, Some(3));
        // one chunk of the cancelled job, one of the follow-up
        assert_eq!(translator.started(), 2);
    }

    #[tokio::test]
    async fn failure_is_isolated_to_its_job() {
        let translator = Arc::new(EchoTranslator::failing_on("boom"));
        let queue = JobQueue::start(settings(1), JobStore::new(), translator);

        let bad = submit(&queue, "fine.\nboom.");
        let good = submit(&queue, "still fine.");
        wait_until(&queue, status_is(&good, JobStatus::Done)).await;

        let job = queue.store().get(&bad).unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert!(job.error.unwrap().contains("boom"));
        assert!(job.result.is_none());
        assert_eq!(job.progress, 50);
    }

    #[tokio::test]
    async fn finished_job_ignores_cancel() {
        let queue = JobQueue::start(settings(1), JobStore::new(), Arc::new(EchoTranslator::default()));
        let id = submit(&queue, "quick.");
        wait_until(&queue, status_is(&id, JobStatus::Done)).await;

        assert_eq!(queue.cancel(&id), CancelOutcome::Finished(JobStatus::Done));
        assert_eq!(queue.cancel(&JobId::from("nope")), CancelOutcome::NotFound);
    }
}
