use std::sync::Arc;

use crate::config::Config;
use crate::jobs::{JobQueue, JobStore, QueueSettings};
use crate::translate::TranslatorInterface;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jobs: Arc<JobQueue>,
    pub translator: Arc<dyn TranslatorInterface>,
}

impl AppState {
    /// Build the state and start the queue workers. Must run inside a Tokio runtime.
    pub fn new(config: Config, translator: Arc<dyn TranslatorInterface>) -> Self {
        let settings = QueueSettings::from(&config.queue);
        let jobs = JobQueue::start(settings, JobStore::new(), translator.clone());

        Self {
            config: Arc::new(config),
            jobs: Arc::new(jobs),
            translator,
        }
    }

    pub fn store(&self) -> &JobStore {
        self.jobs.store()
    }
}
