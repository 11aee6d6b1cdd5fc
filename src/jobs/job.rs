use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::translate::GenerationOptions;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One translation request, from submission to its terminal state.
///
/// `result` is only set in `Done` and `error` only in `Error`; the store's
/// transition methods are the only writers.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Whole percent, 0..=100
    pub progress: u8,
    /// Chunk count, known once the text has been split
    pub total_units: Option<usize>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub generate: GenerationOptions,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Purged by the sweeper once this passes
    pub expires_at: Option<Instant>,
}

impl Job {
    pub fn new(
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        generate: GenerationOptions,
    ) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Queued,
            progress: 0,
            total_units: None,
            result: None,
            error: None,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            generate,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            expires_at: None,
        }
    }
}

/// Percentage of chunks finished, rounded down
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    (completed * 100 / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_queued_and_empty() {
        let job = Job::new("en", "zh", GenerationOptions::new());
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.total_units.is_none());
        assert!(job.result.is_none() && job.error.is_none());
        assert_ne!(job.id, Job::new("en", "zh", GenerationOptions::new()).id);
    }

    #[test]
    fn progress_rounds_down() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 66);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(5, 0), 0);
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(serde_json::to_value(JobStatus::Cancelled).unwrap(), "cancelled");
        assert_eq!(JobStatus::Running.to_string(), "running");
    }
}
