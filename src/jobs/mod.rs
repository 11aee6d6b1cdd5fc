pub mod job;
pub mod pipeline;
pub mod queue;
pub mod store;

pub use job::{Job, JobId, JobStatus};
pub use queue::{JobQueue, QueueError, QueueSettings};
pub use store::{CancelOutcome, JobStore};
