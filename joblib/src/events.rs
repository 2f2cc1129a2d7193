use crate::errors::{Failure, JobError};
use crate::types::{Accepted, JobId, JobResponse};

pub const GONE_MESSAGE: &str = "output deleted from the system (or never run); run it again";
pub const RUNNING_STATUS: &str = "running";

/// What a caller gets back for a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// A synchronous job finished.
    Completed(JobResponse),
    /// An asynchronous job was started; poll for its result.
    Accepted(Accepted),
    Failed(Failure),
}

impl From<Result<JobResponse, JobError>> for Submission {
    fn from(result: Result<JobResponse, JobError>) -> Self {
        match result {
            Ok(response) => Submission::Completed(response),
            Err(err) => Submission::Failed(err.into()),
        }
    }
}

impl From<Result<Accepted, JobError>> for Submission {
    fn from(result: Result<Accepted, JobError>) -> Self {
        match result {
            Ok(accepted) => Submission::Accepted(accepted),
            Err(err) => Submission::Failed(err.into()),
        }
    }
}

/// State of an asynchronous job as seen by a poller.
///
/// `Failed` and `Succeeded` are delivered once; the job is deleted as they are produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResult {
    /// No such job: never submitted, already delivered, or cleaned up externally.
    Gone,
    Running { job_id: JobId },
    Failed(Failure),
    Succeeded(JobResponse),
}

impl PollResult {
    pub fn gone_failure() -> Failure {
        Failure::new(GONE_MESSAGE, JobError::VALIDATION_CODE)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PollResult::Failed(_) | PollResult::Succeeded(_))
    }
}
