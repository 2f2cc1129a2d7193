mod worker;

use self::worker::Worker;
use crate::errors::{ErrorContext, Failure, JobError};
use crate::events::PollResult;
use crate::executor::{JobExecutor, PreparedJob};
use crate::spec::{JobKind, JobSpec};
use crate::store::{self, RESULT_DIR};
use crate::types::{Accepted, JobId, JobResponse, RawInput};
use std::path::Path;
use tracing::{debug, info};

/// Runs jobs in the background and answers polls for their results.
///
/// Every submission gets its own background task; there is no pool, admission limit or
/// cancellation. A result is delivered to the first poll that sees it and deleted right after.
pub struct AsyncJobRunner<K> {
    executor: JobExecutor<K>,
}

impl<K> Clone for AsyncJobRunner<K> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<K: JobKind> AsyncJobRunner<K> {
    pub fn new(spec: JobSpec<K>) -> Self {
        Self::from_executor(JobExecutor::new(spec))
    }

    pub fn from_executor(executor: JobExecutor<K>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &JobExecutor<K> {
        &self.executor
    }

    /// Extract and validate on the caller's task, then hand execution to the background.
    pub async fn submit(&self, input: RawInput, ctx: &ErrorContext) -> Result<Accepted, JobError> {
        let prepared = self.executor.prepare(input, ctx).await?;
        self.start(prepared, ctx).await
    }

    /// Start the background unit of an already prepared job.
    pub async fn start(
        &self,
        prepared: PreparedJob,
        ctx: &ErrorContext,
    ) -> Result<Accepted, JobError> {
        let spec = self.executor.spec();
        let PreparedJob {
            job_id,
            work_dir,
            args,
            ..
        } = prepared;
        if work_dir.is_none() {
            spec.store().create_job_dir(job_id).await?;
        }
        let notice = spec.kind().notice(&args);
        Worker::spawn(self.executor.clone(), job_id, args, ctx.clone());
        info!(kind = %spec.name(), %job_id, "accepted background job");
        Ok(Accepted { job_id, notice })
    }

    /// Report the state of a job, delivering and deleting it if it has finished.
    ///
    /// Concurrent polls of a finished job race to claim it; the losers see `Gone`.
    pub async fn poll(&self, job_id: JobId) -> PollResult {
        match self.inspect(job_id).await {
            Ok(Some(state)) => state,
            Ok(None) => self.deliver(job_id).await,
            Err(err) => PollResult::Failed(Failure::from(err)),
        }
    }

    /// The non-terminal states, or `None` once the job has a result.
    async fn inspect(&self, job_id: JobId) -> Result<Option<PollResult>, JobError> {
        let store = self.executor.spec().store();
        if store::is_terminal(&store.marker_dir(job_id)).await? {
            return Ok(None);
        }
        // checked second, so a job claimed by another poller in between reads as gone
        if store.job_exists(job_id).await? {
            Ok(Some(PollResult::Running { job_id }))
        } else {
            Ok(Some(PollResult::Gone))
        }
    }

    async fn deliver(&self, job_id: JobId) -> PollResult {
        let store = self.executor.spec().store();
        let claimed = match store.claim_job_dir(job_id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return PollResult::Gone,
            Err(err) => return PollResult::Failed(Failure::from(JobError::from(err))),
        };
        let result = match read_result(&claimed.join(RESULT_DIR), job_id).await {
            Ok(result) => result,
            Err(err) => PollResult::Failed(Failure::from(err)),
        };
        self.executor.discard(Some(&claimed)).await;
        debug!(kind = %self.executor.spec().name(), %job_id, "delivered job result");
        result
    }
}

async fn read_result(marker: &Path, job_id: JobId) -> Result<PollResult, JobError> {
    if let Some(failure) = store::read_error(marker).await? {
        return Ok(PollResult::Failed(failure));
    }
    let artifact = store::read_artifact(marker).await?;
    Ok(PollResult::Succeeded(JobResponse { job_id, artifact }))
}
