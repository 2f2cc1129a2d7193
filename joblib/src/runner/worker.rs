use crate::errors::{ErrorContext, Failure, JobError};
use crate::executor::JobExecutor;
use crate::spec::JobKind;
use crate::store;
use crate::types::{ArgMap, JobId};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The background unit of one asynchronous job.
///
/// Nobody waits on it: the only trace it leaves is what it writes into the job's result marker.
pub struct Worker<K> {
    executor: JobExecutor<K>,
    job_id: JobId,
    args: ArgMap,
    ctx: ErrorContext,
}

impl<K: JobKind> Worker<K> {
    pub fn spawn(
        executor: JobExecutor<K>,
        job_id: JobId,
        args: ArgMap,
        ctx: ErrorContext,
    ) -> JoinHandle<()> {
        let worker = Self {
            executor,
            job_id,
            args,
            ctx,
        };
        tokio::spawn(async move { worker.run().await })
    }

    async fn run(self) {
        let Worker {
            executor,
            job_id,
            args,
            ctx,
        } = self;
        let spec = executor.spec();
        let kind = spec.name();

        // creating the marker doubles as the collision check for the job id
        let marker = match spec.store().create_marker(job_id).await {
            Ok(marker) => marker,
            Err(err) => {
                error!(%kind, %job_id, error = %err, "could not create result marker, abandoning job");
                return;
            }
        };
        info!(%kind, %job_id, "background job started");

        let failure = match executor.execute_and_package(args, &ctx).await {
            Ok(artifact) => match store::write_artifact(&marker, &artifact).await {
                Ok(()) => {
                    info!(%kind, %job_id, artifact = %artifact.name, "background job succeeded");
                    return;
                }
                Err(err) => Failure::from(JobError::from(err)),
            },
            Err(err) => Failure::from(err),
        };

        warn!(%kind, %job_id, code = failure.code, message = %failure.message, "background job failed");
        if let Err(err) = store::write_error(&marker, &failure).await {
            error!(%kind, %job_id, error = %err, "could not record job failure");
        }
    }
}
