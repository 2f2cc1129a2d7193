use crate::errors::{ErrorContext, JobError};
use crate::spec::{JobKind, JobSpec};
use crate::types::{ArgMap, Artifact, JobId, JobResponse, RawInput};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, warn};
use uuid::Uuid;

/// A job whose arguments have been extracted and validated, but which has not executed yet.
#[derive(Debug)]
pub struct PreparedJob {
    pub job_id: JobId,
    pub work_dir: Option<PathBuf>,
    pub args: ArgMap,
    pub run_async: bool,
}

/// Runs the pipeline of one kind of job: extract, validate, execute, package.
pub struct JobExecutor<K> {
    spec: Arc<JobSpec<K>>,
}

impl<K> Clone for JobExecutor<K> {
    fn clone(&self) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
        }
    }
}

impl<K: JobKind> JobExecutor<K> {
    pub fn new(spec: JobSpec<K>) -> Self {
        Self::from_shared(Arc::new(spec))
    }

    pub fn from_shared(spec: Arc<JobSpec<K>>) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &JobSpec<K> {
        &self.spec
    }

    /// Run a job to completion on the caller's task.
    ///
    /// The job directory, if any, is gone by the time this returns, whatever the outcome.
    pub async fn run(&self, input: RawInput, ctx: &ErrorContext) -> Result<JobResponse, JobError> {
        let prepared = self.prepare(input, ctx).await?;
        self.complete(prepared, ctx).await
    }

    /// Allocate a job id and directory, then extract and validate the arguments.
    ///
    /// On failure the job directory is removed before returning.
    pub async fn prepare(
        &self,
        input: RawInput,
        ctx: &ErrorContext,
    ) -> Result<PreparedJob, JobError> {
        let job_id = Uuid::new_v4();
        let store = self.spec.store();
        let mut work_dir = if self.spec.needs_work_dir() {
            Some(store.create_job_dir(job_id).await?)
        } else {
            None
        };

        let (args, run_async) = match self.extract_and_validate(input, work_dir.as_deref(), ctx) {
            Ok(prepared) => prepared,
            Err(err) => {
                debug!(kind = %self.spec.name(), %job_id, error = %err, "rejected job arguments");
                self.discard(work_dir.as_deref()).await;
                return Err(err);
            }
        };

        // a dynamic kind without a work dir still needs somewhere to leave its result
        if run_async && work_dir.is_none() {
            work_dir = Some(store.create_job_dir(job_id).await?);
        }

        Ok(PreparedJob {
            job_id,
            work_dir,
            args,
            run_async,
        })
    }

    fn extract_and_validate(
        &self,
        input: RawInput,
        work_dir: Option<&Path>,
        ctx: &ErrorContext,
    ) -> Result<(ArgMap, bool), JobError> {
        let kind = self.spec.kind();
        let mut args = catch_panic(|| kind.extract_args(input, work_dir))
            .map_err(|err| ctx.extraction_failed(err))?;
        let sentinel = args.take_delay_sentinel();
        let overrides =
            catch_panic(|| kind.validate_args(&args)).map_err(|err| ctx.validation_failed(err))?;
        args.merge(overrides);
        Ok((args, self.spec.runs_async(sentinel)))
    }

    /// Execute and package a prepared job, then remove its directory.
    pub async fn complete(
        &self,
        prepared: PreparedJob,
        ctx: &ErrorContext,
    ) -> Result<JobResponse, JobError> {
        let PreparedJob {
            job_id,
            work_dir,
            args,
            ..
        } = prepared;
        let result = self
            .execute_and_package(args, ctx)
            .await
            .map(|artifact| JobResponse { job_id, artifact });
        self.discard(work_dir.as_deref()).await;
        result
    }

    /// Stages 3 and 4, on the blocking pool.
    ///
    /// `execute` failures are classified through `ctx`; `package` failures are returned as is.
    pub(crate) async fn execute_and_package(
        &self,
        args: ArgMap,
        ctx: &ErrorContext,
    ) -> Result<Artifact, JobError> {
        let kind = Arc::clone(self.spec.kind());
        let classify = ctx.clone();
        let handle = task::spawn_blocking(move || {
            let output = kind
                .execute(&args)
                .map_err(|err| classify.execution_failed(err))?;
            let artifact = kind.package(&output, &args);
            kind.cleanup(output);
            artifact
        });
        match handle.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(ctx.execution_panicked(&panic_message(err.into_panic()))),
            Err(_) => Err(ctx.execution_panicked("job was cancelled")),
        }
    }

    pub(crate) async fn discard(&self, work_dir: Option<&Path>) {
        if let Some(dir) = work_dir {
            if let Err(err) = self.spec.store().remove_job_dir(dir).await {
                warn!(kind = %self.spec.name(), dir = %dir.display(), error = %err, "failed to remove job directory");
            }
        }
    }
}

/// Run a stage on the caller's task, turning a panic into an error of that stage.
fn catch_panic<T>(stage: impl FnOnce() -> Result<T, JobError>) -> Result<T, JobError> {
    panic::catch_unwind(AssertUnwindSafe(stage))
        .unwrap_or_else(|payload| Err(JobError::Runtime(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "job panicked".to_string()
    }
}
