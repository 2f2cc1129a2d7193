use crate::errors::{ErrorContext, Failure, JobError};
use crate::events::{PollResult, Submission};
use crate::runner::AsyncJobRunner;
use crate::spec::{JobKind, JobSpec};
use crate::types::{JobId, RawInput};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A registered kind of job with its concrete types erased.
pub trait Program: Send + Sync {
    fn name(&self) -> &str;

    fn may_run_async(&self) -> bool;

    fn submit<'a>(&'a self, input: RawInput, ctx: &'a ErrorContext) -> BoxFuture<'a, Submission>;

    fn poll(&self, job_id: JobId) -> BoxFuture<'_, PollResult>;
}

struct Registered<K> {
    runner: AsyncJobRunner<K>,
}

impl<K: JobKind> Program for Registered<K> {
    fn name(&self) -> &str {
        self.runner.executor().spec().name()
    }

    fn may_run_async(&self) -> bool {
        self.runner.executor().spec().may_run_async()
    }

    fn submit<'a>(&'a self, input: RawInput, ctx: &'a ErrorContext) -> BoxFuture<'a, Submission> {
        async move {
            let executor = self.runner.executor();
            let prepared = match executor.prepare(input, ctx).await {
                Ok(prepared) => prepared,
                Err(err) => return Submission::Failed(err.into()),
            };
            if prepared.run_async {
                self.runner.start(prepared, ctx).await.into()
            } else {
                executor.complete(prepared, ctx).await.into()
            }
        }
        .boxed()
    }

    fn poll(&self, job_id: JobId) -> BoxFuture<'_, PollResult> {
        self.runner.poll(job_id).boxed()
    }
}

/// Every kind of job the service knows, by case-insensitive name.
///
/// Built once at startup and shared by reference.
#[derive(Default)]
pub struct Registry {
    programs: HashMap<String, Arc<dyn Program>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kind of job, replacing any earlier kind of the same name.
    pub fn register<K: JobKind>(mut self, spec: JobSpec<K>) -> Self {
        let key = spec.name().to_lowercase();
        let program = Registered {
            runner: AsyncJobRunner::new(spec),
        };
        if self.programs.insert(key, Arc::new(program)).is_some() {
            warn!("job kind registered twice, keeping the last one");
        }
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Program>> {
        self.programs.get(&kind.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.values().map(|program| program.name())
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    fn unknown(kind: &str) -> Failure {
        Failure::new(
            format!("unknown job kind '{}'", kind),
            JobError::VALIDATION_CODE,
        )
    }

    pub async fn submit(&self, kind: &str, input: RawInput, ctx: &ErrorContext) -> Submission {
        let program = match self.get(kind) {
            Some(program) => program,
            None => return Submission::Failed(Self::unknown(kind)),
        };
        let submission = program.submit(input, ctx).await;
        match &submission {
            Submission::Completed(response) => {
                info!(kind = %program.name(), job_id = %response.job_id, "job completed")
            }
            Submission::Accepted(accepted) => {
                info!(kind = %program.name(), job_id = %accepted.job_id, "job accepted")
            }
            Submission::Failed(failure) => {
                info!(kind = %program.name(), code = failure.code, "job failed")
            }
        }
        submission
    }

    pub async fn poll(&self, kind: &str, job_id: JobId) -> PollResult {
        let program = match self.get(kind) {
            Some(program) => program,
            None => return PollResult::Failed(Self::unknown(kind)),
        };
        if !program.may_run_async() {
            return PollResult::Failed(Failure::new(
                format!(
                    "Can only poll asynchronous jobs. {} runs synchronously",
                    program.name()
                ),
                JobError::VALIDATION_CODE,
            ));
        }
        program.poll(job_id).await
    }
}
