use crate::errors::JobError;
use crate::store::ResultStore;
use crate::types::{ArgMap, Artifact, RawInput};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The four stages of one kind of job.
///
/// `extract_args` and `validate_args` run on the caller's task and are expected to be cheap.
/// `execute` and `package` may block for as long as the computation takes; they are moved onto
/// the blocking thread pool.
pub trait JobKind: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Pull the job's arguments out of the captured request.
    ///
    /// Runs on the async task serving the request, so it should not block: keep uploads in the
    /// returned map and write them out from `execute`.
    ///
    /// `work_dir` is the job's private directory, if the kind asked for one. Insert
    /// `DELAY_SENTINEL` into the result to request asynchronous execution from a kind registered
    /// with `ExecutionMode::Dynamic`.
    fn extract_args(&self, input: RawInput, work_dir: Option<&Path>) -> Result<ArgMap, JobError>;

    /// Check the extracted arguments. The returned map is merged over them.
    fn validate_args(&self, _args: &ArgMap) -> Result<ArgMap, JobError> {
        Ok(ArgMap::new())
    }

    fn execute(&self, args: &ArgMap) -> Result<Self::Output, JobError>;

    fn package(&self, output: &Self::Output, args: &ArgMap) -> Result<Artifact, JobError>;

    /// Release whatever `output` holds once its artifact has been packaged.
    fn cleanup(&self, _output: Self::Output) {}

    /// Text to show next to the acknowledgment of an asynchronous submission.
    fn notice(&self, _args: &ArgMap) -> Option<String> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run on the caller's request and respond with the result.
    Sync,
    /// Always run in the background and respond with an acknowledgment.
    Async,
    /// Run in the background only when `extract_args` returned the delay sentinel.
    Dynamic,
}

/// Immutable configuration of one kind of job.
pub struct JobSpec<K> {
    name: String,
    kind: Arc<K>,
    store: ResultStore,
    needs_work_dir: bool,
    mode: ExecutionMode,
}

impl<K: JobKind> JobSpec<K> {
    /// A synchronous kind whose jobs get a private directory under `root`.
    pub fn new(name: impl Into<String>, kind: K, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: Arc::new(kind),
            store: ResultStore::new(root),
            needs_work_dir: true,
            mode: ExecutionMode::Sync,
        }
    }

    /// Skip creating a job directory for synchronous runs. Background runs always get one.
    pub fn without_work_dir(mut self) -> Self {
        self.needs_work_dir = false;
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn asynchronous(self) -> Self {
        self.mode(ExecutionMode::Async)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &Arc<K> {
        &self.kind
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn root(&self) -> &Path {
        self.store.root()
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn needs_work_dir(&self) -> bool {
        self.needs_work_dir || self.mode == ExecutionMode::Async
    }

    /// Whether jobs of this kind can ever end up in the background.
    pub fn may_run_async(&self) -> bool {
        self.mode != ExecutionMode::Sync
    }

    /// Decide how a job runs, given whether its arguments carried the delay sentinel.
    pub fn runs_async(&self, sentinel: bool) -> bool {
        match self.mode {
            ExecutionMode::Sync => false,
            ExecutionMode::Async => true,
            ExecutionMode::Dynamic => sentinel,
        }
    }
}
