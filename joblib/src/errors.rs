use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf, result};
use thiserror::Error;

/// Failures a job's pipeline can report to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The caller sent something unusable.
    #[error("{0}")]
    Validation(String),
    /// Something broke while the job was running.
    #[error("{0}")]
    Runtime(String),
}

impl JobError {
    pub const VALIDATION_CODE: u16 = 400;
    pub const RUNTIME_CODE: u16 = 500;

    pub fn code(&self) -> u16 {
        match self {
            JobError::Validation(_) => Self::VALIDATION_CODE,
            JobError::Runtime(_) => Self::RUNTIME_CODE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            JobError::Validation(msg) | JobError::Runtime(msg) => msg,
        }
    }
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        JobError::Runtime(err.to_string())
    }
}

/// The `{message, code}` record handed back for a failed job, and persisted as `error.json`
/// for jobs that failed in the background.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub code: u16,
}

impl Failure {
    pub fn new(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

impl From<JobError> for Failure {
    fn from(err: JobError) -> Self {
        let code = err.code();
        match err {
            JobError::Validation(message) | JobError::Runtime(message) => Self { message, code },
        }
    }
}

impl From<&JobError> for Failure {
    fn from(err: &JobError) -> Self {
        Self::new(err.message(), err.code())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
    #[error("{} already exists, job id collision", .0.display())]
    Collision(PathBuf),
    #[error("refusing to touch {} outside of {}", .path.display(), .root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("invalid artifact name '{0}'")]
    InvalidArtifactName(String),
    #[error("no result found in {}", .0.display())]
    EmptyMarker(PathBuf),
    #[error("malformed error descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

pub type Result<T> = result::Result<T, StoreError>;

const DEFAULT_PREFIX: &str = "Something went wrong";

/// Prefixes prepended to the cause of a failure, per pipeline stage.
///
/// A stage without a prefix passes the cause through untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub extraction: Option<String>,
    pub validation: Option<String>,
    pub runtime: Option<String>,
}

impl ErrorContext {
    /// Context with the given validation and runtime prefixes; extraction failures get the
    /// generic "Something went wrong".
    pub fn new(validation: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self {
            extraction: Some(DEFAULT_PREFIX.to_string()),
            validation: Some(validation.into()),
            runtime: Some(runtime.into()),
        }
    }

    fn prefix(prefix: Option<&str>, cause: &str) -> String {
        match prefix {
            Some(prefix) => format!("{}: {}", prefix, cause),
            None => cause.to_string(),
        }
    }

    /// Anything going wrong while extracting arguments is the caller's fault.
    pub fn extraction_failed(&self, err: JobError) -> JobError {
        JobError::Validation(Self::prefix(self.extraction.as_deref(), err.message()))
    }

    pub fn validation_failed(&self, err: JobError) -> JobError {
        JobError::Validation(Self::prefix(self.validation.as_deref(), err.message()))
    }

    /// Late validation keeps its 400 code, everything else becomes a runtime error.
    pub fn execution_failed(&self, err: JobError) -> JobError {
        match err {
            JobError::Validation(cause) => JobError::Validation(Self::prefix(
                self.validation.as_deref().or(self.runtime.as_deref()),
                &cause,
            )),
            JobError::Runtime(cause) => {
                JobError::Runtime(Self::prefix(self.runtime.as_deref(), &cause))
            }
        }
    }

    pub fn execution_panicked(&self, cause: &str) -> JobError {
        JobError::Runtime(Self::prefix(self.runtime.as_deref(), cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_and_validation_always_report_400() {
        let ctx = ErrorContext::new("The given arguments are invalid", "Oops");
        let err = ctx.extraction_failed(JobError::Runtime("no such file".into()));
        assert_eq!(err, JobError::Validation("Something went wrong: no such file".into()));

        let err = ctx.validation_failed(JobError::Runtime("length too big".into()));
        assert_eq!(err.code(), 400);
        assert_eq!(err.message(), "The given arguments are invalid: length too big");
    }

    #[test]
    fn late_validation_uses_validation_prefix() {
        let ctx = ErrorContext::new("invalid", "crashed");
        let err = ctx.execution_failed(JobError::Validation("bad base".into()));
        assert_eq!(err, JobError::Validation("invalid: bad base".into()));

        let err = ctx.execution_failed(JobError::Runtime("disk full".into()));
        assert_eq!(err, JobError::Runtime("crashed: disk full".into()));
    }

    #[test]
    fn late_validation_falls_back_to_runtime_prefix() {
        let ctx = ErrorContext {
            runtime: Some("crashed".into()),
            ..ErrorContext::default()
        };
        let err = ctx.execution_failed(JobError::Validation("bad base".into()));
        assert_eq!(err, JobError::Validation("crashed: bad base".into()));
    }

    #[test]
    fn bare_context_passes_messages_through() {
        let ctx = ErrorContext::default();
        let err = ctx.execution_failed(JobError::Validation("bad input".into()));
        assert_eq!(Failure::from(err), Failure::new("bad input", 400));
    }

    #[test]
    fn failure_serializes_like_the_on_disk_descriptor() {
        let json = serde_json::to_string(&Failure::new("boom", 500)).unwrap();
        assert_eq!(json, r#"{"message":"boom","code":500}"#);
        let back: Failure = serde_json::from_str(r#"{"message": "", "code": 400}"#).unwrap();
        assert_eq!(back, Failure::new("", 400));
    }
}
