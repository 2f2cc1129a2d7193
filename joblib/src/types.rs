use crate::errors::JobError;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type JobId = Uuid;
pub type Fields = HashMap<String, String>;
pub type Files = HashMap<String, Upload>;

/// Key a `JobKind::extract_args` implementation may insert to ask for asynchronous execution.
///
/// Only honoured for kinds registered with `ExecutionMode::Dynamic`, but always stripped from the
/// argument map before validation.
pub const DELAY_SENTINEL: &str = "_delayed_";

/// A file captured from the caller's request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// Everything the request boundary captured for one submission.
#[derive(Clone, Debug, Default)]
pub struct RawInput {
    pub fields: Fields,
    pub files: Files,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.files.insert(
            name.into(),
            Upload {
                filename: filename.into(),
                data: data.into(),
            },
        );
        self
    }

    /// Fetch a text field, failing if the caller did not send it.
    pub fn require_field(&self, name: &str) -> Result<&str, JobError> {
        self.fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| JobError::Validation(format!("missing field '{}'", name)))
    }

    /// Fetch an uploaded file, failing if the caller did not send it.
    pub fn require_file(&self, name: &str) -> Result<&Upload, JobError> {
        self.files
            .get(name)
            .ok_or_else(|| JobError::Validation(format!("missing file '{}'", name)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Path(PathBuf),
    Bytes(Bytes),
}

impl ArgValue {
    fn kind(&self) -> &'static str {
        match self {
            ArgValue::Text(_) => "text",
            ArgValue::Int(_) => "integer",
            ArgValue::Bool(_) => "flag",
            ArgValue::Path(_) => "path",
            ArgValue::Bytes(_) => "bytes",
        }
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Int(n)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<PathBuf> for ArgValue {
    fn from(p: PathBuf) -> Self {
        ArgValue::Path(p)
    }
}

impl From<Bytes> for ArgValue {
    fn from(b: Bytes) -> Self {
        ArgValue::Bytes(b)
    }
}

/// Named arguments flowing between the stages of a job's pipeline.
///
/// The typed accessors report a missing or mistyped key as a validation error, so an `execute`
/// that trips over bad input still surfaces as a client error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArgMap {
    inner: BTreeMap<String, ArgValue>,
}

impl ArgMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.inner.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Keys of `overrides` replace or extend the receiver's; all other keys are left untouched.
    pub fn merge(&mut self, overrides: ArgMap) {
        self.inner.extend(overrides.inner);
    }

    /// Remove the delay sentinel, returning whether it was present.
    pub fn take_delay_sentinel(&mut self) -> bool {
        self.inner.remove(DELAY_SENTINEL).is_some()
    }

    fn require(&self, key: &str) -> Result<&ArgValue, JobError> {
        self.inner
            .get(key)
            .ok_or_else(|| JobError::Validation(format!("missing argument '{}'", key)))
    }

    fn mistyped(key: &str, expected: &str, found: &ArgValue) -> JobError {
        JobError::Validation(format!(
            "argument '{}' should be {} but was {}",
            key,
            expected,
            found.kind()
        ))
    }

    pub fn text(&self, key: &str) -> Result<&str, JobError> {
        match self.require(key)? {
            ArgValue::Text(s) => Ok(s),
            other => Err(Self::mistyped(key, "text", other)),
        }
    }

    /// Integers may also arrive as text straight from a form field.
    pub fn int(&self, key: &str) -> Result<i64, JobError> {
        match self.require(key)? {
            ArgValue::Int(n) => Ok(*n),
            ArgValue::Text(s) => s.trim().parse().map_err(|_| {
                JobError::Validation(format!("argument '{}' is not an integer: '{}'", key, s))
            }),
            other => Err(Self::mistyped(key, "an integer", other)),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool, JobError> {
        match self.require(key)? {
            ArgValue::Bool(b) => Ok(*b),
            other => Err(Self::mistyped(key, "a flag", other)),
        }
    }

    pub fn path(&self, key: &str) -> Result<&Path, JobError> {
        match self.require(key)? {
            ArgValue::Path(p) => Ok(p),
            other => Err(Self::mistyped(key, "a path", other)),
        }
    }

    pub fn bytes(&self, key: &str) -> Result<&Bytes, JobError> {
        match self.require(key)? {
            ArgValue::Bytes(b) => Ok(b),
            other => Err(Self::mistyped(key, "bytes", other)),
        }
    }
}

/// The single file a successful job produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub data: Bytes,
}

impl Artifact {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Final output of a job, ready for the request boundary to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobResponse {
    pub job_id: JobId,
    pub artifact: Artifact,
}

/// Acknowledgment of an asynchronous submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Accepted {
    pub job_id: JobId,
    /// Extra text the job kind wants shown alongside the acknowledgment.
    pub notice: Option<String>,
}

impl Accepted {
    pub const STATUS: &'static str = "accepted";
}
