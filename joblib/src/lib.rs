pub mod errors;
pub mod events;
pub mod executor;
pub mod registry;
pub mod runner;
pub mod spec;
pub mod store;
pub mod types;

pub use errors::{ErrorContext, Failure, JobError};
pub use events::{PollResult, Submission};
pub use executor::{JobExecutor, PreparedJob};
pub use registry::{Program, Registry};
pub use runner::AsyncJobRunner;
pub use spec::{ExecutionMode, JobKind, JobSpec};
pub use store::ResultStore;
pub use types::{Accepted, ArgMap, ArgValue, Artifact, JobId, JobResponse, RawInput, Upload};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    /// Writes the upload into the job directory and reads it back when executed.
    struct Stash;

    impl JobKind for Stash {
        type Output = Vec<u8>;

        fn extract_args(&self, input: RawInput, work_dir: Option<&Path>) -> Result<ArgMap, JobError> {
            let upload = input.require_file("data")?;
            let work_dir = work_dir.ok_or_else(|| JobError::Runtime("no work dir".into()))?;
            let path = work_dir.join(&upload.filename);
            std::fs::write(&path, &upload.data).map_err(|e| JobError::Runtime(e.to_string()))?;
            Ok(ArgMap::new().with("path", path))
        }

        fn execute(&self, args: &ArgMap) -> Result<Vec<u8>, JobError> {
            std::fs::read(args.path("path")?).map_err(|e| JobError::Runtime(e.to_string()))
        }

        fn package(&self, output: &Vec<u8>, _args: &ArgMap) -> Result<Artifact, JobError> {
            Ok(Artifact::new("stash.bin", output.clone()))
        }
    }

    #[tokio::test]
    async fn basic() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let registry = Registry::new()
            .register(JobSpec::new("stash", Stash, tmp.path().join("stash")).asynchronous());
        let ctx = ErrorContext::new("The given arguments are invalid", "Something broke");

        let input = RawInput::new().file("data", "seq.ct", &b"hello world!"[..]);
        let job_id = match registry.submit("stash", input, &ctx).await {
            Submission::Accepted(accepted) => accepted.job_id,
            other => panic!("expected acceptance, got {:?}", other),
        };

        let result = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match registry.poll("stash", job_id).await {
                    PollResult::Running { .. } => tokio::time::sleep(Duration::from_millis(10)).await,
                    other => return other,
                }
            }
        })
        .await
        .expect("job finished");

        match result {
            PollResult::Succeeded(response) => {
                assert_eq!(response.artifact.name, "stash.bin");
                assert_eq!(String::from_utf8_lossy(&response.artifact.data), "hello world!");
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert!(!tmp.path().join("stash").join(job_id.to_string()).exists());
    }
}
