use super::secure_filename;
use joblib::{ArgMap, Artifact, JobError, JobKind, RawInput};
use std::path::Path;
use std::thread;
use std::time::Duration;

const MAX_SECONDS: i64 = 600;
const WARN_SECONDS: i64 = 60;

/// Saves the uploaded `file` in the job directory, waits `seconds`, then returns the saved file.
pub struct Sleep;

impl JobKind for Sleep {
    type Output = Vec<u8>;

    fn extract_args(&self, input: RawInput, work_dir: Option<&Path>) -> Result<ArgMap, JobError> {
        let upload = input.require_file("file")?;
        let work_dir =
            work_dir.ok_or_else(|| JobError::Runtime("sleep jobs need a work directory".into()))?;
        let filename = secure_filename(&upload.filename);
        let path = work_dir.join(&filename);
        let seconds = input
            .fields
            .get("seconds")
            .cloned()
            .unwrap_or_else(|| "1".to_string());
        Ok(ArgMap::new()
            .with("filename", filename)
            .with("path", path)
            .with("data", upload.data.clone())
            .with("seconds", seconds))
    }

    fn validate_args(&self, args: &ArgMap) -> Result<ArgMap, JobError> {
        let seconds = args.int("seconds")?;
        if !(0..=MAX_SECONDS).contains(&seconds) {
            return Err(JobError::Validation(format!(
                "seconds must be between 0 and {}",
                MAX_SECONDS
            )));
        }
        Ok(ArgMap::new().with("seconds", seconds))
    }

    fn execute(&self, args: &ArgMap) -> Result<Vec<u8>, JobError> {
        let path = args.path("path")?;
        std::fs::write(path, args.bytes("data")?)
            .map_err(|e| JobError::Runtime(format!("could not save upload: {}", e)))?;
        let seconds = args.int("seconds")?;
        thread::sleep(Duration::from_secs(seconds as u64));
        std::fs::read(path)
            .map_err(|e| JobError::Runtime(format!("could not read saved upload: {}", e)))
    }

    fn package(&self, output: &Vec<u8>, args: &ArgMap) -> Result<Artifact, JobError> {
        let name = format!("SleepResultsFor-{}", args.text("filename")?);
        Ok(Artifact::new(name, output.clone()))
    }

    fn notice(&self, args: &ArgMap) -> Option<String> {
        match args.int("seconds") {
            Ok(seconds) if seconds > WARN_SECONDS => Some(format!(
                "This job will take about {} minutes; check back later.",
                seconds / 60
            )),
            _ => None,
        }
    }
}
