use super::secure_filename;
use bytes::Bytes;
use joblib::{ArgMap, Artifact, JobError, JobKind, RawInput};
use std::path::Path;

/// Hands the uploaded `file` straight back, upper-cased when the `upper` field is set.
pub struct Echo;

impl JobKind for Echo {
    type Output = Bytes;

    fn extract_args(&self, input: RawInput, _work_dir: Option<&Path>) -> Result<ArgMap, JobError> {
        let upload = input.require_file("file")?;
        let upper = matches!(
            input.fields.get("upper").map(String::as_str),
            Some("1" | "true" | "on")
        );
        Ok(ArgMap::new()
            .with("filename", secure_filename(&upload.filename))
            .with("data", upload.data.clone())
            .with("upper", upper))
    }

    fn validate_args(&self, args: &ArgMap) -> Result<ArgMap, JobError> {
        if args.bytes("data")?.is_empty() {
            return Err(JobError::Validation("the uploaded file is empty".into()));
        }
        Ok(ArgMap::new())
    }

    fn execute(&self, args: &ArgMap) -> Result<Bytes, JobError> {
        let data = args.bytes("data")?;
        if args.flag("upper")? {
            Ok(Bytes::from(data.to_ascii_uppercase()))
        } else {
            Ok(data.clone())
        }
    }

    fn package(&self, output: &Bytes, args: &ArgMap) -> Result<Artifact, JobError> {
        let name = format!("EchoResultsFor-{}", args.text("filename")?);
        Ok(Artifact::new(name, output.clone()))
    }
}
