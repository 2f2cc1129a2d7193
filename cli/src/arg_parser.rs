use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Submit jobs to a gRPC job server and collect their results
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// The address of the server
    #[clap(
        short = 's',
        long = "server",
        env = "JOBS_SERVER",
        default_value = "http://[::1]:50051"
    )]
    pub server: String,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum SubCommand {
    /// submit a new job
    Submit {
        /// kind of job to run
        kind: String,

        #[clap(long = "field", multiple_occurrences = true, parse(try_from_str = key_eq_val))]
        /// a form field, as NAME=VALUE
        fields: Vec<(String, String)>,

        #[clap(long = "file", multiple_occurrences = true, parse(try_from_str = key_eq_val))]
        /// a file to upload, as NAME=PATH
        files: Vec<(String, String)>,

        #[clap(long, default_value = ".")]
        /// directory the result is saved in
        out: PathBuf,
    },
    /// ask for the result of a background job
    Poll {
        /// kind of job that was submitted
        kind: String,

        /// Uuid v4 string
        job_id: Uuid,

        #[clap(long, default_value = ".")]
        /// directory the result is saved in
        out: PathBuf,
    },
}

/// try_from_str parse function for NAME=VALUE pairs
fn key_eq_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err("Required format is NAME=VALUE".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_eq_val_splits_on_first_equals() {
        assert_eq!(
            key_eq_val("seconds=5"),
            Ok(("seconds".to_string(), "5".to_string()))
        );
        assert_eq!(
            key_eq_val("query=a=b"),
            Ok(("query".to_string(), "a=b".to_string()))
        );
        assert_eq!(key_eq_val("empty="), Ok(("empty".to_string(), String::new())));
        assert!(key_eq_val("novalue").is_err());
        assert!(key_eq_val("=5").is_err());
    }

    #[test]
    fn parses_submit() {
        let args = ArgParser::try_parse_from([
            "cli",
            "submit",
            "sleep",
            "--field",
            "seconds=2",
            "--file",
            "file=seq.ct",
        ])
        .unwrap();
        assert_eq!(args.server, "http://[::1]:50051");
        assert_eq!(
            args.sub_command,
            SubCommand::Submit {
                kind: "sleep".into(),
                fields: vec![("seconds".into(), "2".into())],
                files: vec![("file".into(), "seq.ct".into())],
                out: PathBuf::from("."),
            }
        );
    }

    #[test]
    fn poll_requires_a_uuid() {
        assert!(ArgParser::try_parse_from(["cli", "poll", "sleep", "not-a-uuid"]).is_err());
        let job_id = Uuid::new_v4();
        let args = ArgParser::try_parse_from([
            "cli",
            "-s",
            "http://example:1",
            "poll",
            "sleep",
            &job_id.to_string(),
        ])
        .unwrap();
        assert_eq!(args.server, "http://example:1");
        assert!(matches!(args.sub_command, SubCommand::Poll { job_id: id, .. } if id == job_id));
    }
}
