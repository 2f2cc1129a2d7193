//! Mapping between engine outcomes and wire messages.

use joblib::events::RUNNING_STATUS;
use joblib::{Accepted, Failure, JobResponse, PollResult, RawInput, Submission, Upload};
use protobuf::{poll_response, submit_response, PollResponse, SubmitRequest, SubmitResponse};

pub fn raw_input(request: SubmitRequest) -> (String, RawInput) {
    let SubmitRequest {
        kind,
        fields,
        files,
    } = request;
    let files = files
        .into_iter()
        .map(|(name, upload)| {
            let upload = Upload {
                filename: upload.filename,
                data: upload.data.into(),
            };
            (name, upload)
        })
        .collect();
    (kind, RawInput { fields, files })
}

fn artifact(response: JobResponse) -> protobuf::Artifact {
    protobuf::Artifact {
        job_id: response.job_id.to_string(),
        name: response.artifact.name,
        data: response.artifact.data.to_vec(),
    }
}

fn failure(failure: Failure) -> protobuf::Failure {
    protobuf::Failure {
        message: failure.message,
        code: failure.code.into(),
    }
}

pub fn submit_response(submission: Submission) -> SubmitResponse {
    use submit_response::Outcome;
    let outcome = match submission {
        Submission::Completed(response) => Outcome::Completed(artifact(response)),
        Submission::Accepted(accepted) => Outcome::Accepted(protobuf::Accepted {
            job_id: accepted.job_id.to_string(),
            status: Accepted::STATUS.to_string(),
            notice: accepted.notice.unwrap_or_default(),
        }),
        Submission::Failed(f) => Outcome::Failed(failure(f)),
    };
    SubmitResponse {
        outcome: Some(outcome),
    }
}

pub fn poll_response(result: PollResult) -> PollResponse {
    use poll_response::State;
    let state = match result {
        PollResult::Gone => State::Failed(failure(PollResult::gone_failure())),
        PollResult::Running { job_id } => State::Running(protobuf::Running {
            job_id: job_id.to_string(),
            status: RUNNING_STATUS.to_string(),
        }),
        PollResult::Failed(f) => State::Failed(failure(f)),
        PollResult::Succeeded(response) => State::Completed(artifact(response)),
    };
    PollResponse { state: Some(state) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblib::events::GONE_MESSAGE;
    use joblib::Artifact;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn request_becomes_raw_input() {
        let mut files = HashMap::new();
        files.insert(
            "file".to_string(),
            protobuf::Upload {
                filename: "seq.ct".into(),
                data: b"ACGU".to_vec(),
            },
        );
        let mut fields = HashMap::new();
        fields.insert("upper".to_string(), "on".to_string());
        let (kind, input) = raw_input(SubmitRequest {
            kind: "echo".into(),
            fields,
            files,
        });
        assert_eq!(kind, "echo");
        assert_eq!(input.require_field("upper").unwrap(), "on");
        let upload = input.require_file("file").unwrap();
        assert_eq!(upload.filename, "seq.ct");
        assert_eq!(upload.data, &b"ACGU"[..]);
    }

    #[test]
    fn accepted_carries_status_and_notice() {
        let job_id = Uuid::new_v4();
        let response = submit_response(Submission::Accepted(Accepted {
            job_id,
            notice: None,
        }));
        match response.outcome {
            Some(submit_response::Outcome::Accepted(accepted)) => {
                assert_eq!(accepted.job_id, job_id.to_string());
                assert_eq!(accepted.status, "accepted");
                assert_eq!(accepted.notice, "");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn gone_is_a_400_failure() {
        match poll_response(PollResult::Gone).state {
            Some(poll_response::State::Failed(f)) => {
                assert_eq!(f.code, 400);
                assert_eq!(f.message, GONE_MESSAGE);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn running_and_completed_states() {
        let job_id = Uuid::new_v4();
        match poll_response(PollResult::Running { job_id }).state {
            Some(poll_response::State::Running(running)) => {
                assert_eq!(running.status, "running");
                assert_eq!(running.job_id, job_id.to_string());
            }
            other => panic!("unexpected state {:?}", other),
        }
        let done = PollResult::Succeeded(JobResponse {
            job_id,
            artifact: Artifact::new("out.txt", &b"hello"[..]),
        });
        match poll_response(done).state {
            Some(poll_response::State::Completed(artifact)) => {
                assert_eq!(artifact.name, "out.txt");
                assert_eq!(artifact.data, b"hello".to_vec());
            }
            other => panic!("unexpected state {:?}", other),
        }
    }
}
