use protobuf::{
    jobs_client::JobsClient, poll_response::State, submit_response::Outcome, Artifact,
    PollRequest, SubmitRequest, Upload,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tonic::{transport::Channel, Request, Status};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("could not connect: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error(transparent)]
    Rpc(#[from] Status),
    #[error("{}: {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("job failed ({code}): {message}")]
    Failed { code: u32, message: String },
    #[error("server sent an empty response")]
    EmptyResponse,
    #[error("server sent an unusable artifact name '{0}'")]
    ArtifactName(String),
}

pub struct ClientCli {
    inner: JobsClient<Channel>,
}

impl ClientCli {
    pub async fn connect(server_addr: &str) -> Result<Self, CliError> {
        let inner = JobsClient::connect(server_addr.to_string()).await?;
        Ok(Self { inner })
    }

    pub async fn submit_job(
        &mut self,
        kind: &str,
        fields: &[(String, String)],
        files: &[(String, String)],
        out: &Path,
    ) -> Result<(), CliError> {
        let mut uploads = HashMap::new();
        for (name, path) in files {
            let path = PathBuf::from(path);
            let data = std::fs::read(&path).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            uploads.insert(name.clone(), Upload { filename, data });
        }

        let request = Request::new(SubmitRequest {
            kind: kind.into(),
            fields: HashMap::from_iter(fields.iter().cloned()),
            files: uploads,
        });
        let response = self.inner.submit(request).await?;
        match response.into_inner().outcome.ok_or(CliError::EmptyResponse)? {
            Outcome::Completed(artifact) => save_artifact(&artifact, out),
            Outcome::Accepted(accepted) => {
                println!("Accepted job id: {}", accepted.job_id);
                if !accepted.notice.is_empty() {
                    println!("{}", accepted.notice);
                }
                Ok(())
            }
            Outcome::Failed(failure) => Err(CliError::Failed {
                code: failure.code,
                message: failure.message,
            }),
        }
    }

    pub async fn poll_job(&mut self, kind: &str, job_id: Uuid, out: &Path) -> Result<(), CliError> {
        let request = Request::new(PollRequest {
            kind: kind.into(),
            job_id: job_id.to_string(),
        });
        let response = self.inner.poll(request).await?;
        match response.into_inner().state.ok_or(CliError::EmptyResponse)? {
            State::Running(running) => {
                println!("Job {} is still {}", running.job_id, running.status);
                Ok(())
            }
            State::Completed(artifact) => save_artifact(&artifact, out),
            State::Failed(failure) => Err(CliError::Failed {
                code: failure.code,
                message: failure.message,
            }),
        }
    }
}

/// Write the artifact into `out` under the last component of its name.
fn save_artifact(artifact: &Artifact, out: &Path) -> Result<(), CliError> {
    let path = artifact_path(&artifact.name, out)?;
    std::fs::write(&path, &artifact.data).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;
    println!("Job {} finished: saved {}", artifact.job_id, path.display());
    Ok(())
}

fn artifact_path(name: &str, out: &Path) -> Result<PathBuf, CliError> {
    match Path::new(name).file_name() {
        Some(file_name) => Ok(out.join(file_name)),
        None => Err(CliError::ArtifactName(name.to_string())),
    }
}
