mod convert;

use joblib::{ErrorContext, Registry};
use protobuf::jobs_server::Jobs;
use protobuf::{PollRequest, PollResponse, SubmitRequest, SubmitResponse};
use tonic::{Request, Response, Status};
use tracing::debug;
use uuid::Uuid;

pub const VALIDATION_MESSAGE: &str = "The given arguments are invalid";
pub const RUNTIME_MESSAGE: &str = "Something went wrong when calculating your result";

// tonic wraps this in Arc anyway internally, so we don't need Arc
pub struct JobService {
    registry: Registry,
    context: ErrorContext,
}

impl JobService {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            context: ErrorContext::new(VALIDATION_MESSAGE, RUNTIME_MESSAGE),
        }
    }
}

#[tonic::async_trait]
impl Jobs for JobService {
    async fn submit(
        &self,
        req: Request<SubmitRequest>,
    ) -> Result<Response<SubmitResponse>, Status> {
        let (kind, input) = convert::raw_input(req.into_inner());
        debug!(%kind, fields = input.fields.len(), files = input.files.len(), "submit request");
        let submission = self.registry.submit(&kind, input, &self.context).await;
        Ok(Response::new(convert::submit_response(submission)))
    }

    async fn poll(&self, req: Request<PollRequest>) -> Result<Response<PollResponse>, Status> {
        let PollRequest { kind, job_id } = req.into_inner();
        // only well formed ids ever reach the filesystem
        let job_id =
            Uuid::parse_str(&job_id).map_err(|err| Status::invalid_argument(err.to_string()))?;
        let result = self.registry.poll(&kind, job_id).await;
        Ok(Response::new(convert::poll_response(result)))
    }
}
