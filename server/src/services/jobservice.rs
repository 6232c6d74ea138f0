use bytes::Bytes;
use docstream_jobs::types::JobId;
use docstream_jobs::{Converter, JobCoordinator, JobError, JobStatus, StreamEvent};
use docstream_proto::grammar_jobs_server::GrammarJobs;
use docstream_proto::{
    status_response, stream_event, OutputRequest, OutputResponse, StatusRequest, StatusResponse,
    StreamRequest, SubmitRequest, SubmitResponse,
};
use futures::{stream, Stream};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Request, Response, Status};
use tracing::{info, warn};
use uuid::Uuid;

// tonic wraps this in Arc anyway internally, so we don't need Arc
pub struct GrammarJobsService {
    coordinator: JobCoordinator,
    converter: Arc<dyn Converter>,
}

impl GrammarJobsService {
    pub fn new(coordinator: JobCoordinator, converter: Arc<dyn Converter>) -> Self {
        Self {
            coordinator,
            converter,
        }
    }
}

/// Ids that don't parse can't name a job, so they are simply not found.
fn parse_job_id(job_id: &str) -> Result<JobId, JobError> {
    Uuid::parse_str(job_id.trim()).map_err(|_| JobError::NotFound)
}

fn to_status(err: JobError) -> Status {
    match err {
        JobError::NotFound => Status::not_found(err.to_string()),
        JobError::EmptyDocument | JobError::Conversion(_) => {
            Status::invalid_argument(err.to_string())
        }
        JobError::StoreFull { .. } => Status::resource_exhausted(err.to_string()),
        JobError::NotCompleted(_) => Status::failed_precondition(err.to_string()),
        JobError::IdCollision(_) | JobError::CoordinatorGone => {
            warn!(%err, "request failed");
            Status::internal(err.to_string())
        }
    }
}

fn to_event_message(event: StreamEvent) -> docstream_proto::StreamEvent {
    let kind = match event {
        StreamEvent::Data(_) => stream_event::Kind::Data,
        StreamEvent::Error(_) => stream_event::Kind::Error,
        StreamEvent::End => stream_event::Kind::End,
    };
    docstream_proto::StreamEvent {
        kind: kind.into(),
        frame: event.to_frame().to_vec(),
        data: event.payload().to_string(),
    }
}

#[tonic::async_trait]
impl GrammarJobs for GrammarJobsService {
    type StreamCorrectionsStream =
        Pin<Box<dyn Stream<Item = Result<docstream_proto::StreamEvent, Status>> + Send>>;

    async fn submit_document(
        &self,
        req: Request<SubmitRequest>,
    ) -> Result<Response<SubmitResponse>, Status> {
        let SubmitRequest { document, filename } = req.into_inner();
        let size = document.len();
        let submission = self
            .coordinator
            .submit(self.converter.clone(), Bytes::from(document))
            .await
            .map_err(|err| {
                info!(%filename, size, %err, "rejected submission");
                to_status(err)
            })?;
        info!(job_id = %submission.job_id, %filename, size, "accepted submission");

        Ok(Response::new(SubmitResponse {
            job_id: submission.job_id.to_string(),
            markup: submission.result.markup.clone(),
            messages: submission.result.messages.clone(),
        }))
    }

    async fn query_status(
        &self,
        req: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let job_id = parse_job_id(&req.get_ref().job_id).map_err(to_status)?;
        let snapshot = self
            .coordinator
            .snapshot(job_id)
            .await
            .map_err(to_status)?;
        let status = match snapshot.status {
            JobStatus::Processing => status_response::JobStatus::Processing,
            JobStatus::Completed => status_response::JobStatus::Completed,
            JobStatus::Failed => status_response::JobStatus::Failed,
        };
        Ok(Response::new(StatusResponse {
            status: status.into(),
            chunks_sent: snapshot.chunks_sent,
        }))
    }

    async fn stream_corrections(
        &self,
        req: Request<StreamRequest>,
    ) -> Result<Response<Self::StreamCorrectionsStream>, Status> {
        // stream failures are reported in-band, never as a failed call
        let job_id = match parse_job_id(&req.get_ref().job_id) {
            Ok(job_id) => job_id,
            Err(err) => {
                let event = to_event_message(StreamEvent::Error(err.to_string()));
                return Ok(Response::new(
                    Box::pin(stream::once(async move { Ok(event) })) as Self::StreamCorrectionsStream
                ));
            }
        };

        // dropping the response stream on disconnect drops the receiver, which cancels the publisher
        let events = self.coordinator.stream(job_id);
        let response_stream = ReceiverStream::new(events).map(|event| Ok(to_event_message(event)));
        Ok(Response::new(
            Box::pin(response_stream) as Self::StreamCorrectionsStream
        ))
    }

    async fn fetch_output(
        &self,
        req: Request<OutputRequest>,
    ) -> Result<Response<OutputResponse>, Status> {
        let job_id = parse_job_id(&req.get_ref().job_id).map_err(to_status)?;
        let markup = self
            .coordinator
            .output(job_id)
            .await
            .map_err(to_status)?;
        Ok(Response::new(OutputResponse { markup }))
    }
}
