use crate::convert::Conversion;
use crate::errors;
use crate::events::JobSnapshot;
use crate::source::ChunkRequest;
use crate::types::{Fragment, JobId, Markup};
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum CoordinatorMessage {
    CreateJob {
        result: Option<Arc<Conversion>>,
        response: oneshot::Sender<errors::Result<JobId>>,
    },
    GetStatus {
        job_id: JobId,
        response: oneshot::Sender<errors::Result<JobSnapshot>>,
    },
    GetOutput {
        job_id: JobId,
        response: oneshot::Sender<errors::Result<Markup>>,
    },
    OpenStream {
        job_id: JobId,
        response: oneshot::Sender<errors::Result<ChunkRequest>>,
    },
    ChunkDelivered {
        job_id: JobId,
        sequence: u64,
        fragment: Fragment,
    },
    StreamClosed {
        job_id: JobId,
        outcome: StreamOutcome,
    },
}

/// How a stream that got past the job lookup ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The chunk source ran dry; the job is complete.
    Exhausted,
    /// The chunk source failed with the given message.
    Failed(String),
    /// The subscriber went away before the source was exhausted.
    Cancelled,
}
