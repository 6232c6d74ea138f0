mod actor;
mod messages;

pub(crate) use self::messages::StreamOutcome;

use self::{
    actor::JobCoordinator,
    messages::CoordinatorMessage::{
        self, ChunkDelivered, CreateJob, GetOutput, GetStatus, OpenStream, StreamClosed,
    },
};
use super::publisher::StreamPublisher;
use crate::config::JobConfig;
use crate::convert::{Conversion, Converter};
use crate::errors::{self, ConversionError, JobError};
use crate::events::{JobSnapshot, JobStatus, StreamEvent};
use crate::source::{ChunkRequest, ChunkSource};
use crate::types::{Fragment, JobId, Markup};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A freshly created job, together with the conversion result it was created from.
#[derive(Clone, Debug)]
pub struct Submission {
    pub job_id: JobId,
    pub result: Arc<Conversion>,
}

/// A `JobCoordinator` which provides functionality for creating jobs, querying their state,
/// and streaming their corrected fragments.
///
/// This struct is actually an actor handle, the real work is done in the actor spawned by
/// `JobCoordinator::spawn`. The handle can be cloned freely across tasks without an
/// `Arc<Mutex>`: every clone talks to the same actor, which owns the job store.
#[derive(Clone)]
pub struct JobCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    source: Arc<dyn ChunkSource>,
    config: Arc<JobConfig>,
}

impl JobCoordinatorHandle {
    /// Spawn a new coordinator streaming fragments from `source`.
    pub fn spawn(config: JobConfig, source: Arc<dyn ChunkSource>) -> Self {
        let (sender, receiver) = mpsc::channel(config.message_capacity());
        JobCoordinator::spawn(receiver, config.clone());
        Self {
            sender,
            source,
            config: Arc::new(config),
        }
    }

    /// Validate and convert an uploaded document, then register a job for it.
    ///
    /// Empty documents are rejected before anything is converted or stored.
    pub async fn submit(
        &self,
        converter: Arc<dyn Converter>,
        document: Bytes,
    ) -> errors::Result<Submission> {
        if document.is_empty() {
            return Err(JobError::EmptyDocument);
        }
        let result = tokio::task::spawn_blocking(move || converter.convert(&document))
            .await
            .map_err(|err| ConversionError::Aborted(err.to_string()))??;
        self.create(result).await
    }

    /// Register a new job for an already computed conversion result.
    pub async fn create(&self, result: Conversion) -> errors::Result<Submission> {
        let result = Arc::new(result);
        let stored = Some(result.clone());
        let job_id = self
            .request(|response| CreateJob {
                result: stored,
                response,
            })
            .await?;
        Ok(Submission { job_id, result })
    }

    /// Current status of a job.
    ///
    /// Not a pure read: when a completion threshold is configured, querying a job older than
    /// the threshold marks it completed.
    pub async fn status(&self, job_id: JobId) -> errors::Result<JobStatus> {
        Ok(self.snapshot(job_id).await?.status)
    }

    pub async fn snapshot(&self, job_id: JobId) -> errors::Result<JobSnapshot> {
        self.request(|response| GetStatus { job_id, response })
            .await
    }

    /// The corrected document assembled from every delivered fragment. Only available once
    /// the job has completed and a stream has run its chunk source to the end.
    pub async fn output(&self, job_id: JobId) -> errors::Result<Markup> {
        self.request(|response| GetOutput { job_id, response })
            .await
    }

    /// Open a correction stream for a job.
    ///
    /// Always succeeds: an unknown job yields a receiver holding a single error event.
    /// Dropping the receiver cancels the stream.
    pub fn stream(&self, job_id: JobId) -> mpsc::Receiver<StreamEvent> {
        let (subscriber, events) = mpsc::channel(self.config.stream_buffer());
        let pacing = self.source.pacing().unwrap_or(self.config.pacing);
        StreamPublisher::spawn(
            self.clone(),
            self.source.clone(),
            pacing,
            job_id,
            subscriber,
        );
        events
    }

    /// Look a job up for a publisher and count the stream as in flight.
    pub(crate) async fn open_stream(&self, job_id: JobId) -> errors::Result<ChunkRequest> {
        self.request(|response| OpenStream { job_id, response })
            .await
    }

    pub(crate) async fn chunk_delivered(&self, job_id: JobId, sequence: u64, fragment: Fragment) {
        let _ = self
            .sender
            .send(ChunkDelivered {
                job_id,
                sequence,
                fragment,
            })
            .await;
    }

    pub(crate) async fn stream_closed(&self, job_id: JobId, outcome: StreamOutcome) {
        let _ = self.sender.send(StreamClosed { job_id, outcome }).await;
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<errors::Result<T>>) -> CoordinatorMessage,
    ) -> errors::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| JobError::CoordinatorGone)?;
        rx.await.map_err(|_| JobError::CoordinatorGone)?
    }
}
