use super::coordinator::{JobCoordinatorHandle, StreamOutcome};
use crate::events::StreamEvent;
use crate::source::{ChunkRequest, ChunkSource};
use crate::types::JobId;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, info_span, warn, Instrument};

/// Drives one correction stream for one subscriber.
///
/// Fire and forget: the publisher runs in its own task, from the job lookup until the chunk
/// source is exhausted, the source fails, or the subscriber drops its receiver. Every lookup
/// that succeeds is paired with exactly one `StreamClosed` report to the coordinator.
pub struct StreamPublisher {
    coordinator: JobCoordinatorHandle,
    source: Arc<dyn ChunkSource>,
    pacing: Duration,
    subscriber: mpsc::Sender<StreamEvent>,
}

impl StreamPublisher {
    pub fn spawn(
        coordinator: JobCoordinatorHandle,
        source: Arc<dyn ChunkSource>,
        pacing: Duration,
        job_id: JobId,
        subscriber: mpsc::Sender<StreamEvent>,
    ) {
        let publisher = Self {
            coordinator,
            source,
            pacing,
            subscriber,
        };
        tokio::spawn(
            async move { publisher.run(job_id).await }
                .instrument(info_span!("stream", %job_id)),
        );
    }

    async fn run(self, job_id: JobId) {
        // starting
        let request = match self.coordinator.open_stream(job_id).await {
            Ok(request) => request,
            Err(err) => {
                debug!(%err, "rejecting stream");
                let _ = self.subscriber.send(StreamEvent::Error(err.to_string())).await;
                return;
            }
        };
        debug!(pacing = ?self.pacing, "stream opened");

        let outcome = self.emit(&request).await;

        // report before the terminal event, so a client that saw the end of the stream
        // also sees the job's final status
        self.coordinator
            .stream_closed(request.job_id, outcome.clone())
            .await;
        match outcome {
            StreamOutcome::Exhausted => {
                let _ = self.subscriber.send(StreamEvent::End).await;
                debug!("stream finished");
            }
            StreamOutcome::Failed(reason) => {
                warn!(%reason, "chunk source failed mid-stream");
                let _ = self.subscriber.send(StreamEvent::Error(reason)).await;
            }
            StreamOutcome::Cancelled => {
                debug!("subscriber went away");
            }
        }
    }

    /// Pace, count and forward every fragment of the chunk source, in order.
    async fn emit(&self, request: &ChunkRequest) -> StreamOutcome {
        let mut chunks = self.source.chunks(request);
        let mut sequence = 0u64;
        loop {
            let item = select! {
                item = chunks.next() => item,
                _ = self.subscriber.closed() => return StreamOutcome::Cancelled,
            };
            let fragment = match item {
                Some(Ok(fragment)) => fragment,
                Some(Err(err)) => return StreamOutcome::Failed(err.to_string()),
                None => return StreamOutcome::Exhausted,
            };

            select! {
                _ = time::sleep(self.pacing) => {}
                _ = self.subscriber.closed() => return StreamOutcome::Cancelled,
            }

            self.coordinator
                .chunk_delivered(request.job_id, sequence, fragment.clone())
                .await;
            if self.subscriber.send(StreamEvent::Data(fragment)).await.is_err() {
                return StreamOutcome::Cancelled;
            }
            sequence += 1;
        }
    }
}
