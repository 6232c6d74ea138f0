use super::messages::{CoordinatorMessage, StreamOutcome};
use crate::config::JobConfig;
use crate::convert::Conversion;
use crate::errors::{self, JobError};
use crate::events::{JobSnapshot, JobStatus};
use crate::source::ChunkRequest;
use crate::store::JobStore;
use crate::types::{Fragment, JobId, Markup};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio::select;
use tracing::{debug, info, warn};

/// Single owner of the job store. Every read and write of a job record goes through this
/// actor's inbox, so status polls and stream progress updates are serialized per job.
pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    store: JobStore,
    config: JobConfig,
}

impl JobCoordinator {
    pub fn spawn(inbox: mpsc::Receiver<CoordinatorMessage>, config: JobConfig) {
        let actor = Self {
            inbox,
            store: JobStore::new(config.max_jobs),
            config,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        let mut sweep = time::interval(self.config.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    match maybe_msg {
                        Some(msg) => self.handle(msg),
                        // every handle dropped
                        None => break,
                    }
                }
                _ = sweep.tick(), if self.config.retention.is_some() => {
                    self.evict_expired();
                }
            }
        }
        debug!(jobs = self.store.len(), "job coordinator exiting");
    }

    fn handle(&mut self, msg: CoordinatorMessage) {
        use self::CoordinatorMessage::*;
        match msg {
            CreateJob { result, response } => {
                let _ = response.send(self.create_job(result));
            }
            GetStatus { job_id, response } => {
                let _ = response.send(self.get_status(job_id));
            }
            GetOutput { job_id, response } => {
                let _ = response.send(self.get_output(job_id));
            }
            OpenStream { job_id, response } => {
                self.open_stream(job_id, response);
            }
            ChunkDelivered {
                job_id,
                sequence,
                fragment,
            } => {
                self.chunk_delivered(job_id, sequence, fragment);
            }
            StreamClosed { job_id, outcome } => {
                self.stream_closed(job_id, outcome);
            }
        }
    }

    fn create_job(&mut self, result: Option<Arc<Conversion>>) -> errors::Result<JobId> {
        let job_id = uuid::Uuid::new_v4();
        match self.store.insert(job_id, result, Instant::now()) {
            Ok(_) => {
                info!(%job_id, jobs = self.store.len(), "job created");
                Ok(job_id)
            }
            Err(err) => {
                warn!(%job_id, %err, "failed to create job");
                Err(err)
            }
        }
    }

    fn get_status(&mut self, job_id: JobId) -> errors::Result<JobSnapshot> {
        let completion_after = self.config.completion_after;
        let job = self.store.get_mut(&job_id)?;
        let before = job.status();
        let snapshot = job.observe(Instant::now(), completion_after);
        if snapshot.status != before {
            info!(%job_id, status = %snapshot.status, "job completed by timer");
        }
        Ok(snapshot)
    }

    fn get_output(&self, job_id: JobId) -> errors::Result<Markup> {
        let job = self.store.get(&job_id)?;
        match (job.status(), job.output()) {
            (JobStatus::Completed, Some(markup)) => Ok(markup),
            (status, _) => Err(JobError::NotCompleted(status)),
        }
    }

    fn open_stream(
        &mut self,
        job_id: JobId,
        response: oneshot::Sender<errors::Result<ChunkRequest>>,
    ) {
        let request = self.store.get_mut(&job_id).map(|job| {
            job.stream_opened();
            ChunkRequest {
                job_id,
                result: job.result().cloned(),
            }
        });
        if let Err(request) = response.send(request) {
            // the publisher task went away before it could take the lookup
            if request.is_ok() {
                self.stream_closed(job_id, StreamOutcome::Cancelled);
            }
        }
    }

    fn chunk_delivered(&mut self, job_id: JobId, sequence: u64, fragment: Fragment) {
        match self.store.get_mut(&job_id) {
            Ok(job) => job.record_delivery(sequence, fragment),
            Err(_) => warn!(%job_id, sequence, "chunk delivered for unknown job"),
        }
    }

    fn stream_closed(&mut self, job_id: JobId, outcome: StreamOutcome) {
        let job = match self.store.get_mut(&job_id) {
            Ok(job) => job,
            Err(_) => return,
        };
        job.stream_closed();
        match outcome {
            StreamOutcome::Exhausted => {
                job.mark_exhausted();
                if job.advance(JobStatus::Completed) {
                    info!(%job_id, chunks_sent = job.chunks_sent(), "job completed");
                }
            }
            StreamOutcome::Failed(reason) => {
                if job.advance(JobStatus::Failed) {
                    warn!(%job_id, %reason, "job failed");
                }
            }
            StreamOutcome::Cancelled => {
                debug!(%job_id, chunks_sent = job.chunks_sent(), "stream cancelled");
            }
        }
    }

    fn evict_expired(&mut self) {
        if let Some(ttl) = self.config.retention {
            let evicted = self.store.evict_expired(Instant::now(), ttl);
            if !evicted.is_empty() {
                info!(
                    evicted = evicted.len(),
                    remaining = self.store.len(),
                    "evicted expired jobs"
                );
            }
        }
    }
}
