use crate::convert::Conversion;
use crate::errors::{JobError, Result};
use crate::events::{JobSnapshot, JobStatus};
use crate::types::{Fragment, JobId, Markup};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct JobRecord {
    id: JobId,
    status: JobStatus,
    chunks_sent: u64,
    created_at: Instant,
    result: Option<Arc<Conversion>>,
    delivered: Vec<Fragment>,
    exhausted: bool,
    active_streams: usize,
}

impl JobRecord {
    fn new(id: JobId, result: Option<Arc<Conversion>>, now: Instant) -> Self {
        Self {
            id,
            status: JobStatus::Processing,
            chunks_sent: 0,
            created_at: now,
            result,
            delivered: Vec::new(),
            exhausted: false,
            active_streams: 0,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    pub fn result(&self) -> Option<&Arc<Conversion>> {
        self.result.as_ref()
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Move the status forward. Returns false if the record was already terminal.
    pub fn advance(&mut self, to: JobStatus) -> bool {
        if self.status.is_terminal() || to == JobStatus::Processing {
            return false;
        }
        self.status = to;
        true
    }

    /// Apply the timer rule (if any) and report the current state.
    pub fn observe(&mut self, now: Instant, completion_after: Option<Duration>) -> JobSnapshot {
        if let Some(threshold) = completion_after {
            if self.age(now) > threshold {
                self.advance(JobStatus::Completed);
            }
        }
        JobSnapshot {
            job_id: self.id,
            status: self.status,
            chunks_sent: self.chunks_sent,
        }
    }

    /// Count delivery of the fragment at `sequence` (zero based).
    ///
    /// A stream always starts again from the first fragment, so a replayed sequence number
    /// is not counted twice.
    pub fn record_delivery(&mut self, sequence: u64, fragment: Fragment) {
        if sequence == self.delivered.len() as u64 {
            self.delivered.push(fragment);
        }
        self.chunks_sent = self.chunks_sent.max(sequence + 1);
    }

    /// A stream ran the chunk source dry, so every fragment has been delivered at least once.
    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// The corrected document, assembled from every delivered fragment.
    ///
    /// `None` until some stream has exhausted the chunk source, whatever the status says.
    pub fn output(&self) -> Option<Markup> {
        self.exhausted.then(|| self.delivered.concat())
    }

    pub fn stream_opened(&mut self) {
        self.active_streams += 1;
    }

    pub fn stream_closed(&mut self) {
        self.active_streams = self.active_streams.saturating_sub(1);
    }

    pub fn is_streaming(&self) -> bool {
        self.active_streams > 0
    }
}

/// Registry of every live job, keyed by id.
///
/// Owned by the coordinator actor, which is the only writer.
#[derive(Default)]
pub struct JobStore {
    jobs: HashMap<JobId, JobRecord>,
    capacity: Option<usize>,
}

impl JobStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            jobs: HashMap::new(),
            capacity,
        }
    }

    pub fn insert(
        &mut self,
        id: JobId,
        result: Option<Arc<Conversion>>,
        now: Instant,
    ) -> Result<&mut JobRecord> {
        if let Some(capacity) = self.capacity {
            if self.jobs.len() >= capacity {
                return Err(JobError::StoreFull { capacity });
            }
        }
        if self.jobs.contains_key(&id) {
            return Err(JobError::IdCollision(id));
        }
        Ok(self
            .jobs
            .entry(id)
            .or_insert_with(|| JobRecord::new(id, result, now)))
    }

    pub fn get(&self, id: &JobId) -> Result<&JobRecord> {
        self.jobs.get(id).ok_or(JobError::NotFound)
    }

    pub fn get_mut(&mut self, id: &JobId) -> Result<&mut JobRecord> {
        self.jobs.get_mut(id).ok_or(JobError::NotFound)
    }

    /// Drop every job older than `ttl`, except those with a stream in flight.
    pub fn evict_expired(&mut self, now: Instant, ttl: Duration) -> Vec<JobId> {
        let expired: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| !job.is_streaming() && job.age(now) > ttl)
            .map(JobRecord::id)
            .collect();
        for id in &expired {
            self.jobs.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        let mut store = JobStore::default();
        let id = JobId::new_v4();
        let job = store.insert(id, None, Instant::now()).unwrap();
        assert_eq!(job.status(), JobStatus::Processing);
        assert!(!job.advance(JobStatus::Processing));
        assert!(job.advance(JobStatus::Completed));
        assert!(!job.advance(JobStatus::Failed));
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn replayed_deliveries_are_counted_once() {
        let mut store = JobStore::default();
        let id = JobId::new_v4();
        let job = store.insert(id, None, Instant::now()).unwrap();
        for _ in 0..2 {
            job.record_delivery(0, "<p>a</p>".into());
            job.record_delivery(1, "<p>b</p>".into());
        }
        assert_eq!(job.chunks_sent(), 2);
        assert_eq!(job.output(), None);
        job.mark_exhausted();
        assert_eq!(job.output().as_deref(), Some("<p>a</p><p>b</p>"));
    }

    #[test]
    fn capacity_and_collisions() {
        let mut store = JobStore::new(Some(1));
        let id = JobId::new_v4();
        let now = Instant::now();
        store.insert(id, None, now).unwrap();
        assert!(matches!(
            store.insert(JobId::new_v4(), None, now),
            Err(JobError::StoreFull { capacity: 1 })
        ));

        let mut store = JobStore::default();
        store.insert(id, None, now).unwrap();
        assert!(matches!(
            store.insert(id, None, now),
            Err(JobError::IdCollision(dup)) if dup == id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_rule_completes_old_jobs() {
        let mut store = JobStore::default();
        let id = JobId::new_v4();
        store.insert(id, None, Instant::now()).unwrap();
        let threshold = Some(Duration::from_secs(10));

        let job = store.get_mut(&id).unwrap();
        assert_eq!(job.observe(Instant::now(), threshold).status, JobStatus::Processing);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(job.observe(Instant::now(), threshold).status, JobStatus::Completed);
        assert_eq!(job.observe(Instant::now(), threshold).status, JobStatus::Completed);
        // completed by the clock alone, nothing to assemble yet
        assert_eq!(job.output(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_spares_streaming_jobs() {
        let mut store = JobStore::default();
        let idle = JobId::new_v4();
        let busy = JobId::new_v4();
        store.insert(idle, None, Instant::now()).unwrap();
        store.insert(busy, None, Instant::now()).unwrap().stream_opened();

        tokio::time::advance(Duration::from_secs(31)).await;
        let evicted = store.evict_expired(Instant::now(), Duration::from_secs(30));
        assert_eq!(evicted, vec![idle]);
        assert!(matches!(store.get(&idle), Err(JobError::NotFound)));
        assert_eq!(store.len(), 1);

        store.get_mut(&busy).unwrap().stream_closed();
        assert_eq!(
            store.evict_expired(Instant::now(), Duration::from_secs(30)),
            vec![busy]
        );
        assert_eq!(store.len(), 0);
    }
}
