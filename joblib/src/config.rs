use std::time::Duration;

pub const DEFAULT_MESSAGE_CAPACITY: usize = 64;
pub const DEFAULT_STREAM_BUFFER: usize = 16;
pub const DEFAULT_PACING: Duration = Duration::from_secs(2);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Tuning knobs for a [`JobCoordinator`](crate::JobCoordinator).
#[derive(Clone, Debug)]
pub struct JobConfig {
    /// Capacity of the coordinator's inbox. Limits the build-up of inbound messages.
    pub message_capacity: usize,
    /// Number of events buffered per stream before the publisher waits on the subscriber.
    pub stream_buffer: usize,
    /// Delay before each fragment, unless the chunk source specifies its own.
    pub pacing: Duration,
    /// Legacy timer rule: a status query on a job older than this marks it completed.
    /// `None` leaves completion entirely to the stream publisher.
    pub completion_after: Option<Duration>,
    /// Jobs older than this are evicted on the next sweep. `None` keeps jobs for the
    /// life of the process.
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
    /// Upper bound on live jobs; creating more fails with `StoreFull`.
    pub max_jobs: Option<usize>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            pacing: DEFAULT_PACING,
            completion_after: None,
            retention: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_jobs: None,
        }
    }
}

impl JobConfig {
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_completion_after(mut self, threshold: Duration) -> Self {
        self.completion_after = Some(threshold);
        self
    }

    pub fn with_retention(mut self, ttl: Duration, sweep_interval: Duration) -> Self {
        self.retention = Some(ttl);
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = Some(max_jobs);
        self
    }

    // tokio panics on zero-capacity channels and zero-period intervals
    pub(crate) fn message_capacity(&self) -> usize {
        self.message_capacity.max(1)
    }

    pub(crate) fn stream_buffer(&self) -> usize {
        self.stream_buffer.max(1)
    }

    pub(crate) fn sweep_interval(&self) -> Duration {
        self.sweep_interval.max(Duration::from_millis(1))
    }
}
