use crate::events::JobStatus;
use crate::types::JobId;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    /// The wording is part of the stream protocol: it becomes the payload of the error event.
    #[error("Job not found")]
    NotFound,
    #[error("document is empty")]
    EmptyDocument,
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),
    #[error("job store is full ({capacity} jobs)")]
    StoreFull { capacity: usize },
    #[error("job id {0} is already in use")]
    IdCollision(JobId),
    #[error("job is {0} and its corrections have not all been delivered, no output yet")]
    NotCompleted(JobStatus),
    #[error("job coordinator is no longer running")]
    CoordinatorGone,
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("unsupported document: {0}")]
    Unsupported(String),
    #[error("converter aborted: {0}")]
    Aborted(String),
}

/// A chunk source failed while a stream was in flight.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type Result<T> = result::Result<T, JobError>;
