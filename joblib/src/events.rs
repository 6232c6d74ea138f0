use crate::types::{Fragment, Frame, JobId};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Payload carried by the end event.
pub const END_PAYLOAD: &str = "finished";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change status again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time view of a job record.
#[derive(Clone, Debug)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub chunks_sent: u64,
}

/// One event of a correction stream.
///
/// A stream is zero or more `Data` events followed by exactly one terminal event,
/// either `End` or `Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Data(Fragment),
    Error(String),
    End,
}

impl StreamEvent {
    /// The `event:` field of the frame. Data events use the default (unnamed) event type.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            StreamEvent::Data(_) => None,
            StreamEvent::Error(_) => Some("error"),
            StreamEvent::End => Some("end"),
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            StreamEvent::Data(fragment) => fragment,
            StreamEvent::Error(message) => message,
            StreamEvent::End => END_PAYLOAD,
        }
    }

    /// Encode the event as an event-stream frame.
    ///
    /// Every payload line gets its own `data:` field so that a line break inside a fragment
    /// can't terminate the frame early. `\r\n`, `\r` and `\n` all count as line breaks, and
    /// the frame always ends with a blank line.
    pub fn to_frame(&self) -> Frame {
        let payload = self.payload().replace("\r\n", "\n");
        let mut buf = BytesMut::with_capacity(payload.len() + 32);
        if let Some(name) = self.name() {
            buf.put_slice(b"event: ");
            buf.put_slice(name.as_bytes());
            buf.put_u8(b'\n');
        }
        for line in payload.split(|c: char| c == '\n' || c == '\r') {
            buf.put_slice(b"data: ");
            buf.put_slice(line.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.put_u8(b'\n');
        buf.freeze()
    }
}
