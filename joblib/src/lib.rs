mod actors;
pub mod config;
pub mod convert;
pub mod errors;
pub mod events;
pub mod source;
mod store;
pub mod types;

// re-export the job coord handle as if it is the job coordinator itself.
pub use actors::coordinator::JobCoordinatorHandle as JobCoordinator;
pub use actors::coordinator::Submission;
pub use config::JobConfig;
pub use convert::{Conversion, Converter};
pub use errors::{ConversionError, JobError, SourceError};
pub use events::{JobSnapshot, JobStatus, StreamEvent};
pub use source::{ChunkRequest, ChunkSource, ChunkStream, FixedChunks, MarkupBlocks};
