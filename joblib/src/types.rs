use uuid::Uuid;

pub type JobId = Uuid;
pub type Fragment = String;
pub type Markup = String;
pub type Frame = bytes::Bytes;
