pub(crate) mod coordinator;
mod publisher;
