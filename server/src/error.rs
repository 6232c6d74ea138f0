use std::{io, result};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to install tracing subscriber: {0}")]
    Logging(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
}

pub type Result<T> = result::Result<T, ServeError>;
