use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("size exceeded: {0}")]
    SizeExceeded(String),

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("link depth exceeded: {0}")]
    LinkDepthExceeded(String),

    #[error("I/O failure: {0}")]
    IoFailure(#[from] io::Error),
}

impl Error {
    // InvariantViolation and LinkDepthExceeded are fatal: no self-heal attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvariantViolation(_) | Error::LinkDepthExceeded(_))
    }
}
