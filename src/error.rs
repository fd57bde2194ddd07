use std::io;

use thiserror::Error;

/// Failure kinds surfaced by the trainer, the store and the agent.
///
/// Abstraction errors are recovered locally (uniform fallback) by the
/// runtime agent; numeric errors abort the trainer instance, leaving the
/// last completed checkpoint untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("engine protocol error: {0}")]
    EngineProtocol(String),
    #[error("abstraction error: {0}")]
    Abstraction(String),
    #[error("numeric error: {0}")]
    Numeric(String),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl Error {
    /// Process exit code: 2 for bad configuration, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
