use crate::config::ConfigError;
use crate::protocol::{ProtocolError, RequestId};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reply listener stopped")]
    ListenerGone,

    #[error("No free in-flight slot (capacity {0})")]
    InFlightFull(usize),

    #[error("Probe {id} abandoned after {attempts} attempts")]
    RetriesExhausted { id: RequestId, attempts: u32 },

    #[error("{0} probe engine panicked")]
    EnginePanicked(&'static str),

    #[error("Measurement error: {0}")]
    Measurement(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
