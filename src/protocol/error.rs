use thiserror::Error;

/// Protocol-level errors for datagram encoding/decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Bad frame: expected {expected} fields, got {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("Invalid {field} field: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Datagram too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
