//! Error types for lql

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LqlError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    TableNotFound(String),

    #[error("Invalid request method: {0}")]
    InvalidMethod(String),

    #[error("{0}")]
    IncompleteRequest(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error("{0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LqlError {
    /// Prefix the message of a request error with the header it came from.
    pub fn in_header(self, header: &str) -> Self {
        match self {
            LqlError::BadRequest(msg) => LqlError::BadRequest(format!("{}: {}", header, msg)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, LqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_header_prefixes_bad_request() {
        let err = LqlError::BadRequest("missing argument".to_string()).in_header("Limit");
        assert_eq!(err.to_string(), "Limit: missing argument");
    }

    #[test]
    fn test_in_header_keeps_other_errors() {
        let err = LqlError::Gateway("down".to_string()).in_header("Limit");
        assert_eq!(err.to_string(), "down");
    }
}
