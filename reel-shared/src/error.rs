use std::fmt;

#[derive(Debug)]
pub enum ReelError {
    Configuration(String),
    /// Writing or reading durable storage failed.
    IOError(String),
    NotFound(String),
    Conflict(String),
    DatabaseError(String),
    /// Missing or malformed input, detected before any side effect.
    ValidationError(String),
    Unauthorized(String),
    /// The external video transcoder failed; the upload is aborted.
    Transcode(String),
    Other(String),
}

impl fmt::Display for ReelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReelError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            ReelError::IOError(msg) => write!(f, "storage error: {msg}"),
            ReelError::NotFound(msg) => write!(f, "not found: {msg}"),
            ReelError::Conflict(msg) => write!(f, "conflict: {msg}"),
            ReelError::DatabaseError(msg) => write!(f, "database error: {msg}"),
            ReelError::ValidationError(msg) => write!(f, "validation error: {msg}"),
            ReelError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            ReelError::Transcode(msg) => write!(f, "transcode failed: {msg}"),
            ReelError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ReelError {}

impl From<std::io::Error> for ReelError {
    fn from(err: std::io::Error) -> Self {
        ReelError::IOError(err.to_string())
    }
}

impl From<sea_orm::DbErr> for ReelError {
    fn from(err: sea_orm::DbErr) -> Self {
        ReelError::DatabaseError(err.to_string())
    }
}
