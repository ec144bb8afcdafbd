use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Outgoing payload could not be serialized
    #[error("encoding {context}: {message}")]
    Encoding { context: &'static str, message: String },

    /// Incoming multipart body is malformed or a part could not be read
    #[error("decoding {context}: {message}")]
    Decoding { context: &'static str, message: String },

    /// Connection failure, timeout or protocol error while talking to a server
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Server answered with a status other than the one the transport requires
    #[error("unexpected response status: {status} [{body}]")]
    UnexpectedStatus { status: StatusCode, body: String },

    /// One or more attachment writes failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// RPC connection is not in a ready state
    #[error("connectivity error: {message}")]
    Connectivity { message: String },

    /// Configuration rejected during validation
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn encoding(context: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Encoding {
            context,
            message: err.to_string(),
        }
    }

    pub fn decoding(context: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Decoding {
            context,
            message: err.to_string(),
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        Error::Transport { message: err.to_string() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config { message: message.into() }
    }
}

/// A single attachment that could not be persisted.
#[derive(Debug)]
pub struct StorageFailure {
    pub file_name: String,
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Every persistence failure of one service call, collected rather than short-circuited.
#[derive(ThisError, Debug)]
#[error("{} attachment(s) failed to save: {}", .failures.len(), describe(.failures))]
pub struct StorageError {
    pub failures: Vec<StorageFailure>,
}

fn describe(failures: &[StorageFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("failed to create file {}: {}", f.path.display(), f.source))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The HTTP boundary never leaks internal error text: every failure is an empty 500.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Decoding { .. } | Error::Encoding { .. } => {
                tracing::warn!("Rejected hello request: {}", self);
            }
            _ => {
                tracing::error!("Internal service error: {:#}", self);
            }
        }

        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

/// The RPC boundary reports a generic internal status carrying the original message.
impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        tonic::Status::internal(err.to_string())
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
