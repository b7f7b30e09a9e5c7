//! Error taxonomy for the candidate data store.
//!
//! One enum covers both backends. Listing faults and write faults propagate
//! through these variants; per-document read/parse faults inside a session
//! are tolerated at the call site and never surface here.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unknown backend kind at construction. Fatal, fails fast.
    #[error("unsupported storage backend `{0}` (expected `filesystem` or `s3`)")]
    UnsupportedBackend(String),

    #[error("invalid candidate id `{id}`: {reason}")]
    InvalidCandidateId { id: String, reason: String },

    #[error("invalid storage key `{0}`")]
    InvalidKey(String),

    #[error("operation not supported on this backend: {0}")]
    UnsupportedOperation(&'static str),

    #[error("object `{key}` not found")]
    ObjectNotFound { key: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP transport failure talking to the object store.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The object store answered with a non-success status.
    #[error("object store {endpoint} returned {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
