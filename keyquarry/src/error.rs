//! Closed error taxonomy shared by every fallible boundary in the kernel:
//! the store, the pruner, the snapshot engine and the access gate all
//! return this type, so a dispatcher sitting in front of them can map it
//! onto a wire status without knowing which component produced it.

use thiserror::Error;

pub type KeyQuarryResult<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key already exists: {0}")]
    AlreadyExists(String),

    #[error("key {0} is locked by another client")]
    Locked(String),

    #[error("store is in read-only mode")]
    ReadOnly,

    #[error("capacity exhausted: {0}")]
    CapacityExhausted(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable short name for the error kind, used in metrics labels and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::Locked(_) => "locked",
            Error::ReadOnly => "read_only",
            Error::CapacityExhausted(_) => "capacity_exhausted",
            Error::PermissionDenied(_) => "permission_denied",
            Error::Cancelled => "cancelled",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
