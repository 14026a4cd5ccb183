use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures reported by a coordination store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no node at {0}")]
    NotFound(String),

    /// Transport failures, timeouts and an unavailable cluster. Retried at connect time.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Authentication, permission and argument errors. Never retried.
    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("store handle is closed")]
    Closed,

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<etcd_client::Error> for StoreError {
    fn from(err: etcd_client::Error) -> Self {
        use etcd_client::Error as E;

        match err {
            E::TransportError(e) => StoreError::Unavailable(e.to_string()),
            E::IoError(e) => StoreError::Unavailable(e.to_string()),
            E::InvalidArgs(msg) => StoreError::Rejected(msg),
            E::InvalidUri(e) => StoreError::Rejected(e.to_string()),
            E::GRpcStatus(status) => {
                StoreError::from_grpc_code(status.code() as i32, status.message().to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl StoreError {
    /// Codes from the gRPC status table: 3 invalid argument, 7 permission
    /// denied, 16 unauthenticated; 1 cancelled (a client request timeout
    /// surfaces this way), 4 deadline exceeded, 14 unavailable.
    fn from_grpc_code(code: i32, message: String) -> Self {
        match code {
            3 | 7 | 16 => StoreError::Rejected(message),
            1 | 4 | 14 => StoreError::Unavailable(message),
            _ => StoreError::Backend(message),
        }
    }
}

/// Malformed property payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unterminated escape sequence at line {line}")]
    UnterminatedEscape { line: usize },

    #[error("missing key/value delimiter at line {line}")]
    MissingDelimiter { line: usize },

    #[error("invalid \\u escape at line {line}")]
    InvalidUnicodeEscape { line: usize },

    #[error("payload is not valid UTF-8")]
    InvalidEncoding,
}

/// Step of a publish or load at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    EnsureNode,
    Write,
    Check,
    Read,
    Decode,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::EnsureNode => "ensure node",
            SyncStage::Write => "write",
            SyncStage::Check => "check",
            SyncStage::Read => "read",
            SyncStage::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Underlying cause of a failed load.
#[derive(Error, Debug)]
pub enum LoadFailure {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("connection error: {0}")]
    Connection(#[source] StoreError),

    #[error("sync engine is not connected to a store")]
    NotInitialized,

    #[error("cannot resolve store path: {0} is missing")]
    IdentityUnresolved(&'static str),

    #[error("invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("publish to {path} failed during {stage}: {source}")]
    PublishFailed {
        path: String,
        stage: SyncStage,
        #[source]
        source: StoreError,
    },

    #[error("load from {path} failed during {stage}: {source}")]
    LoadFailed {
        path: String,
        stage: SyncStage,
        #[source]
        source: LoadFailure,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}
