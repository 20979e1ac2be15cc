use thiserror::Error;

/// A single object that a recursive delete could not remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub reason: String,
}

impl std::fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] aws_sdk_s3::Error),

    #[error("Storage backend error on {key}: {message}")]
    Backend { key: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Recursive delete of {key} left {} object(s) behind", failures.len())]
    PartialDelete {
        key: String,
        failures: Vec<DeleteFailure>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No bucket configured (set BUCKET_NAME or storage.bucket)")]
    MissingBucket,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn backend(key: &str, message: impl std::fmt::Display) -> Self {
        Error::Backend {
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Failures of a single call against the storage backend.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::S3(_) | Error::Backend { .. } | Error::Io(_))
    }

    /// Keys left in place by a partially failed recursive delete.
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            Error::PartialDelete { failures, .. } => {
                failures.iter().map(|f| f.key.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}
