//! Storage error types.
//!
//! [`StorageError`] covers every failure the object store capability can
//! report. Each variant belongs to one [`ErrorKind`]:
//!
//! - **Rejection**: the remote service refused the request (missing bucket or
//!   key, name collision, non-empty bucket, permissions, ...).
//! - **Timeout**: the request or its confirmation did not finish within the
//!   scoped deadline.
//! - **Cancelled**: the caller's context was cancelled.
//! - **Transport**: the request never produced a service response
//!   (connection refused, DNS failure, truncated body, ...).
//! - **Io**: reading the upload body or writing the download sink failed.
//! - **Config**: the client was constructed with an invalid configuration.
//!
//! Not-found and transport failures are kept apart so callers can decide
//! between giving up and retrying.
//!
//! # Usage
//!
//! ```
//! use ledgerbox_storage::error::{ErrorKind, StorageError};
//!
//! let err = StorageError::NoSuchKey {
//!     bucket: "acct-42".to_owned(),
//!     key: "jan.csv".to_owned(),
//! };
//! assert_eq!(err.kind(), ErrorKind::Rejection);
//! assert!(err.is_not_found());
//! assert!(!err.is_retryable());
//! ```

use std::fmt;

use ledgerbox_core::Interrupted;

/// The capability operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a bucket and confirm it is visible.
    CreateBucket,
    /// Delete a bucket and confirm it is gone.
    DeleteBucket,
    /// Upload (create or replace) an object.
    UploadObject,
    /// Download an object into a random-access sink.
    DownloadObject,
    /// Open an object as a byte stream.
    FetchObject,
    /// Delete an object and confirm it is gone.
    DeleteObject,
}

impl Operation {
    /// Stable snake_case name, used in log fields and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateBucket => "create_bucket",
            Self::DeleteBucket => "delete_bucket",
            Self::UploadObject => "upload_object",
            Self::DownloadObject => "download_object",
            Self::FetchObject => "fetch_object",
            Self::DeleteObject => "delete_object",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`StorageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote service refused the operation.
    Rejection,
    /// The operation or its confirmation ran past the deadline.
    Timeout,
    /// The caller cancelled the operation.
    Cancelled,
    /// No service response was obtained.
    Transport,
    /// Local body or sink I/O failed.
    Io,
    /// Invalid client configuration.
    Config,
}

/// Object storage error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------
    /// The specified bucket does not exist.
    #[error("the specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The specified key does not exist.
    #[error("the specified key does not exist: {bucket}/{key}")]
    NoSuchKey {
        /// The bucket that was searched.
        bucket: String,
        /// The key that was not found.
        key: String,
    },

    /// The bucket name is already taken.
    #[error("the requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket still holds objects and cannot be deleted.
    #[error("the bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The bucket name that is not empty.
        bucket: String,
    },

    /// Any other refusal by the remote service.
    #[error("{operation} rejected by service: {}", describe_rejection(.code.as_deref(), .message.as_deref(), .status.as_ref().copied()))]
    Rejected {
        /// The operation that was refused.
        operation: Operation,
        /// Service error code, when the service sent one.
        code: Option<String>,
        /// Service error message, when the service sent one.
        message: Option<String>,
        /// HTTP status of the response, when one was received.
        status: Option<u16>,
    },

    // -----------------------------------------------------------------------
    // Deadlines and cancellation
    // -----------------------------------------------------------------------
    /// The deadline elapsed before the operation completed.
    #[error("{operation} did not complete before the deadline")]
    Timeout {
        /// The operation that timed out.
        operation: Operation,
    },

    /// The change never became visible within the allowed probe attempts.
    #[error("{operation} not confirmed after {attempts} existence checks")]
    ConfirmationExhausted {
        /// The operation awaiting confirmation.
        operation: Operation,
        /// Number of probes issued.
        attempts: u32,
    },

    /// The caller's context was cancelled.
    #[error("{operation} cancelled")]
    Cancelled {
        /// The operation that was cancelled.
        operation: Operation,
    },

    // -----------------------------------------------------------------------
    // Transport and local I/O
    // -----------------------------------------------------------------------
    /// The request failed before any service response was received.
    #[error("{operation} transport failure: {source}")]
    Transport {
        /// The operation in flight.
        operation: Operation,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// Reading the upload body or writing the download sink failed.
    #[error("{operation} body i/o failed: {source}")]
    Body {
        /// The operation in flight.
        operation: Operation,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------
    /// The client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Map a context interruption onto the matching error for `operation`.
    #[must_use]
    pub fn interrupted(operation: Operation, reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => Self::Cancelled { operation },
            Interrupted::DeadlineExceeded => Self::Timeout { operation },
        }
    }

    /// Wrap an I/O error raised while reading or writing object bytes.
    #[must_use]
    pub fn body(operation: Operation, source: std::io::Error) -> Self {
        Self::Body { operation, source }
    }

    /// Wrap any error that prevented a service response.
    pub fn transport<E>(operation: Operation, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            operation,
            source: anyhow::Error::new(source),
        }
    }

    /// The coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchBucket { .. }
            | Self::NoSuchKey { .. }
            | Self::BucketAlreadyExists { .. }
            | Self::BucketNotEmpty { .. }
            | Self::Rejected { .. } => ErrorKind::Rejection,
            Self::Timeout { .. } | Self::ConfirmationExhausted { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Body { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the operation ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Whether the bucket or key does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchBucket { .. } | Self::NoSuchKey { .. })
    }

    /// Whether repeating the call could plausibly succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Transport)
    }
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

fn describe_rejection(code: Option<&str>, message: Option<&str>, status: Option<u16>) -> String {
    let mut out = code.unwrap_or("unknown error").to_owned();
    if let Some(status) = status {
        out.push_str(&format!(" (status {status})"));
    }
    if let Some(message) = message {
        out.push_str(": ");
        out.push_str(message);
    }
    out
}
