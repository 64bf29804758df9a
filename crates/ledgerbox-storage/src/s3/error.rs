//! Mapping of SDK failures onto [`StorageError`].
//!
//! A service response becomes a rejection, a timeout anywhere in the SDK
//! stack becomes [`StorageError::Timeout`], and everything else that never
//! produced a response becomes [`StorageError::Transport`].

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;

use crate::error::{Operation, StorageError};

/// Fields of an S3 error response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ServiceFailure {
    pub code: Option<String>,
    pub message: Option<String>,
    pub status: Option<u16>,
}

impl ServiceFailure {
    /// Turn the response into the matching rejection.
    ///
    /// HEAD responses carry no body, so a bare 404 is attributed to the key
    /// when one was addressed and to the bucket otherwise.
    pub(crate) fn into_error(
        self,
        operation: Operation,
        bucket: &str,
        key: Option<&str>,
    ) -> StorageError {
        let no_such_bucket = || StorageError::NoSuchBucket {
            bucket: bucket.to_owned(),
        };
        let no_such_key = |key: &str| StorageError::NoSuchKey {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        };

        match self.code.as_deref() {
            Some("NoSuchBucket") => no_such_bucket(),
            Some("NoSuchKey") => no_such_key(key.unwrap_or_default()),
            Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou") => {
                StorageError::BucketAlreadyExists {
                    bucket: bucket.to_owned(),
                }
            }
            Some("BucketNotEmpty") => StorageError::BucketNotEmpty {
                bucket: bucket.to_owned(),
            },
            None | Some("NotFound") if self.status == Some(404) => {
                key.map_or_else(no_such_bucket, no_such_key)
            }
            _ => StorageError::Rejected {
                operation,
                code: self.code,
                message: self.message,
                status: self.status,
            },
        }
    }
}

/// Classify a failed SDK call made on behalf of `operation`.
pub(crate) fn classify<E>(
    err: SdkError<E, HttpResponse>,
    operation: Operation,
    bucket: &str,
    key: Option<&str>,
) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            let service = context.err();
            ServiceFailure {
                code: service.code().map(str::to_owned),
                message: service.message().map(str::to_owned),
                status: Some(status),
            }
            .into_error(operation, bucket, key)
        }
        SdkError::TimeoutError(_) => StorageError::Timeout { operation },
        SdkError::DispatchFailure(ref failure) if failure.is_timeout() => {
            StorageError::Timeout { operation }
        }
        other => StorageError::transport(operation, other),
    }
}

/// Whether a HEAD probe failed only because the resource is absent.
pub(crate) fn is_absent<E>(err: &SdkError<E, HttpResponse>) -> bool {
    matches!(err, SdkError::ServiceError(context) if context.raw().status().as_u16() == 404)
}
