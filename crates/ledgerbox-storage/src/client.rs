//! The object store capability.
//!
//! Account and transaction services depend on [`BucketClient`] only, usually
//! as `Arc<dyn BucketClient>`, so they can run against
//! [`S3BucketClient`](crate::S3BucketClient) in production and
//! [`MemoryBucketClient`](crate::MemoryBucketClient) in tests.
//!
//! # Object safety
//!
//! The trait uses `#[async_trait]` so it stays object-safe for dynamic
//! dispatch.

use std::future::Future;

use async_trait::async_trait;
use ledgerbox_core::Context;

use crate::body::{ObjectBody, ObjectReader, WriteAt};
use crate::error::{Operation, StorageError, StorageResult};

/// Bucket and object lifecycle operations against a remote store.
///
/// Every operation is bounded by `ctx` and, for concrete clients, by their
/// own default timeout. Bucket names and object keys are passed through
/// untouched. Implementations never retry.
#[async_trait]
pub trait BucketClient: Send + Sync + std::fmt::Debug {
    /// Create `bucket` and wait until it is visible.
    async fn create_bucket(&self, ctx: &Context, bucket: &str) -> StorageResult<()>;

    /// Delete the empty `bucket` and wait until it is gone.
    async fn delete_bucket(&self, ctx: &Context, bucket: &str) -> StorageResult<()>;

    /// Create or replace `key` in `bucket` with the full contents of `body`.
    ///
    /// Returns a location descriptor for the stored object.
    async fn upload_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> StorageResult<String>;

    /// Write the object into `sink`, returning the number of bytes written.
    async fn download_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        sink: &mut dyn WriteAt,
    ) -> StorageResult<u64>;

    /// Open the object as a stream positioned at its first byte.
    ///
    /// The deadline covers opening the stream; reading it is up to the caller.
    async fn fetch_object(&self, ctx: &Context, bucket: &str, key: &str)
    -> StorageResult<ObjectReader>;

    /// Delete `key` from `bucket` and wait until it is gone.
    ///
    /// Fails with [`StorageError::NoSuchKey`] if the object does not exist.
    async fn delete_object(&self, ctx: &Context, bucket: &str, key: &str) -> StorageResult<()>;
}

/// Run `fut` under `ctx`, mapping an interruption to the error for `operation`.
pub(crate) async fn bounded<T, F>(ctx: &Context, operation: Operation, fut: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    ctx.run(fut)
        .await
        .map_err(|reason| StorageError::interrupted(operation, reason))?
}
