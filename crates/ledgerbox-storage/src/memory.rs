//! In-memory object store.
//!
//! [`MemoryBucketClient`] implements [`BucketClient`] without any remote
//! service, so services built on the capability can be tested in isolation.
//! It is immediately consistent and reports the same errors as the S3 client
//! for the same situations. An optional fixed latency is applied before each
//! operation to exercise deadline handling.
//!
//! Buckets live in a `DashMap`; each bucket guards its objects with a
//! `parking_lot::RwLock`. Clones share state.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ledgerbox_core::Context;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::body::{ObjectBody, ObjectReader, WriteAt};
use crate::client::{BucketClient, bounded};
use crate::error::{Operation, StorageError, StorageResult};

/// A bucket and its objects.
#[derive(Debug)]
struct MemoryBucket {
    created: DateTime<Utc>,
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryBucket {
    fn new() -> Self {
        Self {
            created: Utc::now(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

/// In-memory [`BucketClient`].
///
/// # Examples
///
/// ```
/// use ledgerbox_core::Context;
/// use ledgerbox_storage::{BucketClient, MemoryBucketClient, ObjectBody};
///
/// # tokio_test::block_on(async {
/// let store = MemoryBucketClient::new();
/// let ctx = Context::background();
///
/// store.create_bucket(&ctx, "acct-42").await.unwrap();
/// let location = store
///     .upload_object(&ctx, "acct-42", "jan.csv", ObjectBody::from_static(b"date,amount\n"))
///     .await
///     .unwrap();
/// assert_eq!(location, "memory://acct-42/jan.csv");
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MemoryBucketClient {
    buckets: Arc<DashMap<String, MemoryBucket>>,
    latency: Duration,
}

impl std::fmt::Debug for MemoryBucketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBucketClient")
            .field("bucket_count", &self.buckets.len())
            .field("latency", &self.latency)
            .finish()
    }
}

impl MemoryBucketClient {
    /// Create an empty store with no simulated latency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation by `latency` before it touches any state.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Whether `bucket` exists.
    #[must_use]
    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    /// Bucket names with creation times, sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut buckets: Vec<(String, DateTime<Utc>)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created))
            .collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));
        buckets
    }

    /// Keys stored in `bucket`, in lexicographic order.
    #[must_use]
    pub fn list_keys(&self, bucket: &str) -> Option<Vec<String>> {
        self.buckets
            .get(bucket)
            .map(|b| b.objects.read().keys().cloned().collect())
    }

    /// Remove every bucket and object.
    pub fn reset(&self) {
        debug!("resetting in-memory object store");
        self.buckets.clear();
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn read_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })?;
        let objects = entry.objects.read();
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NoSuchKey {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })
    }
}

#[async_trait]
impl BucketClient for MemoryBucketClient {
    async fn create_bucket(&self, ctx: &Context, bucket: &str) -> StorageResult<()> {
        bounded(ctx, Operation::CreateBucket, async {
            self.simulate_latency().await;
            match self.buckets.entry(bucket.to_owned()) {
                dashmap::mapref::entry::Entry::Occupied(_) => Err(StorageError::BucketAlreadyExists {
                    bucket: bucket.to_owned(),
                }),
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(MemoryBucket::new());
                    info!(bucket = %bucket, "bucket created");
                    Ok(())
                }
            }
        })
        .await
    }

    async fn delete_bucket(&self, ctx: &Context, bucket: &str) -> StorageResult<()> {
        bounded(ctx, Operation::DeleteBucket, async {
            self.simulate_latency().await;
            let removed = self
                .buckets
                .remove_if(bucket, |_, b| b.objects.read().is_empty());
            if removed.is_some() {
                info!(bucket = %bucket, "bucket deleted");
                return Ok(());
            }
            if self.buckets.contains_key(bucket) {
                Err(StorageError::BucketNotEmpty {
                    bucket: bucket.to_owned(),
                })
            } else {
                Err(StorageError::NoSuchBucket {
                    bucket: bucket.to_owned(),
                })
            }
        })
        .await
    }

    async fn upload_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> StorageResult<String> {
        let operation = Operation::UploadObject;
        bounded(ctx, operation, async {
            self.simulate_latency().await;
            if !self.buckets.contains_key(bucket) {
                return Err(StorageError::NoSuchBucket {
                    bucket: bucket.to_owned(),
                });
            }

            let data = body
                .into_bytes()
                .await
                .map_err(|e| StorageError::body(operation, e))?;
            let size = data.len();

            let entry = self
                .buckets
                .get(bucket)
                .ok_or_else(|| StorageError::NoSuchBucket {
                    bucket: bucket.to_owned(),
                })?;
            entry.objects.write().insert(key.to_owned(), data);

            debug!(bucket = %bucket, key = %key, size, "upload_object completed");
            Ok(format!("memory://{bucket}/{key}"))
        })
        .await
    }

    async fn download_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        sink: &mut dyn WriteAt,
    ) -> StorageResult<u64> {
        let operation = Operation::DownloadObject;
        bounded(ctx, operation, async {
            self.simulate_latency().await;
            let data = self.read_object(bucket, key)?;
            if !data.is_empty() {
                sink.write_at(&data, 0)
                    .map_err(|e| StorageError::body(operation, e))?;
            }
            debug!(bucket = %bucket, key = %key, size = data.len(), "download_object completed");
            Ok(data.len() as u64)
        })
        .await
    }

    async fn fetch_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectReader> {
        bounded(ctx, Operation::FetchObject, async {
            self.simulate_latency().await;
            let data = self.read_object(bucket, key)?;
            let length = data.len() as u64;
            Ok(ObjectReader::new(Cursor::new(data), Some(length)))
        })
        .await
    }

    async fn delete_object(&self, ctx: &Context, bucket: &str, key: &str) -> StorageResult<()> {
        bounded(ctx, Operation::DeleteObject, async {
            self.simulate_latency().await;
            let entry = self
                .buckets
                .get(bucket)
                .ok_or_else(|| StorageError::NoSuchBucket {
                    bucket: bucket.to_owned(),
                })?;
            if entry.objects.write().remove(key).is_none() {
                return Err(StorageError::NoSuchKey {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                });
            }
            debug!(bucket = %bucket, key = %key, "delete_object completed");
            Ok(())
        })
        .await
    }
}
