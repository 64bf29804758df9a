//! Integration tests for Ledgerbox object storage.
//!
//! These tests require an S3-compatible server at `localhost:4566` (override
//! with `S3_ENDPOINT_URL`). They are marked `#[ignore]` so they don't run
//! during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p ledgerbox-integration -- --ignored
//! ```

use std::sync::Once;
use std::time::Duration;

use anyhow::Context as _;
use ledgerbox_core::Context;
use ledgerbox_storage::wait::WaitPolicy;
use ledgerbox_storage::{BucketClient, S3BucketClient, StorageConfig};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Storage configuration pointing at the local server.
///
/// Confirmation polling is tightened so a slow server fails fast.
#[must_use]
pub fn storage_config() -> StorageConfig {
    StorageConfig::builder()
        .region("us-east-1")
        .access_key_id("test")
        .secret_access_key("test")
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .wait(
            WaitPolicy::builder()
                .interval(Duration::from_millis(200))
                .max_attempts(25)
                .build(),
        )
        .build()
}

/// Create a storage client pointing at the local server.
pub async fn storage_client() -> anyhow::Result<S3BucketClient> {
    init_tracing();
    S3BucketClient::connect(storage_config())
        .await
        .context("failed to build storage client")
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a bucket and return its name. Caller is responsible for cleanup.
pub async fn create_test_bucket(client: &dyn BucketClient, prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    client
        .create_bucket(&Context::background(), &name)
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Delete the listed objects, then the bucket. Errors are ignored.
pub async fn cleanup_bucket(client: &dyn BucketClient, bucket: &str, keys: &[&str]) {
    let ctx = Context::background();
    for key in keys {
        let _ = client.delete_object(&ctx, bucket, key).await;
    }
    let _ = client.delete_bucket(&ctx, bucket).await;
}

mod test_bucket;
mod test_object;
mod test_transfer;
