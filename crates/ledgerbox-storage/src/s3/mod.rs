//! S3-backed [`BucketClient`].
//!
//! Every call derives a bounded [`Scope`](ledgerbox_core::Scope) from the
//! caller's context and the client's default timeout, issues its request
//! under that scope, and, for bucket creation/deletion and object deletion,
//! polls HEAD until the change is visible. The SDK retry layer is disabled,
//! so each logical request is one round trip plus confirmation probes.

mod download;
pub(crate) mod error;
mod location;
mod upload;

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use ledgerbox_core::Context;
use tracing::{debug, info};

use self::error::{classify, is_absent};
use crate::body::{ObjectBody, ObjectReader, WriteAt};
use crate::client::{BucketClient, bounded};
use crate::config::StorageConfig;
use crate::error::{Operation, StorageError, StorageResult};
use crate::wait::{Presence, wait_for_presence};

/// [`BucketClient`] for Amazon S3 and S3-compatible services.
///
/// Cheap to clone; clones share the SDK client's connection pool.
#[derive(Debug, Clone)]
pub struct S3BucketClient {
    client: Client,
    config: Arc<StorageConfig>,
}

impl S3BucketClient {
    /// Wrap a pre-built SDK client. Timeouts, polling and transfer tuning are
    /// taken from `config`; its endpoint fields are ignored.
    ///
    /// Fails with [`StorageError::Config`] if `config` does not validate.
    pub fn new(client: Client, config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// Build an SDK client from `config` and wrap it.
    ///
    /// Static credentials are used when both halves are configured;
    /// otherwise the SDK default credential chain is loaded.
    pub async fn connect(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;

        let region = Region::new(config.region.as_str().to_owned());
        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(Credentials::new(id, secret, None, None, "ledgerbox-static")),
            _ => {
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(region.clone())
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&sdk_config)
            }
        };

        builder = builder
            .region(region)
            .retry_config(RetryConfig::disabled())
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            region = %config.region,
            endpoint = ?config.endpoint_url,
            force_path_style = config.force_path_style,
            timeout = ?config.timeout,
            "S3 bucket client configured"
        );
        Self::new(Client::from_conf(builder.build()), config)
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn sdk_client(&self) -> &Client {
        &self.client
    }

    async fn bucket_presence(&self, operation: Operation, bucket: &str) -> StorageResult<Presence> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(Presence::Present),
            Err(e) if is_absent(&e) => Ok(Presence::Absent),
            Err(e) => Err(classify(e, operation, bucket, None)),
        }
    }

    async fn object_presence(
        &self,
        operation: Operation,
        bucket: &str,
        key: &str,
    ) -> StorageResult<Presence> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(Presence::Present),
            Err(e) if is_absent(&e) => Ok(Presence::Absent),
            Err(e) => Err(classify(e, operation, bucket, Some(key))),
        }
    }

    /// Blame a missing object on its bucket when the bucket is gone too.
    ///
    /// A HEAD object response carries no body, so a 404 alone cannot tell a
    /// missing key from a missing bucket.
    async fn attribute_missing(
        &self,
        ctx: &Context,
        operation: Operation,
        bucket: &str,
        err: StorageError,
    ) -> StorageError {
        if !matches!(err, StorageError::NoSuchKey { .. }) {
            return err;
        }
        match bounded(ctx, operation, self.bucket_presence(operation, bucket)).await {
            Ok(Presence::Absent) => StorageError::NoSuchBucket {
                bucket: bucket.to_owned(),
            },
            _ => err,
        }
    }

    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        let region = &self.config.region;
        region.needs_location_constraint().then(|| {
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region.as_str()))
                .build()
        })
    }
}

#[async_trait]
impl BucketClient for S3BucketClient {
    async fn create_bucket(&self, ctx: &Context, bucket: &str) -> StorageResult<()> {
        let operation = Operation::CreateBucket;
        let scope = ctx.scope(self.config.timeout);

        bounded(&scope, operation, async {
            self.client
                .create_bucket()
                .bucket(bucket)
                .set_create_bucket_configuration(self.bucket_configuration())
                .send()
                .await
                .map_err(|e| classify(e, operation, bucket, None))
        })
        .await?;

        wait_for_presence(&scope, self.config.wait, operation, Presence::Present, || {
            self.bucket_presence(operation, bucket)
        })
        .await?;

        info!(bucket = %bucket, "bucket created");
        Ok(())
    }

    async fn delete_bucket(&self, ctx: &Context, bucket: &str) -> StorageResult<()> {
        let operation = Operation::DeleteBucket;
        let scope = ctx.scope(self.config.timeout);

        bounded(&scope, operation, async {
            self.client
                .delete_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| classify(e, operation, bucket, None))
        })
        .await?;

        wait_for_presence(&scope, self.config.wait, operation, Presence::Absent, || {
            self.bucket_presence(operation, bucket)
        })
        .await?;

        info!(bucket = %bucket, "bucket deleted");
        Ok(())
    }

    async fn upload_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> StorageResult<String> {
        let scope = ctx.scope(self.config.timeout);
        let location = bounded(
            &scope,
            Operation::UploadObject,
            upload::upload(&self.client, &self.config, bucket, key, body),
        )
        .await?;

        debug!(bucket = %bucket, key = %key, location = %location, "upload_object completed");
        Ok(location)
    }

    async fn download_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        sink: &mut dyn WriteAt,
    ) -> StorageResult<u64> {
        let scope = ctx.scope(self.config.timeout);
        let operation = Operation::DownloadObject;
        let written = match bounded(
            &scope,
            operation,
            download::download(&self.client, &self.config, bucket, key, sink),
        )
        .await
        {
            Ok(written) => written,
            Err(e) => return Err(self.attribute_missing(&scope, operation, bucket, e).await),
        };

        debug!(bucket = %bucket, key = %key, size = written, "download_object completed");
        Ok(written)
    }

    async fn fetch_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
    ) -> StorageResult<ObjectReader> {
        let operation = Operation::FetchObject;
        let scope = ctx.scope(self.config.timeout);

        let output = match bounded(&scope, operation, async {
            self.client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify(e, operation, bucket, Some(key)))
        })
        .await
        {
            Ok(output) => output,
            Err(e) => return Err(self.attribute_missing(&scope, operation, bucket, e).await),
        };

        let content_length = output.content_length().and_then(|n| u64::try_from(n).ok());
        debug!(bucket = %bucket, key = %key, content_length, "fetch_object opened");
        Ok(ObjectReader::new(output.body.into_async_read(), content_length))
    }

    async fn delete_object(&self, ctx: &Context, bucket: &str, key: &str) -> StorageResult<()> {
        let operation = Operation::DeleteObject;
        let scope = ctx.scope(self.config.timeout);

        let deleted = bounded(&scope, operation, async {
            if self.object_presence(operation, bucket, key).await? == Presence::Absent {
                return Err(StorageError::NoSuchKey {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                });
            }
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify(e, operation, bucket, Some(key)))
        })
        .await;
        if let Err(e) = deleted {
            return Err(self.attribute_missing(&scope, operation, bucket, e).await);
        }

        wait_for_presence(&scope, self.config.wait, operation, Presence::Absent, || {
            self.object_presence(operation, bucket, key)
        })
        .await?;

        debug!(bucket = %bucket, key = %key, "delete_object completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::error::ErrorKind;

    fn local_config(port: u16) -> StorageConfig {
        StorageConfig::builder()
            .region("us-east-1")
            .access_key_id("test")
            .secret_access_key("test")
            .endpoint_url(format!("http://127.0.0.1:{port}"))
            .force_path_style(true)
            .build()
    }

    fn offline_sdk_client() -> Client {
        Client::from_conf(
            aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .build(),
        )
    }

    /// Answer every request with an empty-bodied status: 404 for object
    /// paths, `bucket_status` for bucket paths.
    async fn head_server(bucket_status: u16) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind head server");
        let port = listener.local_addr().expect("local addr").port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut chunk = [0_u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&request);
                    let target = head.split_whitespace().nth(1).unwrap_or("/");
                    let path = target.split('?').next().unwrap_or(target);
                    let status = if path.trim_start_matches('/').contains('/') {
                        404
                    } else {
                        bucket_status
                    };
                    let reason = if status == 200 { "OK" } else { "Not Found" };
                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        port
    }

    #[test]
    fn test_should_validate_config_in_new() {
        let zero_parts = StorageConfig {
            part_size: 0,
            ..StorageConfig::default()
        };
        let err = S3BucketClient::new(offline_sdk_client(), zero_parts).expect_err("zero part size");
        assert_eq!(err.kind(), ErrorKind::Config);

        let zero_concurrency = StorageConfig {
            concurrency: 0,
            ..StorageConfig::default()
        };
        let err = S3BucketClient::new(offline_sdk_client(), zero_concurrency)
            .expect_err("zero concurrency");
        assert_eq!(err.kind(), ErrorKind::Config);

        let client = S3BucketClient::new(offline_sdk_client(), StorageConfig::default())
            .expect("default config");
        assert_eq!(client.config().part_size, crate::config::MIN_PART_SIZE);
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_for_object_calls() {
        let port = head_server(404).await;
        let client = S3BucketClient::connect(local_config(port)).await.expect("connect");
        let ctx = Context::background().with_timeout(Duration::from_secs(5));

        let err = client
            .delete_object(&ctx, "ghost-bucket", "jan.csv")
            .await
            .expect_err("delete in missing bucket");
        assert!(matches!(err, StorageError::NoSuchBucket { ref bucket } if bucket == "ghost-bucket"), "{err}");

        let mut sink = Vec::new();
        let err = client
            .download_object(&ctx, "ghost-bucket", "jan.csv", &mut sink)
            .await
            .expect_err("download from missing bucket");
        assert!(matches!(err, StorageError::NoSuchBucket { .. }), "{err}");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_should_report_missing_key_in_existing_bucket() {
        let port = head_server(200).await;
        let client = S3BucketClient::connect(local_config(port)).await.expect("connect");
        let ctx = Context::background().with_timeout(Duration::from_secs(5));

        let err = client
            .delete_object(&ctx, "acct-42", "ghost.csv")
            .await
            .expect_err("delete missing key");
        assert!(matches!(err, StorageError::NoSuchKey { ref key, .. } if key == "ghost.csv"), "{err}");

        let mut sink = Vec::new();
        let err = client
            .download_object(&ctx, "acct-42", "ghost.csv", &mut sink)
            .await
            .expect_err("download missing key");
        assert!(matches!(err, StorageError::NoSuchKey { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_should_reject_invalid_config() {
        let config = StorageConfig::builder().access_key_id("AKIDEXAMPLE").build();
        let err = S3BucketClient::connect(config).await.expect_err("half credentials");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_should_time_out_against_unresponsive_endpoint() {
        // Accepts connections at the kernel level but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind blackhole");
        let port = listener.local_addr().expect("local addr").port();
        let client = S3BucketClient::connect(local_config(port)).await.expect("connect");

        let ctx = Context::background().with_timeout(Duration::from_millis(50));
        let start = Instant::now();
        let err = client
            .upload_object(&ctx, "acct-42", "jan.csv", ObjectBody::from("date,amount\n"))
            .await
            .expect_err("upload against blackhole");

        assert!(err.is_timeout(), "{err}");
        assert!(start.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[tokio::test]
    async fn test_should_honor_client_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind blackhole");
        let port = listener.local_addr().expect("local addr").port();
        let mut config = local_config(port);
        config.timeout = Duration::from_millis(50);
        let client = S3BucketClient::connect(config).await.expect("connect");

        let err = client
            .create_bucket(&Context::background(), "acct-42")
            .await
            .expect_err("create against blackhole");
        assert!(matches!(
            err,
            StorageError::Timeout {
                operation: Operation::CreateBucket
            }
        ));
        drop(listener);
    }

    #[tokio::test]
    async fn test_should_report_transport_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("local addr").port()
        };
        let client = S3BucketClient::connect(local_config(port)).await.expect("connect");

        let ctx = Context::background().with_timeout(Duration::from_secs(5));
        let err = client
            .fetch_object(&ctx, "acct-42", "jan.csv")
            .await
            .expect_err("fetch from closed port");

        assert_eq!(err.kind(), ErrorKind::Transport, "{err}");
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_stop_when_cancelled() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind blackhole");
        let port = listener.local_addr().expect("local addr").port();
        let client = S3BucketClient::connect(local_config(port)).await.expect("connect");

        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = client
            .delete_object(&ctx, "acct-42", "jan.csv")
            .await
            .expect_err("cancelled delete");
        assert!(matches!(err, StorageError::Cancelled { .. }), "{err}");
        drop(listener);
    }

    #[tokio::test]
    async fn test_should_omit_location_constraint_in_default_region() {
        let client = S3BucketClient::connect(local_config(1)).await.expect("connect");
        assert!(client.bucket_configuration().is_none());

        let mut config = local_config(1);
        config.region = "eu-west-1".into();
        let client = S3BucketClient::connect(config).await.expect("connect");
        let configuration = client.bucket_configuration().expect("constraint");
        assert_eq!(
            configuration.location_constraint(),
            Some(&BucketLocationConstraint::EuWest1)
        );
    }
}
