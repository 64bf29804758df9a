//! Object storage configuration.
//!
//! Provides [`StorageConfig`], the construction-time settings for
//! [`S3BucketClient`](crate::S3BucketClient): credentials, region, optional
//! endpoint override, the default per-operation timeout, confirmation polling
//! policy, and transfer tuning.

use std::fmt;
use std::time::Duration;

use ledgerbox_core::AwsRegion;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{StorageError, StorageResult};
use crate::wait::WaitPolicy;

/// Default bound on a single storage operation, including confirmation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Smallest part size S3 accepts for every part but the last.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Default number of parts or ranges in flight per transfer.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// S3 object storage configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ledgerbox_storage::config::StorageConfig;
///
/// let config = StorageConfig::builder()
///     .endpoint_url("http://localhost:4566")
///     .force_path_style(true)
///     .timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(config.region.as_str(), "us-west-2");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Region the buckets live in.
    #[builder(default, setter(into))]
    #[serde(default)]
    pub region: AwsRegion,

    /// Static access key id. When unset, the SDK default credential chain is used.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key. Never serialized.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing)]
    pub secret_access_key: Option<String>,

    /// Endpoint override for S3-compatible services.
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    #[builder(default = false)]
    #[serde(default)]
    pub force_path_style: bool,

    /// Default per-operation timeout; a tighter caller deadline wins.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,

    /// Confirmation polling for bucket/object creation and deletion.
    #[builder(default)]
    #[serde(default)]
    pub wait: WaitPolicy,

    /// Size of each multipart upload part and each download range.
    #[builder(default = MIN_PART_SIZE)]
    pub part_size: usize,

    /// Parts or ranges transferred concurrently.
    #[builder(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .field("force_path_style", &self.force_path_style)
            .field("timeout", &self.timeout)
            .field("wait", &self.wait)
            .field("part_size", &self.part_size)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: AwsRegion::default(),
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            force_path_style: false,
            timeout: DEFAULT_TIMEOUT,
            wait: WaitPolicy::default(),
            part_size: MIN_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults);
    /// where two names are listed the first one set wins:
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `AWS_REGION`, `DEFAULT_REGION` | `us-west-2` |
    /// | `AWS_ID`, `AWS_ACCESS_KEY_ID` | *(unset)* |
    /// | `AWS_SECRET`, `AWS_SECRET_ACCESS_KEY` | *(unset)* |
    /// | `S3_ENDPOINT_URL` | *(unset)* |
    /// | `S3_FORCE_PATH_STYLE` | `false` |
    /// | `STORAGE_TIMEOUT_MS` | `15000` |
    /// | `STORAGE_WAIT_INTERVAL_MS` | `5000` |
    /// | `STORAGE_WAIT_MAX_ATTEMPTS` | `20` |
    /// | `STORAGE_PART_SIZE` | `5242880` |
    /// | `STORAGE_CONCURRENCY` | `5` |
    ///
    /// Unparseable numeric values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = first_env(&["AWS_REGION", "DEFAULT_REGION"]) {
            config.region = AwsRegion::new(v);
        }
        config.access_key_id = first_env(&["AWS_ID", "AWS_ACCESS_KEY_ID"]);
        config.secret_access_key = first_env(&["AWS_SECRET", "AWS_SECRET_ACCESS_KEY"]);
        config.endpoint_url = first_env(&["S3_ENDPOINT_URL"]);
        if let Ok(v) = std::env::var("S3_FORCE_PATH_STYLE") {
            config.force_path_style = parse_bool(&v);
        }
        if let Some(d) = env_parse::<u64>("STORAGE_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(d);
        }
        if let Some(d) = env_parse::<u64>("STORAGE_WAIT_INTERVAL_MS") {
            config.wait.interval = Duration::from_millis(d);
        }
        if let Some(n) = env_parse::<u32>("STORAGE_WAIT_MAX_ATTEMPTS") {
            config.wait.max_attempts = n;
        }
        if let Some(n) = env_parse::<usize>("STORAGE_PART_SIZE") {
            config.part_size = n;
        }
        if let Some(n) = env_parse::<usize>("STORAGE_CONCURRENCY") {
            config.concurrency = n;
        }

        config
    }

    /// Check the configuration for values the client cannot work with.
    pub fn validate(&self) -> StorageResult<()> {
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StorageError::Config(
                "access key id and secret access key must be set together".to_owned(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(StorageError::Config("timeout must be non-zero".to_owned()));
        }
        if self.wait.max_attempts == 0 {
            return Err(StorageError::Config(
                "wait max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.part_size < MIN_PART_SIZE {
            return Err(StorageError::Config(format!(
                "part size {} is below the {MIN_PART_SIZE} byte minimum",
                self.part_size
            )));
        }
        if self.concurrency == 0 {
            return Err(StorageError::Config(
                "concurrency must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn first_env(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| std::env::var(name).ok())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
