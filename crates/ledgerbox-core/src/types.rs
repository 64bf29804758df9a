//! Common AWS type definitions.

use std::fmt;

/// The one region where S3 buckets are created without a location constraint.
const UNCONSTRAINED_S3_REGION: &str = "us-east-1";

/// AWS Region identifier.
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Region transaction buckets live in unless configured otherwise.
    pub const DEFAULT: &str = "us-west-2";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `CreateBucket` in this region must carry a location constraint.
    #[must_use]
    pub fn needs_location_constraint(&self) -> bool {
        self.0 != UNCONSTRAINED_S3_REGION
    }

    /// Virtual-hosted S3 host name for `bucket` in this region.
    #[must_use]
    pub fn s3_virtual_host(&self, bucket: &str) -> String {
        format!("{bucket}.s3.{}.amazonaws.com", self.0)
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AwsRegion {
    fn from(region: &str) -> Self {
        Self::new(region)
    }
}

impl From<String> for AwsRegion {
    fn from(region: String) -> Self {
        Self(region)
    }
}
