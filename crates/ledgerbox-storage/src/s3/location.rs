//! Object location descriptors.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::config::StorageConfig;

/// Characters escaped in an object key. Unreserved characters and `/` are
/// kept as-is.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// URL of `key` in `bucket` for the configured service.
///
/// With an endpoint override the URL is path-style or virtual-hosted per
/// `force_path_style`; otherwise it is the regional AWS virtual-hosted URL.
pub(crate) fn object_url(config: &StorageConfig, bucket: &str, key: &str) -> String {
    let key = utf8_percent_encode(key, KEY_ENCODE_SET);

    let Some(endpoint) = config.endpoint_url.as_deref() else {
        return format!("https://{}/{key}", config.region.s3_virtual_host(bucket));
    };

    let endpoint = endpoint.trim_end_matches('/');
    if config.force_path_style {
        return format!("{endpoint}/{bucket}/{key}");
    }

    match endpoint.split_once("://") {
        Some((scheme, host)) => format!("{scheme}://{bucket}.{host}/{key}"),
        None => format!("{bucket}.{endpoint}/{key}"),
    }
}
