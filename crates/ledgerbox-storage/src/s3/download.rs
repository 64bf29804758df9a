//! Ranged parallel download.
//!
//! The object length is read with a HEAD request, then the object is fetched
//! in `part_size` byte ranges with up to `concurrency` requests in flight.
//! Ranges complete out of order and are written at their own offsets.

use std::io;

use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use super::error::classify;
use crate::body::WriteAt;
use crate::config::StorageConfig;
use crate::error::{Operation, StorageError, StorageResult};

const OPERATION: Operation = Operation::DownloadObject;

/// Download `bucket/key` into `sink`, returning the number of bytes written.
pub(super) async fn download(
    client: &Client,
    config: &StorageConfig,
    bucket: &str,
    key: &str,
    sink: &mut dyn WriteAt,
) -> StorageResult<u64> {
    let head = client
        .head_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| classify(e, OPERATION, bucket, Some(key)))?;

    let Some(total) = head.content_length().and_then(|n| u64::try_from(n).ok()) else {
        let data = fetch(client, bucket, key, None).await?;
        write(sink, &data, 0)?;
        return Ok(data.len() as u64);
    };
    if total == 0 {
        return Ok(0);
    }

    let part_size = config.part_size as u64;
    let ranges = (0..total)
        .step_by(config.part_size)
        .map(|start| (start, (start + part_size).min(total) - 1));

    let mut fetches = stream::iter(ranges)
        .map(|(start, end)| async move {
            let data = fetch(client, bucket, key, Some((start, end))).await?;
            Ok::<_, StorageError>((start, data))
        })
        .buffer_unordered(config.concurrency);

    let mut ranges_written = 0_usize;
    while let Some((offset, data)) = fetches.try_next().await? {
        write(sink, &data, offset)?;
        ranges_written += 1;
    }

    debug!(bucket = %bucket, key = %key, size = total, ranges = ranges_written, "ranged download completed");
    Ok(total)
}

/// GET the object, or the inclusive byte range `[start, end]` of it.
async fn fetch(
    client: &Client,
    bucket: &str,
    key: &str,
    range: Option<(u64, u64)>,
) -> StorageResult<Bytes> {
    let output = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .set_range(range.map(|(start, end)| format!("bytes={start}-{end}")))
        .send()
        .await
        .map_err(|e| classify(e, OPERATION, bucket, Some(key)))?;

    let data = output
        .body
        .collect()
        .await
        .map_err(|e| StorageError::transport(OPERATION, e))?
        .into_bytes();

    if let Some((start, end)) = range {
        let expected = end - start + 1;
        if data.len() as u64 != expected {
            return Err(StorageError::transport(
                OPERATION,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "range {start}-{end} of {bucket}/{key} returned {} of {expected} bytes",
                        data.len()
                    ),
                ),
            ));
        }
    }
    Ok(data)
}

fn write(sink: &mut dyn WriteAt, data: &[u8], offset: u64) -> StorageResult<()> {
    sink.write_at(data, offset)
        .map_err(|e| StorageError::body(OPERATION, e))
}
