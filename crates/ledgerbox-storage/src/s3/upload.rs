//! Object upload.
//!
//! Bodies that fit in one part go out as a single `PutObject`. Larger bodies
//! are streamed as a multipart upload with up to `concurrency` parts in
//! flight. If a multipart upload does not complete (error, timeout or
//! cancellation), it is aborted in the background so no orphaned parts are
//! left behind.

use std::collections::VecDeque;

use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::error::classify;
use super::location::object_url;
use crate::body::ObjectBody;
use crate::config::StorageConfig;
use crate::error::{Operation, StorageError, StorageResult};

const OPERATION: Operation = Operation::UploadObject;

/// Most parts S3 accepts in one multipart upload.
const MAX_UPLOAD_PARTS: i32 = 10_000;

/// Upload `body` to `bucket/key` and return its location.
pub(super) async fn upload(
    client: &Client,
    config: &StorageConfig,
    bucket: &str,
    key: &str,
    mut body: ObjectBody,
) -> StorageResult<String> {
    let part_size = config.part_size;
    let first = read_part(&mut body, part_size).await?;
    if first.len() < part_size {
        return put_single(client, config, bucket, key, first).await;
    }

    let second = read_part(&mut body, part_size).await?;
    if second.is_empty() {
        return put_single(client, config, bucket, key, first).await;
    }

    put_multipart(client, config, bucket, key, VecDeque::from([first, second]), body).await
}

async fn read_part(body: &mut ObjectBody, part_size: usize) -> StorageResult<Bytes> {
    body.read_chunk(part_size)
        .await
        .map_err(|e| StorageError::body(OPERATION, e))
}

async fn put_single(
    client: &Client,
    config: &StorageConfig,
    bucket: &str,
    key: &str,
    data: Bytes,
) -> StorageResult<String> {
    let size = data.len();
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(data))
        .send()
        .await
        .map_err(|e| classify(e, OPERATION, bucket, Some(key)))?;

    debug!(bucket = %bucket, key = %key, size, "put_object completed");
    Ok(object_url(config, bucket, key))
}

async fn put_multipart(
    client: &Client,
    config: &StorageConfig,
    bucket: &str,
    key: &str,
    mut buffered: VecDeque<Bytes>,
    mut body: ObjectBody,
) -> StorageResult<String> {
    let created = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| classify(e, OPERATION, bucket, Some(key)))?;
    let upload_id = created
        .upload_id()
        .ok_or_else(|| StorageError::Rejected {
            operation: OPERATION,
            code: None,
            message: Some("create multipart upload returned no upload id".to_owned()),
            status: None,
        })?
        .to_owned();

    let mut guard = AbortOnDrop {
        client: client.clone(),
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        upload_id: upload_id.clone(),
        armed: true,
    };

    let mut tasks = JoinSet::new();
    let mut parts = Vec::new();
    let mut part_number = 0;

    loop {
        let chunk = match buffered.pop_front() {
            Some(chunk) => chunk,
            None => read_part(&mut body, config.part_size).await?,
        };
        if chunk.is_empty() {
            break;
        }

        part_number += 1;
        if part_number > MAX_UPLOAD_PARTS {
            return Err(StorageError::Rejected {
                operation: OPERATION,
                code: Some("EntityTooLarge".to_owned()),
                message: Some(format!(
                    "object needs more than {MAX_UPLOAD_PARTS} parts of {} bytes",
                    config.part_size
                )),
                status: None,
            });
        }

        while tasks.len() >= config.concurrency {
            if let Some(joined) = tasks.join_next().await {
                parts.push(joined.map_err(|e| StorageError::transport(OPERATION, e))??);
            }
        }

        let last = chunk.len() < config.part_size;
        tasks.spawn(upload_part(
            client.clone(),
            bucket.to_owned(),
            key.to_owned(),
            upload_id.clone(),
            part_number,
            chunk,
        ));
        if last {
            break;
        }
    }

    while let Some(joined) = tasks.join_next().await {
        parts.push(joined.map_err(|e| StorageError::transport(OPERATION, e))??);
    }
    parts.sort_by_key(|part| part.part_number());

    let output = client
        .complete_multipart_upload()
        .bucket(bucket)
        .key(key)
        .upload_id(&upload_id)
        .multipart_upload(
            CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build(),
        )
        .send()
        .await
        .map_err(|e| classify(e, OPERATION, bucket, Some(key)))?;
    guard.armed = false;

    debug!(bucket = %bucket, key = %key, parts = part_number, "multipart upload completed");
    Ok(output
        .location()
        .map_or_else(|| object_url(config, bucket, key), str::to_owned))
}

async fn upload_part(
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    part_number: i32,
    data: Bytes,
) -> StorageResult<CompletedPart> {
    let size = data.len();
    let output = client
        .upload_part()
        .bucket(&bucket)
        .key(&key)
        .upload_id(upload_id)
        .part_number(part_number)
        .body(ByteStream::from(data))
        .send()
        .await
        .map_err(|e| classify(e, OPERATION, &bucket, Some(&key)))?;

    debug!(bucket = %bucket, key = %key, part_number, size, "part uploaded");
    Ok(CompletedPart::builder()
        .part_number(part_number)
        .set_e_tag(output.e_tag().map(str::to_owned))
        .build())
}

/// Aborts an unfinished multipart upload when dropped while armed.
struct AbortOnDrop {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    armed: bool,
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                bucket = %self.bucket,
                key = %self.key,
                upload_id = %self.upload_id,
                "no runtime to abort multipart upload"
            );
            return;
        };

        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);
        handle.spawn(async move {
            match client
                .abort_multipart_upload()
                .bucket(&bucket)
                .key(&key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                Ok(_) => debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "multipart upload aborted"),
                Err(e) => warn!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    error = %DisplayErrorContext(&e),
                    "failed to abort multipart upload"
                ),
            }
        });
    }
}
