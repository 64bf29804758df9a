//! Multipart upload and ranged download integration tests.

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom};

    use ledgerbox_core::Context;
    use ledgerbox_storage::config::MIN_PART_SIZE;
    use ledgerbox_storage::{BucketClient, ObjectBody};

    use crate::{cleanup_bucket, create_test_bucket, storage_client};

    /// Two full parts plus a short tail.
    fn large_body() -> Vec<u8> {
        (0..MIN_PART_SIZE * 2 + 1234)
            .map(|i| u8::try_from(i % 251).expect("fits in u8"))
            .collect()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_large_object_in_parts() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "multipart").await;
        let expected = large_body();

        client
            .upload_object(&ctx, &bucket, "year.csv", ObjectBody::from(expected.clone()))
            .await
            .expect("upload_object");

        let data = client
            .fetch_object(&ctx, &bucket, "year.csv")
            .await
            .expect("fetch_object")
            .into_bytes()
            .await
            .expect("read body");
        assert_eq!(data.len(), expected.len());
        assert!(data.as_ref() == expected.as_slice(), "multipart content mismatch");

        cleanup_bucket(&client, &bucket, &["year.csv"]).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_download_in_ranges_to_file() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "ranged").await;
        let expected = large_body();

        client
            .upload_object(&ctx, &bucket, "year.csv", ObjectBody::from(expected.clone()))
            .await
            .expect("upload_object");

        let mut file = tempfile::tempfile().expect("tempfile");
        let written = client
            .download_object(&ctx, &bucket, "year.csv", &mut file)
            .await
            .expect("download_object");
        assert_eq!(written, expected.len() as u64);

        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0)).expect("rewind");
        file.read_to_end(&mut contents).expect("read back");
        assert!(contents == expected, "ranged download content mismatch");

        cleanup_bucket(&client, &bucket, &["year.csv"]).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_download_small_and_empty_objects() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "small").await;

        client
            .upload_object(&ctx, &bucket, "jan.csv", ObjectBody::from("date,amount\n"))
            .await
            .expect("upload small");
        client
            .upload_object(&ctx, &bucket, "empty.csv", ObjectBody::empty())
            .await
            .expect("upload empty");

        let mut sink = Vec::new();
        let written = client
            .download_object(&ctx, &bucket, "jan.csv", &mut sink)
            .await
            .expect("download small");
        assert_eq!(written, 12);
        assert_eq!(sink, b"date,amount\n");

        let mut sink = Vec::new();
        let written = client
            .download_object(&ctx, &bucket, "empty.csv", &mut sink)
            .await
            .expect("download empty");
        assert_eq!(written, 0);
        assert!(sink.is_empty());

        cleanup_bucket(&client, &bucket, &["jan.csv", "empty.csv"]).await;
    }
}
