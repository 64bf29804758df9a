//! Object round-trip integration tests.

#[cfg(test)]
mod tests {
    use ledgerbox_core::Context;
    use ledgerbox_storage::{BucketClient, ObjectBody, StorageError};

    use crate::{cleanup_bucket, create_test_bucket, storage_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_and_fetch_object() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "roundtrip").await;

        let location = client
            .upload_object(&ctx, &bucket, "jan.csv", ObjectBody::from_static(b"date,amount\n"))
            .await
            .expect("upload_object");
        assert!(location.contains(&bucket), "{location}");
        assert!(location.ends_with("jan.csv"), "{location}");

        let reader = client
            .fetch_object(&ctx, &bucket, "jan.csv")
            .await
            .expect("fetch_object");
        assert_eq!(reader.content_length(), Some(12));
        let data = reader.into_bytes().await.expect("read body");
        assert_eq!(data.as_ref(), b"date,amount\n");

        cleanup_bucket(&client, &bucket, &["jan.csv"]).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_replace_object_on_reupload() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "replace").await;

        for body in ["v1", "v2"] {
            client
                .upload_object(&ctx, &bucket, "feb.csv", ObjectBody::from(body))
                .await
                .expect("upload_object");
        }

        let data = client
            .fetch_object(&ctx, &bucket, "feb.csv")
            .await
            .expect("fetch_object")
            .into_bytes()
            .await
            .expect("read body");
        assert_eq!(data.as_ref(), b"v2");

        cleanup_bucket(&client, &bucket, &["feb.csv"]).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_not_found_after_delete() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "delete").await;

        client
            .upload_object(&ctx, &bucket, "jan.csv", ObjectBody::from("date,amount\n"))
            .await
            .expect("upload_object");
        client
            .delete_object(&ctx, &bucket, "jan.csv")
            .await
            .expect("delete_object");

        let err = client
            .fetch_object(&ctx, &bucket, "jan.csv")
            .await
            .expect_err("fetch deleted object");
        assert!(matches!(err, StorageError::NoSuchKey { .. }), "{err}");

        let err = client
            .delete_object(&ctx, &bucket, "jan.csv")
            .await
            .expect_err("delete twice");
        assert!(err.is_not_found(), "{err}");

        cleanup_bucket(&client, &bucket, &[]).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_handle_keys_with_special_characters() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "keys").await;
        let key = "2024/q1 report+final.csv";

        let location = client
            .upload_object(&ctx, &bucket, key, ObjectBody::from("x"))
            .await
            .expect("upload_object");
        assert!(location.ends_with("2024/q1%20report%2Bfinal.csv"), "{location}");

        let data = client
            .fetch_object(&ctx, &bucket, key)
            .await
            .expect("fetch_object")
            .into_bytes()
            .await
            .expect("read body");
        assert_eq!(data.as_ref(), b"x");

        cleanup_bucket(&client, &bucket, &[key]).await;
    }
}
