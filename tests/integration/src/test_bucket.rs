//! Bucket lifecycle integration tests.

#[cfg(test)]
mod tests {
    use ledgerbox_core::Context;
    use ledgerbox_storage::{BucketClient, ObjectBody, StorageError};

    use crate::{cleanup_bucket, create_test_bucket, storage_client, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_and_delete_bucket() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = test_bucket_name("lifecycle");

        client.create_bucket(&ctx, &bucket).await.expect("create_bucket");
        client.delete_bucket(&ctx, &bucket).await.expect("delete_bucket");

        let err = client
            .upload_object(&ctx, &bucket, "jan.csv", ObjectBody::from("x"))
            .await
            .expect_err("upload into deleted bucket");
        assert!(err.is_not_found(), "{err}");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_deleting_non_empty_bucket() {
        let client = storage_client().await.expect("client");
        let ctx = Context::background();
        let bucket = create_test_bucket(&client, "nonempty").await;

        client
            .upload_object(&ctx, &bucket, "jan.csv", ObjectBody::from("date,amount\n"))
            .await
            .expect("upload_object");

        let err = client
            .delete_bucket(&ctx, &bucket)
            .await
            .expect_err("delete non-empty bucket");
        assert!(matches!(err, StorageError::BucketNotEmpty { .. }), "{err}");

        cleanup_bucket(&client, &bucket, &["jan.csv"]).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_deleting_missing_bucket() {
        let client = storage_client().await.expect("client");
        let bucket = test_bucket_name("missing");

        let err = client
            .delete_bucket(&Context::background(), &bucket)
            .await
            .expect_err("delete missing bucket");
        assert!(matches!(err, StorageError::NoSuchBucket { .. }), "{err}");
    }
}
