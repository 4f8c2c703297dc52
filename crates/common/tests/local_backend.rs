//! Gateway behaviour over an allocation stored on the local filesystem

mod common;

use ::common::gateway::{GatewayError, RangeSpec, StorageGateway};
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_fresh_allocation() {
    let (gateway, _temp) = common::setup_local_env();

    let buckets = gateway.list_buckets().await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert!(buckets[0].synthesized);

    let page = gateway.list_objects("root", "", "", "/", 1000).await.unwrap();
    assert!(page.objects.is_empty());
}

#[tokio::test]
async fn test_buckets_and_listing() {
    let (gateway, _temp) = common::setup_local_env();
    common::put(&gateway, "root", "a.txt", b"top").await;
    common::put(&gateway, "docs", "readme.txt", &[b'x'; 120]).await;
    common::put(&gateway, "docs", "sub/b.txt", b"b").await;

    let buckets = gateway.list_buckets().await.unwrap();
    let names: Vec<_> = buckets.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["root", "docs"]);

    let page = gateway.list_objects("docs", "", "", "/", 1000).await.unwrap();
    assert_eq!(common::names(&page.objects), vec!["readme.txt"]);
    assert_eq!(page.objects[0].size, 120);
    assert_eq!(page.prefixes, vec!["sub/"]);

    let page = gateway.list_objects("root", "", "", "/", 1000).await.unwrap();
    assert_eq!(common::names(&page.objects), vec!["a.txt"]);
}

#[tokio::test]
async fn test_ranged_read_and_cleanup() {
    let (gateway, temp) = common::setup_local_env();
    common::put(&gateway, "root", "digits.txt", b"0123456789").await;

    let mut object = gateway
        .get_object(
            "root",
            "digits.txt",
            Some(RangeSpec::FromTo {
                start: 7,
                end: None,
            }),
        )
        .await
        .unwrap();
    let mut out = String::new();
    object.reader.read_to_string(&mut out).await.unwrap();
    assert_eq!(out, "789");

    object.reader.close().unwrap();
    assert_eq!(common::staged_files(&temp), 0);
}

#[tokio::test]
async fn test_bucket_removal() {
    let (gateway, _temp) = common::setup_local_env();
    common::put(&gateway, "docs", "a.txt", b"a").await;

    let err = gateway.delete_bucket("docs", false).await.unwrap_err();
    assert!(matches!(err, GatewayError::BucketNotEmpty { .. }));

    gateway.delete_bucket("docs", true).await.unwrap();
    let err = gateway.get_bucket_info("docs").await.unwrap_err();
    assert!(err.is_not_found());
}
