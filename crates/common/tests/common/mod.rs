//! Shared test utilities for gateway integration tests
#![allow(dead_code)]

use std::io::Cursor;

use ::common::allocation::{LocalAllocation, MemoryAllocation};
use ::common::config::GatewayConfig;
use ::common::gateway::{AllocationGateway, ObjectInfo, StorageGateway};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config(temp_dir: &TempDir) -> GatewayConfig {
    let config = GatewayConfig {
        staging_dir: Some(temp_dir.path().join("staging")),
        ..Default::default()
    };
    std::fs::create_dir_all(config.staging_dir()).unwrap();
    config
}

/// Set up a gateway over an empty in-memory allocation
pub fn setup_test_env() -> (AllocationGateway<MemoryAllocation>, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let alloc = MemoryAllocation::new(config.staging_dir());
    (AllocationGateway::new(alloc, &config), temp_dir)
}

/// Set up a gateway over an empty allocation rooted in a temporary directory
pub fn setup_local_env() -> (AllocationGateway<LocalAllocation>, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(&temp_dir);
    let alloc = LocalAllocation::new(temp_dir.path().join("alloc"), config.staging_dir());
    (AllocationGateway::new(alloc, &config), temp_dir)
}

/// Upload `data` as a text object
pub async fn put(gateway: &impl StorageGateway, bucket: &str, key: &str, data: &[u8]) -> ObjectInfo {
    let mut reader = Cursor::new(data.to_vec());
    gateway
        .put_object(
            bucket,
            key,
            Some("text/plain"),
            &mut reader,
            Some(data.len() as u64),
        )
        .await
        .unwrap()
}

/// Read a whole object back
pub async fn read(gateway: &impl StorageGateway, bucket: &str, key: &str) -> Vec<u8> {
    let mut object = gateway.get_object(bucket, key, None).await.unwrap();
    let mut out = Vec::new();
    object.reader.read_to_end(&mut out).await.unwrap();
    object.reader.close().unwrap();
    out
}

/// Number of files left behind in the staging directory
pub fn staged_files(temp_dir: &TempDir) -> usize {
    std::fs::read_dir(temp_dir.path().join("staging"))
        .unwrap()
        .count()
}

/// Names of the objects in a listing
pub fn names(objects: &[ObjectInfo]) -> Vec<&str> {
    objects.iter().map(|o| o.name.as_str()).collect()
}
