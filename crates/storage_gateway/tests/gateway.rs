use std::{path::Path, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use storage_gateway::{
    FileRecord,
    GatewayConfig,
    InMemoryRemoteStore,
    Metadata,
    SecretResolver,
    SecretSource,
    StaticSecretResolver,
    StorageError,
    StorageGateway,
};
use tempfile::TempDir;

const ACCOUNT: &str = "acct";

fn local_gateway(root: &Path) -> StorageGateway {
    gateway(format!("LOCAL;{};http://host/files", root.display()))
}

fn remote_gateway(store: &InMemoryRemoteStore) -> StorageGateway {
    StorageGateway::new(
        &GatewayConfig::default(),
        Arc::new(StaticSecretResolver::new(format!("{ACCOUNT};c2VjcmV0"))),
        Arc::new(store.clone()),
    )
}

fn gateway(descriptor: String) -> StorageGateway {
    StorageGateway::new(
        &GatewayConfig::default(),
        Arc::new(StaticSecretResolver::new(descriptor)),
        Arc::new(InMemoryRemoteStore::new(ACCOUNT)),
    )
}

fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Removes what the fixed-path scenario leaves under its root, innermost
/// first, keeping anything another run still uses.
fn remove_scenario_dirs(root: &Path) {
    for dir in [root.join("docs/a"), root.join("docs"), root.to_path_buf()] {
        let _ = std::fs::remove_dir(dir);
    }
}

#[tokio::test]
async fn test_local_upload_and_signed_url() {
    let root = Path::new("/tmp/store");
    let gateway = gateway("LOCAL;/tmp/store;http://host/files".to_string());

    let record = gateway
        .upload("docs", "a/b.txt", vec![0x68, 0x69])
        .await
        .unwrap();
    assert_eq!(record, FileRecord::new("docs", "a/b.txt"));
    let stored = std::fs::read(root.join("docs/a/b.txt"));

    let url = gateway.signed_url("docs", "a/b.txt").await.unwrap();
    let deleted = gateway.delete("docs", "a/b.txt").await;
    remove_scenario_dirs(root);

    assert_eq!(stored.unwrap(), vec![0x68, 0x69]);
    assert_eq!(url.url, "http://host/files?filepath=/tmp/store/docs/a/b.txt");
    assert!(!url.is_signed());
    assert!(deleted.unwrap());
}

#[tokio::test]
async fn test_local_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let gateway = local_gateway(temp_dir.path());

    gateway.upload("docs", "report.txt", "first").await.unwrap();
    gateway.upload("docs", "report.txt", "second").await.unwrap();
    assert_eq!(
        gateway.download("docs", "report.txt").await.unwrap().as_ref(),
        b"second"
    );
    assert!(gateway.exists("docs", "report.txt").await.unwrap());

    assert!(gateway.delete("docs", "report.txt").await.unwrap());
    assert!(!gateway.exists("docs", "report.txt").await.unwrap());
    assert!(matches!(
        gateway.download("docs", "report.txt").await,
        Err(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_missing_is_false_on_both_backends() {
    let temp_dir = TempDir::new().unwrap();
    let local = local_gateway(temp_dir.path());
    assert!(!local.delete("docs", "never.txt").await.unwrap());

    let remote = remote_gateway(&InMemoryRemoteStore::new(ACCOUNT));
    assert!(!remote.delete("docs", "never.txt").await.unwrap());
}

#[tokio::test]
async fn test_empty_listing_on_both_backends() {
    let temp_dir = TempDir::new().unwrap();
    let local = local_gateway(temp_dir.path());
    assert!(local.list("docs", "").await.unwrap().is_empty());
    assert!(local.list("docs", "nothing/here").await.unwrap().is_empty());

    let remote = remote_gateway(&InMemoryRemoteStore::new(ACCOUNT));
    assert!(remote.list("docs", "").await.unwrap().is_empty());
    assert!(remote.list("docs", "nothing/here").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_is_one_level_deep() {
    let temp_dir = TempDir::new().unwrap();
    let local = local_gateway(temp_dir.path());
    let remote = remote_gateway(&InMemoryRemoteStore::new(ACCOUNT));

    for gateway in [&local, &remote] {
        gateway.upload("docs", "a/one.txt", "1").await.unwrap();
        gateway.upload("docs", "a/b/two.txt", "2").await.unwrap();
        gateway.upload("docs", "top.txt", "3").await.unwrap();
    }

    let paths = |records: Vec<FileRecord>| {
        let mut paths: Vec<String> = records.into_iter().map(|r| r.path).collect();
        paths.sort();
        paths
    };

    assert_eq!(paths(local.list("docs", "a").await.unwrap()), ["a/b", "a/one.txt"]);
    assert_eq!(paths(remote.list("docs", "a").await.unwrap()), ["a/b/", "a/one.txt"]);
    assert_eq!(paths(local.list("docs", "").await.unwrap()), ["a", "top.txt"]);
    assert_eq!(paths(remote.list("docs", "").await.unwrap()), ["a/", "top.txt"]);
}

#[tokio::test]
async fn test_remote_metadata_merge() {
    let store = InMemoryRemoteStore::new(ACCOUNT);
    let gateway = remote_gateway(&store);

    gateway.upload("docs", "a.txt", "x").await.unwrap();
    gateway
        .set_metadata("docs", "a.txt", metadata(&[("owner", "ana"), ("tier", "hot")]))
        .await
        .unwrap();
    gateway
        .set_metadata("docs", "a.txt", metadata(&[("tier", "cold")]))
        .await
        .unwrap();

    assert_eq!(
        gateway.get_metadata("docs", "a.txt").await.unwrap(),
        metadata(&[("owner", "ana"), ("tier", "cold")])
    );
}

#[tokio::test]
async fn test_local_metadata_is_unsupported() {
    let temp_dir = TempDir::new().unwrap();
    let gateway = local_gateway(temp_dir.path());
    gateway.upload("docs", "a.txt", "x").await.unwrap();

    assert!(matches!(
        gateway.get_metadata("docs", "a.txt").await,
        Err(StorageError::UnsupportedOperation { .. })
    ));
    assert!(matches!(
        gateway
            .set_metadata("docs", "a.txt", metadata(&[("k", "v")]))
            .await,
        Err(StorageError::UnsupportedOperation { .. })
    ));
}

#[tokio::test]
async fn test_object_url_window_is_shorter_than_container_window() {
    let gateway = remote_gateway(&InMemoryRemoteStore::new(ACCOUNT));
    gateway.upload("docs", "a.txt", "x").await.unwrap();

    let object = gateway.signed_url("docs", "a.txt").await.unwrap();
    let container = gateway.container_signed_url("docs", "").await.unwrap();

    let object_grant = object.grant.unwrap();
    let container_grant = container.grant.unwrap();
    assert!(object_grant.expires_in < container_grant.expires_in);
    assert!(object.url.contains("sp=rwl"));
    assert!(container.url.contains("sp=racwdl"));
}

#[tokio::test]
async fn test_directory_urls() {
    let temp_dir = TempDir::new().unwrap();
    let local = local_gateway(temp_dir.path());
    let url = local.container_signed_url("docs", "reports/2024").await.unwrap();
    assert_eq!(
        url.url,
        format!(
            "http://host/files?filepath={}",
            temp_dir.path().join("docs").join("reports/2024").display()
        )
    );
    assert!(url.grant.is_none());

    let remote = remote_gateway(&InMemoryRemoteStore::new(ACCOUNT));
    let url = remote.container_signed_url("docs", "reports/2024").await.unwrap();
    assert!(url.url.starts_with("memory://acct/docs?sr=c&sp=racwdl"));
    assert!(matches!(
        remote.container_signed_url("docs", "../up").await,
        Err(StorageError::InvalidPath { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_secret_store() {
    struct Unreachable;

    #[async_trait]
    impl SecretResolver for Unreachable {
        async fn resolve(&self, _source: &SecretSource) -> anyhow::Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    let gateway = StorageGateway::new(
        &GatewayConfig::default(),
        Arc::new(Unreachable),
        Arc::new(InMemoryRemoteStore::new(ACCOUNT)),
    );
    assert!(matches!(
        gateway.upload("docs", "a.txt", "x").await,
        Err(StorageError::SecretUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_malformed_local_descriptor() {
    let gateway = gateway("LOCAL;onlyonefield".to_string());
    let err = gateway.upload("docs", "a.txt", "x").await.unwrap_err();
    assert!(matches!(err, StorageError::Configuration { .. }));
    assert!(err.is_misconfiguration());
}

#[tokio::test]
async fn test_concurrent_operations_share_nothing() {
    let store = InMemoryRemoteStore::new(ACCOUNT);
    let gateway = Arc::new(remote_gateway(&store));

    let mut handles = Vec::new();
    for i in 0..16 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            let path = format!("batch/{i}.txt");
            gateway.upload("docs", &path, i.to_string()).await.unwrap();
            gateway.download("docs", &path).await.unwrap()
        }));
    }
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().as_ref(), i.to_string().as_bytes());
    }

    assert_eq!(gateway.list("docs", "batch").await.unwrap().len(), 16);
}
