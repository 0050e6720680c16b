//! The storage gateway: one capability set over the local and remote
//! backends.

use std::{future::Future, sync::Arc};

use bytes::Bytes;
use opentelemetry::metrics::Meter;
use tracing::{debug, warn};

use crate::{
    FileRecord,
    GatewayConfig,
    LocalBackend,
    Operation,
    RemoteBackend,
    SecretResolver,
    SecretSource,
    SignedUrl,
    SignedUrlPolicy,
    StorageError,
    StorageResult,
    client::{Metadata, RemoteConnector},
    connection::{ConnectionDescriptor, classify},
    metrics::GatewayMetrics,
};

/// A backend resolved for a single operation.
pub enum Backend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

impl Backend {
    /// Build the backend a descriptor routes to.
    pub async fn connect(
        descriptor: ConnectionDescriptor,
        connector: &dyn RemoteConnector,
        policy: SignedUrlPolicy,
    ) -> StorageResult<Self> {
        match descriptor {
            ConnectionDescriptor::Local {
                base_path,
                public_base_url,
            } => Ok(Backend::Local(LocalBackend::new(base_path, public_base_url))),
            ConnectionDescriptor::Remote(credentials) => {
                let client = connector.connect(&credentials).await.map_err(|e| {
                    StorageError::configuration(format!(
                        "cannot connect to storage account {}: {e:#}",
                        credentials.account_name()
                    ))
                })?;
                Ok(Backend::Remote(RemoteBackend::new(client, policy)))
            }
        }
    }

    /// Backend label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local(_) => "local",
            Backend::Remote(_) => "remote",
        }
    }

    /// Store a whole object.
    pub async fn upload(&self, container: &str, path: &str, data: Bytes) -> StorageResult<FileRecord> {
        match self {
            Backend::Local(local) => local.upload(container, path, data).await,
            Backend::Remote(remote) => remote.upload(container, path, data).await,
        }
    }

    /// Fetch a whole object.
    pub async fn download(&self, container: &str, path: &str) -> StorageResult<Bytes> {
        match self {
            Backend::Local(local) => local.download(container, path).await,
            Backend::Remote(remote) => remote.download(container, path).await,
        }
    }

    /// Delete an object, reporting whether it existed.
    pub async fn delete(&self, container: &str, path: &str) -> StorageResult<bool> {
        match self {
            Backend::Local(local) => local.delete(container, path).await,
            Backend::Remote(remote) => remote.delete(container, path).await,
        }
    }

    /// Whether an object exists.
    pub async fn exists(&self, container: &str, path: &str) -> StorageResult<bool> {
        match self {
            Backend::Local(local) => local.exists(container, path).await,
            Backend::Remote(remote) => remote.exists(container, path).await,
        }
    }

    /// One level of entries below `prefix`.
    pub async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<FileRecord>> {
        match self {
            Backend::Local(local) => local.list(container, prefix).await,
            Backend::Remote(remote) => remote.list(container, prefix).await,
        }
    }

    /// Object-level access URL.
    pub async fn signed_url(&self, container: &str, path: &str) -> StorageResult<SignedUrl> {
        match self {
            Backend::Local(local) => local.signed_url(container, path),
            Backend::Remote(remote) => remote.signed_url(container, path).await,
        }
    }

    /// Directory-level access URL.
    pub async fn container_signed_url(
        &self,
        container: &str,
        directory: &str,
    ) -> StorageResult<SignedUrl> {
        match self {
            Backend::Local(local) => local.container_signed_url(container, directory),
            Backend::Remote(remote) => remote.container_signed_url(container, directory).await,
        }
    }

    /// Read object metadata.
    pub async fn get_metadata(&self, container: &str, path: &str) -> StorageResult<Metadata> {
        match self {
            Backend::Local(local) => local.get_metadata(container, path),
            Backend::Remote(remote) => remote.get_metadata(container, path).await,
        }
    }

    /// Merge object metadata.
    pub async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: Metadata,
    ) -> StorageResult<()> {
        match self {
            Backend::Local(local) => local.set_metadata(container, path, metadata),
            Backend::Remote(remote) => remote.set_metadata(container, path, metadata).await,
        }
    }
}

/// File operations against whichever backend the connection descriptor
/// selects.
///
/// The descriptor is fetched and parsed again on every call and no backend
/// state is kept between calls, so a gateway can be shared freely across
/// tasks.
pub struct StorageGateway {
    secret_source: SecretSource,
    secrets: Arc<dyn SecretResolver>,
    connector: Arc<dyn RemoteConnector>,
    policy: SignedUrlPolicy,
    metrics: Option<GatewayMetrics>,
}

impl StorageGateway {
    /// Build a gateway reading its descriptor through `secrets` and
    /// connecting remote accounts through `connector`.
    pub fn new(
        config: &GatewayConfig,
        secrets: Arc<dyn SecretResolver>,
        connector: Arc<dyn RemoteConnector>,
    ) -> Self {
        Self {
            secret_source: config.secret.clone(),
            secrets,
            connector,
            policy: config.signed_urls.policy(),
            metrics: None,
        }
    }

    /// Record operation latencies and errors on `meter`.
    pub fn with_metrics(mut self, meter: &Meter) -> Self {
        self.metrics = Some(GatewayMetrics::new(meter));
        self
    }

    /// Windows and permissions applied to remote signed URLs.
    pub fn signed_url_policy(&self) -> &SignedUrlPolicy {
        &self.policy
    }

    /// Fetch and classify the descriptor, then build its backend.
    pub async fn backend(&self) -> StorageResult<Backend> {
        let descriptor = self
            .secrets
            .resolve(&self.secret_source)
            .await
            .map_err(|source| StorageError::SecretUnavailable { source })?;
        let descriptor = classify(&descriptor)?;
        Backend::connect(descriptor, self.connector.as_ref(), self.policy).await
    }

    async fn run<T, F, Fut>(
        &self,
        operation: Operation,
        container: &str,
        path: &str,
        f: F,
    ) -> StorageResult<T>
    where
        F: FnOnce(Backend) -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let result = match self.backend().await {
            Ok(backend) => {
                let name = backend.name();
                let _timer = self.metrics.as_ref().map(|m| m.timer(operation, name));
                f(backend).await.map_err(|e| (name, e))
            }
            Err(e) => Err(("unresolved", e)),
        };

        result.map_err(|(backend, err)| {
            if let Some(metrics) = &self.metrics {
                metrics.record_error(operation, backend);
            }
            match &err {
                StorageError::NotFound { .. } => {
                    debug!(%operation, backend, container, path, "object not found")
                }
                _ => warn!(%operation, backend, container, path, error = %err, "storage operation failed"),
            }
            err
        })
    }

    /// Store `data` at `(container, path)`, replacing any existing object.
    pub async fn upload(
        &self,
        container: &str,
        path: &str,
        data: impl Into<Bytes>,
    ) -> StorageResult<FileRecord> {
        let data = data.into();
        self.run(Operation::Upload, container, path, |backend| async move {
            backend.upload(container, path, data).await
        })
        .await
    }

    /// Fetch a whole object. Fails with `NotFound` if it does not exist.
    pub async fn download(&self, container: &str, path: &str) -> StorageResult<Bytes> {
        self.run(Operation::Download, container, path, |backend| async move {
            backend.download(container, path).await
        })
        .await
    }

    /// Delete an object. `Ok(false)` means there was nothing to delete.
    pub async fn delete(&self, container: &str, path: &str) -> StorageResult<bool> {
        self.run(Operation::Delete, container, path, |backend| async move {
            backend.delete(container, path).await
        })
        .await
    }

    /// Whether an object exists at `(container, path)`.
    pub async fn exists(&self, container: &str, path: &str) -> StorageResult<bool> {
        self.run(Operation::Exists, container, path, |backend| async move {
            backend.exists(container, path).await
        })
        .await
    }

    /// One level of entries below `prefix`; empty when nothing matches.
    pub async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<FileRecord>> {
        self.run(Operation::List, container, prefix, |backend| async move {
            backend.list(container, prefix).await
        })
        .await
    }

    /// Short-lived access URL for a single object.
    pub async fn signed_url(&self, container: &str, path: &str) -> StorageResult<SignedUrl> {
        self.run(Operation::SignedUrl, container, path, |backend| async move {
            backend.signed_url(container, path).await
        })
        .await
    }

    /// Longer-lived, broader access URL for a directory.
    ///
    /// Local URLs point at `container/directory`; remote grants cover the
    /// whole container the directory lives in.
    pub async fn container_signed_url(
        &self,
        container: &str,
        directory: &str,
    ) -> StorageResult<SignedUrl> {
        self.run(Operation::SignedUrl, container, directory, |backend| async move {
            backend.container_signed_url(container, directory).await
        })
        .await
    }

    /// Remote object metadata; the local backend has none.
    pub async fn get_metadata(&self, container: &str, path: &str) -> StorageResult<Metadata> {
        self.run(Operation::GetMetadata, container, path, |backend| async move {
            backend.get_metadata(container, path).await
        })
        .await
    }

    /// Merge `metadata` into the object's existing metadata.
    pub async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: Metadata,
    ) -> StorageResult<()> {
        self.run(Operation::SetMetadata, container, path, |backend| async move {
            backend.set_metadata(container, path, metadata).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;
    use crate::{StaticSecretResolver, memory::InMemoryRemoteStore};

    struct FailingResolver;

    #[async_trait]
    impl SecretResolver for FailingResolver {
        async fn resolve(&self, source: &SecretSource) -> anyhow::Result<String> {
            Err(anyhow!("vault refused access to {}", source.name))
        }
    }

    fn gateway(secrets: Arc<dyn SecretResolver>) -> StorageGateway {
        StorageGateway::new(
            &GatewayConfig::default(),
            secrets,
            Arc::new(InMemoryRemoteStore::new("acct")),
        )
    }

    #[tokio::test]
    async fn test_secret_failure_is_distinct() {
        let gateway = gateway(Arc::new(FailingResolver));
        let err = gateway.download("docs", "a.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::SecretUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_descriptor_is_configuration_error() {
        let gateway = gateway(Arc::new(StaticSecretResolver::new("LOCAL;onlyonefield")));
        let err = gateway.list("docs", "").await.unwrap_err();
        assert!(matches!(err, StorageError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_unknown_account_is_configuration_error() {
        let gateway = gateway(Arc::new(StaticSecretResolver::new("other;a2V5")));
        let err = gateway.list("docs", "").await.unwrap_err();
        assert!(matches!(err, StorageError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_backend_selection() {
        let temp_dir = tempfile::tempdir().unwrap();
        let local = gateway(Arc::new(StaticSecretResolver::new(format!(
            "LOCAL;{};http://host/files",
            temp_dir.path().display()
        ))));
        assert_eq!(local.backend().await.unwrap().name(), "local");

        let remote = gateway(Arc::new(StaticSecretResolver::new("acct;a2V5")));
        assert_eq!(remote.backend().await.unwrap().name(), "remote");
    }

    #[tokio::test]
    async fn test_metrics_do_not_change_results() {
        let meter = opentelemetry::global::meter("storage_gateway_test");
        let gateway = gateway(Arc::new(StaticSecretResolver::new("acct;a2V5"))).with_metrics(&meter);

        gateway.upload("docs", "a.txt", b"hi".to_vec()).await.unwrap();
        assert_eq!(gateway.download("docs", "a.txt").await.unwrap().as_ref(), b"hi");
        assert!(matches!(
            gateway.download("docs", "b.txt").await,
            Err(StorageError::NotFound { .. })
        ));
    }
}
