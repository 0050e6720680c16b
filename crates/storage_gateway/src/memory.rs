//! In-process object storage implementing the remote client interface.
//!
//! Behaves like a flat key/value blob service: containers must exist before
//! objects are written to them, directories are virtual, and signed URLs use
//! a `memory://` scheme carrying the same query fields a service SAS does.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::{
    ListEntry,
    SasPermissions,
    SasScope,
    client::{Metadata, PUT_SUCCESS_STATUS, RemoteConnector, RemoteStoreClient},
    remote::RemoteCredentials,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    metadata: Metadata,
}

type Containers = HashMap<String, BTreeMap<String, StoredObject>>;

/// Shared in-memory blob service for one account. Clones share contents.
#[derive(Clone)]
pub struct InMemoryRemoteStore {
    account_name: String,
    signing_key: String,
    put_status: u16,
    containers: Arc<RwLock<Containers>>,
}

impl InMemoryRemoteStore {
    /// An empty store for `account_name`.
    pub fn new(account_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            signing_key: String::new(),
            put_status: PUT_SUCCESS_STATUS,
            containers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Make every put report `status`. Puts reporting anything other than
    /// `201` store nothing.
    pub fn with_put_status(mut self, status: u16) -> Self {
        self.put_status = status;
        self
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    fn sign(&self, permissions: &str, expiry: &str, resource: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [self.signing_key.as_str(), permissions, expiry, resource] {
            hasher.update(part.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl RemoteStoreClient for InMemoryRemoteStore {
    async fn create_container_if_absent(&self, container: &str) -> Result<()> {
        self.containers
            .write()
            .await
            .entry(container.to_string())
            .or_default();
        Ok(())
    }

    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> Result<u16> {
        let mut containers = self.containers.write().await;
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| anyhow!("container {container} does not exist"))?;
        if self.put_status == PUT_SUCCESS_STATUS {
            objects.insert(
                key.to_string(),
                StoredObject {
                    data,
                    metadata: Metadata::new(),
                },
            );
        }
        Ok(self.put_status)
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<Option<Bytes>> {
        let containers = self.containers.read().await;
        Ok(containers
            .get(container)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone()))
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<bool> {
        let mut containers = self.containers.write().await;
        Ok(containers
            .get_mut(container)
            .and_then(|objects| objects.remove(key))
            .is_some())
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<ListEntry>> {
        let containers = self.containers.read().await;
        let Some(objects) = containers.get(container) else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        let mut directories = BTreeSet::new();
        for key in objects.keys().filter(|key| key.starts_with(prefix)) {
            let rest = &key[prefix.len()..];
            match rest.find('/') {
                Some(index) => {
                    directories.insert(format!("{prefix}{}", &rest[..=index]));
                }
                None => entries.push(ListEntry::Object { key: key.clone() }),
            }
        }
        entries.extend(
            directories
                .into_iter()
                .map(|prefix| ListEntry::Directory { prefix }),
        );
        Ok(entries)
    }

    async fn get_metadata(&self, container: &str, key: &str) -> Result<Option<Metadata>> {
        let containers = self.containers.read().await;
        Ok(containers
            .get(container)
            .and_then(|objects| objects.get(key))
            .map(|object| object.metadata.clone()))
    }

    async fn set_metadata(&self, container: &str, key: &str, metadata: &Metadata) -> Result<()> {
        let mut containers = self.containers.write().await;
        let object = containers
            .get_mut(container)
            .and_then(|objects| objects.get_mut(key))
            .ok_or_else(|| anyhow!("object {container}/{key} does not exist"))?;
        object.metadata = metadata.clone();
        Ok(())
    }

    async fn signed_url(
        &self,
        scope: SasScope<'_>,
        permissions: SasPermissions,
        expires_in: Duration,
    ) -> Result<String> {
        let expiry = (Utc::now() + chrono::Duration::from_std(expires_in)?)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let permissions = permissions.to_string();
        let (resource, kind) = match scope {
            SasScope::Object { container, key } => (format!("{container}/{key}"), "b"),
            SasScope::Container { container } => (container.to_string(), "c"),
        };
        let signature = self.sign(&permissions, &expiry, &resource);
        Ok(format!(
            "memory://{}/{resource}?sr={kind}&sp={permissions}&se={expiry}&sig={signature}",
            self.account_name
        ))
    }
}

#[async_trait]
impl RemoteConnector for InMemoryRemoteStore {
    async fn connect(&self, credentials: &RemoteCredentials) -> Result<Arc<dyn RemoteStoreClient>> {
        if credentials.account_name() != self.account_name {
            return Err(anyhow!(
                "unknown storage account {}",
                credentials.account_name()
            ));
        }
        let mut client = self.clone();
        client.signing_key = credentials.account_key().to_string();
        Ok(Arc::new(client))
    }
}
