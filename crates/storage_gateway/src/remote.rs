//! Remote object-storage backend.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    FileRecord,
    Operation,
    SasScope,
    SignedUrl,
    SignedUrlPolicy,
    StorageError,
    StorageResult,
    client::{Metadata, PUT_SUCCESS_STATUS, RemoteStoreClient},
    connection::DESCRIPTOR_DELIMITER,
    record::{normalize_path, records_from_entries, validate_container},
};

const ACCOUNT_NAME_KEY: &str = "AccountName";
const ACCOUNT_KEY_KEY: &str = "AccountKey";

/// Account identity and secret for the remote service.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    account_name: String,
    account_key: String,
}

impl RemoteCredentials {
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
        }
    }

    /// Parse `account;secret`, or the keyed
    /// `AccountName=...;AccountKey=...[;...]` form where unknown keys are
    /// ignored.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        if raw.contains(&format!("{ACCOUNT_NAME_KEY}=")) {
            return Self::parse_keyed(raw);
        }

        let fields: Vec<&str> = raw.split(DESCRIPTOR_DELIMITER).map(str::trim).collect();
        match fields.as_slice() {
            [account, key] if !account.is_empty() && !key.is_empty() => {
                Ok(Self::new(*account, *key))
            }
            _ => Err(StorageError::configuration(format!(
                "remote descriptor must be '<account>{DESCRIPTOR_DELIMITER}<secret>', found {} field(s)",
                fields.len()
            ))),
        }
    }

    fn parse_keyed(raw: &str) -> StorageResult<Self> {
        let mut account_name = None;
        let mut account_key = None;
        for field in raw.split(DESCRIPTOR_DELIMITER).map(str::trim) {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            if key.eq_ignore_ascii_case(ACCOUNT_NAME_KEY) {
                account_name = Some(value.trim());
            } else if key.eq_ignore_ascii_case(ACCOUNT_KEY_KEY) {
                account_key = Some(value.trim());
            }
        }
        match (account_name, account_key) {
            (Some(name), Some(key)) if !name.is_empty() && !key.is_empty() => {
                Ok(Self::new(name, key))
            }
            _ => Err(StorageError::configuration(format!(
                "remote descriptor must set both {ACCOUNT_NAME_KEY} and {ACCOUNT_KEY_KEY}"
            ))),
        }
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn account_key(&self) -> &str {
        &self.account_key
    }
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .finish()
    }
}

/// Storage backed by a remote object-storage container.
pub struct RemoteBackend {
    client: Arc<dyn RemoteStoreClient>,
    policy: SignedUrlPolicy,
}

impl RemoteBackend {
    /// Backend issuing requests through `client` and signing URLs per `policy`.
    pub fn new(client: Arc<dyn RemoteStoreClient>, policy: SignedUrlPolicy) -> Self {
        Self { client, policy }
    }

    fn object_key(container: &str, path: &str) -> StorageResult<String> {
        validate_container(container)?;
        let key = normalize_path(path)?;
        if key.is_empty() {
            return Err(StorageError::invalid_path(path, "object path is empty"));
        }
        Ok(key)
    }

    /// Upload a whole buffer, creating the container first if needed.
    ///
    /// Anything but a `201` from the service is a failure, even when the
    /// client itself reported no error.
    pub async fn upload(&self, container: &str, path: &str, data: Bytes) -> StorageResult<FileRecord> {
        let key = Self::object_key(container, path)?;
        let size = data.len();

        self.client
            .create_container_if_absent(container)
            .await
            .map_err(|e| StorageError::backend(Operation::Upload, container, &key, e))?;

        let status = self
            .client
            .put_object(container, &key, data)
            .await
            .map_err(|e| StorageError::backend(Operation::Upload, container, &key, e))?;
        if status != PUT_SUCCESS_STATUS {
            warn!(container, key = %key, status, "remote put returned unexpected status");
            return Err(StorageError::backend(
                Operation::Upload,
                container,
                &key,
                anyhow::anyhow!("unexpected status {status}, expected {PUT_SUCCESS_STATUS}"),
            ));
        }

        debug!(container, key = %key, size, "uploaded remote object");
        Ok(FileRecord::new(container, key))
    }

    /// Download a whole object into memory.
    pub async fn download(&self, container: &str, path: &str) -> StorageResult<Bytes> {
        let key = Self::object_key(container, path)?;
        self.client
            .get_object(container, &key)
            .await
            .map_err(|e| StorageError::backend(Operation::Download, container, &key, e))?
            .ok_or_else(|| StorageError::not_found(container, &key))
    }

    /// Delete an object. `Ok(false)` means it was not there.
    pub async fn delete(&self, container: &str, path: &str) -> StorageResult<bool> {
        let key = Self::object_key(container, path)?;
        let deleted = self
            .client
            .delete_object(container, &key)
            .await
            .map_err(|e| StorageError::backend(Operation::Delete, container, &key, e))?;
        debug!(container, key = %key, deleted, "deleted remote object");
        Ok(deleted)
    }

    /// Whether an object exists.
    pub async fn exists(&self, container: &str, path: &str) -> StorageResult<bool> {
        let key = Self::object_key(container, path)?;
        // A metadata fetch is a properties request; it never transfers content.
        let metadata = self
            .client
            .get_metadata(container, &key)
            .await
            .map_err(|e| StorageError::backend(Operation::Exists, container, &key, e))?;
        Ok(metadata.is_some())
    }

    /// One level of objects and virtual directories below `prefix`.
    pub async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<FileRecord>> {
        validate_container(container)?;
        let mut prefix = normalize_path(prefix)?;
        if !prefix.is_empty() {
            prefix.push('/');
        }

        let entries = self
            .client
            .list_objects(container, &prefix)
            .await
            .map_err(|e| StorageError::backend(Operation::List, container, &prefix, e))?;
        let records = records_from_entries(container, entries);
        debug!(container, prefix = %prefix, count = records.len(), "listed remote objects");
        Ok(records)
    }

    /// All metadata of an object. Fails with `NotFound` if it does not exist.
    pub async fn get_metadata(&self, container: &str, path: &str) -> StorageResult<Metadata> {
        let key = Self::object_key(container, path)?;
        self.client
            .get_metadata(container, &key)
            .await
            .map_err(|e| StorageError::backend(Operation::GetMetadata, container, &key, e))?
            .ok_or_else(|| StorageError::not_found(container, &key))
    }

    /// Merge `metadata` into the object's existing metadata and commit it.
    pub async fn set_metadata(
        &self,
        container: &str,
        path: &str,
        metadata: Metadata,
    ) -> StorageResult<()> {
        let key = Self::object_key(container, path)?;
        let mut merged = self
            .client
            .get_metadata(container, &key)
            .await
            .map_err(|e| StorageError::backend(Operation::SetMetadata, container, &key, e))?
            .ok_or_else(|| StorageError::not_found(container, &key))?;
        merged.extend(metadata);

        self.client
            .set_metadata(container, &key, &merged)
            .await
            .map_err(|e| StorageError::backend(Operation::SetMetadata, container, &key, e))?;
        debug!(container, key = %key, entries = merged.len(), "committed remote metadata");
        Ok(())
    }

    /// Short-lived read/write/list URL for one object.
    pub async fn signed_url(&self, container: &str, path: &str) -> StorageResult<SignedUrl> {
        let key = Self::object_key(container, path)?;
        let grant = self.policy.object;
        let url = self
            .client
            .signed_url(
                SasScope::Object {
                    container,
                    key: &key,
                },
                grant.permissions,
                grant.expires_in,
            )
            .await
            .map_err(|e| StorageError::backend(Operation::SignedUrl, container, &key, e))?;
        Ok(SignedUrl::signed(url, grant))
    }

    /// Longer-lived full-access URL for the container holding `directory`.
    ///
    /// Directories are virtual here, so the grant always covers the whole
    /// container; `directory` is only validated.
    pub async fn container_signed_url(
        &self,
        container: &str,
        directory: &str,
    ) -> StorageResult<SignedUrl> {
        validate_container(container)?;
        normalize_path(directory)?;
        let grant = self.policy.container;
        let url = self
            .client
            .signed_url(
                SasScope::Container { container },
                grant.permissions,
                grant.expires_in,
            )
            .await
            .map_err(|e| StorageError::backend(Operation::SignedUrl, container, "", e))?;
        Ok(SignedUrl::signed(url, grant))
    }
}
