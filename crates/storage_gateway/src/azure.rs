//! Azure Blob Storage client for the remote backend.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::{StatusCode, error::ErrorKind, request_options::Metadata as AzureMetadata};
use azure_storage::{StorageCredentials, shared_access_signature::service_sas::BlobSasPermissions};
use azure_storage_blobs::{container::operations::BlobItem, prelude::*};
use bytes::Bytes;
use futures::StreamExt;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    ListEntry,
    RemoteCredentials,
    SasPermissions,
    SasScope,
    client::{Metadata, PUT_SUCCESS_STATUS, RemoteConnector, RemoteStoreClient},
};

/// Connects to Azure storage accounts with shared-key credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureConnector;

#[async_trait]
impl RemoteConnector for AzureConnector {
    async fn connect(&self, credentials: &RemoteCredentials) -> Result<Arc<dyn RemoteStoreClient>> {
        let storage_credentials = StorageCredentials::access_key(
            credentials.account_name().to_string(),
            credentials.account_key().to_string(),
        );
        let service = BlobServiceClient::new(credentials.account_name(), storage_credentials);
        debug!(account = credentials.account_name(), "created azure blob client");
        Ok(Arc::new(AzureBlobClient { service }))
    }
}

/// [`RemoteStoreClient`] over one Azure storage account.
pub struct AzureBlobClient {
    service: BlobServiceClient,
}

fn has_status(err: &azure_core::Error, status: StatusCode) -> bool {
    match err.kind() {
        ErrorKind::HttpResponse { status: actual, .. } => *actual == status,
        _ => false,
    }
}

fn blob_permissions(permissions: SasPermissions) -> BlobSasPermissions {
    BlobSasPermissions {
        read: permissions.read,
        add: permissions.add,
        create: permissions.create,
        write: permissions.write,
        delete: permissions.delete,
        list: permissions.list,
        ..Default::default()
    }
}

/// Convert service metadata, rejecting values that are not UTF-8.
fn metadata_from_azure(mut metadata: AzureMetadata) -> Result<Metadata> {
    metadata
        .as_mut()
        .drain()
        .map(|(name, value)| {
            let value = String::from_utf8(value.to_vec())
                .with_context(|| format!("metadata value of {name} is not UTF-8"))?;
            Ok::<_, anyhow::Error>((name, value))
        })
        .collect()
}

fn expiry_after(expires_in: Duration) -> OffsetDateTime {
    OffsetDateTime::now_utc() + expires_in
}

#[async_trait]
impl RemoteStoreClient for AzureBlobClient {
    async fn create_container_if_absent(&self, container: &str) -> Result<()> {
        match self.service.container_client(container).create().await {
            Ok(_) => Ok(()),
            Err(err) if has_status(&err, StatusCode::Conflict) => Ok(()),
            Err(err) => Err(err).with_context(|| format!("creating container {container}")),
        }
    }

    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> Result<u16> {
        // The SDK turns every non-success response into an error, so a
        // returned response is always the service's 201.
        self.service
            .container_client(container)
            .blob_client(key)
            .put_block_blob(data)
            .await
            .with_context(|| format!("uploading {container}/{key}"))?;
        Ok(PUT_SUCCESS_STATUS)
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<Option<Bytes>> {
        let blob = self.service.container_client(container).blob_client(key);
        match blob.get_content().await {
            Ok(content) => Ok(Some(Bytes::from(content))),
            Err(err) if has_status(&err, StatusCode::NotFound) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("downloading {container}/{key}")),
        }
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<bool> {
        let blob = self.service.container_client(container).blob_client(key);
        match blob.delete().await {
            Ok(_) => Ok(true),
            Err(err) if has_status(&err, StatusCode::NotFound) => Ok(false),
            Err(err) => Err(err).with_context(|| format!("deleting {container}/{key}")),
        }
    }

    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<ListEntry>> {
        let mut builder = self
            .service
            .container_client(container)
            .list_blobs()
            .delimiter("/");
        if !prefix.is_empty() {
            builder = builder.prefix(prefix.to_string());
        }

        let mut pages = builder.into_stream();
        let mut entries = Vec::new();
        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(err) if has_status(&err, StatusCode::NotFound) => return Ok(Vec::new()),
                Err(err) => return Err(err).with_context(|| format!("listing {container}/{prefix}")),
            };
            entries.extend(page.blobs.items.into_iter().map(|item| match item {
                BlobItem::Blob(blob) => ListEntry::Object { key: blob.name },
                BlobItem::BlobPrefix(dir) => ListEntry::Directory { prefix: dir.name },
            }));
        }
        Ok(entries)
    }

    async fn get_metadata(&self, container: &str, key: &str) -> Result<Option<Metadata>> {
        let blob = self.service.container_client(container).blob_client(key);
        match blob.get_metadata().await {
            Ok(response) => metadata_from_azure(response.metadata)
                .map(Some)
                .with_context(|| format!("reading metadata of {container}/{key}")),
            Err(err) if has_status(&err, StatusCode::NotFound) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading metadata of {container}/{key}")),
        }
    }

    async fn set_metadata(&self, container: &str, key: &str, metadata: &Metadata) -> Result<()> {
        let mut azure_metadata = AzureMetadata::new();
        for (name, value) in metadata {
            azure_metadata.insert(name.clone(), value.clone());
        }
        self.service
            .container_client(container)
            .blob_client(key)
            .set_metadata()
            .metadata(azure_metadata)
            .await
            .with_context(|| format!("writing metadata of {container}/{key}"))?;
        Ok(())
    }

    async fn signed_url(
        &self,
        scope: SasScope<'_>,
        permissions: SasPermissions,
        expires_in: Duration,
    ) -> Result<String> {
        let permissions = blob_permissions(permissions);
        let expiry = expiry_after(expires_in);
        let url = match scope {
            SasScope::Object { container, key } => {
                let blob = self.service.container_client(container).blob_client(key);
                let sas = blob
                    .shared_access_signature(permissions, expiry)
                    .await
                    .with_context(|| format!("signing {container}/{key}"))?;
                blob.generate_signed_blob_url(&sas)?
            }
            SasScope::Container { container } => {
                let client = self.service.container_client(container);
                let sas = client
                    .shared_access_signature(permissions, expiry)
                    .await
                    .with_context(|| format!("signing container {container}"))?;
                client.generate_signed_container_url(&sas)?
            }
        };
        Ok(url.to_string())
    }
}
