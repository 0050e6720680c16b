//! The narrow interface the remote backend needs from an object-storage
//! service client.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::{ListEntry, SasPermissions, SasScope, remote::RemoteCredentials};

/// User-defined key/value metadata attached to a remote object.
pub type Metadata = BTreeMap<String, String>;

/// Status code a successful single-shot put must report.
pub const PUT_SUCCESS_STATUS: u16 = 201;

/// Object storage operations used by [`RemoteBackend`](crate::RemoteBackend).
///
/// Implementations report absence through `Option`/`bool` return values and
/// every other failure through `Err`; the backend wraps those errors with
/// the operation and object they belong to.
#[async_trait]
pub trait RemoteStoreClient: Send + Sync {
    /// Create the container unless it already exists.
    async fn create_container_if_absent(&self, container: &str) -> Result<()>;

    /// Store `data` under `key`, replacing any previous object.
    ///
    /// Returns the transport status code of the request.
    async fn put_object(&self, container: &str, key: &str, data: Bytes) -> Result<u16>;

    /// Fetch a whole object, `None` if it does not exist.
    async fn get_object(&self, container: &str, key: &str) -> Result<Option<Bytes>>;

    /// Delete an object. Returns whether it existed.
    async fn delete_object(&self, container: &str, key: &str) -> Result<bool>;

    /// List one level below `prefix`, using `/` as the directory delimiter.
    ///
    /// A missing container lists as empty.
    async fn list_objects(&self, container: &str, prefix: &str) -> Result<Vec<ListEntry>>;

    /// Fetch an object's metadata, `None` if the object does not exist.
    async fn get_metadata(&self, container: &str, key: &str) -> Result<Option<Metadata>>;

    /// Replace an object's metadata with `metadata`.
    async fn set_metadata(&self, container: &str, key: &str, metadata: &Metadata) -> Result<()>;

    /// Generate a URL granting `permissions` on `scope` for `expires_in`.
    async fn signed_url(
        &self,
        scope: SasScope<'_>,
        permissions: SasPermissions,
        expires_in: Duration,
    ) -> Result<String>;
}

/// Builds a client for a set of account credentials.
///
/// The gateway calls this once per operation; whether the returned client
/// shares a transport with earlier ones is up to the implementation.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, credentials: &RemoteCredentials) -> Result<Arc<dyn RemoteStoreClient>>;
}
