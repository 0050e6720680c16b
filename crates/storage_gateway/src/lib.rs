//! File storage behind a single capability set.
//!
//! A connection descriptor, fetched from a secret store on every operation,
//! decides whether files live on a local filesystem or in a remote
//! object-storage account. Callers use [`StorageGateway`] and never see which
//! backend served them, except that metadata is remote-only and local access
//! URLs are unsigned.

#[cfg(feature = "azure")]
pub mod azure;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod local;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod presign;
pub mod record;
pub mod remote;
pub mod secrets;

#[cfg(feature = "azure")]
pub use azure::AzureConnector;
pub use client::{Metadata, RemoteConnector, RemoteStoreClient};
pub use config::{GatewayConfig, LoggingConfig, SignedUrlConfig};
pub use connection::{classify, ConnectionDescriptor};
pub use error::{Operation, StorageError, StorageResult};
pub use gateway::{Backend, StorageGateway};
pub use local::LocalBackend;
pub use memory::InMemoryRemoteStore;
pub use metrics::GatewayMetrics;
pub use presign::{AccessGrant, SasPermissions, SasScope, SignedUrl, SignedUrlPolicy};
pub use record::{FileRecord, ListEntry};
pub use remote::{RemoteBackend, RemoteCredentials};
pub use secrets::{EnvSecretResolver, SecretResolver, SecretSource, StaticSecretResolver};
