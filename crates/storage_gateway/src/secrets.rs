//! Resolution of the connection descriptor from a secret store.

use std::fmt;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment variable holding the descriptor when nothing else is set.
pub const DEFAULT_SECRET_NAME: &str = "STORAGE_CONNECTION_STRING";

/// Where the connection descriptor lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSource {
    /// Secret (or environment variable) name.
    pub name: String,

    /// Vault endpoint, for resolvers backed by a remote secret store.
    #[serde(default)]
    pub vault_url: Option<String>,
}

impl Default for SecretSource {
    fn default() -> Self {
        Self {
            name: DEFAULT_SECRET_NAME.to_string(),
            vault_url: None,
        }
    }
}

/// Fetches the connection descriptor.
///
/// Failures are surfaced to callers as
/// [`StorageError::SecretUnavailable`](crate::StorageError::SecretUnavailable)
/// and are not retried.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, source: &SecretSource) -> Result<String>;
}

/// Reads the descriptor from the environment variable named by the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretResolver;

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, source: &SecretSource) -> Result<String> {
        let value = std::env::var(&source.name)
            .with_context(|| format!("environment variable {} is not readable", source.name))?;
        if value.trim().is_empty() {
            return Err(anyhow!("environment variable {} is empty", source.name));
        }
        Ok(value)
    }
}

/// Always returns the same descriptor, for hosts that already hold it.
#[derive(Clone)]
pub struct StaticSecretResolver {
    descriptor: String,
}

impl StaticSecretResolver {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Debug for StaticSecretResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecretResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, _source: &SecretSource) -> Result<String> {
        Ok(self.descriptor.clone())
    }
}
