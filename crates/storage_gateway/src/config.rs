//! Gateway configuration.

use std::time::Duration;

use anyhow::{Result, anyhow};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{
    SecretSource,
    SignedUrlPolicy,
    presign::{DEFAULT_CONTAINER_URL_TTL, DEFAULT_OBJECT_URL_TTL},
};

/// Prefix of environment variables overriding file configuration.
/// Nested keys are separated by `__`, e.g.
/// `STORAGE_GATEWAY_SIGNED_URLS__OBJECT_TTL_SECS`.
pub const ENV_PREFIX: &str = "STORAGE_GATEWAY_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Where the connection descriptor is fetched from.
    #[serde(default)]
    pub secret: SecretSource,

    #[serde(default)]
    pub signed_urls: SignedUrlConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrlConfig {
    /// Validity of single-object URLs, in seconds.
    #[serde(default = "default_object_ttl_secs")]
    pub object_ttl_secs: u64,

    /// Validity of container-level URLs, in seconds.
    #[serde(default = "default_container_ttl_secs")]
    pub container_ttl_secs: u64,
}

fn default_object_ttl_secs() -> u64 {
    DEFAULT_OBJECT_URL_TTL.as_secs()
}

fn default_container_ttl_secs() -> u64 {
    DEFAULT_CONTAINER_URL_TTL.as_secs()
}

impl Default for SignedUrlConfig {
    fn default() -> Self {
        Self {
            object_ttl_secs: default_object_ttl_secs(),
            container_ttl_secs: default_container_ttl_secs(),
        }
    }
}

impl SignedUrlConfig {
    /// The signed URL policy these windows describe.
    pub fn policy(&self) -> SignedUrlPolicy {
        SignedUrlPolicy::new(
            Duration::from_secs(self.object_ttl_secs),
            Duration::from_secs(self.container_ttl_secs),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of compact text.
    #[serde(default)]
    pub structured: bool,
}

impl GatewayConfig {
    /// Read and validate a YAML config file.
    pub fn from_path(path: &str) -> Result<GatewayConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    /// Parse YAML, apply environment overrides and validate.
    pub fn from_yaml(config_str: &str) -> Result<GatewayConfig> {
        let config: GatewayConfig = Figment::new()
            .merge(Yaml::string(config_str))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.secret.name.trim().is_empty() {
            return Err(anyhow!("secret name must not be empty"));
        }
        self.signed_urls
            .policy()
            .validate()
            .map_err(|e| anyhow!("invalid signed url windows: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.secret.name, crate::secrets::DEFAULT_SECRET_NAME);
        assert!(!config.logging.structured);
    }

    #[test]
    fn test_from_yaml() {
        let config = GatewayConfig::from_yaml(
            r#"
secret:
  name: files-connection
  vault_url: https://vault.example.net
signed_urls:
  object_ttl_secs: 900
logging:
  structured: true
"#,
        )
        .unwrap();
        assert_eq!(config.secret.name, "files-connection");
        assert_eq!(
            config.secret.vault_url.as_deref(),
            Some("https://vault.example.net")
        );
        assert_eq!(config.signed_urls.object_ttl_secs, 900);
        assert_eq!(
            config.signed_urls.container_ttl_secs,
            DEFAULT_CONTAINER_URL_TTL.as_secs()
        );
        assert!(config.logging.structured);
    }

    #[test]
    fn test_rejects_object_window_longer_than_container() {
        let result = GatewayConfig::from_yaml(
            r#"
signed_urls:
  object_ttl_secs: 90000
  container_ttl_secs: 3600
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_secret_name() {
        let config = GatewayConfig {
            secret: SecretSource {
                name: " ".to_string(),
                vault_url: None,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("gateway.yaml");
        std::fs::write(&path, "secret:\n  name: from-file\n").unwrap();
        let config = GatewayConfig::from_path(path.to_str().unwrap()).unwrap();
        assert_eq!(config.secret.name, "from-file");
    }
}
