//! Signed access URLs and the policies that scope them.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Maximum signed URL expiry (7 days).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default window for single-object URLs (1 hour).
pub const DEFAULT_OBJECT_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Default window for container-level URLs (24 hours).
pub const DEFAULT_CONTAINER_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Permissions granted by a signed URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SasPermissions {
    pub read: bool,
    pub add: bool,
    pub create: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
}

impl SasPermissions {
    /// Read/write/list on a single object.
    pub const OBJECT_ACCESS: SasPermissions = SasPermissions {
        read: true,
        add: false,
        create: false,
        write: true,
        delete: false,
        list: true,
    };

    /// Full CRUD plus list on a whole container.
    pub const CONTAINER_ACCESS: SasPermissions = SasPermissions {
        read: true,
        add: true,
        create: true,
        write: true,
        delete: true,
        list: true,
    };
}

/// Renders the canonical `racwdl` permission string.
impl fmt::Display for SasPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.write, 'w'),
            (self.delete, 'd'),
            (self.list, 'l'),
        ];
        for (enabled, flag) in flags {
            if enabled {
                write!(f, "{flag}")?;
            }
        }
        Ok(())
    }
}

/// What a signed URL grants and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub permissions: SasPermissions,
    pub expires_in: Duration,
}

/// The resource a signed URL is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasScope<'a> {
    Object { container: &'a str, key: &'a str },
    Container { container: &'a str },
}

impl SasScope<'_> {
    pub fn container(&self) -> &str {
        match self {
            SasScope::Object { container, .. } | SasScope::Container { container } => container,
        }
    }

    /// Object key, or an empty string for container scope.
    pub fn key(&self) -> &str {
        match self {
            SasScope::Object { key, .. } => key,
            SasScope::Container { .. } => "",
        }
    }
}

/// A shareable URL.
///
/// `grant` is `None` when the URL carries no cryptographic guarantee at all,
/// which is the case for the local backend: its URL is a plain pointer into
/// a public file server and anyone holding it can use it indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub url: String,
    pub grant: Option<AccessGrant>,
}

impl SignedUrl {
    /// A URL that carries no grant.
    pub fn unsigned(url: String) -> Self {
        Self { url, grant: None }
    }

    /// A URL signed with `grant`.
    pub fn signed(url: String, grant: AccessGrant) -> Self {
        Self {
            url,
            grant: Some(grant),
        }
    }

    /// Whether the URL carries a cryptographic grant.
    pub fn is_signed(&self) -> bool {
        self.grant.is_some()
    }
}

/// Per-operation grants. Object and container access are deliberately
/// asymmetric and are never collapsed into one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedUrlPolicy {
    pub object: AccessGrant,
    pub container: AccessGrant,
}

impl SignedUrlPolicy {
    pub fn new(object_ttl: Duration, container_ttl: Duration) -> Self {
        Self {
            object: AccessGrant {
                permissions: SasPermissions::OBJECT_ACCESS,
                expires_in: object_ttl,
            },
            container: AccessGrant {
                permissions: SasPermissions::CONTAINER_ACCESS,
                expires_in: container_ttl,
            },
        }
    }

    /// Check both windows are in range and the object window is the shorter.
    pub fn validate(&self) -> Result<(), String> {
        validate_expiry(self.object.expires_in)?;
        validate_expiry(self.container.expires_in)?;
        if self.object.expires_in >= self.container.expires_in {
            return Err(format!(
                "object URL window {:?} must be shorter than container URL window {:?}",
                self.object.expires_in, self.container.expires_in
            ));
        }
        Ok(())
    }
}

impl Default for SignedUrlPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECT_URL_TTL, DEFAULT_CONTAINER_URL_TTL)
    }
}

/// Validate signed URL expiry duration.
pub fn validate_expiry(expires_in: Duration) -> Result<(), String> {
    if expires_in > MAX_PRESIGN_EXPIRY {
        Err(format!(
            "Expiry duration {:?} exceeds maximum allowed {:?}",
            expires_in, MAX_PRESIGN_EXPIRY
        ))
    } else if expires_in.is_zero() {
        Err("Expiry duration must be greater than zero".to_string())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_strings() {
        assert_eq!(SasPermissions::OBJECT_ACCESS.to_string(), "rwl");
        assert_eq!(SasPermissions::CONTAINER_ACCESS.to_string(), "racwdl");
        assert_eq!(SasPermissions::default().to_string(), "");
    }

    #[test]
    fn test_default_policy_is_asymmetric() {
        let policy = SignedUrlPolicy::default();
        assert!(policy.object.expires_in < policy.container.expires_in);
        assert_ne!(policy.object.permissions, policy.container.permissions);
        assert!(!policy.object.permissions.delete);
        assert!(policy.container.permissions.delete);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_rejects_inverted_windows() {
        let policy = SignedUrlPolicy::new(Duration::from_secs(7200), Duration::from_secs(3600));
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_validate_expiry() {
        assert!(validate_expiry(Duration::from_secs(60)).is_ok());
        assert!(validate_expiry(Duration::ZERO).is_err());
        assert!(validate_expiry(MAX_PRESIGN_EXPIRY + Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_scope_accessors() {
        let object = SasScope::Object {
            container: "docs",
            key: "a/b.txt",
        };
        assert_eq!(object.container(), "docs");
        assert_eq!(object.key(), "a/b.txt");
        let container = SasScope::Container { container: "docs" };
        assert_eq!(container.key(), "");
    }
}
