//! Connection descriptor parsing.
//!
//! A single descriptor string selects the backend:
//!
//! - `LOCAL;<base path>;<public base url>` routes to the local filesystem.
//! - anything else is remote account credentials, see
//!   [`RemoteCredentials::parse`].

use std::path::PathBuf;

use crate::{StorageError, StorageResult, remote::RemoteCredentials};

/// Reserved marker that starts a local-mode descriptor.
pub const LOCAL_MARKER: &str = "LOCAL";

/// Field delimiter used by every descriptor form.
pub const DESCRIPTOR_DELIMITER: char = ';';

/// The backend a descriptor routes to, with its parameters.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    Local {
        base_path: PathBuf,
        public_base_url: String,
    },
    Remote(RemoteCredentials),
}

impl ConnectionDescriptor {
    /// Short backend name used in logs, errors and metric labels.
    pub fn backend_name(&self) -> &'static str {
        match self {
            ConnectionDescriptor::Local { .. } => "local",
            ConnectionDescriptor::Remote(_) => "remote",
        }
    }
}

// Credentials must never end up in logs.
impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionDescriptor::Local {
                base_path,
                public_base_url,
            } => f
                .debug_struct("Local")
                .field("base_path", base_path)
                .field("public_base_url", public_base_url)
                .finish(),
            ConnectionDescriptor::Remote(credentials) => {
                f.debug_tuple("Remote").field(credentials).finish()
            }
        }
    }
}

/// Decide which backend a descriptor routes to. Pure and deterministic.
pub fn classify(descriptor: &str) -> StorageResult<ConnectionDescriptor> {
    let descriptor = descriptor.trim();
    if !descriptor.starts_with(LOCAL_MARKER) {
        return RemoteCredentials::parse(descriptor).map(ConnectionDescriptor::Remote);
    }

    let fields: Vec<&str> = descriptor.split(DESCRIPTOR_DELIMITER).collect();
    if fields.len() != 3 {
        return Err(StorageError::configuration(format!(
            "local descriptor must have exactly 3 '{}'-separated fields \
             (marker, base path, public base url), found {}",
            DESCRIPTOR_DELIMITER,
            fields.len()
        )));
    }

    let base_path = fields[1].trim();
    let public_base_url = fields[2].trim();
    if base_path.is_empty() {
        return Err(StorageError::configuration(
            "local descriptor has an empty base path",
        ));
    }
    if public_base_url.is_empty() {
        return Err(StorageError::configuration(
            "local descriptor has an empty public base url",
        ));
    }
    url::Url::parse(public_base_url).map_err(|e| {
        StorageError::configuration(format!(
            "local descriptor public base url '{public_base_url}' is invalid: {e}"
        ))
    })?;

    Ok(ConnectionDescriptor::Local {
        base_path: PathBuf::from(base_path),
        public_base_url: public_base_url.to_string(),
    })
}
