//! Uniform records describing stored objects and listing entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{StorageError, StorageResult};

/// One stored object or listing entry, addressed by `(container, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileRecord {
    /// Logical bucket/container name.
    pub container: String,

    /// Forward-slash path relative to the container root.
    pub path: String,
}

impl FileRecord {
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.path)
    }
}

/// A single entry returned by a one-level listing.
///
/// Remote listings are heterogeneous, so every kind keeps the string the
/// service reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    /// A stored object, identified by its full key.
    Object { key: String },

    /// A virtual directory, identified by its common prefix.
    Directory { prefix: String },

    /// Anything else the service returned, identified by its raw location.
    Other { location: String },
}

impl ListEntry {
    /// The path a [`FileRecord`] built from this entry carries.
    pub fn record_path(&self) -> &str {
        match self {
            ListEntry::Object { key } => key,
            ListEntry::Directory { prefix } => prefix,
            ListEntry::Other { location } => location,
        }
    }
}

/// Maps listing entries to records, then stamps the container name onto all
/// of them. Both passes finish before anything is returned.
pub fn records_from_entries(
    container: &str,
    entries: impl IntoIterator<Item = ListEntry>,
) -> Vec<FileRecord> {
    let mut records: Vec<FileRecord> = entries
        .into_iter()
        .map(|entry| FileRecord {
            container: String::new(),
            path: entry.record_path().to_string(),
        })
        .collect();
    for record in records.iter_mut() {
        record.container = container.to_string();
    }
    records
}

/// Normalizes a caller-supplied object path: platform separators become
/// forward slashes and leading/trailing slashes are dropped.
///
/// Empty segments, `.` and `..` are rejected so a path can never escape its
/// container.
pub fn normalize_path(path: &str) -> StorageResult<String> {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(StorageError::invalid_path(path, "empty path segment")),
            "." | ".." => {
                return Err(StorageError::invalid_path(
                    path,
                    "relative path segments are not allowed",
                ))
            }
            _ => {}
        }
    }
    Ok(trimmed.to_string())
}

/// Validates a container name. Containers are a single path segment.
pub fn validate_container(container: &str) -> StorageResult<()> {
    if container.is_empty() {
        return Err(StorageError::invalid_path(container, "container name is empty"));
    }
    if container.contains(['/', '\\']) || container == "." || container == ".." {
        return Err(StorageError::invalid_path(
            container,
            "container name must be a single path segment",
        ));
    }
    Ok(())
}
