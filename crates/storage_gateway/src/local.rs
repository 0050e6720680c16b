//! Local filesystem backend.
//!
//! Every operation maps onto `base_path/container/path`. The filesystem has
//! no metadata store and no real URL signing: metadata calls fail with
//! [`StorageError::UnsupportedOperation`] and signed URLs are plain pointers
//! into a public file server.
//!
//! Uploads go through `object_store`'s local store, which stages content in
//! a sibling file named `<name>#<n>` before renaming it into place. File
//! names of that shape are therefore rejected on upload. Reads, deletes and
//! listings work on the filesystem directly, so such files are still visible
//! and reachable when something else put them there.

use std::{
    io,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use object_store::{ObjectStore, PutPayload, local::LocalFileSystem, path::Path as ObjectPath};
use tracing::debug;

use crate::{
    FileRecord,
    ListEntry,
    Operation,
    SignedUrl,
    StorageError,
    StorageResult,
    client::Metadata,
    record::{normalize_path, records_from_entries, validate_container},
};

const BACKEND_NAME: &str = "local";

/// Whether `file_name` looks like an in-flight upload staging file.
pub fn is_staging_name(file_name: &str) -> bool {
    match file_name.split_once('#') {
        Some((_, suffix)) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Storage rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalBackend {
    /// Describe the store rooted at `base_path`.
    ///
    /// Nothing is created on disk here. The root directory is created by the
    /// first upload; reads against a missing root report absence.
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Validate a container/path pair and return the normalized key.
    fn file_key(container: &str, path: &str) -> StorageResult<String> {
        validate_container(container)?;
        let key = normalize_path(path)?;
        if key.is_empty() {
            return Err(StorageError::invalid_path(path, "file path is empty"));
        }
        Ok(key)
    }

    fn io_failure(operation: Operation, container: &str, key: &str, err: io::Error) -> StorageError {
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::not_found(container, key),
            _ => StorageError::backend(operation, container, key, err),
        }
    }

    /// Absolute filesystem path of a container-relative key.
    fn resolved_path(&self, container: &str, key: &str) -> PathBuf {
        let mut resolved = self.base_path.join(container);
        if !key.is_empty() {
            resolved.push(key);
        }
        resolved
    }

    /// Open the object store over the root, creating the root first.
    async fn writable_store(&self) -> StorageResult<LocalFileSystem> {
        tokio::fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StorageError::configuration(format!(
                "cannot create storage root {}: {e}",
                self.base_path.display()
            ))
        })?;
        LocalFileSystem::new_with_prefix(&self.base_path).map_err(|e| {
            StorageError::configuration(format!(
                "cannot open storage root {}: {e}",
                self.base_path.display()
            ))
        })
    }

    /// Write `data`, replacing any existing file. The content is staged next
    /// to the target and renamed into place, so a failed upload never leaves
    /// a truncated file behind.
    pub async fn upload(&self, container: &str, path: &str, data: Bytes) -> StorageResult<FileRecord> {
        let key = Self::file_key(container, path)?;
        let file_name = key.rsplit('/').next().unwrap_or(&key);
        if is_staging_name(file_name) {
            return Err(StorageError::invalid_path(
                path,
                "file names ending in '#<digits>' are reserved for upload staging",
            ));
        }
        let location = ObjectPath::parse(format!("{container}/{key}"))
            .map_err(|e| StorageError::invalid_path(path, e.to_string()))?;

        let size = data.len();
        self.writable_store()
            .await?
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| StorageError::backend(Operation::Upload, container, &key, e))?;
        debug!(container, key = %key, size, "uploaded local file");
        Ok(FileRecord::new(container, key))
    }

    /// Read a whole file. Fails with `NotFound` if it does not exist.
    pub async fn download(&self, container: &str, path: &str) -> StorageResult<Bytes> {
        let key = Self::file_key(container, path)?;
        let data = tokio::fs::read(self.resolved_path(container, &key))
            .await
            .map_err(|e| Self::io_failure(Operation::Download, container, &key, e))?;
        Ok(Bytes::from(data))
    }

    /// Remove a file. Returns `false` when there was nothing to remove.
    pub async fn delete(&self, container: &str, path: &str) -> StorageResult<bool> {
        let key = Self::file_key(container, path)?;
        match tokio::fs::remove_file(self.resolved_path(container, &key)).await {
            Ok(()) => {
                debug!(container, key = %key, "deleted local file");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::backend(Operation::Delete, container, &key, e)),
        }
    }

    /// Whether a regular file exists at `(container, path)`.
    pub async fn exists(&self, container: &str, path: &str) -> StorageResult<bool> {
        let key = Self::file_key(container, path)?;
        match tokio::fs::metadata(self.resolved_path(container, &key)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::backend(Operation::Exists, container, &key, e)),
        }
    }

    /// Immediate children of `prefix`, files and directories alike.
    ///
    /// Paths are relative to the container root. A prefix that does not
    /// exist, or names a file, lists as empty.
    pub async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<FileRecord>> {
        validate_container(container)?;
        let prefix = normalize_path(prefix)?;
        let directory = self.resolved_path(container, &prefix);
        let failure = |e: io::Error| StorageError::backend(Operation::List, container, &prefix, e);

        match tokio::fs::metadata(&directory).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Ok(Vec::new()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(failure(e)),
        }

        let mut entries = Vec::new();
        let mut children = tokio::fs::read_dir(&directory).await.map_err(failure)?;
        while let Some(child) = children.next_entry().await.map_err(failure)? {
            let name = child.file_name().to_string_lossy().into_owned();
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            let file_type = child.file_type().await.map_err(failure)?;
            entries.push(if file_type.is_dir() {
                ListEntry::Directory { prefix: path }
            } else {
                ListEntry::Object { key: path }
            });
        }

        let records = records_from_entries(container, entries);
        debug!(container, prefix = %prefix, count = records.len(), "listed local files");
        Ok(records)
    }

    /// `public_base_url?filepath=<resolved path>`.
    ///
    /// This is not a signature: it grants nothing and expires never. It only
    /// works behind a file server that trusts the `filepath` parameter.
    pub fn signed_url(&self, container: &str, path: &str) -> StorageResult<SignedUrl> {
        let key = Self::file_key(container, path)?;
        Ok(self.file_url(&self.resolved_path(container, &key)))
    }

    /// Pointer to a directory inside a container; an empty `directory` points
    /// at the container root.
    pub fn container_signed_url(&self, container: &str, directory: &str) -> StorageResult<SignedUrl> {
        validate_container(container)?;
        let directory = normalize_path(directory)?;
        Ok(self.file_url(&self.resolved_path(container, &directory)))
    }

    fn file_url(&self, resolved: &Path) -> SignedUrl {
        SignedUrl::unsigned(format!(
            "{}?filepath={}",
            self.public_base_url,
            resolved.display()
        ))
    }

    /// Always `UnsupportedOperation`: plain files carry no metadata.
    pub fn get_metadata(&self, _container: &str, _path: &str) -> StorageResult<Metadata> {
        Err(StorageError::UnsupportedOperation {
            operation: Operation::GetMetadata,
            backend: BACKEND_NAME,
        })
    }

    /// Always `UnsupportedOperation`, never a silent no-op.
    pub fn set_metadata(&self, _container: &str, _path: &str, _metadata: Metadata) -> StorageResult<()> {
        Err(StorageError::UnsupportedOperation {
            operation: Operation::SetMetadata,
            backend: BACKEND_NAME,
        })
    }
}
