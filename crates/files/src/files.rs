//! Filesystem-backed content store
//!
//! This module provides the [`ContentStore`] seam used by the file repository, and
//! [`FilesService`], its implementation on a local directory tree.
//!
//! # Handles
//!
//! A [`ContentHandle`] is the path of the stored bytes relative to the store root:
//!
//! ```text
//! <s1>/<s2>/<owner_id>/<folder_id | root>/<content_id>
//! ```
//!
//! Every component is either a canonical identifier or the literal `root`, so a handle can be
//! validated component by component before it is ever joined onto a filesystem path. Handles
//! read back from metadata are re-validated; a tampered record cannot escape the store root.
//!
//! # Write Semantics
//!
//! - Files are created with `create_new`, so an existing handle is never overwritten
//! - A failed write removes the partially written file before the error is returned
//! - Content is flushed to disk before `put` returns

use crate::constants::{DERIVED_SIZES, MAX_PUT_ATTEMPTS, ROOT_SCOPE_NAME};
use crate::{FilesError, FilesResult};
use chrono::{DateTime, Utc};
use drive_types::NonEmptyText;
use drive_uuid::ShardableUuid;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Opaque reference from a file node to its stored bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHandle(String);

impl ContentHandle {
    /// Validates a handle string.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidHandle`] unless the input has exactly the shape produced by
    /// [`FilesService::put`].
    pub fn parse(input: &str) -> FilesResult<Self> {
        let invalid = || FilesError::InvalidHandle(input.to_owned());

        let parts: Vec<&str> = input.split('/').collect();
        let [s1, s2, owner, folder, content] = parts.as_slice() else {
            return Err(invalid());
        };

        if !ShardableUuid::is_canonical(owner) || !ShardableUuid::is_canonical(content) {
            return Err(invalid());
        }
        if *s1 != &owner[0..2] || *s2 != &owner[2..4] {
            return Err(invalid());
        }
        if *folder != ROOT_SCOPE_NAME && !ShardableUuid::is_canonical(folder) {
            return Err(invalid());
        }

        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn relative_path(&self) -> PathBuf {
        self.0.split('/').collect()
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHandle {
    type Error = FilesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHandle> for String {
    fn from(handle: ContentHandle) -> Self {
        handle.0
    }
}

/// Where new content is grouped: the owning user and the folder the file is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentScope {
    pub owner: ShardableUuid,
    pub folder: Option<ShardableUuid>,
}

impl ContentScope {
    pub fn new(owner: ShardableUuid, folder: Option<ShardableUuid>) -> Self {
        Self { owner, folder }
    }

    fn handle_for(&self, content_id: &ShardableUuid) -> ContentHandle {
        let owner = self.owner.to_string();
        let folder = self
            .folder
            .map(|f| f.to_string())
            .unwrap_or_else(|| ROOT_SCOPE_NAME.to_owned());
        ContentHandle(format!(
            "{}/{}/{}/{}/{}",
            &owner[0..2],
            &owner[2..4],
            owner,
            folder,
            content_id
        ))
    }
}

/// Result of a successful [`ContentStore::put`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredContent {
    /// Handle to record in metadata
    pub handle: ContentHandle,

    /// Hexadecimal SHA-256 digest of the stored bytes
    pub sha256: String,

    /// Size of the content in bytes
    pub size_bytes: u64,

    /// Media type sniffed from the bytes, if recognisable
    ///
    /// Best-effort only; callers may prefer a type derived from the file name.
    pub media_type: Option<NonEmptyText>,

    /// UTC timestamp when the content was stored
    pub stored_at: DateTime<Utc>,
}

/// Persistence for raw file bytes.
pub trait ContentStore: Send + Sync {
    /// Stores `bytes` under a freshly generated handle within `scope`.
    fn put(&self, scope: &ContentScope, bytes: &[u8]) -> FilesResult<StoredContent>;

    /// Reads the bytes behind `handle`.
    ///
    /// With a size hint, a derived representation of that size is returned when one exists,
    /// otherwise the original bytes.
    fn get(&self, handle: &ContentHandle, size_hint: Option<u32>) -> FilesResult<Vec<u8>>;

    /// Removes the bytes behind `handle` along with any derived representations.
    ///
    /// Deleting a handle that has no backing bytes is not an error.
    fn delete(&self, handle: &ContentHandle) -> FilesResult<()>;
}

/// Content store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FilesService {
    root_directory: PathBuf,
}

impl FilesService {
    /// Creates a `FilesService` rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the directory does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path) -> FilesResult<Self> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Returns the canonicalised root directory.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    fn storage_path(&self, handle: &ContentHandle) -> PathBuf {
        self.root_directory.join(handle.relative_path())
    }

    fn derived_path(path: &Path, size: u32) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(format!("_{size}"));
        path.with_file_name(name)
    }
}

impl ContentStore for FilesService {
    fn put(&self, scope: &ContentScope, bytes: &[u8]) -> FilesResult<StoredContent> {
        for _attempt in 0..MAX_PUT_ATTEMPTS {
            let handle = scope.handle_for(&ShardableUuid::new());
            let storage_path = self.storage_path(&handle);

            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    ))
                })?;
            }

            match write_exclusive(&storage_path, bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to write content to {}: {}", storage_path.display(), e),
                    )))
                }
            }

            let digest = Sha256::digest(bytes);
            let media_type = infer::get(bytes).and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

            tracing::debug!(handle = %handle, size = bytes.len(), "stored content");

            return Ok(StoredContent {
                handle,
                sha256: hex::encode(digest),
                size_bytes: bytes.len() as u64,
                media_type,
                stored_at: Utc::now(),
            });
        }

        Err(FilesError::FileAlreadyExists(format!(
            "no free handle after {} attempts",
            MAX_PUT_ATTEMPTS
        )))
    }

    fn get(&self, handle: &ContentHandle, size_hint: Option<u32>) -> FilesResult<Vec<u8>> {
        let storage_path = self.storage_path(handle);

        if let Some(size) = size_hint {
            let derived = Self::derived_path(&storage_path, size);
            if derived.is_file() {
                return fs::read(&derived).map_err(FilesError::Io);
            }
        }

        if !storage_path.is_file() {
            return Err(FilesError::NotFound(handle.to_string()));
        }

        fs::read(&storage_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read content from {}: {}", storage_path.display(), e),
            ))
        })
    }

    fn delete(&self, handle: &ContentHandle) -> FilesResult<()> {
        let storage_path = self.storage_path(handle);

        remove_if_present(&storage_path)?;
        for size in DERIVED_SIZES {
            remove_if_present(&Self::derived_path(&storage_path, size))?;
        }

        Ok(())
    }
}

fn write_exclusive(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;

    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        if let Err(cleanup) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %cleanup, "failed to remove partial content");
        }
        return Err(e);
    }

    Ok(())
}

fn remove_if_present(path: &Path) -> FilesResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FilesError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to remove {}: {}", path.display(), e),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> FilesService {
        FilesService::new(temp.path()).expect("root exists")
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let result = FilesService::new(&temp.path().join("missing"));

        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_rejects_file_as_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "not a directory").unwrap();

        assert!(matches!(
            FilesService::new(&file),
            Err(FilesError::InvalidRootDirectory(_))
        ));
    }

    #[test]
    fn test_put_then_get_returns_identical_bytes() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let scope = ContentScope::new(ShardableUuid::new(), None);
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        let stored = service.put(&scope, &bytes).unwrap();

        assert_eq!(stored.size_bytes, 4096);
        assert_eq!(service.get(&stored.handle, None).unwrap(), bytes);
    }

    #[test]
    fn test_put_records_digest_and_media_type() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let scope = ContentScope::new(ShardableUuid::new(), None);
        let png_header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

        let hello = service.put(&scope, b"hello").unwrap();
        let png = service.put(&scope, &png_header).unwrap();

        assert_eq!(
            hello.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(hello.media_type.is_none());
        assert_eq!(png.media_type.unwrap().as_str(), "image/png");
    }

    #[test]
    fn test_handles_are_nested_under_owner_and_folder() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let owner = ShardableUuid::new();
        let folder = ShardableUuid::new();

        let at_root = service.put(&ContentScope::new(owner, None), b"a").unwrap();
        let in_folder = service
            .put(&ContentScope::new(owner, Some(folder)), b"b")
            .unwrap();

        let owner_prefix = owner.shard_path().to_string_lossy().replace('\\', "/");
        assert!(at_root
            .handle
            .as_str()
            .starts_with(&format!("{owner_prefix}/root/")));
        assert!(in_folder
            .handle
            .as_str()
            .starts_with(&format!("{owner_prefix}/{folder}/")));
        assert!(service.storage_path(&in_folder.handle).is_file());
    }

    #[test]
    fn test_identical_bytes_get_distinct_handles() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let scope = ContentScope::new(ShardableUuid::new(), None);

        let first = service.put(&scope, b"same").unwrap();
        let second = service.put(&scope, b"same").unwrap();

        assert_ne!(first.handle, second.handle);
        service.delete(&first.handle).unwrap();
        assert_eq!(service.get(&second.handle, None).unwrap(), b"same");
    }

    #[test]
    fn test_get_missing_handle_is_not_found() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let handle = ContentScope::new(ShardableUuid::new(), None).handle_for(&ShardableUuid::new());

        assert!(matches!(
            service.get(&handle, None),
            Err(FilesError::NotFound(_))
        ));
        assert!(matches!(
            service.get(&handle, Some(500)),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    fn test_size_hint_prefers_derived_and_falls_back_to_original() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let scope = ContentScope::new(ShardableUuid::new(), None);
        let stored = service.put(&scope, b"original").unwrap();

        assert_eq!(service.get(&stored.handle, Some(250)).unwrap(), b"original");

        let path = service.storage_path(&stored.handle);
        fs::write(FilesService::derived_path(&path, 250), b"small").unwrap();

        assert_eq!(service.get(&stored.handle, Some(250)).unwrap(), b"small");
        assert_eq!(service.get(&stored.handle, Some(500)).unwrap(), b"original");
        assert_eq!(service.get(&stored.handle, None).unwrap(), b"original");
    }

    #[test]
    fn test_delete_is_idempotent_and_removes_derived() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp);
        let scope = ContentScope::new(ShardableUuid::new(), Some(ShardableUuid::new()));
        let stored = service.put(&scope, b"bytes").unwrap();
        let path = service.storage_path(&stored.handle);
        let derived = FilesService::derived_path(&path, 100);
        fs::write(&derived, b"thumb").unwrap();

        service.delete(&stored.handle).unwrap();
        service.delete(&stored.handle).unwrap();

        assert!(!path.exists());
        assert!(!derived.exists());
        assert!(path.parent().unwrap().is_dir());
        assert!(matches!(
            service.get(&stored.handle, None),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    fn test_put_succeeds_while_last_file_in_scope_is_deleted() {
        let temp = TempDir::new().unwrap();
        let service = Arc::new(service(&temp));
        let scope = ContentScope::new(ShardableUuid::new(), Some(ShardableUuid::new()));

        for _ in 0..200 {
            let first = service.put(&scope, b"a").unwrap();

            let writer = {
                let service = service.clone();
                thread::spawn(move || service.put(&scope, b"b"))
            };
            service.delete(&first.handle).unwrap();

            let second = writer.join().unwrap().unwrap();
            assert_eq!(service.get(&second.handle, None).unwrap(), b"b");
            service.delete(&second.handle).unwrap();
        }
    }

    #[test]
    fn test_handle_parse_accepts_generated_handles() {
        let scope = ContentScope::new(ShardableUuid::new(), Some(ShardableUuid::new()));
        let handle = scope.handle_for(&ShardableUuid::new());

        assert_eq!(ContentHandle::parse(handle.as_str()).unwrap(), handle);
    }

    #[test]
    fn test_handle_parse_rejects_traversal_and_mismatched_shards() {
        let owner = "550e8400e29b41d4a716446655440000";
        let content = "6ba7b8109dad11d180b400c04fd430c8";
        for bad in [
            String::new(),
            "../../etc/passwd".to_owned(),
            format!("55/0e/{owner}/../{content}"),
            format!("55/0e/{owner}/root/{content}/extra"),
            format!("aa/bb/{owner}/root/{content}"),
            format!("55/0e/{owner}/Root/{content}"),
            format!("/55/0e/{owner}/root/{content}"),
        ] {
            assert!(
                matches!(ContentHandle::parse(&bad), Err(FilesError::InvalidHandle(_))),
                "{bad} should be rejected"
            );
        }
        assert!(ContentHandle::parse(&format!("55/0e/{owner}/root/{content}")).is_ok());
    }

    #[test]
    fn test_handle_deserialization_validates() {
        let bad: Result<ContentHandle, _> = serde_json::from_str("\"../secret\"");
        assert!(bad.is_err());
    }
}
