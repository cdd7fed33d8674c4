//! Drive content storage
//!
//! This crate persists the raw bytes of uploaded files. Metadata (names, hierarchy, visibility)
//! lives elsewhere; a file node only keeps the opaque [`ContentHandle`] returned by
//! [`ContentStore::put`].
//!
//! ## Design Principles
//!
//! - Handles are generated, never supplied by callers, so a write can never clobber existing
//!   content
//! - Stored bytes are immutable; new content always produces a new handle
//! - Reads of a missing handle fail; deletes of a missing handle succeed
//! - Derived representations (e.g. thumbnails) are optional and looked up by size
//!
//! ## Storage Layout
//!
//! Content is grouped per owner and per folder so the tree stays traceable by a human:
//!
//! ```text
//! content/
//! └── 55/0e/<owner_id>/        # owner, sharded
//!     ├── root/                # files at the owner's root
//!     │   └── <content_id>
//!     └── <folder_id>/
//!         ├── <content_id>
//!         └── <content_id>_500 # optional derived representation
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use drive_files::{ContentScope, ContentStore, FilesService};
//! use drive_uuid::ShardableUuid;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FilesService::new(Path::new("drive_data/content"))?;
//! let scope = ContentScope::new(ShardableUuid::new(), None);
//! let stored = service.put(&scope, b"hello")?;
//! assert_eq!(service.get(&stored.handle, None)?, b"hello");
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{CONTENT_FOLDER_NAME, DERIVED_SIZES, ROOT_SCOPE_NAME};
pub use files::{ContentHandle, ContentScope, ContentStore, FilesService, StoredContent};
pub use drive_uuid::ShardableUuid;

/// Errors that can occur during content operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Handle is not of the form produced by this store
    #[error("Invalid content handle: {0}")]
    InvalidHandle(String),

    /// No bytes are stored under the handle
    #[error("Content not found: {0}")]
    NotFound(String),

    /// Exclusive create kept colliding with existing content
    #[error("Content already exists at {0}")]
    FileAlreadyExists(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for content operations.
pub type FilesResult<T> = Result<T, FilesError>;
