//! # Drive Core
//!
//! Core business logic for the Drive file service.
//!
//! This crate contains the session lifecycle and the file hierarchy:
//! - User registration and password verification (Argon2id)
//! - Bearer tokens with a fixed time-to-live in a connectable token store
//! - Folder/file nodes with ownership, per-node visibility and breadcrumb resolution
//! - File bytes persisted through the `drive_files` content store
//!
//! **No API concerns**: HTTP routing, headers and wire formats belong in `api-rest` and
//! `api-shared`.

pub mod clock;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod metadata;
pub mod node;
pub mod records;
pub mod repository;
pub mod services;
pub mod session;
pub mod tokens;

pub use config::CoreConfig;
pub use credentials::{CredentialStore, User, UserRegistry};
pub use error::{DriveError, DriveResult};
pub use metadata::{MetadataStore, NodeIndex, Removal};
pub use node::{FileNode, NodeKind, NodeType, PathEntry};
pub use repository::{FileRepository, NewNode};
pub use services::DriveServices;
pub use session::SessionManager;
pub use tokens::{InMemoryTokenStore, TokenStore};

pub use drive_uuid::ShardableUuid;
