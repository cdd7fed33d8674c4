//! Identifier and sharded-path utilities.
//!
//! Drive identifies users, file nodes and stored content with UUIDs rendered in a *canonical*
//! form: **32 lowercase hexadecimal characters** (no hyphens), the same value produced by
//! `Uuid::new_v4().simple().to_string()`.
//!
//! This crate provides:
//! - A wrapper type ([`ShardableUuid`]) that guarantees the canonical format once constructed.
//! - Shared sharding logic used to derive on-disk locations from an identifier.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, records live under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `drive_data/metadata/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! Sharding keeps the fan-out of any single directory small.

mod service;

pub use service::{ShardableUuid, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
