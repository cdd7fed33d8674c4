//! Constants used throughout the Drive core crate.
//!
//! Path and filename constants live here so the on-disk layout is defined in one place.

/// Default directory for all persisted state when none is configured.
pub const DEFAULT_DATA_DIR: &str = "drive_data";

/// Directory name (under the data directory) for file node records.
pub const METADATA_DIR_NAME: &str = "metadata";

/// Directory name (under the data directory) for user records.
pub const USERS_DIR_NAME: &str = "users";

/// Filename of a persisted file node.
pub const NODE_RECORD_FILENAME: &str = "node.json";

/// Filename of a persisted user.
pub const USER_RECORD_FILENAME: &str = "user.json";

/// Session lifetime when none is configured (24 hours).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Maximum hierarchy depth when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Prefix of token store keys.
pub const TOKEN_KEY_PREFIX: &str = "auth_";

/// Number of random bytes in a session token.
pub const TOKEN_BYTES: usize = 32;

/// MIME type used when neither the name nor the bytes identify the content.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
