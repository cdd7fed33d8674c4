//! Constants for the content store layout.

/// Directory (under the data directory) that holds all stored content.
pub const CONTENT_FOLDER_NAME: &str = "content";

/// Scope component used for files that live at the root of an owner's tree.
pub const ROOT_SCOPE_NAME: &str = "root";

/// Sizes for which a derived representation (`<handle>_<size>`) may exist.
pub const DERIVED_SIZES: [u32; 3] = [100, 250, 500];

/// Number of fresh identifiers tried before giving up on an exclusive create.
pub(crate) const MAX_PUT_ATTEMPTS: usize = 5;
