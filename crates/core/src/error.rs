use drive_files::FilesError;
use drive_types::TextError;
use drive_uuid::ShardableUuid;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("permission denied")]
    PermissionDenied,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("corrupt hierarchy at {id}: {reason}")]
    CorruptHierarchy { id: ShardableUuid, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("content store error: {0}")]
    Content(#[from] FilesError),
    #[error(
        "create failed and content cleanup also failed (handle: {handle}): create={create_error}; cleanup={cleanup_error}"
    )]
    CleanupAfterCreateFailed {
        handle: String,
        #[source]
        create_error: Box<DriveError>,
        cleanup_error: FilesError,
    },
    #[error("token store is not connected")]
    TokenStoreUnavailable,
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record: {0}")]
    RecordWrite(std::io::Error),
    #[error("failed to read record: {0}")]
    RecordRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
}

impl From<TextError> for DriveError {
    fn from(e: TextError) -> Self {
        DriveError::Validation(e.to_string())
    }
}

impl DriveError {
    /// True for failures of the service itself rather than of the request.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            DriveError::InvalidCredentials
                | DriveError::Unauthenticated
                | DriveError::PermissionDenied
                | DriveError::Validation(_)
                | DriveError::NotFound(_)
                | DriveError::DuplicateEmail
        )
    }
}

pub type DriveResult<T> = std::result::Result<T, DriveError>;
