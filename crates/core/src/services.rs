//! Service wiring.
//!
//! Builds the session manager and file repository over the persistent stores described by a
//! [`CoreConfig`]. Binaries call [`DriveServices::open`] once at startup and share the result.

use crate::config::CoreConfig;
use crate::credentials::{CredentialStore, UserRegistry};
use crate::metadata::NodeIndex;
use crate::repository::FileRepository;
use crate::session::SessionManager;
use crate::tokens::{InMemoryTokenStore, TokenStore};
use crate::{DriveError, DriveResult};
use drive_files::FilesService;
use std::fs;
use std::sync::Arc;

#[derive(Clone)]
pub struct DriveServices {
    pub sessions: SessionManager,
    pub credentials: Arc<dyn CredentialStore>,
    pub files: FileRepository,
}

impl DriveServices {
    /// Opens every store under the configured data directory with an in-memory token store.
    pub fn open(config: &CoreConfig) -> DriveResult<Self> {
        Self::open_with_tokens(config, Arc::new(InMemoryTokenStore::new()))
    }

    /// Opens (creating if needed) every store under the configured data directory and
    /// connects `tokens`.
    pub fn open_with_tokens(config: &CoreConfig, tokens: Arc<dyn TokenStore>) -> DriveResult<Self> {
        let content_dir = config.content_dir();
        fs::create_dir_all(&content_dir).map_err(DriveError::StorageDirCreation)?;

        let credentials: Arc<dyn CredentialStore> =
            Arc::new(UserRegistry::open(&config.users_dir())?);
        let metadata = Arc::new(NodeIndex::open(&config.metadata_dir())?);
        let content = Arc::new(FilesService::new(&content_dir)?);

        tokens.connect()?;

        tracing::info!("storage ready at {}", config.data_dir().display());
        Ok(Self {
            sessions: SessionManager::new(credentials.clone(), tokens, config.token_ttl()),
            credentials,
            files: FileRepository::new(metadata, content, config.max_depth()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::NewNode;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_layout_and_persists_across_restarts() {
        let temp = TempDir::new().unwrap();
        let config = CoreConfig::with_defaults(temp.path().join("data"));

        let (owner, node_id) = {
            let services = DriveServices::open(&config).unwrap();
            let user = services
                .credentials
                .register("alice@example.com", "secret123")
                .unwrap();
            let node = services
                .files
                .create(
                    &user.id,
                    NewNode {
                        name: "a.txt",
                        kind: "file",
                        parent_id: None,
                        data: Some("aGVsbG8="),
                    },
                )
                .unwrap();
            (user.id, node.id)
        };

        assert!(config.users_dir().is_dir());
        assert!(config.metadata_dir().is_dir());
        assert!(config.content_dir().is_dir());

        let services = DriveServices::open(&config).unwrap();
        let (_, bytes) = services
            .files
            .read_content(&node_id, Some(&owner), None)
            .unwrap();
        assert_eq!(bytes, b"hello");

        // Sessions do not survive a restart, but credentials do.
        let token = services
            .sessions
            .authenticate(&STANDARD.encode("alice@example.com:secret123"))
            .unwrap();
        assert_eq!(services.sessions.resolve(&token).unwrap(), owner);
    }
}
