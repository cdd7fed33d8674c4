//! Wire types.
//!
//! JSON field names are camelCase. Request bodies default every field so that a missing field
//! reaches the service and is reported with its own validation message.

use drive_core::{FileNode, PathEntry, User};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectRes {
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateUserReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRes {
    pub id: String,
    pub email: String,
}

impl From<&User> for UserRes {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateFileReq {
    pub name: String,
    /// `folder` or `file`
    #[serde(rename = "type")]
    pub kind: String,
    /// Absent, null or empty for the root
    pub parent_id: Option<String>,
    /// Base64 content, required for files
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RenameFileReq {
    pub name: String,
}

/// A node as seen by clients. The content handle is internal and never serialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRes {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parent_id: Option<String>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&FileNode> for FileRes {
    fn from(node: &FileNode) -> Self {
        Self {
            id: node.id.to_string(),
            user_id: node.user_id.to_string(),
            name: node.name.to_string(),
            kind: node.node_type().to_string(),
            parent_id: node.parent_id.map(|p| p.to_string()),
            is_public: node.is_public,
            mime_type: node.mime_type().map(str::to_owned),
            size: node.size(),
            created_at: node.created_at.to_rfc3339(),
            updated_at: node.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListFilesRes {
    pub files: Vec<FileRes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PathEntryRes {
    pub id: String,
    pub name: String,
}

impl From<PathEntry> for PathEntryRes {
    fn from(entry: PathEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PathRes {
    pub path: Vec<PathEntryRes>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    /// Folder to list; absent or empty lists the root
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileDataQuery {
    /// Derived representation width: 100, 250 or 500
    pub size: Option<String>,
    /// `1` or `true` to download as an attachment
    pub dl: Option<String>,
}

impl FileDataQuery {
    pub fn download(&self) -> bool {
        matches!(self.dl.as_deref().map(str::trim), Some("1") | Some("true"))
    }
}
