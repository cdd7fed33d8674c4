//! File node model.
//!
//! A node is either a folder or a file. File-only fields live inside [`NodeKind::File`], so a
//! folder cannot carry a content handle and a file cannot exist without one.

use crate::{DriveError, DriveResult};
use chrono::{DateTime, Utc};
use drive_files::ContentHandle;
use drive_types::NonEmptyText;
use drive_uuid::ShardableUuid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind-specific node data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File {
        content: ContentHandle,
        mime_type: String,
        size: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: ShardableUuid,
    pub user_id: ShardableUuid,
    pub name: NonEmptyText,
    /// `None` places the node at the owner's root.
    pub parent_id: Option<ShardableUuid>,
    pub is_public: bool,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileNode {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder)
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Folder => NodeType::Folder,
            NodeKind::File { .. } => NodeType::File,
        }
    }

    pub fn content_handle(&self) -> Option<&ContentHandle> {
        match &self.kind {
            NodeKind::File { content, .. } => Some(content),
            NodeKind::Folder => None,
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { mime_type, .. } => Some(mime_type),
            NodeKind::Folder => None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::File { size, .. } => Some(size),
            NodeKind::Folder => None,
        }
    }

    /// True when `requester` may read this node.
    pub fn readable_by(&self, requester: Option<&ShardableUuid>) -> bool {
        self.is_public || requester == Some(&self.user_id)
    }
}

/// The kind requested on create, before any content exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Folder,
    File,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Folder => "folder",
            NodeType::File => "file",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = DriveError;

    fn from_str(s: &str) -> DriveResult<Self> {
        match s.trim() {
            "" => Err(DriveError::Validation("Missing type".into())),
            "folder" => Ok(NodeType::Folder),
            "file" => Ok(NodeType::File),
            _ => Err(DriveError::Validation("Unknown type".into())),
        }
    }
}

/// One breadcrumb: an ancestor (or the node itself) on the way down from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEntry {
    pub id: ShardableUuid,
    pub name: String,
}

impl From<&FileNode> for PathEntry {
    fn from(node: &FileNode) -> Self {
        Self {
            id: node.id,
            name: node.name.to_string(),
        }
    }
}
