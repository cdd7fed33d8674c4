//! File repository.
//!
//! Owns the folder/file hierarchy: creation under a parent, ownership and visibility checks,
//! breadcrumb resolution, renames, and recursive deletion. Node records go through a
//! [`MetadataStore`]; file bytes go through a [`ContentStore`].
//!
//! Ordering rules:
//! - On create, content is written before the node record. If the record cannot be written the
//!   content is deleted again, so a failed create leaves nothing reachable behind. The metadata
//!   store re-checks the parent when the record is committed, so a parent deleted while the
//!   content was being written fails the create instead of leaving an orphan.
//! - On delete, each file's content is released before its record is removed, and descendants
//!   go before their ancestors. A folder that gains a child mid-delete is walked again.

use crate::constants::DEFAULT_MIME_TYPE;
use crate::metadata::{MetadataStore, Removal};
use crate::node::{FileNode, NodeKind, NodeType, PathEntry};
use crate::{DriveError, DriveResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use drive_files::{ContentScope, ContentStore, FilesError, DERIVED_SIZES};
use drive_types::NonEmptyText;
use drive_uuid::ShardableUuid;
use std::collections::HashSet;
use std::sync::Arc;

/// Fields supplied by a client to create a node.
#[derive(Debug, Clone, Default)]
pub struct NewNode<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub parent_id: Option<ShardableUuid>,
    /// Base64 file content. Ignored for folders.
    pub data: Option<&'a str>,
}

#[derive(Clone)]
pub struct FileRepository {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    max_depth: usize,
}

impl FileRepository {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        max_depth: usize,
    ) -> Self {
        Self {
            metadata,
            content,
            max_depth,
        }
    }

    pub fn create(&self, owner: &ShardableUuid, request: NewNode<'_>) -> DriveResult<FileNode> {
        let name = NonEmptyText::new(request.name)
            .map_err(|_| DriveError::Validation("Missing name".into()))?;
        let node_type: NodeType = request.kind.parse()?;

        let bytes = match node_type {
            NodeType::Folder => None,
            NodeType::File => {
                let data = request
                    .data
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .ok_or_else(|| DriveError::Validation("Missing data".into()))?;
                let decoded = STANDARD
                    .decode(data)
                    .map_err(|_| DriveError::Validation("Invalid base64 data".into()))?;
                Some(decoded)
            }
        };

        if let Some(parent_id) = &request.parent_id {
            self.check_parent(owner, parent_id)?;
        }

        let id = ShardableUuid::new();
        let now = Utc::now();
        let mut node = FileNode {
            id,
            user_id: *owner,
            name,
            parent_id: request.parent_id,
            is_public: false,
            kind: NodeKind::Folder,
            created_at: now,
            updated_at: now,
        };

        let Some(bytes) = bytes else {
            self.metadata.insert(node.clone())?;
            tracing::info!(node_id = %id, "created folder");
            return Ok(node);
        };

        let stored = self
            .content
            .put(&ContentScope::new(*owner, request.parent_id), &bytes)?;

        let mime_type = mime_guess::from_path(node.name.as_str())
            .first_raw()
            .map(str::to_owned)
            .or_else(|| stored.media_type.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_owned());

        node.kind = NodeKind::File {
            content: stored.handle.clone(),
            mime_type,
            size: stored.size_bytes,
        };

        if let Err(create_error) = self.metadata.insert(node.clone()) {
            return match self.content.delete(&stored.handle) {
                Ok(()) => Err(create_error),
                Err(cleanup_error) => {
                    tracing::error!(
                        "content {} left behind after failed create: {}",
                        stored.handle,
                        cleanup_error
                    );
                    Err(DriveError::CleanupAfterCreateFailed {
                        handle: stored.handle.to_string(),
                        create_error: Box::new(create_error),
                        cleanup_error,
                    })
                }
            };
        }

        tracing::info!(node_id = %id, size = stored.size_bytes, "created file");
        Ok(node)
    }

    /// Returns a node the requester may read.
    pub fn get(
        &self,
        id: &ShardableUuid,
        requester: Option<&ShardableUuid>,
    ) -> DriveResult<FileNode> {
        let node = self.find(id)?;
        if !node.readable_by(requester) {
            return Err(DriveError::PermissionDenied);
        }
        Ok(node)
    }

    /// Direct children of `parent` (root when `None`). An unknown parent has no children.
    pub fn list(
        &self,
        owner: &ShardableUuid,
        parent: Option<&ShardableUuid>,
    ) -> Vec<FileNode> {
        self.metadata.children(owner, parent)
    }

    /// Ancestors of `id` from the root down to the node itself.
    ///
    /// The walk is bounded by the configured maximum depth and tracks visited ids, so a cycle
    /// or a dangling parent in stored metadata surfaces as [`DriveError::CorruptHierarchy`]
    /// instead of looping.
    pub fn resolve_path(&self, id: &ShardableUuid) -> DriveResult<Vec<PathEntry>> {
        let mut current = self.find(id)?;
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        loop {
            if !visited.insert(current.id) {
                return Err(corrupt(current.id, "cycle in parent chain"));
            }
            if path.len() >= self.max_depth {
                return Err(corrupt(current.id, "parent chain exceeds maximum depth"));
            }
            path.push(PathEntry::from(&current));

            let Some(parent_id) = current.parent_id else {
                break;
            };
            current = self
                .metadata
                .get(&parent_id)
                .ok_or_else(|| corrupt(current.id, "parent does not exist"))?;
        }

        path.reverse();
        Ok(path)
    }

    /// Breadcrumbs for a node the requester may read.
    pub fn breadcrumbs(
        &self,
        id: &ShardableUuid,
        requester: Option<&ShardableUuid>,
    ) -> DriveResult<Vec<PathEntry>> {
        self.get(id, requester)?;
        self.resolve_path(id)
    }

    /// Sets the visibility of a single node. Descendants are not affected.
    pub fn set_visibility(
        &self,
        id: &ShardableUuid,
        owner: &ShardableUuid,
        public: bool,
    ) -> DriveResult<FileNode> {
        self.owned(id, owner)?;
        self.metadata
            .update(id, &mut |node| node.is_public = public)?
            .ok_or_else(not_found)
    }

    pub fn rename(
        &self,
        id: &ShardableUuid,
        owner: &ShardableUuid,
        name: &str,
    ) -> DriveResult<FileNode> {
        let name = NonEmptyText::new(name)
            .map_err(|_| DriveError::Validation("Missing name".into()))?;
        self.owned(id, owner)?;

        let now = Utc::now();
        self.metadata
            .update(id, &mut |node| {
                node.name = name.clone();
                node.updated_at = now;
            })?
            .ok_or_else(not_found)
    }

    /// Deletes a node and, for folders, everything beneath it.
    pub fn delete(&self, id: &ShardableUuid, owner: &ShardableUuid) -> DriveResult<()> {
        let mut root = self.owned(id, owner)?;
        let mut removed = 0;
        let mut blocked_on = None;

        loop {
            let order = self.subtree(root, owner);
            let mut progress = 0;
            let mut kept = None;

            for node in order.iter().rev() {
                if let Some(handle) = node.content_handle() {
                    self.content.delete(handle)?;
                }
                match self.metadata.remove(&node.id)? {
                    Removal::Removed => progress += 1,
                    Removal::Missing => {}
                    Removal::HasChildren => {
                        kept = Some(node.id);
                        break;
                    }
                }
            }
            removed += progress;

            let Some(kept) = kept else {
                break;
            };
            // Stuck on the same folder twice: the blocking child is not in the owner's tree.
            if progress == 0 && blocked_on == Some(kept) {
                return Err(corrupt(kept, "children outside the owner's tree"));
            }
            blocked_on = Some(kept);
            tracing::debug!(node_id = %kept, "folder gained a child during delete, walking again");
            match self.metadata.get(id) {
                Some(node) => root = node,
                None => break,
            }
        }

        tracing::info!(node_id = %id, removed, "deleted node");
        Ok(())
    }

    /// `root` and its descendants in pre-order.
    fn subtree(&self, root: FileNode, owner: &ShardableUuid) -> Vec<FileNode> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id) {
                continue;
            }
            if node.is_folder() {
                stack.extend(self.metadata.children(owner, Some(&node.id)));
            }
            order.push(node);
        }
        order
    }

    /// Reads a file's bytes, or a derived representation of them when `size_hint` is given.
    pub fn read_content(
        &self,
        id: &ShardableUuid,
        requester: Option<&ShardableUuid>,
        size_hint: Option<u32>,
    ) -> DriveResult<(FileNode, Vec<u8>)> {
        let node = self.get(id, requester)?;
        if let Some(size) = size_hint {
            if !DERIVED_SIZES.contains(&size) {
                return Err(DriveError::Validation("Invalid size".into()));
            }
        }
        let Some(handle) = node.content_handle() else {
            return Err(DriveError::Validation("A folder doesn't have content".into()));
        };

        let bytes = match self.content.get(handle, size_hint) {
            Ok(bytes) => bytes,
            Err(FilesError::NotFound(_)) => {
                return Err(DriveError::NotFound("Content not found".into()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok((node, bytes))
    }

    fn find(&self, id: &ShardableUuid) -> DriveResult<FileNode> {
        self.metadata.get(id).ok_or_else(not_found)
    }

    fn owned(&self, id: &ShardableUuid, owner: &ShardableUuid) -> DriveResult<FileNode> {
        let node = self.find(id)?;
        if node.user_id != *owner {
            return Err(DriveError::PermissionDenied);
        }
        Ok(node)
    }

    fn check_parent(&self, owner: &ShardableUuid, parent_id: &ShardableUuid) -> DriveResult<()> {
        let parent = self
            .metadata
            .get(parent_id)
            .ok_or_else(|| DriveError::NotFound("Parent not found".into()))?;
        if parent.user_id != *owner {
            return Err(DriveError::PermissionDenied);
        }
        if !parent.is_folder() {
            return Err(DriveError::Validation("Parent is not a folder".into()));
        }
        if self.resolve_path(parent_id)?.len() >= self.max_depth {
            return Err(DriveError::Validation("Maximum folder depth exceeded".into()));
        }
        Ok(())
    }
}

fn not_found() -> DriveError {
    DriveError::NotFound("Not found".into())
}

fn corrupt(id: ShardableUuid, reason: &str) -> DriveError {
    tracing::error!(node_id = %id, "corrupt hierarchy: {}", reason);
    DriveError::CorruptHierarchy {
        id,
        reason: reason.to_owned(),
    }
}
