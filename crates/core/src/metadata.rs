//! Metadata store.
//!
//! Node records keyed by id. [`NodeIndex`] serves reads from a `DashMap` and, when opened on a
//! directory, writes every change through to `metadata/<s1>/<s2>/<id>/node.json` before it
//! becomes visible in memory.
//!
//! Writers to the same node are serialised by the map's entry lock: `update` applies its
//! mutation while holding the entry, and `remove` takes the same entry. A concurrent update and
//! delete therefore end with the node either updated or gone, never half of each.
//!
//! Links between nodes are guarded by a separate structure lock. `insert` checks the parent and
//! stores the child under its shared side; `remove` checks for children and drops the node under
//! its exclusive side. A child can therefore never be committed under a parent that is being
//! removed, and a folder that gains a child is not removed.

use crate::constants::NODE_RECORD_FILENAME;
use crate::node::FileNode;
use crate::records::RecordDir;
use crate::{DriveError, DriveResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use drive_uuid::ShardableUuid;
use parking_lot::RwLock;
use std::path::Path;

/// Outcome of [`MetadataStore::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Missing,
    /// The node still has children and was kept.
    HasChildren,
}

pub trait MetadataStore: Send + Sync {
    /// Stores a node, replacing any record with the same id.
    ///
    /// Fails with [`DriveError::NotFound`] when the node names a parent that does not exist.
    fn insert(&self, node: FileNode) -> DriveResult<()>;

    fn get(&self, id: &ShardableUuid) -> Option<FileNode>;

    /// Applies `mutate` to the node under its entry lock and returns the updated node, or
    /// `None` if no such node exists.
    fn update(
        &self,
        id: &ShardableUuid,
        mutate: &mut dyn FnMut(&mut FileNode),
    ) -> DriveResult<Option<FileNode>>;

    /// Removes a node unless it has children.
    fn remove(&self, id: &ShardableUuid) -> DriveResult<Removal>;

    /// Direct children of `parent` (or root-level nodes) owned by `owner`, oldest first.
    fn children(&self, owner: &ShardableUuid, parent: Option<&ShardableUuid>) -> Vec<FileNode>;
}

#[derive(Debug, Default)]
pub struct NodeIndex {
    nodes: DashMap<ShardableUuid, FileNode>,
    structure: RwLock<()>,
    records: Option<RecordDir>,
}

impl NodeIndex {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens an index persisted under `dir`, loading every stored node.
    pub fn open(dir: &Path) -> DriveResult<Self> {
        let records = RecordDir::open(dir, NODE_RECORD_FILENAME)?;
        let nodes = DashMap::new();
        for node in records.load_all::<FileNode>()? {
            nodes.insert(node.id, node);
        }

        tracing::debug!("loaded {} nodes from {}", nodes.len(), dir.display());
        Ok(Self {
            nodes,
            structure: RwLock::new(()),
            records: Some(records),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn persist(&self, node: &FileNode) -> DriveResult<()> {
        match &self.records {
            Some(records) => records.write(&node.id, node),
            None => Ok(()),
        }
    }
}

impl MetadataStore for NodeIndex {
    fn insert(&self, node: FileNode) -> DriveResult<()> {
        let _links = self.structure.read();
        if let Some(parent_id) = &node.parent_id {
            if !self.nodes.contains_key(parent_id) {
                return Err(DriveError::NotFound("Parent not found".into()));
            }
        }

        let slot = self.nodes.entry(node.id);
        self.persist(&node)?;
        slot.insert(node);
        Ok(())
    }

    fn get(&self, id: &ShardableUuid) -> Option<FileNode> {
        self.nodes.get(id).map(|n| n.clone())
    }

    fn update(
        &self,
        id: &ShardableUuid,
        mutate: &mut dyn FnMut(&mut FileNode),
    ) -> DriveResult<Option<FileNode>> {
        let Some(mut current) = self.nodes.get_mut(id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        mutate(&mut updated);
        self.persist(&updated)?;
        *current = updated.clone();
        Ok(Some(updated))
    }

    fn remove(&self, id: &ShardableUuid) -> DriveResult<Removal> {
        let _links = self.structure.write();
        if self.nodes.iter().any(|n| n.parent_id.as_ref() == Some(id)) {
            return Ok(Removal::HasChildren);
        }

        match self.nodes.entry(*id) {
            Entry::Occupied(slot) => {
                if let Some(records) = &self.records {
                    records.remove(id)?;
                }
                slot.remove();
                Ok(Removal::Removed)
            }
            Entry::Vacant(_) => Ok(Removal::Missing),
        }
    }

    fn children(&self, owner: &ShardableUuid, parent: Option<&ShardableUuid>) -> Vec<FileNode> {
        let mut children: Vec<FileNode> = self
            .nodes
            .iter()
            .filter(|n| n.user_id == *owner && n.parent_id.as_ref() == parent)
            .map(|n| n.clone())
            .collect();

        children.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use chrono::{Duration, Utc};
    use drive_types::NonEmptyText;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn folder(owner: ShardableUuid, parent: Option<ShardableUuid>, name: &str) -> FileNode {
        let now = Utc::now();
        FileNode {
            id: ShardableUuid::new(),
            user_id: owner,
            name: NonEmptyText::new(name).unwrap(),
            parent_id: parent,
            is_public: false,
            kind: NodeKind::Folder,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_children_filters_by_owner_and_parent() {
        let index = NodeIndex::in_memory();
        let alice = ShardableUuid::new();
        let bob = ShardableUuid::new();

        let docs = folder(alice, None, "Docs");
        let inner = folder(alice, Some(docs.id), "Inner");
        let bobs = folder(bob, None, "Bob");
        for n in [&docs, &inner, &bobs] {
            index.insert(n.clone()).unwrap();
        }

        let root: Vec<_> = index.children(&alice, None).into_iter().map(|n| n.id).collect();
        assert_eq!(root, vec![docs.id]);

        let nested: Vec<_> = index
            .children(&alice, Some(&docs.id))
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(nested, vec![inner.id]);

        assert!(index.children(&bob, Some(&docs.id)).is_empty());
    }

    #[test]
    fn test_children_are_ordered_by_creation_time() {
        let index = NodeIndex::in_memory();
        let owner = ShardableUuid::new();
        let base = Utc::now();

        let mut later = folder(owner, None, "later");
        later.created_at = base + Duration::seconds(5);
        let mut earlier = folder(owner, None, "earlier");
        earlier.created_at = base;

        index.insert(later.clone()).unwrap();
        index.insert(earlier.clone()).unwrap();

        let names: Vec<_> = index
            .children(&owner, None)
            .into_iter()
            .map(|n| n.name.to_string())
            .collect();
        assert_eq!(names, vec!["earlier", "later"]);
    }

    #[test]
    fn test_update_applies_mutation_and_missing_is_none() {
        let index = NodeIndex::in_memory();
        let node = folder(ShardableUuid::new(), None, "Docs");
        index.insert(node.clone()).unwrap();

        let updated = index
            .update(&node.id, &mut |n| n.is_public = true)
            .unwrap()
            .unwrap();
        assert!(updated.is_public);
        assert!(index.get(&node.id).unwrap().is_public);

        let missing = index
            .update(&ShardableUuid::new(), &mut |n| n.is_public = true)
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_remove_reports_existence() {
        let index = NodeIndex::in_memory();
        let node = folder(ShardableUuid::new(), None, "Docs");
        index.insert(node.clone()).unwrap();

        assert_eq!(index.remove(&node.id).unwrap(), Removal::Removed);
        assert_eq!(index.remove(&node.id).unwrap(), Removal::Missing);
        assert!(index.get(&node.id).is_none());
    }

    #[test]
    fn test_insert_requires_existing_parent() {
        let index = NodeIndex::in_memory();
        let owner = ShardableUuid::new();
        let orphan = folder(owner, Some(ShardableUuid::new()), "Orphan");

        assert!(matches!(
            index.insert(orphan.clone()),
            Err(DriveError::NotFound(_))
        ));
        assert!(index.get(&orphan.id).is_none());
    }

    #[test]
    fn test_remove_keeps_folder_with_children() {
        let index = NodeIndex::in_memory();
        let owner = ShardableUuid::new();
        let docs = folder(owner, None, "Docs");
        let inner = folder(owner, Some(docs.id), "Inner");
        index.insert(docs.clone()).unwrap();
        index.insert(inner.clone()).unwrap();

        assert_eq!(index.remove(&docs.id).unwrap(), Removal::HasChildren);
        assert!(index.get(&docs.id).is_some());

        assert_eq!(index.remove(&inner.id).unwrap(), Removal::Removed);
        assert_eq!(index.remove(&docs.id).unwrap(), Removal::Removed);
    }

    #[test]
    fn test_concurrent_child_insert_and_parent_remove_leave_no_orphan() {
        let owner = ShardableUuid::new();
        for _ in 0..200 {
            let index = Arc::new(NodeIndex::in_memory());
            let docs = folder(owner, None, "Docs");
            index.insert(docs.clone()).unwrap();
            let child = folder(owner, Some(docs.id), "Inner");

            let inserter = {
                let index = index.clone();
                let child = child.clone();
                thread::spawn(move || index.insert(child))
            };
            let removal = index.remove(&docs.id).unwrap();
            let inserted = inserter.join().unwrap();

            match removal {
                Removal::Removed => {
                    assert!(inserted.is_err());
                    assert!(index.get(&child.id).is_none());
                }
                Removal::HasChildren => {
                    assert!(inserted.is_ok());
                    assert!(index.get(&docs.id).is_some());
                }
                Removal::Missing => panic!("folder vanished"),
            }
        }
    }

    #[test]
    fn test_concurrent_update_and_remove_never_resurrect() {
        for _ in 0..200 {
            let index = Arc::new(NodeIndex::in_memory());
            let node = folder(ShardableUuid::new(), None, "Docs");
            index.insert(node.clone()).unwrap();

            let updater = {
                let index = index.clone();
                let id = node.id;
                thread::spawn(move || index.update(&id, &mut |n| n.is_public = true))
            };
            assert_eq!(index.remove(&node.id).unwrap(), Removal::Removed);
            assert!(index.get(&node.id).is_none());

            let updated = updater.join().unwrap().unwrap();
            // Either the update landed before the removal, or it found nothing.
            if let Some(updated) = updated {
                assert!(updated.is_public);
            }
            assert!(index.get(&node.id).is_none());
            assert!(index.children(&node.user_id, None).is_empty());
        }
    }

    #[test]
    fn test_persisted_index_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("metadata");
        let owner = ShardableUuid::new();
        let kept = folder(owner, None, "Kept");
        let dropped = folder(owner, None, "Dropped");

        {
            let index = NodeIndex::open(&dir).unwrap();
            index.insert(kept.clone()).unwrap();
            index.insert(dropped.clone()).unwrap();
            index.update(&kept.id, &mut |n| n.is_public = true).unwrap();
            index.remove(&dropped.id).unwrap();
        }

        let reopened = NodeIndex::open(&dir).unwrap();
        assert_eq!(reopened.len(), 1);
        let loaded = reopened.get(&kept.id).unwrap();
        assert!(loaded.is_public);
        assert_eq!(loaded.name, kept.name);
    }
}
