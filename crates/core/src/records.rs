//! Sharded JSON record persistence.
//!
//! Users and file nodes are stored one record per identifier:
//!
//! ```text
//! <root>/<s1>/<s2>/<uuid>/<record file>
//! ```
//!
//! Records are written to a sibling temporary file and renamed into place, so a reader (or a
//! restart after a crash) sees either the previous record or the new one, never a torn write.
//! Callers serialise writes per identifier.

use crate::{DriveError, DriveResult};
use drive_uuid::ShardableUuid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct RecordDir {
    root: PathBuf,
    file_name: &'static str,
}

impl RecordDir {
    /// Opens (creating if needed) a record directory.
    pub fn open(root: &Path, file_name: &'static str) -> DriveResult<Self> {
        fs::create_dir_all(root).map_err(DriveError::StorageDirCreation)?;
        Ok(Self {
            root: root.to_path_buf(),
            file_name,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &ShardableUuid) -> PathBuf {
        id.sharded_dir(&self.root).join(self.file_name)
    }

    pub fn write<T: Serialize>(&self, id: &ShardableUuid, record: &T) -> DriveResult<()> {
        let path = self.record_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(DriveError::StorageDirCreation)?;
        }

        let json = serde_json::to_vec_pretty(record).map_err(DriveError::Serialization)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, json).map_err(DriveError::RecordWrite)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(DriveError::RecordWrite(e));
        }

        Ok(())
    }

    /// Removes a record. Removing an absent record succeeds.
    pub fn remove(&self, id: &ShardableUuid) -> DriveResult<()> {
        let dir = id.sharded_dir(&self.root);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(DriveError::RecordWrite(e)),
        }

        // Prune now-empty shard directories; a non-empty shard simply stays.
        let mut parent = dir.parent();
        while let Some(p) = parent {
            if p == self.root || fs::remove_dir(p).is_err() {
                break;
            }
            parent = p.parent();
        }

        Ok(())
    }

    /// Loads every record under the root.
    ///
    /// Walks `<s1>/<s2>/<uuid>/`. Entries that are not directories, and records that fail to
    /// parse, are logged and skipped.
    pub fn load_all<T: DeserializeOwned>(&self) -> DriveResult<Vec<T>> {
        let mut records = Vec::new();

        for s1 in read_dirs(&self.root)? {
            for s2 in read_dirs(&s1)? {
                for id_dir in read_dirs(&s2)? {
                    let record_path = id_dir.join(self.file_name);
                    if !record_path.is_file() {
                        continue;
                    }

                    let contents = fs::read(&record_path).map_err(DriveError::RecordRead)?;
                    match serde_json::from_slice::<T>(&contents) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            tracing::warn!(
                                "failed to parse record {}: {}",
                                record_path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }

        Ok(records)
    }
}

fn read_dirs(path: &Path) -> DriveResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(path) {
        Ok(it) => it,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DriveError::RecordRead(e)),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(DriveError::RecordRead)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Sample {
        id: ShardableUuid,
        label: String,
    }

    #[test]
    fn test_write_then_load_all() {
        let temp = TempDir::new().unwrap();
        let dir = RecordDir::open(&temp.path().join("records"), "sample.json").unwrap();
        let a = Sample { id: ShardableUuid::new(), label: "a".into() };
        let b = Sample { id: ShardableUuid::new(), label: "b".into() };

        dir.write(&a.id, &a).unwrap();
        dir.write(&b.id, &b).unwrap();

        let mut loaded: Vec<Sample> = dir.load_all().unwrap();
        loaded.sort_by(|x, y| x.label.cmp(&y.label));
        assert_eq!(loaded, vec![a, b]);
    }

    #[test]
    fn test_overwrite_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let dir = RecordDir::open(temp.path(), "sample.json").unwrap();
        let mut record = Sample { id: ShardableUuid::new(), label: "first".into() };

        dir.write(&record.id, &record).unwrap();
        record.label = "second".into();
        dir.write(&record.id, &record).unwrap();

        let record_dir = record.id.sharded_dir(temp.path());
        let names: Vec<_> = fs::read_dir(&record_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("sample.json")]);

        let loaded: Vec<Sample> = dir.load_all().unwrap();
        assert_eq!(loaded[0].label, "second");
    }

    #[test]
    fn test_remove_is_idempotent_and_prunes_shards() {
        let temp = TempDir::new().unwrap();
        let dir = RecordDir::open(temp.path(), "sample.json").unwrap();
        let record = Sample { id: ShardableUuid::new(), label: "x".into() };
        dir.write(&record.id, &record).unwrap();

        dir.remove(&record.id).unwrap();
        dir.remove(&record.id).unwrap();

        assert!(fs::read_dir(temp.path()).unwrap().next().is_none());
        assert!(temp.path().exists());
    }

    #[test]
    fn test_load_all_skips_corrupt_records() {
        let temp = TempDir::new().unwrap();
        let dir = RecordDir::open(temp.path(), "sample.json").unwrap();
        let good = Sample { id: ShardableUuid::new(), label: "good".into() };
        dir.write(&good.id, &good).unwrap();

        let bad_id = ShardableUuid::new();
        let bad_dir = bad_id.sharded_dir(temp.path());
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join("sample.json"), "{ not json").unwrap();

        let loaded: Vec<Sample> = dir.load_all().unwrap();
        assert_eq!(loaded, vec![good]);
    }
}
