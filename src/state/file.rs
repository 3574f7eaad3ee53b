//! File-backed state store
//!
//! All records live in one JSON document. Every mutation rewrites it
//! atomically:
//! 1. Write to a temp file next to the target
//! 2. fsync the temp file
//! 3. Rename over the target
//! 4. fsync the directory so the rename is durable
//!
//! A reader therefore sees either the old document or the new one.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::errors::{StateError, StateResult};
use super::{RelationRecord, StateStore};
use crate::substrate::RelationId;

/// Relation records persisted to a JSON file.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    temp_path: PathBuf,
    records: BTreeMap<RelationId, RelationRecord>,
}

impl FileStateStore {
    /// Open the store at `path`, loading existing records.
    ///
    /// A missing file is an empty store; it is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> StateResult<Self> {
        let path = path.into();
        let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        let records = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| StateError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StateError::io("read", &path, e)),
        };

        Ok(Self {
            path,
            temp_path,
            records,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `records` as the new document. The in-memory copy is only
    /// replaced by callers once this succeeds.
    fn persist(&self, records: &BTreeMap<RelationId, RelationRecord>) -> StateResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StateError::io("create directory", parent, e))?;
        }

        let content = serde_json::to_string_pretty(records).map_err(|e| StateError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| StateError::io("create", &self.temp_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| StateError::io("write", &self.temp_path, e))?;
        file.sync_all()
            .map_err(|e| StateError::io("fsync", &self.temp_path, e))?;

        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| StateError::io("rename", &self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, relation_id: RelationId) -> StateResult<Option<RelationRecord>> {
        Ok(self.records.get(&relation_id).cloned())
    }

    fn put(&mut self, relation_id: RelationId, record: RelationRecord) -> StateResult<()> {
        let mut records = self.records.clone();
        records.insert(relation_id, record);
        self.persist(&records)?;
        self.records = records;
        Ok(())
    }

    fn remove(&mut self, relation_id: RelationId) -> StateResult<bool> {
        if !self.records.contains_key(&relation_id) {
            return Ok(false);
        }
        let mut records = self.records.clone();
        records.remove(&relation_id);
        self.persist(&records)?;
        self.records = records;
        Ok(true)
    }
}
