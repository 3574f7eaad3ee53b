//! In-memory state store

use std::collections::BTreeMap;

use super::errors::StateResult;
use super::{RelationRecord, StateStore};
use crate::substrate::RelationId;

/// Keeps relation records for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: BTreeMap<RelationId, RelationRecord>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, for inspection.
    pub fn records(&self) -> &BTreeMap<RelationId, RelationRecord> {
        &self.records
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, relation_id: RelationId) -> StateResult<Option<RelationRecord>> {
        Ok(self.records.get(&relation_id).cloned())
    }

    fn put(&mut self, relation_id: RelationId, record: RelationRecord) -> StateResult<()> {
        self.records.insert(relation_id, record);
        Ok(())
    }

    fn remove(&mut self, relation_id: RelationId) -> StateResult<bool> {
        Ok(self.records.remove(&relation_id).is_some())
    }
}
