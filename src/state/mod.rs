//! Relation State
//!
//! The last resolved endpoints of every joined relation:
//! - Created at join with no master and no standbys
//! - Replaced after every processed change
//! - Deleted when the relation breaks
//!
//! The diff engine compares fresh resolutions against these records, so
//! they must survive process restarts between notifications.

mod errors;
mod file;
mod memory;

use serde::{Deserialize, Serialize};

use crate::substrate::RelationId;

pub use errors::{StateError, StateResult};
pub use file::FileStateStore;
pub use memory::MemoryStateStore;

/// Endpoints last observed on a relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Master connection string, `None` when no ready master was seen
    #[serde(default)]
    pub master: Option<String>,

    /// Standby connection strings in published order
    #[serde(default)]
    pub standbys: Vec<String>,
}

impl RelationRecord {
    pub fn new(master: Option<String>, standbys: Vec<String>) -> Self {
        Self { master, standbys }
    }

    /// Whether any endpoint is recorded.
    pub fn has_endpoints(&self) -> bool {
        self.master.is_some() || !self.standbys.is_empty()
    }
}

/// Persistence for [`RelationRecord`]s, keyed by relation id.
pub trait StateStore {
    fn get(&self, relation_id: RelationId) -> StateResult<Option<RelationRecord>>;

    fn put(&mut self, relation_id: RelationId, record: RelationRecord) -> StateResult<()>;

    /// Delete a record. Returns whether one existed.
    fn remove(&mut self, relation_id: RelationId) -> StateResult<bool>;

    fn contains(&self, relation_id: RelationId) -> StateResult<bool> {
        Ok(self.get(relation_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_endpoints() {
        assert!(!RelationRecord::default().has_endpoints());
        assert!(RelationRecord::new(Some("host=a".into()), vec![]).has_endpoints());
        assert!(RelationRecord::new(None, vec!["host=b".into()]).has_endpoints());
    }

    #[test]
    fn test_record_tolerates_missing_fields() {
        let record: RelationRecord = serde_json::from_str(r#"{"master":null}"#).unwrap();
        assert_eq!(record, RelationRecord::default());
    }
}
