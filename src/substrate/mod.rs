//! Relation Data Substrate
//!
//! The key/value propagation layer the protocol runs on, consumed through
//! the [`Substrate`] trait:
//! - One data bag per participant (units and applications on both sides)
//! - The local unit bag is written by the local unit
//! - The local application bag is written by the leader only
//! - Remote bags are read-only
//! - A leader-writable settings store, readable by every unit
//!
//! The crate never talks to the real substrate directly. [`MemorySubstrate`]
//! is an in-process implementation used by tests and scenario replay.

mod errors;
mod memory;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use errors::{SubstrateError, SubstrateResult};
pub use memory::MemorySubstrate;

/// Opaque relation identifier assigned by the substrate.
pub type RelationId = u32;

/// A participant's key/value data bag.
pub type Bag = BTreeMap<String, String>;

/// A unit or application with its own data bag on a relation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Participant {
    /// A single unit, e.g. `postgresql/0`
    Unit(String),
    /// A whole application, e.g. `postgresql`
    App(String),
}

impl Participant {
    pub fn unit(name: impl Into<String>) -> Self {
        Self::Unit(name.into())
    }

    pub fn app(name: impl Into<String>) -> Self {
        Self::App(name.into())
    }

    /// The participant name, used for deterministic ordering.
    pub fn name(&self) -> &str {
        match self {
            Self::Unit(name) | Self::App(name) => name,
        }
    }

    pub fn is_app(&self) -> bool {
        matches!(self, Self::App(_))
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access to relation data, membership and leadership.
///
/// Reads return snapshots; writes are last-writer-wins per key. Leader
/// settings hold plain strings and are replaced per key.
pub trait Substrate {
    /// Name of the local unit, e.g. `myapp/0`.
    fn local_unit(&self) -> &str;

    /// Name of the local application, e.g. `myapp`.
    fn local_app(&self) -> &str;

    /// Whether the local unit currently holds leadership.
    fn is_leader(&self) -> SubstrateResult<bool>;

    /// Ids of every established relation on the named endpoint.
    fn relation_ids(&self, relation_name: &str) -> SubstrateResult<Vec<RelationId>>;

    /// The remote application of a relation, if already known.
    fn remote_app(&self, relation_id: RelationId) -> SubstrateResult<Option<String>>;

    /// Remote units currently participating in a relation.
    fn remote_units(&self, relation_id: RelationId) -> SubstrateResult<Vec<String>>;

    /// Snapshot of one participant's bag. Missing bags read as empty.
    fn read_bag(&self, relation_id: RelationId, participant: &Participant) -> SubstrateResult<Bag>;

    /// Set `key` in a participant's bag.
    fn write_bag(
        &mut self,
        relation_id: RelationId,
        participant: &Participant,
        key: &str,
        value: &str,
    ) -> SubstrateResult<()>;

    /// Read a leader setting.
    fn leader_get(&self, key: &str) -> SubstrateResult<Option<String>>;

    /// Replace a leader setting. Leader only.
    fn leader_set(&mut self, key: &str, value: &str) -> SubstrateResult<()>;

    /// Every participant on a relation: remote units, the remote application,
    /// the local unit and the local application.
    fn participants(&self, relation_id: RelationId) -> SubstrateResult<Vec<Participant>> {
        let mut participants: Vec<Participant> = self
            .remote_units(relation_id)?
            .into_iter()
            .map(Participant::Unit)
            .collect();
        if let Some(app) = self.remote_app(relation_id)? {
            participants.push(Participant::App(app));
        }
        participants.push(Participant::unit(self.local_unit()));
        participants.push(Participant::app(self.local_app()));
        Ok(participants)
    }

    /// The local unit as a participant.
    fn local_unit_participant(&self) -> Participant {
        Participant::unit(self.local_unit())
    }

    /// The local application as a participant.
    fn local_app_participant(&self) -> Participant {
        Participant::app(self.local_app())
    }
}
