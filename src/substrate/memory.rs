//! In-memory substrate
//!
//! Enforces the same write permissions as a real deployment:
//! - Local unit bag: writable
//! - Local application bag: writable by the leader only
//! - Remote bags: read-only (set through the `set_remote_*` helpers instead)
//!
//! Setting a key to the empty string removes it, as relation data does.

use std::collections::{BTreeMap, BTreeSet};

use super::errors::{SubstrateError, SubstrateResult};
use super::{Bag, Participant, RelationId, Substrate};

#[derive(Debug, Clone)]
struct MemoryRelation {
    name: String,
    remote_app: String,
    remote_units: BTreeSet<String>,
    bags: BTreeMap<Participant, Bag>,
}

/// A self-contained substrate holding all relation data in memory.
#[derive(Debug, Clone)]
pub struct MemorySubstrate {
    local_unit: String,
    local_app: String,
    leader: bool,
    relations: BTreeMap<RelationId, MemoryRelation>,
    leader_settings: BTreeMap<String, String>,
}

impl MemorySubstrate {
    /// Create a substrate for `local_unit` of `local_app`, initially not leader.
    pub fn new(local_unit: impl Into<String>, local_app: impl Into<String>) -> Self {
        Self {
            local_unit: local_unit.into(),
            local_app: local_app.into(),
            leader: false,
            relations: BTreeMap::new(),
            leader_settings: BTreeMap::new(),
        }
    }

    pub fn set_leader(&mut self, leader: bool) {
        self.leader = leader;
    }

    /// Establish a relation on endpoint `relation_name` with `remote_app`.
    ///
    /// Re-adding an existing id keeps its data.
    pub fn add_relation(
        &mut self,
        relation_id: RelationId,
        relation_name: impl Into<String>,
        remote_app: impl Into<String>,
    ) {
        self.relations
            .entry(relation_id)
            .or_insert_with(|| MemoryRelation {
                name: relation_name.into(),
                remote_app: remote_app.into(),
                remote_units: BTreeSet::new(),
                bags: BTreeMap::new(),
            });
    }

    /// Remove a relation and all of its data. Returns whether it existed.
    pub fn remove_relation(&mut self, relation_id: RelationId) -> bool {
        self.relations.remove(&relation_id).is_some()
    }

    pub fn add_remote_unit(
        &mut self,
        relation_id: RelationId,
        unit: impl Into<String>,
    ) -> SubstrateResult<()> {
        self.relation_mut(relation_id)?
            .remote_units
            .insert(unit.into());
        Ok(())
    }

    /// Remove a departed remote unit along with its bag.
    pub fn remove_remote_unit(
        &mut self,
        relation_id: RelationId,
        unit: &str,
    ) -> SubstrateResult<()> {
        let relation = self.relation_mut(relation_id)?;
        relation.remote_units.remove(unit);
        relation.bags.remove(&Participant::unit(unit));
        Ok(())
    }

    /// Set `key` in a remote participant's bag, as the remote side would.
    pub fn set_remote_data(
        &mut self,
        relation_id: RelationId,
        participant: &Participant,
        key: &str,
        value: &str,
    ) -> SubstrateResult<()> {
        if !self.is_remote(relation_id, participant)? {
            return Err(SubstrateError::UnknownParticipant {
                relation_id,
                participant: participant.name().to_string(),
            });
        }
        self.store(relation_id, participant, key, value)
    }

    /// Apply several remote updates at once.
    pub fn update_remote_bag<I, K, V>(
        &mut self,
        relation_id: RelationId,
        participant: &Participant,
        data: I,
    ) -> SubstrateResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in data {
            self.set_remote_data(relation_id, participant, key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// All leader settings, for inspection.
    pub fn leader_settings(&self) -> &BTreeMap<String, String> {
        &self.leader_settings
    }

    fn relation(&self, relation_id: RelationId) -> SubstrateResult<&MemoryRelation> {
        self.relations
            .get(&relation_id)
            .ok_or(SubstrateError::UnknownRelation(relation_id))
    }

    fn relation_mut(&mut self, relation_id: RelationId) -> SubstrateResult<&mut MemoryRelation> {
        self.relations
            .get_mut(&relation_id)
            .ok_or(SubstrateError::UnknownRelation(relation_id))
    }

    fn is_remote(
        &self,
        relation_id: RelationId,
        participant: &Participant,
    ) -> SubstrateResult<bool> {
        let relation = self.relation(relation_id)?;
        Ok(match participant {
            Participant::Unit(name) => relation.remote_units.contains(name),
            Participant::App(name) => *name == relation.remote_app,
        })
    }

    fn is_local(&self, participant: &Participant) -> bool {
        match participant {
            Participant::Unit(name) => *name == self.local_unit,
            Participant::App(name) => *name == self.local_app,
        }
    }

    fn store(
        &mut self,
        relation_id: RelationId,
        participant: &Participant,
        key: &str,
        value: &str,
    ) -> SubstrateResult<()> {
        let bag = self
            .relation_mut(relation_id)?
            .bags
            .entry(participant.clone())
            .or_default();
        if value.is_empty() {
            bag.remove(key);
        } else {
            bag.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

impl Substrate for MemorySubstrate {
    fn local_unit(&self) -> &str {
        &self.local_unit
    }

    fn local_app(&self) -> &str {
        &self.local_app
    }

    fn is_leader(&self) -> SubstrateResult<bool> {
        Ok(self.leader)
    }

    fn relation_ids(&self, relation_name: &str) -> SubstrateResult<Vec<RelationId>> {
        Ok(self
            .relations
            .iter()
            .filter(|(_, relation)| relation.name == relation_name)
            .map(|(id, _)| *id)
            .collect())
    }

    fn remote_app(&self, relation_id: RelationId) -> SubstrateResult<Option<String>> {
        Ok(Some(self.relation(relation_id)?.remote_app.clone()))
    }

    fn remote_units(&self, relation_id: RelationId) -> SubstrateResult<Vec<String>> {
        Ok(self
            .relation(relation_id)?
            .remote_units
            .iter()
            .cloned()
            .collect())
    }

    fn read_bag(&self, relation_id: RelationId, participant: &Participant) -> SubstrateResult<Bag> {
        if !self.is_local(participant) && !self.is_remote(relation_id, participant)? {
            return Err(SubstrateError::UnknownParticipant {
                relation_id,
                participant: participant.name().to_string(),
            });
        }
        Ok(self
            .relation(relation_id)?
            .bags
            .get(participant)
            .cloned()
            .unwrap_or_default())
    }

    fn write_bag(
        &mut self,
        relation_id: RelationId,
        participant: &Participant,
        key: &str,
        value: &str,
    ) -> SubstrateResult<()> {
        match participant {
            Participant::Unit(name) if *name == self.local_unit => {}
            Participant::App(name) if *name == self.local_app => {
                if !self.leader {
                    return Err(SubstrateError::NotLeader(format!(
                        "write application data on relation {}",
                        relation_id
                    )));
                }
            }
            _ => {
                return Err(SubstrateError::ReadOnly {
                    relation_id,
                    participant: participant.name().to_string(),
                })
            }
        }
        self.store(relation_id, participant, key, value)
    }

    fn leader_get(&self, key: &str) -> SubstrateResult<Option<String>> {
        Ok(self.leader_settings.get(key).cloned())
    }

    fn leader_set(&mut self, key: &str, value: &str) -> SubstrateResult<()> {
        if !self.leader {
            return Err(SubstrateError::NotLeader(format!("set leader setting {}", key)));
        }
        if value.is_empty() {
            self.leader_settings.remove(key);
        } else {
            self.leader_settings.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substrate() -> MemorySubstrate {
        let mut s = MemorySubstrate::new("client/0", "client");
        s.add_relation(1, "db", "postgresql");
        s.add_remote_unit(1, "postgresql/0").unwrap();
        s
    }

    #[test]
    fn test_relation_ids_by_name() {
        let mut s = substrate();
        s.add_relation(2, "db-admin", "postgresql");
        s.add_relation(3, "db", "other-pg");
        assert_eq!(s.relation_ids("db").unwrap(), vec![1, 3]);
        assert_eq!(s.relation_ids("db-admin").unwrap(), vec![2]);
        assert!(s.relation_ids("missing").unwrap().is_empty());
    }

    #[test]
    fn test_participants_listing() {
        let s = substrate();
        assert_eq!(
            s.participants(1).unwrap(),
            vec![
                Participant::unit("postgresql/0"),
                Participant::app("postgresql"),
                Participant::unit("client/0"),
                Participant::app("client"),
            ]
        );
    }

    #[test]
    fn test_local_unit_bag_writable() {
        let mut s = substrate();
        let me = s.local_unit_participant();
        s.write_bag(1, &me, "egress-subnets", "10.0.0.0/24").unwrap();
        assert_eq!(
            s.read_bag(1, &me).unwrap().get("egress-subnets").map(String::as_str),
            Some("10.0.0.0/24")
        );
    }

    #[test]
    fn test_local_app_bag_requires_leader() {
        let mut s = substrate();
        let app = s.local_app_participant();
        let err = s.write_bag(1, &app, "database", "foo").unwrap_err();
        assert!(matches!(err, SubstrateError::NotLeader(_)));

        s.set_leader(true);
        s.write_bag(1, &app, "database", "foo").unwrap();
    }

    #[test]
    fn test_remote_bags_read_only() {
        let mut s = substrate();
        let err = s
            .write_bag(1, &Participant::unit("postgresql/0"), "master", "host=x")
            .unwrap_err();
        assert!(matches!(err, SubstrateError::ReadOnly { .. }));
    }

    #[test]
    fn test_set_remote_data_and_empty_removes() {
        let mut s = substrate();
        let remote = Participant::unit("postgresql/0");
        s.set_remote_data(1, &remote, "master", "host=x").unwrap();
        assert_eq!(s.read_bag(1, &remote).unwrap().len(), 1);
        s.set_remote_data(1, &remote, "master", "").unwrap();
        assert!(s.read_bag(1, &remote).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_participant_rejected() {
        let mut s = substrate();
        let stranger = Participant::unit("postgresql/9");
        assert!(s.read_bag(1, &stranger).is_err());
        assert!(s.set_remote_data(1, &stranger, "master", "x").is_err());
    }

    #[test]
    fn test_departed_unit_loses_bag() {
        let mut s = substrate();
        let remote = Participant::unit("postgresql/0");
        s.set_remote_data(1, &remote, "master", "host=x").unwrap();
        s.remove_remote_unit(1, "postgresql/0").unwrap();
        assert!(s.remote_units(1).unwrap().is_empty());
        assert!(s.read_bag(1, &remote).is_err());
    }

    #[test]
    fn test_leader_settings_require_leader() {
        let mut s = substrate();
        assert!(s.leader_set("k", "v").is_err());
        s.set_leader(true);
        s.leader_set("k", "v").unwrap();
        assert_eq!(s.leader_get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_unknown_relation() {
        let s = substrate();
        assert_eq!(s.remote_units(42).unwrap_err(), SubstrateError::UnknownRelation(42));
    }
}
