//! Endpoint Resolver
//!
//! Finds the master and standby endpoints published on a relation.
//!
//! - Remote participants (units and the remote application) are scanned in
//!   name order; the application name sorts before its units, so
//!   application data wins over legacy unit data
//! - The local application bag is never scanned
//! - Only the first participant with a value that passes readiness is used:
//!   one provider fronts the whole relation, values are never merged

use tracing::debug;

use crate::mirror::{SharedConfig, SharedConfigStore};
use crate::readiness::is_ready;
use crate::substrate::{Bag, Participant, RelationId, Substrate, SubstrateResult};

/// Remote key holding the master connection string.
pub const MASTER_KEY: &str = "master";

/// Remote key holding newline-separated standby connection strings.
pub const STANDBYS_KEY: &str = "standbys";

/// Remote key holding the PostgreSQL server version.
pub const VERSION_KEY: &str = "version";

/// Resolves endpoints from live relation data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
    store: SharedConfigStore,
}

impl Resolver {
    pub fn new(store: SharedConfigStore) -> Self {
        Self { store }
    }

    /// The configuration the leader requested on this relation.
    pub fn shared_config<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
        relation_id: RelationId,
    ) -> SubstrateResult<Option<SharedConfig>> {
        self.store.record(substrate, relation_id)
    }

    /// The ready master connection string, if any.
    pub fn master<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
        relation_id: RelationId,
    ) -> SubstrateResult<Option<String>> {
        let found = self.find_ready(substrate, relation_id, MASTER_KEY, is_ready)?;
        if found.is_none() {
            debug!(relation_id, "no ready master found");
        }
        Ok(found)
    }

    /// The ready standby connection strings, in published order.
    ///
    /// Lines may end in `\n`, `\r\n` or a bare `\r`.
    pub fn standbys<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
        relation_id: RelationId,
    ) -> SubstrateResult<Vec<String>> {
        let Some(raw) = self.find_ready(substrate, relation_id, STANDBYS_KEY, is_ready)? else {
            debug!(relation_id, "no ready standbys found");
            return Ok(Vec::new());
        };
        Ok(raw
            .split(['\n', '\r'])
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// PostgreSQL version advertised on the relation.
    ///
    /// Application data is preferred, falling back to `unit`'s data.
    pub fn version<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
        relation_id: RelationId,
        unit: Option<&str>,
    ) -> SubstrateResult<Option<String>> {
        if let Some(app) = substrate.remote_app(relation_id)? {
            let bag = substrate.read_bag(relation_id, &Participant::App(app))?;
            if let Some(version) = non_empty(&bag, VERSION_KEY) {
                return Ok(Some(version.to_string()));
            }
        }
        if let Some(unit) = unit {
            let bag = substrate.read_bag(relation_id, &Participant::unit(unit))?;
            return Ok(non_empty(&bag, VERSION_KEY).map(str::to_string));
        }
        Ok(None)
    }

    /// First non-empty `key` value, in participant order, whose bag passes `check`.
    ///
    /// `check` only runs for bags that carry the key.
    pub(crate) fn find_ready<S, F>(
        &self,
        substrate: &S,
        relation_id: RelationId,
        key: &str,
        mut check: F,
    ) -> SubstrateResult<Option<String>>
    where
        S: Substrate + ?Sized,
        F: FnMut(Option<&SharedConfig>, &Bag, &Bag) -> bool,
    {
        let shared = self.store.record(substrate, relation_id)?;
        let local = substrate.read_bag(relation_id, &substrate.local_unit_participant())?;

        for participant in remote_participants(substrate, relation_id)? {
            let bag = substrate.read_bag(relation_id, &participant)?;
            let Some(value) = non_empty(&bag, key) else {
                continue;
            };
            if check(shared.as_ref(), &local, &bag) {
                debug!(relation_id, key, participant = participant.name(), "ready endpoint found");
                return Ok(Some(value.to_string()));
            }
            debug!(relation_id, key, participant = participant.name(), "unready endpoint found");
        }

        Ok(None)
    }
}

/// Remote units and the remote application, sorted by name.
fn remote_participants<S: Substrate + ?Sized>(
    substrate: &S,
    relation_id: RelationId,
) -> SubstrateResult<Vec<Participant>> {
    let mut participants: Vec<Participant> = substrate
        .remote_units(relation_id)?
        .into_iter()
        .map(Participant::Unit)
        .collect();
    if let Some(app) = substrate.remote_app(relation_id)? {
        participants.push(Participant::App(app));
    }
    let local_app = substrate.local_app();
    participants.retain(|p| !(p.is_app() && p.name() == local_app));
    participants.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(participants)
}

fn non_empty<'a>(bag: &'a Bag, key: &str) -> Option<&'a str> {
    bag.get(key).map(String::as_str).filter(|v| !v.is_empty())
}
