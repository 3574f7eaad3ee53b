//! Leader-shared configuration store
//!
//! The configuration the leader requested on each relation, stored as one
//! JSON document under a single leader-settings key:
//!
//! ```text
//! {"3": {"database": "app", "roles": "reader,writer", "extensions": "citext"}}
//! ```
//!
//! - Single writer: the leader
//! - Readers: every unit, the leader included
//! - Entries are upserted, never deleted

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::substrate::{RelationId, Substrate, SubstrateError, SubstrateResult};

/// Keys the client requests and the provider echoes back once applied.
pub const CONFIG_KEYS: [&str; 3] = ["database", "roles", "extensions"];

/// Configuration requested for one relation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// Database name, empty when unset
    pub database: String,
    /// Comma-joined sorted role names
    pub roles: String,
    /// Comma-joined sorted extension names
    pub extensions: String,
}

impl SharedConfig {
    /// Value for one of [`CONFIG_KEYS`]. Unknown keys read as empty.
    pub fn get(&self, key: &str) -> &str {
        match key {
            "database" => &self.database,
            "roles" => &self.roles,
            "extensions" => &self.extensions,
            _ => "",
        }
    }

    /// Set one of [`CONFIG_KEYS`]. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "database" => &mut self.database,
            "roles" => &mut self.roles,
            "extensions" => &mut self.extensions,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// `(key, value)` pairs in [`CONFIG_KEYS`] order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        CONFIG_KEYS.into_iter().map(move |key| (key, self.get(key)))
    }
}

/// Requested configuration for every relation, keyed by relation id.
pub type LeaderData = BTreeMap<RelationId, SharedConfig>;

/// Reads and writes [`LeaderData`] under one leader-settings key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedConfigStore {
    key: String,
}

impl SharedConfigStore {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The leader-settings key holding the document.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the whole document. A missing or blank setting is empty.
    pub fn load<S: Substrate + ?Sized>(&self, substrate: &S) -> SubstrateResult<LeaderData> {
        match substrate.leader_get(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => {
                serde_json::from_str(&raw).map_err(|e| SubstrateError::Encoding {
                    key: self.key.clone(),
                    message: e.to_string(),
                })
            }
            _ => Ok(LeaderData::new()),
        }
    }

    /// The record for one relation, if the leader published one.
    pub fn record<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
        relation_id: RelationId,
    ) -> SubstrateResult<Option<SharedConfig>> {
        Ok(self.load(substrate)?.remove(&relation_id))
    }

    /// Replace the whole document. Leader only.
    pub fn save<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        data: &LeaderData,
    ) -> SubstrateResult<()> {
        let raw = serde_json::to_string(data).map_err(|e| SubstrateError::Encoding {
            key: self.key.clone(),
            message: e.to_string(),
        })?;
        substrate.leader_set(&self.key, &raw)
    }

    /// Upsert one key of one relation's record. Leader only.
    pub fn upsert<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        relation_id: RelationId,
        key: &str,
        value: &str,
    ) -> SubstrateResult<()> {
        let mut data = self.load(substrate)?;
        data.entry(relation_id).or_default().set(key, value);
        self.save(substrate, &data)
    }
}
