//! Shared-Config Mirror
//!
//! The leader configures a relation through the local application bag, but:
//! - Older providers only read unit bags, never application bags
//! - Non-leader units cannot reliably read their own application bag
//!
//! So the configuration (database, roles, extensions) is kept in three places:
//! - Local application bag: authoritative, leader writes
//! - Local unit bag: mirrored copy for providers reading unit data
//! - Leader-shared store: copy every unit can read, used for readiness checks
//!
//! Mirroring runs on join, change, leader-elected and leader-settings-changed.

mod store;

use tracing::{debug, info};

use crate::substrate::{RelationId, Substrate, SubstrateResult};

pub use store::{LeaderData, SharedConfig, SharedConfigStore, CONFIG_KEYS};

/// Summary of one mirroring pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorReport {
    /// Relations visited
    pub relations: usize,
    /// Whether the leader rewrote the shared store
    pub leader_data_rewritten: bool,
}

/// Reconciles requested configuration for every relation of one endpoint.
#[derive(Debug, Clone)]
pub struct Mirror {
    relation_name: String,
    store: SharedConfigStore,
}

impl Mirror {
    pub fn new(relation_name: impl Into<String>, store: SharedConfigStore) -> Self {
        Self {
            relation_name: relation_name.into(),
            store,
        }
    }

    pub fn store(&self) -> &SharedConfigStore {
        &self.store
    }

    /// Mirror application configuration into unit bags and the shared store.
    ///
    /// Leader: application bag → local unit bag and shared store; the store
    /// is written once, and only if a record is missing or stale.
    /// Non-leader: shared store → local unit bag.
    pub fn mirror<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
    ) -> SubstrateResult<MirrorReport> {
        let leader = substrate.is_leader()?;
        let current = self.store.load(substrate)?;
        let mut updated = current.clone();
        let mut report = MirrorReport::default();

        let local_unit = substrate.local_unit_participant();
        let local_app = substrate.local_app_participant();

        for relation_id in substrate.relation_ids(&self.relation_name)? {
            debug!(relation_id, "mirroring app relation data");
            report.relations += 1;

            if leader {
                let app_bag = substrate.read_bag(relation_id, &local_app)?;
                let mut record = SharedConfig::default();
                for key in CONFIG_KEYS {
                    let value = app_bag.get(key).map(String::as_str).unwrap_or("");
                    substrate.write_bag(relation_id, &local_unit, key, value)?;
                    record.set(key, value);
                }
                if current.get(&relation_id) != Some(&record) {
                    report.leader_data_rewritten = true;
                }
                updated.insert(relation_id, record);
            } else if let Some(record) = current.get(&relation_id) {
                for (key, value) in record.entries() {
                    substrate.write_bag(relation_id, &local_unit, key, value)?;
                }
            }
        }

        if report.leader_data_rewritten {
            debug!(
                key = self.store.key(),
                "storing updated app relation data in leadership settings"
            );
            self.store.save(substrate, &updated)?;
        }

        Ok(report)
    }

    /// Publish one configuration value on a relation. Caller must be leader.
    pub fn publish<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        relation_id: RelationId,
        key: &str,
        value: &str,
    ) -> SubstrateResult<()> {
        let local_unit = substrate.local_unit_participant();
        let local_app = substrate.local_app_participant();
        substrate.write_bag(relation_id, &local_app, key, value)?;
        substrate.write_bag(relation_id, &local_unit, key, value)?;
        self.store.upsert(substrate, relation_id, key, value)
    }

    /// Move legacy unit-bag configuration into the application bag.
    ///
    /// For units upgraded from releases that only wrote unit data. Keys
    /// already present in the application bag are left alone. Afterwards the
    /// application values of every relation are published to the shared
    /// store. Caller must be leader.
    pub fn migrate_legacy<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
    ) -> SubstrateResult<usize> {
        let mut data = self.store.load(substrate)?;
        let local_unit = substrate.local_unit_participant();
        let local_app = substrate.local_app_participant();
        let mut migrated = 0;

        for relation_id in substrate.relation_ids(&self.relation_name)? {
            let unit_bag = substrate.read_bag(relation_id, &local_unit)?;
            let app_bag = substrate.read_bag(relation_id, &local_app)?;
            let mut record = SharedConfig::default();
            let mut logged = false;

            for key in CONFIG_KEYS {
                let value = match (app_bag.get(key), unit_bag.get(key)) {
                    (Some(value), _) => value.clone(),
                    (None, Some(legacy)) => {
                        if !logged {
                            info!(
                                relation_id,
                                "leader migrating legacy relation data to app relation data"
                            );
                            logged = true;
                        }
                        substrate.write_bag(relation_id, &local_app, key, legacy)?;
                        migrated += 1;
                        legacy.clone()
                    }
                    (None, None) => String::new(),
                };
                record.set(key, value);
            }
            data.insert(relation_id, record);
        }

        self.store.save(substrate, &data)?;
        Ok(migrated)
    }
}
