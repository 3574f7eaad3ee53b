//! Relation State Machine
//!
//! Drives one relation endpoint through its lifecycle:
//! - Join: announce the relation once and seed its record
//! - Change: resolve endpoints, diff against the record, emit, persist
//! - Break: emit compensating events from the last record, then delete it
//! - Upgrade and leadership changes: reconcile the shared configuration
//!
//! Every transition runs to completion for one notification. A change seen
//! before its join is deferred, never processed.

use std::fmt;

use tracing::{debug, error, info};

use super::diff;
use super::errors::ClientResult;
use super::events::{
    join_list, publish_config, Dispatch, EventKind, Notification, RelationEvent, RelationHook,
};
use crate::config::ClientConfig;
use crate::mirror::{Mirror, SharedConfigStore};
use crate::resolver::Resolver;
use crate::state::{RelationRecord, StateStore};
use crate::substrate::{RelationId, Substrate, SubstrateError};

/// Callback invoked for each emitted event, with write access to the substrate.
pub type Observer<S> = Box<dyn FnMut(&RelationEvent, &mut S) -> ClientResult<()>>;

/// Lifecycle position of one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPhase {
    /// No record: never joined, or already broken
    Uninitialized,
    /// Joined, no endpoints observed yet
    Joined,
    /// At least one endpoint recorded
    Active,
}

impl RelationPhase {
    pub fn from_record(record: Option<&RelationRecord>) -> Self {
        match record {
            None => Self::Uninitialized,
            Some(r) if r.has_endpoints() => Self::Active,
            Some(_) => Self::Joined,
        }
    }

    /// Get the state name for observability.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Joined => "joined",
            Self::Active => "active",
        }
    }
}

/// Requires side of a pgsql relation endpoint.
pub struct PgsqlClient<S: Substrate, T: StateStore> {
    config: ClientConfig,
    substrate: S,
    state: T,
    resolver: Resolver,
    mirror: Mirror,
    observers: Vec<(Option<EventKind>, Observer<S>)>,
}

impl<S: Substrate, T: StateStore> fmt::Debug for PgsqlClient<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgsqlClient")
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<S: Substrate, T: StateStore> PgsqlClient<S, T> {
    pub fn new(config: ClientConfig, substrate: S, state: T) -> Self {
        let store = SharedConfigStore::new(config.leader_key.clone());
        Self {
            resolver: Resolver::new(store.clone()),
            mirror: Mirror::new(config.relation_name.clone(), store),
            config,
            substrate,
            state,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn substrate(&self) -> &S {
        &self.substrate
    }

    /// Mutable substrate access, for feeding data in tests and replay.
    pub fn substrate_mut(&mut self) -> &mut S {
        &mut self.substrate
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Register an observer for one event kind.
    pub fn observe<F>(&mut self, kind: EventKind, observer: F)
    where
        F: FnMut(&RelationEvent, &mut S) -> ClientResult<()> + 'static,
    {
        self.observers.push((Some(kind), Box::new(observer)));
    }

    /// Register an observer for every event kind.
    pub fn observe_all<F>(&mut self, observer: F)
    where
        F: FnMut(&RelationEvent, &mut S) -> ClientResult<()> + 'static,
    {
        self.observers.push((None, Box::new(observer)));
    }

    /// The last recorded endpoints of a relation.
    pub fn record(&self, relation_id: RelationId) -> ClientResult<Option<RelationRecord>> {
        Ok(self.state.get(relation_id)?)
    }

    pub fn phase(&self, relation_id: RelationId) -> ClientResult<RelationPhase> {
        Ok(RelationPhase::from_record(self.record(relation_id)?.as_ref()))
    }

    /// Request a database outside of event delivery. Leader only.
    pub fn set_database(
        &mut self,
        relation_id: RelationId,
        database: Option<&str>,
    ) -> ClientResult<()> {
        publish_config(
            &self.mirror,
            &mut self.substrate,
            relation_id,
            "set database",
            "database",
            database.unwrap_or(""),
        )
    }

    /// Request roles outside of event delivery. Leader only.
    pub fn set_roles<I, R>(&mut self, relation_id: RelationId, roles: I) -> ClientResult<()>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        let roles = join_list(roles);
        publish_config(&self.mirror, &mut self.substrate, relation_id, "set roles", "roles", &roles)
    }

    /// Request extensions outside of event delivery. Leader only.
    pub fn set_extensions<I, E>(
        &mut self,
        relation_id: RelationId,
        extensions: I,
    ) -> ClientResult<()>
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        let extensions = join_list(extensions);
        publish_config(
            &self.mirror,
            &mut self.substrate,
            relation_id,
            "set extensions",
            "extensions",
            &extensions,
        )
    }

    /// Route one notification to its transition.
    pub fn dispatch(&mut self, notification: &Notification) -> ClientResult<Dispatch> {
        match notification {
            Notification::Joined(hook) => self.on_joined(hook),
            Notification::Changed(hook) => self.on_changed(hook),
            Notification::Broken(hook) => self.on_broken(hook),
            Notification::LeaderElected | Notification::LeaderSettingsChanged => {
                self.on_leader_change()
            }
            Notification::UpgradeRequested => self.on_upgrade(),
        }
    }

    pub fn on_joined(&mut self, hook: &RelationHook) -> ClientResult<Dispatch> {
        let relation_id = hook.relation_id;
        debug!(relation_id, "relation joined");
        self.mirror.mirror(&mut self.substrate)?;

        if self.state.contains(relation_id)? {
            debug!(relation_id, "relation_joined already emitted");
            return Ok(Dispatch::Emitted(Vec::new()));
        }

        let hook = self.complete(hook)?;
        let events = self.emit(&hook, &[EventKind::RelationJoined])?;
        self.state.put(relation_id, RelationRecord::default())?;
        Ok(Dispatch::Emitted(events))
    }

    pub fn on_changed(&mut self, hook: &RelationHook) -> ClientResult<Dispatch> {
        let relation_id = hook.relation_id;
        debug!(relation_id, "relation changed");

        let Some(prev) = self.state.get(relation_id)? else {
            error!(
                relation_id,
                relation_name = %self.config.relation_name,
                "relation changed before it was joined, deferring"
            );
            return Ok(Dispatch::Deferred);
        };

        self.mirror.mirror(&mut self.substrate)?;
        let hook = self.complete(hook)?;

        let new = RelationRecord::new(
            self.resolver.master(&self.substrate, relation_id)?,
            self.resolver.standbys(&self.substrate, relation_id)?,
        );
        let kinds = diff::changes(&prev, &new);
        let events = self.emit(&hook, &kinds)?;

        if prev != new {
            self.state.put(relation_id, new)?;
        }
        Ok(Dispatch::Emitted(events))
    }

    pub fn on_broken(&mut self, hook: &RelationHook) -> ClientResult<Dispatch> {
        let relation_id = hook.relation_id;
        debug!(relation_id, "relation broken");

        let hook = self.complete(hook)?;
        let last = self.state.get(relation_id)?;
        let events = self.emit(&hook, &diff::teardown(last.as_ref()))?;

        if self.state.remove(relation_id)? {
            info!(relation_id, "cleaned up broken relation");
        }
        Ok(Dispatch::Emitted(events))
    }

    /// Migrate legacy configuration after an upgrade.
    ///
    /// Non-leaders defer until the leader has published shared configuration.
    pub fn on_upgrade(&mut self) -> ClientResult<Dispatch> {
        debug!(relation_name = %self.config.relation_name, "upgrade requested");

        if self.substrate.is_leader()? {
            let migrated = self.mirror.migrate_legacy(&mut self.substrate)?;
            debug!(migrated, "legacy relation data migrated");
        } else if self.mirror.store().load(&self.substrate)?.is_empty() {
            debug!("no shared configuration from the leader yet, deferring");
            return Ok(Dispatch::Deferred);
        } else {
            self.mirror.mirror(&mut self.substrate)?;
        }
        Ok(Dispatch::Emitted(Vec::new()))
    }

    pub fn on_leader_change(&mut self) -> ClientResult<Dispatch> {
        self.mirror.mirror(&mut self.substrate)?;
        Ok(Dispatch::Emitted(Vec::new()))
    }

    /// Fill in the remote application when the notification did not carry it.
    fn complete(&self, hook: &RelationHook) -> ClientResult<RelationHook> {
        let mut hook = hook.clone();
        if hook.app.is_none() {
            hook.app = match self.substrate.remote_app(hook.relation_id) {
                Ok(app) => app,
                Err(SubstrateError::UnknownRelation(_)) => None,
                Err(e) => return Err(e.into()),
            };
        }
        Ok(hook)
    }

    /// Build and deliver events in order. The first observer error aborts.
    fn emit(
        &mut self,
        hook: &RelationHook,
        kinds: &[EventKind],
    ) -> ClientResult<Vec<RelationEvent>> {
        let local_unit = self.substrate.local_unit().to_string();
        let mut events = Vec::with_capacity(kinds.len());

        for &kind in kinds {
            let event = RelationEvent::new(
                kind,
                hook,
                &self.config.relation_name,
                &local_unit,
                self.resolver.clone(),
                self.mirror.clone(),
            );
            info!(relation_id = hook.relation_id, event = kind.as_str(), "emitting event");

            for (filter, observer) in self.observers.iter_mut() {
                if filter.is_none_or(|k| k == kind) {
                    observer(&event, &mut self.substrate)?;
                }
            }
            events.push(event);
        }

        Ok(events)
    }
}
