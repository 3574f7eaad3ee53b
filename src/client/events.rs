//! Lifecycle events raised to the owning application
//!
//! Event payloads are accessors, not snapshots: every getter reads the
//! substrate it is handed at call time. An observer reading `master` after
//! further relation updates sees the current endpoint, not the one that
//! triggered the event.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ClientError, ClientResult};
use crate::connstr::ConnectionString;
use crate::mirror::Mirror;
use crate::resolver::Resolver;
use crate::substrate::{RelationId, Substrate};

/// The eleven lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RelationJoined,
    RelationBroken,
    MasterAvailable,
    StandbyAvailable,
    DatabaseAvailable,
    MasterChanged,
    StandbyChanged,
    DatabaseChanged,
    MasterGone,
    StandbyGone,
    DatabaseGone,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::RelationJoined,
        EventKind::RelationBroken,
        EventKind::MasterAvailable,
        EventKind::StandbyAvailable,
        EventKind::DatabaseAvailable,
        EventKind::MasterChanged,
        EventKind::StandbyChanged,
        EventKind::DatabaseChanged,
        EventKind::MasterGone,
        EventKind::StandbyGone,
        EventKind::DatabaseGone,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelationJoined => "relation_joined",
            Self::RelationBroken => "relation_broken",
            Self::MasterAvailable => "master_available",
            Self::StandbyAvailable => "standby_available",
            Self::DatabaseAvailable => "database_available",
            Self::MasterChanged => "master_changed",
            Self::StandbyChanged => "standby_changed",
            Self::DatabaseChanged => "database_changed",
            Self::MasterGone => "master_gone",
            Self::StandbyGone => "standby_gone",
            Self::DatabaseGone => "database_gone",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation notification context: which relation fired, and for whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationHook {
    pub relation_id: RelationId,
    /// Remote application; looked up from the substrate when absent
    #[serde(default)]
    pub app: Option<String>,
    /// Remote unit the notification concerns, if any
    #[serde(default)]
    pub unit: Option<String>,
}

impl RelationHook {
    pub fn new(relation_id: RelationId) -> Self {
        Self {
            relation_id,
            app: None,
            unit: None,
        }
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// External notifications driving the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Joined(RelationHook),
    Changed(RelationHook),
    Broken(RelationHook),
    LeaderElected,
    LeaderSettingsChanged,
    UpgradeRequested,
}

impl Notification {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Joined(_) => "joined",
            Self::Changed(_) => "changed",
            Self::Broken(_) => "broken",
            Self::LeaderElected => "leader_elected",
            Self::LeaderSettingsChanged => "leader_settings_changed",
            Self::UpgradeRequested => "upgrade_requested",
        }
    }
}

/// Outcome of handling one notification.
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Handled; events raised, in order
    Emitted(Vec<RelationEvent>),
    /// Preconditions not met; redeliver the same notification later
    Deferred,
}

impl Dispatch {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }

    /// Kinds of the emitted events, empty when deferred.
    pub fn kinds(&self) -> Vec<EventKind> {
        match self {
            Self::Emitted(events) => events.iter().map(|e| e.kind).collect(),
            Self::Deferred => Vec::new(),
        }
    }

    pub fn events(&self) -> &[RelationEvent] {
        match self {
            Self::Emitted(events) => events,
            Self::Deferred => &[],
        }
    }
}

/// One lifecycle event.
#[derive(Debug, Clone)]
pub struct RelationEvent {
    pub kind: EventKind,
    pub relation_id: RelationId,
    pub relation_name: String,
    /// Remote application
    pub app: Option<String>,
    /// Remote unit, if the notification concerned one
    pub unit: Option<String>,
    pub local_unit: String,
    resolver: Resolver,
    mirror: Mirror,
}

impl RelationEvent {
    pub(crate) fn new(
        kind: EventKind,
        hook: &RelationHook,
        relation_name: &str,
        local_unit: &str,
        resolver: Resolver,
        mirror: Mirror,
    ) -> Self {
        Self {
            kind,
            relation_id: hook.relation_id,
            relation_name: relation_name.to_string(),
            app: hook.app.clone(),
            unit: hook.unit.clone(),
            local_unit: local_unit.to_string(),
            resolver,
            mirror,
        }
    }

    /// The ready master database, `None` if there is currently no master.
    pub fn master<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
    ) -> ClientResult<Option<ConnectionString>> {
        let master = self.resolver.master(substrate, self.relation_id)?;
        Ok(master.as_deref().map(ConnectionString::parse))
    }

    /// All ready hot standby databases.
    pub fn standbys<S: Substrate + ?Sized>(
        &self,
        substrate: &S,
    ) -> ClientResult<Vec<ConnectionString>> {
        let standbys = self.resolver.standbys(substrate, self.relation_id)?;
        Ok(standbys.iter().map(|s| ConnectionString::parse(s)).collect())
    }

    /// The requested database name.
    ///
    /// Read from the leader-shared copy, which non-leaders can see too.
    pub fn database<S: Substrate + ?Sized>(&self, substrate: &S) -> ClientResult<Option<String>> {
        let shared = self.resolver.shared_config(substrate, self.relation_id)?;
        Ok(shared.map(|c| c.database).filter(|d| !d.is_empty()))
    }

    /// Requested roles for the application's database user.
    pub fn roles<S: Substrate + ?Sized>(&self, substrate: &S) -> ClientResult<Vec<String>> {
        let shared = self.resolver.shared_config(substrate, self.relation_id)?;
        Ok(split_list(shared.as_ref().map(|c| c.roles.as_str())))
    }

    /// Requested extensions.
    pub fn extensions<S: Substrate + ?Sized>(&self, substrate: &S) -> ClientResult<Vec<String>> {
        let shared = self.resolver.shared_config(substrate, self.relation_id)?;
        Ok(split_list(shared.as_ref().map(|c| c.extensions.as_str())))
    }

    /// PostgreSQL version advertised by the provider.
    pub fn version<S: Substrate + ?Sized>(&self, substrate: &S) -> ClientResult<Option<String>> {
        Ok(self
            .resolver
            .version(substrate, self.relation_id, self.unit.as_deref())?)
    }

    /// Request a database. Leader only; `None` clears the request.
    ///
    /// The provider creates the database if necessary and never removes it.
    pub fn set_database<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        database: Option<&str>,
    ) -> ClientResult<()> {
        self.publish(substrate, "set database", "database", database.unwrap_or(""))
    }

    /// Request roles for the application's database user. Leader only.
    pub fn set_roles<S, I, R>(&self, substrate: &mut S, roles: I) -> ClientResult<()>
    where
        S: Substrate + ?Sized,
        I: IntoIterator<Item = R>,
        R: AsRef<str>,
    {
        self.publish(substrate, "set roles", "roles", &join_list(roles))
    }

    /// Request extensions installed into the database. Leader only.
    pub fn set_extensions<S, I, E>(&self, substrate: &mut S, extensions: I) -> ClientResult<()>
    where
        S: Substrate + ?Sized,
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        self.publish(substrate, "set extensions", "extensions", &join_list(extensions))
    }

    fn publish<S: Substrate + ?Sized>(
        &self,
        substrate: &mut S,
        operation: &'static str,
        key: &str,
        value: &str,
    ) -> ClientResult<()> {
        publish_config(&self.mirror, substrate, self.relation_id, operation, key, value)
    }
}

/// Leader-only write of one configuration key on a relation.
pub(crate) fn publish_config<S: Substrate + ?Sized>(
    mirror: &Mirror,
    substrate: &mut S,
    relation_id: RelationId,
    operation: &'static str,
    key: &str,
    value: &str,
) -> ClientResult<()> {
    if !substrate.is_leader()? {
        return Err(ClientError::PermissionDenied {
            operation,
            relation_id,
        });
    }
    mirror.publish(substrate, relation_id, key, value)?;
    tracing::debug!(relation_id, key, value, "relation configuration set");
    Ok(())
}

/// Sorted, deduplicated, comma-joined.
pub(crate) fn join_list<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut items: Vec<String> = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    items.sort();
    items.dedup();
    items.join(",")
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or("")
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::SharedConfigStore;
    use crate::substrate::{MemorySubstrate, Participant};

    fn event(kind: EventKind) -> RelationEvent {
        let store = SharedConfigStore::new("interface.pgsql");
        RelationEvent::new(
            kind,
            &RelationHook::new(1).with_app("postgresql").with_unit("postgresql/0"),
            "db",
            "client/0",
            Resolver::new(store.clone()),
            Mirror::new("db", store),
        )
    }

    fn substrate(leader: bool) -> MemorySubstrate {
        let mut s = MemorySubstrate::new("client/0", "client");
        s.set_leader(leader);
        s.add_relation(1, "db", "postgresql");
        s.add_remote_unit(1, "postgresql/0").unwrap();
        s
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::MasterAvailable.as_str(), "master_available");
        assert_eq!(EventKind::RelationBroken.to_string(), "relation_broken");
        let json = serde_json::to_string(&EventKind::DatabaseGone).unwrap();
        assert_eq!(json, "\"database_gone\"");
        for kind in EventKind::ALL {
            let back: EventKind = serde_json::from_str(&format!("\"{}\"", kind.as_str())).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_setters_publish_sorted_lists() {
        let mut s = substrate(true);
        let ev = event(EventKind::RelationJoined);
        ev.set_database(&mut s, Some("app")).unwrap();
        ev.set_roles(&mut s, ["writer", "reader", "writer"]).unwrap();
        ev.set_extensions(&mut s, Vec::<String>::new()).unwrap();

        assert_eq!(ev.database(&s).unwrap().as_deref(), Some("app"));
        assert_eq!(ev.roles(&s).unwrap(), vec!["reader", "writer"]);
        assert!(ev.extensions(&s).unwrap().is_empty());

        let app_bag = s.read_bag(1, &Participant::app("client")).unwrap();
        assert_eq!(app_bag.get("roles").map(String::as_str), Some("reader,writer"));
    }

    #[test]
    fn test_clearing_database() {
        let mut s = substrate(true);
        let ev = event(EventKind::RelationJoined);
        ev.set_database(&mut s, Some("app")).unwrap();
        ev.set_database(&mut s, None).unwrap();
        assert_eq!(ev.database(&s).unwrap(), None);
    }

    #[test]
    fn test_setters_require_leader() {
        let mut s = substrate(false);
        let err = event(EventKind::RelationJoined)
            .set_database(&mut s, Some("app"))
            .unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied { relation_id: 1, .. }));
        assert!(s.read_bag(1, &Participant::unit("client/0")).unwrap().is_empty());
    }

    #[test]
    fn test_accessors_read_live_data() {
        let mut s = substrate(false);
        let ev = event(EventKind::MasterAvailable);
        assert!(ev.master(&s).unwrap().is_none());

        s.set_remote_data(1, &Participant::app("postgresql"), "master", "host=db port=5432")
            .unwrap();
        let master = ev.master(&s).unwrap().unwrap();
        assert_eq!(master.host(), Some("db"));
        assert_eq!(master.port(), Some("5432"));

        s.set_remote_data(1, &Participant::unit("postgresql/0"), "version", "12").unwrap();
        assert_eq!(ev.version(&s).unwrap().as_deref(), Some("12"));
    }

    #[test]
    fn test_dispatch_kinds() {
        let d = Dispatch::Emitted(vec![
            event(EventKind::MasterChanged),
            event(EventKind::MasterGone),
        ]);
        assert_eq!(d.kinds(), vec![EventKind::MasterChanged, EventKind::MasterGone]);
        assert!(!d.is_deferred());
        assert!(Dispatch::Deferred.kinds().is_empty());
        assert!(Dispatch::Deferred.events().is_empty());
    }
}
