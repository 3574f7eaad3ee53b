//! Event diff engine
//!
//! Pure comparison of the previously recorded endpoints with freshly
//! resolved ones. Each kind appears at most once and Database* events
//! always follow the Master*/Standby* events.

use super::events::EventKind;
use crate::state::RelationRecord;

/// Events for a change from `prev` to `new`, in emission order.
pub fn changes(prev: &RelationRecord, new: &RelationRecord) -> Vec<EventKind> {
    let mut events = Vec::new();
    let mut available = false;
    let mut changed = false;
    let mut gone = false;

    if prev.master.is_none() && new.master.is_some() {
        events.push(EventKind::MasterAvailable);
        available = true;
    }
    if prev.master != new.master {
        events.push(EventKind::MasterChanged);
        changed = true;
    }
    if prev.master.is_some() && new.master.is_none() {
        events.push(EventKind::MasterGone);
        gone = true;
    }

    if prev.standbys.is_empty() && !new.standbys.is_empty() {
        events.push(EventKind::StandbyAvailable);
        available = true;
    }
    if prev.standbys != new.standbys {
        events.push(EventKind::StandbyChanged);
        changed = true;
    }
    if !prev.standbys.is_empty() && new.standbys.is_empty() {
        events.push(EventKind::StandbyGone);
        gone = true;
    }

    if available {
        events.push(EventKind::DatabaseAvailable);
    }
    if changed {
        events.push(EventKind::DatabaseChanged);
    }
    if gone && !new.has_endpoints() {
        events.push(EventKind::DatabaseGone);
    }

    events
}

/// Compensating events for a relation being torn down, ending with
/// `RelationBroken`.
pub fn teardown(last: Option<&RelationRecord>) -> Vec<EventKind> {
    let mut events = Vec::new();
    let mut gone = false;

    if let Some(last) = last {
        if last.master.is_some() {
            events.extend([EventKind::MasterChanged, EventKind::MasterGone]);
            gone = true;
        }
        if !last.standbys.is_empty() {
            events.extend([EventKind::StandbyChanged, EventKind::StandbyGone]);
            gone = true;
        }
    }
    if gone {
        events.extend([EventKind::DatabaseChanged, EventKind::DatabaseGone]);
    }

    events.push(EventKind::RelationBroken);
    events
}
