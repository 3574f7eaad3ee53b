//! pgsql relation client
//!
//! Turns relation notifications into lifecycle events for the owning
//! application. See [`PgsqlClient`] for the transitions and [`diff`] for the
//! event rules.

mod controller;
pub mod diff;
mod errors;
mod events;

pub use controller::{Observer, PgsqlClient, RelationPhase};
pub use errors::{ClientError, ClientResult};
pub use events::{Dispatch, EventKind, Notification, RelationEvent, RelationHook};
