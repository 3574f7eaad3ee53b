//! pgsql-relation - client side of the pgsql relation protocol
//!
//! Deduces, from asynchronous key/value relation data:
//! - which remote participant provides the master endpoint
//! - which participants provide hot standby endpoints
//! - whether the provider has applied the requested configuration
//! - the lifecycle events to raise, including teardown compensation
//!
//! The relation data substrate is injected through [`substrate::Substrate`].

pub mod cli;
pub mod client;
pub mod config;
pub mod connstr;
pub mod mirror;
pub mod observability;
pub mod readiness;
pub mod resolver;
pub mod state;
pub mod substrate;

pub use client::{
    ClientError, ClientResult, Dispatch, EventKind, Notification, PgsqlClient, RelationEvent,
    RelationHook, RelationPhase,
};
pub use config::ClientConfig;
pub use connstr::ConnectionString;
pub use state::{FileStateStore, MemoryStateStore, RelationRecord, StateStore};
pub use substrate::{MemorySubstrate, Participant, RelationId, Substrate};
