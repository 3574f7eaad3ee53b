//! CLI module for pgsql-relation
//!
//! Provides command-line interface for:
//! - format: canonical key=value connection strings
//! - uri: postgresql:// URIs
//! - replay: scenario replay through the relation client

mod args;
mod commands;
mod errors;
mod scenario;

pub use args::{Cli, Command, ConnStrArgs};
pub use commands::{replay, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use scenario::{RelationSpec, Scenario, Step};
