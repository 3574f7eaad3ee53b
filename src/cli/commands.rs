//! CLI command implementations
//!
//! - format / uri: connection string conversions
//! - replay: drive a [`PgsqlClient`] over an in-memory substrate and report
//!   every emitted event as one JSON line

use std::collections::VecDeque;
use std::io::{self, Write};

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::args::{Cli, Command, ConnStrArgs};
use super::errors::{CliError, CliResult};
use super::scenario::{Scenario, Step};
use crate::client::{Dispatch, Notification, PgsqlClient};
use crate::config::ClientConfig;
use crate::connstr::ConnectionString;
use crate::observability::{init_logging, ObservabilityErrorCode};
use crate::state::{FileStateStore, MemoryStateStore, StateStore};
use crate::substrate::{MemorySubstrate, Participant, RelationId, Substrate};

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    if let Err(e) = init_logging(&cli.log_level) {
        if e.code() == ObservabilityErrorCode::InvalidFilter {
            return Err(CliError::config_error(e.message().to_string()));
        }
    }

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    let lines = run_command(&config, cli.command)?;
    write_lines(&lines)
}

/// Run one command, returning its output lines.
pub fn run_command(config: &ClientConfig, cmd: Command) -> CliResult<Vec<String>> {
    match cmd {
        Command::Format(args) => Ok(vec![connection_string(&args).to_string()]),
        Command::Uri(args) => Ok(vec![connection_string(&args).uri()]),
        Command::Replay { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let records = replay(config, &scenario)?;
            records
                .iter()
                .map(|v| serde_json::to_string(v).map_err(CliError::from))
                .collect()
        }
    }
}

fn connection_string(args: &ConnStrArgs) -> ConnectionString {
    ConnectionString::with_overrides(&args.connstr, args.overrides.iter().cloned())
}

fn write_lines(lines: &[String]) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{}", line)?;
    }
    stdout.flush()?;
    Ok(())
}

/// Replay a scenario, returning one JSON record per emitted event or deferral.
///
/// Relation records go to `config.state_file` when set, otherwise memory.
pub fn replay(config: &ClientConfig, scenario: &Scenario) -> CliResult<Vec<Value>> {
    let substrate = scenario.substrate(&config.relation_name)?;
    match &config.state_file {
        Some(path) => {
            let state = FileStateStore::open(path)?;
            replay_with(PgsqlClient::new(config.clone(), substrate, state), scenario)
        }
        None => replay_with(
            PgsqlClient::new(config.clone(), substrate, MemoryStateStore::new()),
            scenario,
        ),
    }
}

fn replay_with<T: StateStore>(
    mut client: PgsqlClient<MemorySubstrate, T>,
    scenario: &Scenario,
) -> CliResult<Vec<Value>> {
    let mut out = Vec::new();
    let mut deferred: VecDeque<Notification> = VecDeque::new();

    for (index, step) in scenario.steps.iter().enumerate() {
        let step_no = index + 1;
        debug!(step = step_no, ?step, "replaying step");

        if let Some(notification) = step.notification() {
            // Deferred notifications are redelivered before anything newer.
            for pending in std::mem::take(&mut deferred) {
                deliver(&mut client, &pending, step_no, true, &mut deferred, &mut out)?;
            }
            deliver(&mut client, &notification, step_no, false, &mut deferred, &mut out)?;

            if let Step::Broken { relation_id } = step {
                client.substrate_mut().remove_relation(*relation_id);
            }
            continue;
        }

        apply(&mut client, step)?;
    }

    for pending in deferred {
        warn!(notification = pending.name(), "notification still deferred at end of scenario");
        out.push(json!({
            "undelivered": pending.name(),
            "relation_id": relation_of(&pending),
        }));
    }

    Ok(out)
}

fn deliver<T: StateStore>(
    client: &mut PgsqlClient<MemorySubstrate, T>,
    notification: &Notification,
    step: usize,
    redelivered: bool,
    deferred: &mut VecDeque<Notification>,
    out: &mut Vec<Value>,
) -> CliResult<()> {
    match client.dispatch(notification)? {
        Dispatch::Deferred => {
            out.push(json!({
                "step": step,
                "deferred": notification.name(),
                "relation_id": relation_of(notification),
            }));
            deferred.push_back(notification.clone());
        }
        Dispatch::Emitted(events) => {
            for event in &events {
                let substrate = client.substrate();
                let master = event.master(substrate)?.map(|m| m.to_string());
                let standbys: Vec<String> = event
                    .standbys(substrate)?
                    .iter()
                    .map(ConnectionString::to_string)
                    .collect();
                let mut record = json!({
                    "step": step,
                    "event": event.kind.as_str(),
                    "relation_id": event.relation_id,
                    "app": event.app,
                    "unit": event.unit,
                    "master": master,
                    "standbys": standbys,
                });
                if redelivered {
                    record["redelivered"] = json!(true);
                }
                out.push(record);
            }
        }
    }
    Ok(())
}

fn apply<T: StateStore>(
    client: &mut PgsqlClient<MemorySubstrate, T>,
    step: &Step,
) -> CliResult<()> {
    match step {
        Step::AddRelation { id, name, remote_app } => {
            let name = name.clone().unwrap_or_else(|| client.config().relation_name.clone());
            client.substrate_mut().add_relation(*id, name, remote_app.clone());
        }
        Step::AddUnit { relation_id, unit } => {
            client.substrate_mut().add_remote_unit(*relation_id, unit.clone())?;
        }
        Step::Departed { relation_id, unit } => {
            client.substrate_mut().remove_remote_unit(*relation_id, unit)?;
        }
        Step::SetRemote {
            relation_id,
            participant,
            data,
        } => {
            client.substrate_mut().update_remote_bag(*relation_id, participant, data)?;
        }
        Step::SetLocal { relation_id, data } => {
            let substrate = client.substrate_mut();
            let me = Participant::unit(substrate.local_unit());
            for (key, value) in data {
                substrate.write_bag(*relation_id, &me, key, value)?;
            }
        }
        Step::SetConfig {
            relation_id,
            database,
            roles,
            extensions,
        } => {
            if let Some(database) = database {
                client.set_database(*relation_id, Some(database.as_str()))?;
            }
            if let Some(roles) = roles {
                client.set_roles(*relation_id, roles)?;
            }
            if let Some(extensions) = extensions {
                client.set_extensions(*relation_id, extensions)?;
            }
        }
        Step::SetLeader { leader } => client.substrate_mut().set_leader(*leader),
        Step::Joined { .. }
        | Step::Changed { .. }
        | Step::Broken { .. }
        | Step::LeaderElected
        | Step::LeaderSettingsChanged
        | Step::Upgrade => {
            return Err(CliError::scenario_error("notification steps are delivered, not applied"));
        }
    }
    Ok(())
}

fn relation_of(notification: &Notification) -> Option<RelationId> {
    match notification {
        Notification::Joined(hook) | Notification::Changed(hook) | Notification::Broken(hook) => {
            Some(hook.relation_id)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(json: &str) -> Scenario {
        Scenario::from_json(json).unwrap()
    }

    #[test]
    fn test_format_and_uri_commands() {
        let config = ClientConfig::default();
        let args = || ConnStrArgs {
            connstr: "host=db dbname=app".to_string(),
            overrides: vec![("port".to_string(), "5433".to_string())],
        };
        assert_eq!(
            run_command(&config, Command::Format(args())).unwrap(),
            vec!["dbname=app host=db port=5433".to_string()]
        );
        assert_eq!(
            run_command(&config, Command::Uri(args())).unwrap(),
            vec!["postgresql://db:5433/app".to_string()]
        );
    }

    #[test]
    fn test_replay_redelivers_deferred_change() {
        let s = scenario(
            r#"{
            "local_unit": "myapp/0", "local_app": "myapp", "leader": true,
            "relations": [{"id": 1, "remote_app": "postgresql", "remote_units": ["postgresql/0"]}],
            "steps": [
                {"op": "set_remote", "relation_id": 1,
                 "participant": {"kind": "app", "name": "postgresql"},
                 "data": {"master": "host=m"}},
                {"op": "changed", "relation_id": 1},
                {"op": "joined", "relation_id": 1}
            ]}"#,
        );
        let out = replay(&ClientConfig::default(), &s).unwrap();

        assert_eq!(out[0]["deferred"], "changed");
        assert_eq!(out[0]["step"], 2);
        // The deferred change is redelivered before the join, so it defers again.
        assert_eq!(out[1]["deferred"], "changed");
        assert_eq!(out[2]["event"], "relation_joined");
        assert_eq!(out[3]["undelivered"], "changed");
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_set_config_requires_leader() {
        let s = scenario(
            r#"{
            "local_unit": "myapp/1", "local_app": "myapp",
            "relations": [{"id": 1, "remote_app": "postgresql"}],
            "steps": [{"op": "set_config", "relation_id": 1, "database": "app"}]}"#,
        );
        let err = replay(&ClientConfig::default(), &s).unwrap_err();
        assert_eq!(err.code_str(), "PGSQL_CLI_CLIENT_ERROR");
    }
}
