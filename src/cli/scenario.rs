//! Replay scenarios
//!
//! A scenario describes a local unit, the relations it starts with, and an
//! ordered list of steps. Steps either change substrate data (as the remote
//! side or the operator would) or deliver a notification to the client.
//!
//! ```json
//! {
//!   "local_unit": "myapp/0",
//!   "local_app": "myapp",
//!   "leader": true,
//!   "relations": [{"id": 1, "remote_app": "postgresql", "remote_units": ["postgresql/0"]}],
//!   "steps": [
//!     {"op": "joined", "relation_id": 1, "unit": "postgresql/0"},
//!     {"op": "set_config", "relation_id": 1, "database": "app"},
//!     {"op": "set_remote", "relation_id": 1,
//!      "participant": {"kind": "app", "name": "postgresql"},
//!      "data": {"master": "host=10.0.0.5 dbname=app", "database": "app"}},
//!     {"op": "changed", "relation_id": 1, "unit": "postgresql/0"},
//!     {"op": "broken", "relation_id": 1}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::errors::{CliError, CliResult};
use crate::client::{Notification, RelationHook};
use crate::substrate::{MemorySubstrate, Participant, RelationId};

/// A complete replay scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub local_unit: String,
    pub local_app: String,

    /// Whether the local unit starts as leader (default: false)
    #[serde(default)]
    pub leader: bool,

    #[serde(default)]
    pub relations: Vec<RelationSpec>,

    pub steps: Vec<Step>,
}

/// A relation present when the scenario starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationSpec {
    pub id: RelationId,

    /// Endpoint name; defaults to the configured relation name
    #[serde(default)]
    pub name: Option<String>,

    pub remote_app: String,

    #[serde(default)]
    pub remote_units: Vec<String>,
}

/// One scenario step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Deliver a join notification
    Joined {
        relation_id: RelationId,
        #[serde(default)]
        unit: Option<String>,
    },

    /// Deliver a change notification
    Changed {
        relation_id: RelationId,
        #[serde(default)]
        unit: Option<String>,
    },

    /// Deliver a break notification, then drop the relation
    Broken { relation_id: RelationId },

    /// Establish a new relation (no notification)
    AddRelation {
        id: RelationId,
        #[serde(default)]
        name: Option<String>,
        remote_app: String,
    },

    /// A remote unit enters the relation (no notification)
    AddUnit { relation_id: RelationId, unit: String },

    /// A remote unit leaves the relation (no notification)
    Departed { relation_id: RelationId, unit: String },

    /// Merge keys into a remote bag; empty values remove keys
    SetRemote {
        relation_id: RelationId,
        participant: Participant,
        data: BTreeMap<String, String>,
    },

    /// Merge keys into the local unit bag
    SetLocal {
        relation_id: RelationId,
        data: BTreeMap<String, String>,
    },

    /// Request configuration through the client. Leader only.
    SetConfig {
        relation_id: RelationId,
        #[serde(default)]
        database: Option<String>,
        #[serde(default)]
        roles: Option<Vec<String>>,
        #[serde(default)]
        extensions: Option<Vec<String>>,
    },

    /// Gain or lose leadership (no notification)
    SetLeader { leader: bool },

    LeaderElected,

    LeaderSettingsChanged,

    Upgrade,
}

impl Step {
    /// The notification this step delivers, if any.
    pub fn notification(&self) -> Option<Notification> {
        match self {
            Self::Joined { relation_id, unit } => {
                Some(Notification::Joined(hook(*relation_id, unit)))
            }
            Self::Changed { relation_id, unit } => {
                Some(Notification::Changed(hook(*relation_id, unit)))
            }
            Self::Broken { relation_id } => {
                Some(Notification::Broken(RelationHook::new(*relation_id)))
            }
            Self::LeaderElected => Some(Notification::LeaderElected),
            Self::LeaderSettingsChanged => Some(Notification::LeaderSettingsChanged),
            Self::Upgrade => Some(Notification::UpgradeRequested),
            _ => None,
        }
    }
}

fn hook(relation_id: RelationId, unit: &Option<String>) -> RelationHook {
    let hook = RelationHook::new(relation_id);
    match unit {
        Some(unit) => hook.with_unit(unit.clone()),
        None => hook,
    }
}

impl Scenario {
    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::io_error(format!("Failed to read scenario {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CliResult<Self> {
        let scenario: Self = serde_json::from_str(content)
            .map_err(|e| CliError::scenario_error(format!("Invalid scenario JSON: {}", e)))?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> CliResult<()> {
        if self.local_unit.is_empty() || self.local_app.is_empty() {
            return Err(CliError::scenario_error("local_unit and local_app must be set"));
        }
        let mut seen = std::collections::BTreeSet::new();
        for relation in &self.relations {
            if !seen.insert(relation.id) {
                return Err(CliError::scenario_error(format!(
                    "relation {} declared twice",
                    relation.id
                )));
            }
        }
        Ok(())
    }

    /// Build the initial substrate. Relations without a name join `default_name`.
    pub fn substrate(&self, default_name: &str) -> CliResult<MemorySubstrate> {
        let mut substrate = MemorySubstrate::new(self.local_unit.clone(), self.local_app.clone());
        substrate.set_leader(self.leader);
        for relation in &self.relations {
            let name = relation.name.as_deref().unwrap_or(default_name);
            substrate.add_relation(relation.id, name, relation.remote_app.clone());
            for unit in &relation.remote_units {
                substrate.add_remote_unit(relation.id, unit.clone())?;
            }
        }
        Ok(substrate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;

    const SCENARIO: &str = r#"{
        "local_unit": "myapp/0",
        "local_app": "myapp",
        "leader": true,
        "relations": [
            {"id": 1, "remote_app": "postgresql", "remote_units": ["postgresql/0"]},
            {"id": 2, "name": "other", "remote_app": "pgbouncer"}
        ],
        "steps": [
            {"op": "joined", "relation_id": 1, "unit": "postgresql/0"},
            {"op": "set_remote", "relation_id": 1,
             "participant": {"kind": "unit", "name": "postgresql/0"},
             "data": {"master": "host=m"}},
            {"op": "set_config", "relation_id": 1, "roles": ["b", "a"]},
            {"op": "upgrade"},
            {"op": "broken", "relation_id": 1}
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert_eq!(scenario.steps.len(), 5);
        assert!(matches!(
            scenario.steps[1],
            Step::SetRemote { ref participant, .. }
                if *participant == Participant::unit("postgresql/0")
        ));
        assert_eq!(
            scenario.steps[0].notification(),
            Some(Notification::Joined(RelationHook::new(1).with_unit("postgresql/0")))
        );
        assert_eq!(scenario.steps[3].notification(), Some(Notification::UpgradeRequested));
        assert!(scenario.steps[2].notification().is_none());
    }

    #[test]
    fn test_build_substrate() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let substrate = scenario.substrate("db").unwrap();
        assert!(substrate.is_leader().unwrap());
        assert_eq!(substrate.relation_ids("db").unwrap(), vec![1]);
        assert_eq!(substrate.relation_ids("other").unwrap(), vec![2]);
        assert_eq!(substrate.remote_units(1).unwrap(), vec!["postgresql/0".to_string()]);
    }

    #[test]
    fn test_duplicate_relation_rejected() {
        let json = r#"{"local_unit": "a/0", "local_app": "a", "steps": [],
            "relations": [{"id": 1, "remote_app": "p"}, {"id": 1, "remote_app": "q"}]}"#;
        let err = Scenario::from_json(json).unwrap_err();
        assert_eq!(err.code_str(), "PGSQL_CLI_SCENARIO_ERROR");
    }

    #[test]
    fn test_unknown_op_rejected() {
        let json = r#"{"local_unit": "a/0", "local_app": "a", "steps": [{"op": "explode"}]}"#;
        assert!(Scenario::from_json(json).is_err());
    }
}
