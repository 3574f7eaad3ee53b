//! CLI argument definitions using clap
//!
//! Commands:
//! - pgsql-relation format <CONNSTR> [--set key=value]...
//! - pgsql-relation uri <CONNSTR> [--set key=value]...
//! - pgsql-relation replay <SCENARIO>

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// pgsql-relation - client side of the pgsql relation protocol
#[derive(Parser, Debug)]
#[command(name = "pgsql-relation")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON client configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a connection string in canonical key=value form
    Format(ConnStrArgs),

    /// Print a connection string as a postgresql:// URI
    Uri(ConnStrArgs),

    /// Replay a relation scenario and print the emitted events
    Replay {
        /// Path to the scenario JSON file
        scenario: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct ConnStrArgs {
    /// libpq connection string, e.g. "host=db port=5432"
    pub connstr: String,

    /// Override or add a keyword; repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, String)>,
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid keyword {:?}", key));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_with_overrides() {
        let cli = Cli::try_parse_from([
            "pgsql-relation",
            "format",
            "host=db",
            "--set",
            "port=5433",
            "--set",
            "application_name=my app",
        ])
        .unwrap();
        let Command::Format(args) = cli.command else {
            panic!("expected format");
        };
        assert_eq!(args.connstr, "host=db");
        assert_eq!(
            args.overrides,
            vec![
                ("port".to_string(), "5433".to_string()),
                ("application_name".to_string(), "my app".to_string())
            ]
        );
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pgsql-relation",
            "replay",
            "scenario.json",
            "--config",
            "client.json",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("client.json")));
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::Replay { .. }));
    }

    #[test]
    fn test_bad_override_rejected() {
        assert!(
            Cli::try_parse_from(["pgsql-relation", "uri", "host=db", "--set", "port"]).is_err()
        );
        assert!(Cli::try_parse_from(["pgsql-relation", "uri", "host=db", "--set", "=5"]).is_err());
    }
}
