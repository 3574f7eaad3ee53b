//! Observability
//!
//! The library only emits `tracing` events; it never installs a subscriber.
//! Binaries call [`init_logging`] once at startup.
//!
//! Levels used across the crate:
//! - debug: readiness decisions, endpoint resolution, mirroring
//! - info: every emitted lifecycle event, relation record cleanup
//! - error: notifications delivered out of order
//!
//! Common fields are `relation_id` and `event`.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Observability error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservabilityErrorCode {
    /// Log filter directive could not be parsed
    InvalidFilter,
    /// A global subscriber is already installed
    AlreadyInitialized,
}

impl ObservabilityErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidFilter => "PGSQL_OBSERVABILITY_INVALID_FILTER",
            Self::AlreadyInitialized => "PGSQL_OBSERVABILITY_ALREADY_INITIALIZED",
        }
    }
}

impl fmt::Display for ObservabilityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observability error. Never fatal: the caller may continue without logs.
#[derive(Debug)]
pub struct ObservabilityError {
    code: ObservabilityErrorCode,
    message: String,
}

impl ObservabilityError {
    pub fn new(code: ObservabilityErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ObservabilityErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        false
    }
}

impl fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ObservabilityError {}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

/// Build the log filter. `RUST_LOG` wins over `default_level` when set.
pub fn build_filter(rust_log: Option<&str>, default_level: &str) -> ObservabilityResult<EnvFilter> {
    let directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_level);
    EnvFilter::try_new(directives).map_err(|e| {
        ObservabilityError::new(
            ObservabilityErrorCode::InvalidFilter,
            format!("invalid log filter {:?}: {}", directives, e),
        )
    })
}

/// Install a formatting subscriber writing to stderr.
///
/// Stdout stays reserved for command output.
pub fn init_logging(default_level: &str) -> ObservabilityResult<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), default_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| {
            ObservabilityError::new(ObservabilityErrorCode::AlreadyInitialized, e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_used_without_env() {
        let filter = build_filter(None, "debug").unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_env_overrides_default() {
        let filter = build_filter(Some("pgsql_relation=trace"), "info").unwrap();
        assert_eq!(filter.to_string(), "pgsql_relation=trace");
    }

    #[test]
    fn test_blank_env_ignored() {
        let filter = build_filter(Some("  "), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_invalid_filter() {
        let err = build_filter(None, "pgsql_relation=loud").unwrap_err();
        assert_eq!(err.code(), ObservabilityErrorCode::InvalidFilter);
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("[ERROR] PGSQL_OBSERVABILITY_INVALID_FILTER"));
    }
}
