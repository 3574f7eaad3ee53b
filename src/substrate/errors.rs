//! Substrate Error Types
//!
//! Failures reading or writing relation data or leadership settings. These
//! are never handled inside the crate; they propagate to the caller, which
//! decides whether they are fatal.

use thiserror::Error;

use super::RelationId;

/// Result type for substrate operations
pub type SubstrateResult<T> = Result<T, SubstrateError>;

/// Substrate errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    #[error("relation {0} is not known to the substrate")]
    UnknownRelation(RelationId),

    #[error("participant {participant} is not part of relation {relation_id}")]
    UnknownParticipant {
        relation_id: RelationId,
        participant: String,
    },

    #[error("data bag of {participant} on relation {relation_id} is read-only for this unit")]
    ReadOnly {
        relation_id: RelationId,
        participant: String,
    },

    #[error("only the leader may {0}")]
    NotLeader(String),

    #[error("substrate unavailable: {0}")]
    Unavailable(String),

    #[error("malformed leader data under {key}: {message}")]
    Encoding { key: String, message: String },
}

impl SubstrateError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(SubstrateError::unavailable("leader-get timed out").is_transient());
        assert!(!SubstrateError::UnknownRelation(3).is_transient());
        assert!(!SubstrateError::NotLeader("write".into()).is_transient());
    }

    #[test]
    fn test_display() {
        let err = SubstrateError::ReadOnly {
            relation_id: 7,
            participant: "postgresql/0".into(),
        };
        assert_eq!(
            err.to_string(),
            "data bag of postgresql/0 on relation 7 is read-only for this unit"
        );
    }
}
