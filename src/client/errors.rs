//! Client Error Types

use thiserror::Error;

use crate::state::StateError;
use crate::substrate::{RelationId, SubstrateError};

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// A leader-only operation was attempted by a non-leader
    #[error("{operation} on relation {relation_id} requires leadership")]
    PermissionDenied {
        operation: &'static str,
        relation_id: RelationId,
    },

    #[error(transparent)]
    Substrate(#[from] SubstrateError),

    #[error(transparent)]
    State(#[from] StateError),

    /// An observer rejected an event
    #[error("observer failed: {0}")]
    Observer(String),
}

impl ClientError {
    pub fn observer(message: impl Into<String>) -> Self {
        Self::Observer(message.into())
    }

    /// Whether retrying the same notification cannot succeed.
    ///
    /// Transient substrate failures and observer errors are worth a retry;
    /// permission and persisted-state failures are not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Substrate(e) => !e.is_transient(),
            Self::State(StateError::Corrupt { .. }) => true,
            Self::State(StateError::Io { .. }) => false,
            Self::Observer(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        let denied = ClientError::PermissionDenied {
            operation: "set database",
            relation_id: 3,
        };
        assert!(denied.is_fatal());
        assert_eq!(denied.to_string(), "set database on relation 3 requires leadership");

        assert!(!ClientError::from(SubstrateError::unavailable("leader-get timed out")).is_fatal());
        assert!(ClientError::from(SubstrateError::UnknownRelation(9)).is_fatal());
        assert!(!ClientError::observer("boom").is_fatal());
    }
}
