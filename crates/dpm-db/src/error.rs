//! Database-specific error types and conversions.

use std::collections::HashMap;

use dpm_core::error::{DpmError, Entity};

/// Text SurrealDB puts in a unique index violation.
const INDEX_VIOLATION: &str = "already contains";
/// Text SurrealDB puts in every statement of a rolled back transaction.
const FAILED_TRANSACTION: &str = "failed transaction";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored value: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Unique constraint violated for {entity}")]
    Conflict { entity: Entity },

    /// A transaction was rolled back and no statement named the cause.
    #[error("Transaction rolled back: {0}")]
    RolledBack(String),
}

impl DbError {
    /// Classify the failed statements of one response, as returned by
    /// `take_errors()`.
    ///
    /// Every statement is inspected: inside a transaction the statement
    /// that hit a unique index may be any of them, and the others only
    /// report the rollback.
    pub(crate) fn from_statements(
        errors: HashMap<usize, surrealdb::Error>,
        entity: Entity,
    ) -> Result<(), DbError> {
        let mut messages: Vec<(usize, String)> = errors
            .into_iter()
            .map(|(index, err)| (index, err.to_string()))
            .collect();
        messages.sort_by_key(|(index, _)| *index);
        Self::classify(messages.into_iter().map(|(_, msg)| msg).collect(), entity)
    }

    fn classify(mut messages: Vec<String>, entity: Entity) -> Result<(), DbError> {
        if messages.is_empty() {
            return Ok(());
        }
        if messages.iter().any(|msg| msg.contains(INDEX_VIOLATION)) {
            return Err(DbError::Conflict { entity });
        }
        match messages
            .iter()
            .position(|msg| !msg.contains(FAILED_TRANSACTION))
        {
            Some(cause) => Err(DbError::Query(messages.swap_remove(cause))),
            None => Err(DbError::RolledBack(messages.swap_remove(0))),
        }
    }
}

impl From<DbError> for DpmError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => DpmError::NotFound { entity, id },
            DbError::Conflict { entity } => DpmError::AlreadyExists { entity },
            DbError::Decode(msg) => DpmError::Internal(format!("invalid stored value: {msg}")),
            other => DpmError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_already_exists() {
        let err: DpmError = DbError::Conflict {
            entity: Entity::GroupMembership,
        }
        .into();
        assert!(matches!(
            err,
            DpmError::AlreadyExists {
                entity: Entity::GroupMembership
            }
        ));
    }

    #[test]
    fn index_violation_anywhere_in_a_transaction_is_a_conflict() {
        let messages = vec![
            "The query was not executed due to a failed transaction".to_string(),
            "Database index `grant_pair` already contains ['a', 't'], with record \
             `permissions_application_permission:x`"
                .to_string(),
            "The query was not executed due to a failed transaction".to_string(),
        ];
        assert!(matches!(
            DbError::classify(messages, Entity::ApplicationPermission),
            Err(DbError::Conflict {
                entity: Entity::ApplicationPermission
            })
        ));
    }

    #[test]
    fn bare_rollback_is_reported_as_rolled_back() {
        let messages =
            vec!["The query was not executed due to a failed transaction".to_string(); 2];
        assert!(matches!(
            DbError::classify(messages, Entity::Group),
            Err(DbError::RolledBack(_))
        ));
    }

    #[test]
    fn statement_cause_wins_over_rollback_noise() {
        let messages = vec![
            "The query was not executed due to a failed transaction".to_string(),
            "Found 'x' for field `kind`, but expected a string".to_string(),
        ];
        match DbError::classify(messages, Entity::Topic) {
            Err(DbError::Query(msg)) => assert!(msg.contains("field `kind`")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(DbError::classify(Vec::new(), Entity::Topic).is_ok());
    }

    #[test]
    fn undecodable_row_is_internal() {
        let err: DpmError = DbError::Decode("grant g1 has neither read nor write".into()).into();
        assert!(matches!(err, DpmError::Internal(_)));
    }

    #[test]
    fn not_found_keeps_entity() {
        let err: DpmError = DbError::NotFound {
            entity: Entity::Topic,
            id: "t1".into(),
        }
        .into();
        assert!(matches!(err, DpmError::NotFound { entity: Entity::Topic, .. }));
    }
}
