//! Database error types
//!
//! Wraps `sqlx::Error` into a small set of kinds the rest of the
//! application can match on. Postgres constraint violations are
//! classified by SQLSTATE so callers can turn a unique or exclusion
//! violation into a domain conflict instead of a 500.

/// SQLSTATE codes for the constraint classes we care about
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const EXCLUSION_VIOLATION: &str = "23P01";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Row lookup returned nothing where one row was required
    NotFound { entity: String, id: String },
    /// Unique or exclusion constraint rejected a write
    ConstraintViolation {
        constraint: Option<String>,
        message: String,
    },
    /// A referenced row does not exist
    ForeignKeyViolation {
        constraint: Option<String>,
        message: String,
    },
    /// Transient failure worth retrying (serialization, deadlock, pool)
    Transient { message: String },
    /// Connection-level failure
    Connection { message: String },
    /// Anything else
    Unknown { message: String },
}

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for DatabaseError {}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    /// Classify an sqlx error into a [`DatabaseErrorKind`]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => DatabaseErrorKind::Transient {
                message: err.to_string(),
            },
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => DatabaseErrorKind::Connection {
                message: err.to_string(),
            },
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let constraint = db_err.constraint().map(|c| c.to_string());
                classify_pg_code(code.as_deref(), constraint, db_err.message().to_string())
            }
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self::new(kind)
    }

    pub fn message(&self) -> String {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } if id.is_empty() => {
                format!("{} not found", entity)
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} '{}' not found", entity, id)
            }
            DatabaseErrorKind::ConstraintViolation { message, .. }
            | DatabaseErrorKind::ForeignKeyViolation { message, .. }
            | DatabaseErrorKind::Transient { message }
            | DatabaseErrorKind::Connection { message }
            | DatabaseErrorKind::Unknown { message } => message.clone(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::Transient { .. } | DatabaseErrorKind::Connection { .. }
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::ConstraintViolation { .. })
    }
}

/// SQLSTATE classification, split out so the mapping is testable without
/// a live connection.
fn classify_pg_code(
    code: Option<&str>,
    constraint: Option<String>,
    message: String,
) -> DatabaseErrorKind {
    match code {
        Some(UNIQUE_VIOLATION) | Some(EXCLUSION_VIOLATION) => {
            DatabaseErrorKind::ConstraintViolation {
                constraint,
                message,
            }
        }
        Some(FOREIGN_KEY_VIOLATION) => DatabaseErrorKind::ForeignKeyViolation {
            constraint,
            message,
        },
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
            DatabaseErrorKind::Transient { message }
        }
        _ => DatabaseErrorKind::Unknown { message },
    }
}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        let retryable = err.is_retryable();
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.message(),
            is_retryable: retryable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_classified_as_constraint() {
        let kind = classify_pg_code(
            Some("23505"),
            Some("payments_checkout_request_id_key".to_string()),
            "duplicate key value".to_string(),
        );
        assert!(matches!(
            kind,
            DatabaseErrorKind::ConstraintViolation { .. }
        ));
    }

    #[test]
    fn exclusion_violation_is_classified_as_constraint() {
        let kind = classify_pg_code(
            Some("23P01"),
            Some("bookings_no_overlap".to_string()),
            "conflicting key value violates exclusion constraint".to_string(),
        );
        assert!(matches!(
            kind,
            DatabaseErrorKind::ConstraintViolation { .. }
        ));
    }

    #[test]
    fn deadlock_is_transient() {
        let kind = classify_pg_code(Some("40P01"), None, "deadlock detected".to_string());
        let err = DatabaseError::new(kind);
        assert!(err.is_retryable());
    }

    #[test]
    fn unknown_code_is_not_retryable() {
        let kind = classify_pg_code(Some("42601"), None, "syntax error".to_string());
        let err = DatabaseError::new(kind);
        assert!(!err.is_retryable());
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn not_found_message_includes_entity_and_id() {
        let err = DatabaseError::not_found("Booking", "b-1");
        assert_eq!(err.message(), "Booking 'b-1' not found");
    }
}
