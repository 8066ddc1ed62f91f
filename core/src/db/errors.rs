use anyhow::Error as AnyError;
use sqlx::{Error as SqlxError, error::DatabaseError};
use std::{error::Error as StdError, fmt};

const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";
const SQLITE_CANTOPEN: &str = "14";
const SQLITE_BUSY_RECOVERY: &str = "261";
const SQLITE_BUSY_SNAPSHOT: &str = "517";
const SQLITE_FOREIGN_KEY_VIOLATION: &str = "787";
const SQLITE_UNIQUE_VIOLATION: &str = "2067";
const SQLITE_PRIMARY_KEY_VIOLATION: &str = "1555";

/// Constraint failure raised by backends that do not go through sqlx, shaped
/// like the SQLite message so logs look the same regardless of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintViolation {
    Unique(&'static str),
    ForeignKey(&'static str),
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique(constraint) => write!(f, "UNIQUE constraint failed: {constraint}"),
            Self::ForeignKey(constraint) => {
                write!(f, "FOREIGN KEY constraint failed: {constraint}")
            }
        }
    }
}

impl StdError for ConstraintViolation {}

/// Returns `true` if the provided error represents a uniqueness constraint
/// violation on any supported backend.
pub fn is_unique_violation(err: &AnyError) -> bool {
    err.chain().any(is_unique_violation_cause)
}

/// Returns `true` if the error is a reference to a row that no longer exists,
/// e.g. a grant inserted for a document deleted concurrently.
pub fn is_foreign_key_violation(err: &AnyError) -> bool {
    err.chain().any(|cause| {
        if let Some(violation) = cause.downcast_ref::<ConstraintViolation>() {
            return matches!(violation, ConstraintViolation::ForeignKey(_));
        }

        if let Some(SqlxError::Database(db_err)) = cause.downcast_ref::<SqlxError>() {
            return database_code_matches(db_err.as_ref(), &[SQLITE_FOREIGN_KEY_VIOLATION])
                || db_err
                    .message()
                    .to_ascii_lowercase()
                    .contains("foreign key constraint");
        }

        false
    })
}

/// Returns `true` if the store could not serve the request at all (pool
/// exhausted, database locked, I/O failure) as opposed to rejecting it.
pub fn is_store_unavailable(err: &AnyError) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<SqlxError>() {
        Some(
            SqlxError::PoolTimedOut
            | SqlxError::PoolClosed
            | SqlxError::Io(_)
            | SqlxError::WorkerCrashed,
        ) => true,
        Some(SqlxError::Database(db_err)) => database_code_matches(
            db_err.as_ref(),
            &[
                SQLITE_BUSY,
                SQLITE_LOCKED,
                SQLITE_CANTOPEN,
                SQLITE_BUSY_RECOVERY,
                SQLITE_BUSY_SNAPSHOT,
            ],
        ),
        _ => false,
    })
}

fn is_unique_violation_cause(cause: &(dyn StdError + 'static)) -> bool {
    if let Some(violation) = cause.downcast_ref::<ConstraintViolation>() {
        return matches!(violation, ConstraintViolation::Unique(_));
    }

    if let Some(sqlx_error) = cause.downcast_ref::<SqlxError>() {
        if matches_sqlx_unique(sqlx_error) {
            return true;
        }
    }

    message_indicates_unique(cause)
}

fn matches_sqlx_unique(err: &SqlxError) -> bool {
    match err {
        SqlxError::Database(db_err) => {
            if database_code_matches(
                db_err.as_ref(),
                &[SQLITE_UNIQUE_VIOLATION, SQLITE_PRIMARY_KEY_VIOLATION],
            ) {
                return true;
            }

            if let Some(constraint) = db_err.constraint() {
                if constraint.to_ascii_lowercase().contains("unique") {
                    return true;
                }
            }

            db_err
                .message()
                .to_ascii_lowercase()
                .contains("unique constraint")
        }
        _ => false,
    }
}

fn database_code_matches(err: &(dyn DatabaseError + 'static), codes: &[&str]) -> bool {
    err.code()
        .map(|code_ref| {
            let code: &str = &code_ref;
            codes.contains(&code)
        })
        .unwrap_or(false)
}

fn message_indicates_unique(err: &(dyn StdError + 'static)) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("unique constraint failed")
        || message.contains("violates unique constraint")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn typed_violations_are_classified() {
        let unique = AnyError::new(ConstraintViolation::Unique("doc_user_roles.user_id"))
            .context("failed to insert grant");
        assert!(is_unique_violation(&unique));
        assert!(!is_foreign_key_violation(&unique));

        let missing = AnyError::new(ConstraintViolation::ForeignKey("doc_user_roles.doc_id"));
        assert!(is_foreign_key_violation(&missing));
        assert!(!is_unique_violation(&missing));
    }

    #[test]
    fn unique_message_is_detected_through_context() {
        let err: Result<(), AnyError> = Err(anyhow!(
            "UNIQUE constraint failed: doc_user_roles.doc_id, doc_user_roles.user_id"
        ));
        let err = err.context("add collaborator").unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn pool_timeouts_count_as_unavailable() {
        let err = AnyError::new(SqlxError::PoolTimedOut);
        assert!(is_store_unavailable(&err));
        assert!(!is_unique_violation(&err));

        let other = anyhow!("something else");
        assert!(!is_store_unavailable(&other));
    }
}
