use thiserror::Error;

/// Error taxonomy of the aggregation core. Controllers map these onto
/// HTTP status codes; inside the core, `Conflict` from the artifact
/// create race is the only variant that gets retried (once, as an update).
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Whether a storage error is a schema-level uniqueness violation, i.e.
/// we lost a check-and-create race and should fall back to the update path.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (name TEXT UNIQUE NOT NULL)", [])
            .unwrap();
        conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap();

        let err = conn
            .execute("INSERT INTO t (name) VALUES ('a')", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let err = conn.execute("INSERT INTO missing DEFAULT VALUES", []).unwrap_err();
        assert!(!is_unique_violation(&err));
    }
}
