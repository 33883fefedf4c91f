use std::path::PathBuf;

use rusqlite::ErrorCode;
use serde::Serialize;

/// Failure while turning one input into committed rows.
///
/// `Validation` and `UnresolvedReference` only ever concern a single record,
/// `Input` a whole file. `Store` is record-scoped unless `fatal` is set, in
/// which case the run cannot continue.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid field `{field}`: {cause}")]
    Validation { field: &'static str, cause: String },

    #[error("unresolved {entity}: {cause}")]
    UnresolvedReference { entity: &'static str, cause: String },

    #[error("input {}: {cause}", path.display())]
    Input { path: PathBuf, cause: String },

    #[error("store rejected write: {source}")]
    Store {
        fatal: bool,
        #[source]
        source: rusqlite::Error,
    },
}

impl LoadError {
    pub fn validation(field: &'static str, cause: impl Into<String>) -> Self {
        Self::Validation {
            field,
            cause: cause.into(),
        }
    }

    pub fn unresolved(entity: &'static str, cause: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            entity,
            cause: cause.into(),
        }
    }

    pub fn input(path: impl Into<PathBuf>, cause: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Self::Input { .. } => ErrorKind::Input,
            Self::Store { .. } => ErrorKind::Store,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store { fatal: true, .. })
    }
}

impl From<rusqlite::Error> for LoadError {
    fn from(source: rusqlite::Error) -> Self {
        Self::Store {
            fatal: is_connection_failure(&source),
            source,
        }
    }
}

/// Error kinds as they appear in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Validation,
    UnresolvedReference,
    Input,
    Store,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::UnresolvedReference => "UnresolvedReferenceError",
            Self::Input => "InputError",
            Self::Store => "StoreError",
        }
    }
}

/// The store went away underneath a run; names what was in flight.
#[derive(Debug, thiserror::Error)]
#[error("fatal store failure while loading {} (line {line}): {source}", file.display())]
pub struct FatalStoreError {
    pub file: PathBuf,
    pub line: usize,
    #[source]
    pub source: rusqlite::Error,
}

// Constraint violations and bad parameters stay with the record; anything
// that means the database itself is unusable ends the run.
fn is_connection_failure(err: &rusqlite::Error) -> bool {
    let rusqlite::Error::SqliteFailure(inner, _) = err else {
        return false;
    };
    matches!(
        inner.code,
        ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn constraint_violation_is_record_scoped() {
        let err = LoadError::from(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT));
        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(!err.is_fatal());
    }

    #[test]
    fn io_failure_is_fatal() {
        let err = LoadError::from(sqlite_failure(rusqlite::ffi::SQLITE_IOERR));
        assert!(err.is_fatal());
        let err = LoadError::from(sqlite_failure(rusqlite::ffi::SQLITE_NOTADB));
        assert!(err.is_fatal());
    }

    #[test]
    fn validation_message_names_field() {
        let err = LoadError::validation("date", "unparseable date `32/13/2024`");
        assert_eq!(
            err.to_string(),
            "invalid field `date`: unparseable date `32/13/2024`"
        );
        assert_eq!(err.kind().label(), "ValidationError");
    }
}
