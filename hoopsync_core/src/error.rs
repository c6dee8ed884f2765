//! Error taxonomy for the sync engine.
//!
//! Per-record failures (conversion, resolution) are caught at the
//! syncer or manager boundary and folded into the run's counts; adapter
//! failures during season-wide setup abort the whole run. Storage
//! unique-constraint collisions stay distinguishable because they
//! indicate either a modeling bug or a true concurrent write.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionErrorKind {
    MissingField,
    OutOfRange,
    UnknownValue,
}

/// A provider payload that cannot be made to conform to the canonical
/// representation. Fatal for that one record only.
#[derive(Debug, Clone, Error)]
#[error("conversion failed ({kind:?}) on field '{field}': {detail}")]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    pub field: String,
    pub detail: String,
}

impl ConversionError {
    pub fn missing(field: &str) -> Self {
        Self {
            kind: ConversionErrorKind::MissingField,
            field: field.to_string(),
            detail: "required field is missing or empty".to_string(),
        }
    }

    pub fn out_of_range(field: &str, detail: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::OutOfRange,
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    pub fn unknown_value(field: &str, value: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::UnknownValue,
            field: field.to_string(),
            detail: format!("unknown value '{}'", value.into()),
        }
    }
}

/// Failures raised by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider connection failed: {0}")]
    Connection(String),

    #[error("provider rate limit hit: {0}")]
    RateLimited(String),

    #[error("not found on provider: {0}")]
    NotFound(String),

    #[error("provider payload failed validation: {0}")]
    Validation(String),
}

/// Failures raised by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint collision. Surfaced, never swallowed.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            // 23505 = postgres unique_violation
            if db.code().as_deref() == Some("23505") {
                return StoreError::UniqueViolation(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Top-level failure for one sync unit (a game, a team list, a run).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Teams must be synced before games; fatal for that game only.
    #[error("teams not found for game {game_external_id} (home={home}, away={away})")]
    TeamsNotFound {
        game_external_id: String,
        home: String,
        away: String,
    },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_display() {
        let err = ConversionError::missing("player_id");
        assert!(err.to_string().contains("player_id"));
        assert_eq!(err.kind, ConversionErrorKind::MissingField);

        let err = ConversionError::unknown_value("position", "Libero");
        assert!(err.to_string().contains("Libero"));
    }

    #[test]
    fn test_sync_error_from_store() {
        let err: SyncError = StoreError::UniqueViolation("teams_pkey".into()).into();
        assert!(matches!(
            err,
            SyncError::Store(StoreError::UniqueViolation(_))
        ));
    }
}
