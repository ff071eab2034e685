//! Error types for favorites operations

use crate::{AssetId, AssetKind, OwnerId};
use thiserror::Error;

/// Durable store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Insert failed for asset {id}: {reason}")]
    InsertFailed { id: AssetId, reason: String },

    #[error("Update failed for asset {id}: {reason}")]
    UpdateFailed { id: AssetId, reason: String },

    #[error("Delete failed for asset {id}: {reason}")]
    DeleteFailed { id: AssetId, reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Cursor failed mid-stream: {reason}")]
    CursorFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Asset validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Invalid asset type: expected {expected}, got {got}")]
    KindMismatch { expected: AssetKind, got: AssetKind },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn constraint(constraint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            constraint: constraint.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all favorites errors.
#[derive(Debug, Clone, Error)]
pub enum FavoritesError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Asset not found: {id}")]
    NotFound { id: AssetId },

    #[error("Forbidden: {owner_id} does not own asset {id}")]
    Forbidden { id: AssetId, owner_id: OwnerId },

    /// Store failure on the write path.
    #[error("Persistence error: {0}")]
    Persistence(StorageError),

    /// Store failure on the read path.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown asset type: {kind}")]
    UnknownType { kind: String },

    #[error("Codec error: {reason}")]
    Codec { reason: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Enrichment failed: {reason}")]
    Enrichment { reason: String },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl FavoritesError {
    pub fn not_found(id: impl Into<AssetId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Re-classify an error raised while inserting `id` as a write-path failure.
    ///
    /// Validation errors pass through untouched; anything else the store
    /// reports becomes [`FavoritesError::Persistence`].
    pub fn into_persistence(self, id: &str) -> Self {
        self.into_write_failure(|reason| StorageError::InsertFailed {
            id: id.to_string(),
            reason,
        })
    }

    /// Like [`into_persistence`](Self::into_persistence), for updates of `id`.
    pub fn into_update_failure(self, id: &str) -> Self {
        self.into_write_failure(|reason| StorageError::UpdateFailed {
            id: id.to_string(),
            reason,
        })
    }

    /// Like [`into_persistence`](Self::into_persistence), for deletes of `id`.
    pub fn into_delete_failure(self, id: &str) -> Self {
        self.into_write_failure(|reason| StorageError::DeleteFailed {
            id: id.to_string(),
            reason,
        })
    }

    fn into_write_failure(self, wrap: impl FnOnce(String) -> StorageError) -> Self {
        match self {
            Self::Validation(_)
            | Self::Persistence(_)
            | Self::NotFound { .. }
            | Self::Forbidden { .. } => self,
            Self::Storage(e) => Self::Persistence(e),
            other => Self::Persistence(wrap(other.to_string())),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

impl From<serde_json::Error> for FavoritesError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec {
            reason: e.to_string(),
        }
    }
}

/// Result type alias for favorites operations.
pub type FavoritesResult<T> = Result<T, FavoritesError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = FavoritesError::not_found("42");
        let msg = format!("{}", err);
        assert!(msg.contains("Asset not found"));
        assert!(msg.contains("42"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_forbidden_display() {
        let err = FavoritesError::Forbidden {
            id: "1".to_string(),
            owner_id: "mallory".to_string(),
        };
        assert!(err.is_forbidden());
        assert!(err.to_string().contains("mallory"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::missing("name");
        assert_eq!(err.to_string(), "Required field missing: name");

        let err = ValidationError::KindMismatch {
            expected: AssetKind::Chart,
            got: AssetKind::Insight,
        };
        assert_eq!(
            err.to_string(),
            "Invalid asset type: expected chart, got insight"
        );
    }

    #[test]
    fn test_storage_error_becomes_persistence() {
        let err: FavoritesError = StorageError::QueryFailed {
            reason: "connection reset".to_string(),
        }
        .into();
        match err.into_persistence("1") {
            FavoritesError::Persistence(StorageError::QueryFailed { reason }) => {
                assert_eq!(reason, "connection reset");
            }
            other => panic!("Expected Persistence error, got: {:?}", other),
        }
    }

    #[test]
    fn test_foreign_error_becomes_insert_failed() {
        let err = FavoritesError::Codec {
            reason: "bad bytes".to_string(),
        };
        match err.into_persistence("7") {
            FavoritesError::Persistence(StorageError::InsertFailed { id, .. }) => {
                assert_eq!(id, "7");
            }
            other => panic!("Expected Persistence error, got: {:?}", other),
        }
    }

    #[test]
    fn test_validation_survives_persistence_mapping() {
        let err = FavoritesError::Validation(ValidationError::missing("id"));
        assert!(matches!(
            err.into_persistence("x"),
            FavoritesError::Validation(_)
        ));
    }

    #[test]
    fn test_update_and_delete_failures_name_the_operation() {
        let codec = || FavoritesError::Codec {
            reason: "bad bytes".to_string(),
        };
        match codec().into_update_failure("3") {
            FavoritesError::Persistence(StorageError::UpdateFailed { id, reason }) => {
                assert_eq!(id, "3");
                assert!(reason.contains("bad bytes"));
            }
            other => panic!("Expected UpdateFailed, got: {:?}", other),
        }
        assert!(matches!(
            codec().into_delete_failure("4"),
            FavoritesError::Persistence(StorageError::DeleteFailed { .. })
        ));
    }

    #[test]
    fn test_not_found_survives_write_mapping() {
        assert!(FavoritesError::not_found("9")
            .into_delete_failure("9")
            .is_not_found());
        assert!(FavoritesError::not_found("9")
            .into_update_failure("9")
            .is_not_found());
    }

    #[test]
    fn test_json_error_converts_to_codec() {
        let parse = serde_json::from_slice::<serde_json::Value>(b"{not json");
        let err: FavoritesError = parse.unwrap_err().into();
        assert!(matches!(err, FavoritesError::Codec { .. }));
    }
}
