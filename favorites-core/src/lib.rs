//! Favorites Core - Asset Model
//!
//! The closed set of favorite asset variants, their validation rules,
//! the discriminator-first codec shared by the store and the cache, and
//! the error taxonomy used across the workspace. No I/O lives here.

mod asset;
mod config;
mod entities;
mod enums;
mod error;
mod identity;

pub use asset::Asset;
pub use config::{ServiceConfig, DEFAULT_BATCH_SIZE};
pub use entities::{AssetHeader, Audience, AudienceRules, Chart, Insight};
pub use enums::AssetKind;
pub use error::{
    CacheError, ConfigError, FavoritesError, FavoritesResult, StorageError, ValidationError,
};
pub use identity::{score_at, score_now, AssetId, OwnerId, Score, Timestamp};

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
