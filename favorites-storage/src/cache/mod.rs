//! Cache adapters for the favorites read path.
//!
//! - [`InMemoryAssetCache`]: process-local index and blobs, used in tests
//!   and single-node wiring
//! - [`LmdbAssetCache`]: persistent LMDB environment via heed with blob expiry
//! - [`InstrumentedCache`]: decorator that counts batch hits and misses

mod instrumented;
mod key;
mod lmdb_backend;
mod memory;

pub use instrumented::{CacheStats, InstrumentedCache};
pub use key::ScoreKey;
pub use lmdb_backend::{
    LmdbAssetCache, LmdbCacheConfig, LmdbCacheError, DEFAULT_BLOB_TTL, DEFAULT_CACHE_PATH,
    DEFAULT_MAX_SIZE_MB,
};
pub use memory::InMemoryAssetCache;
