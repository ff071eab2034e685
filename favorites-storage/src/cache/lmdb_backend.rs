//! LMDB-backed asset cache.
//!
//! Uses heed to keep the recency index and the encoded blobs in one
//! memory-mapped environment with three named databases:
//!
//! - `index`: asset id → score (8 bytes LE)
//! - `by_score`: [`ScoreKey`] → empty, scanned in reverse for range reads
//! - `blobs`: asset id → `[expires_at millis][payload]`
//!
//! Every write runs in a single write transaction, so the two index
//! databases never disagree. Blobs past their expiry read as absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use favorites_core::{AssetId, CacheError, ConfigError, FavoritesError, FavoritesResult, Score};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use super::key::{decode_score, encode_score, frame_blob, unframe_blob, ScoreKey};
use crate::ports::{resolve_range, AssetCache};

/// Default on-disk location of the cache environment.
pub const DEFAULT_CACHE_PATH: &str = "./data/favorites-cache";
/// Default LMDB map size in megabytes.
pub const DEFAULT_MAX_SIZE_MB: usize = 64;
/// Default lifetime of a cached blob.
pub const DEFAULT_BLOB_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    #[error("Failed to open database: {0}")]
    DbOpen(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A stored key or value did not match the expected layout.
    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<heed::Error> for LmdbCacheError {
    fn from(e: heed::Error) -> Self {
        LmdbCacheError::Transaction(e.to_string())
    }
}

impl From<LmdbCacheError> for FavoritesError {
    fn from(e: LmdbCacheError) -> Self {
        let reason = e.to_string();
        match e {
            LmdbCacheError::Config(e) => FavoritesError::Config(e),
            LmdbCacheError::EnvOpen(_) | LmdbCacheError::DbOpen(_) | LmdbCacheError::Io(_) => {
                FavoritesError::Cache(CacheError::Unavailable { reason })
            }
            LmdbCacheError::Transaction(_) | LmdbCacheError::Corrupt(_) => {
                FavoritesError::Cache(CacheError::TransactionFailed { reason })
            }
        }
    }
}

/// Configuration for [`LmdbAssetCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct LmdbCacheConfig {
    /// Directory holding the LMDB files.
    pub path: PathBuf,
    /// Maximum size of the memory map in megabytes.
    pub max_size_mb: usize,
    /// How long a blob stays readable after it is written.
    pub blob_ttl: Duration,
}

impl Default for LmdbCacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_PATH),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            blob_ttl: DEFAULT_BLOB_TTL,
        }
    }
}

impl LmdbCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    pub fn with_blob_ttl(mut self, ttl: Duration) -> Self {
        self.blob_ttl = ttl;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `FAVORITES_CACHE_PATH` (default: `./data/favorites-cache`)
    /// - `FAVORITES_CACHE_MAX_SIZE_MB` (default: 64)
    /// - `FAVORITES_CACHE_BLOB_TTL_SECS` (default: 86400)
    pub fn from_env() -> Self {
        let path = std::env::var("FAVORITES_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH));

        let max_size_mb = std::env::var("FAVORITES_CACHE_MAX_SIZE_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_SIZE_MB);

        let blob_ttl = std::env::var("FAVORITES_CACHE_BLOB_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_BLOB_TTL);

        Self {
            path,
            max_size_mb,
            blob_ttl,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "path".to_string(),
            });
        }
        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_size_mb".to_string(),
                value: "0".to_string(),
                reason: "map size must be positive".to_string(),
            });
        }
        if self.blob_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "blob_ttl".to_string(),
                value: "0s".to_string(),
                reason: "blobs would expire on write".to_string(),
            });
        }
        Ok(())
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.blob_ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// LMDB-backed [`AssetCache`].
pub struct LmdbAssetCache {
    env: Env,
    index: Database<Bytes, Bytes>,
    by_score: Database<Bytes, Bytes>,
    blobs: Database<Bytes, Bytes>,
    blob_ttl_millis: i64,
}

impl std::fmt::Debug for LmdbAssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbAssetCache")
            .field("path", &self.env.path())
            .field("blob_ttl_millis", &self.blob_ttl_millis)
            .finish()
    }
}

impl LmdbAssetCache {
    /// Open (or create) a cache at `path` with default TTL.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        Self::open(&LmdbCacheConfig::new(path.as_ref()).with_max_size_mb(max_size_mb))
    }

    /// Open (or create) a cache from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LmdbCacheError::Config`] if `config` fails validation, or
    /// an error if the directory cannot be created or the LMDB environment
    /// and its databases cannot be opened.
    pub fn open(config: &LmdbCacheConfig) -> Result<Self, LmdbCacheError> {
        config.validate()?;
        std::fs::create_dir_all(&config.path)?;

        // SAFETY: the environment is opened once per path by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.max_size_mb * 1024 * 1024)
                .max_dbs(3)
                .open(&config.path)
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn()?;
        let index = Self::create_db(&env, &mut wtxn, "index")?;
        let by_score = Self::create_db(&env, &mut wtxn, "by_score")?;
        let blobs = Self::create_db(&env, &mut wtxn, "blobs")?;
        wtxn.commit()?;

        Ok(Self {
            env,
            index,
            by_score,
            blobs,
            blob_ttl_millis: config.ttl_millis(),
        })
    }

    fn create_db(
        env: &Env,
        wtxn: &mut RwTxn<'_>,
        name: &str,
    ) -> Result<Database<Bytes, Bytes>, LmdbCacheError> {
        env.create_database(wtxn, Some(name))
            .map_err(|e| LmdbCacheError::DbOpen(format!("{name}: {e}")))
    }

    fn current_score(&self, txn: &RoTxn<'_>, id: &str) -> Result<Option<Score>, LmdbCacheError> {
        match self.index.get(txn, id.as_bytes())? {
            Some(bytes) => decode_score(bytes)
                .map(Some)
                .ok_or_else(|| LmdbCacheError::Corrupt(format!("score for {id}"))),
            None => Ok(None),
        }
    }

    /// Drop `id` from both index databases inside `wtxn`.
    fn unindex(&self, wtxn: &mut RwTxn<'_>, id: &str) -> Result<(), LmdbCacheError> {
        if let Some(old) = self.current_score(wtxn, id)? {
            self.by_score
                .delete(wtxn, &ScoreKey::new(old, id).encode())?;
            self.index.delete(wtxn, id.as_bytes())?;
        }
        Ok(())
    }

    /// Number of ids in the recency index.
    pub fn index_len(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.index.len(&rtxn)?)
    }

    /// Number of stored blobs, expired ones included.
    pub fn blob_count(&self) -> Result<u64, LmdbCacheError> {
        let rtxn = self.env.read_txn()?;
        Ok(self.blobs.len(&rtxn)?)
    }

    /// Delete every blob whose expiry has passed. Returns the number removed.
    pub fn purge_expired(&self) -> Result<u64, LmdbCacheError> {
        let now = Utc::now().timestamp_millis();
        let expired: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn()?;
            let mut keys = Vec::new();
            for entry in self.blobs.iter(&rtxn)? {
                let (key, value) = entry?;
                match unframe_blob(value) {
                    Some((expires_at, _)) if expires_at > now => {}
                    _ => keys.push(key.to_vec()),
                }
            }
            keys
        };

        let mut wtxn = self.env.write_txn()?;
        let mut purged = 0u64;
        for key in &expired {
            if self.blobs.delete(&mut wtxn, key)? {
                purged += 1;
            }
        }
        wtxn.commit()?;

        if purged > 0 {
            tracing::debug!(purged, "Purged expired cache blobs");
        }
        Ok(purged)
    }

    fn write_blob(&self, id: &str, payload: &[u8], expires_at: i64) -> Result<(), LmdbCacheError> {
        let framed = frame_blob(expires_at, payload);
        let mut wtxn = self.env.write_txn()?;
        self.blobs.put(&mut wtxn, id.as_bytes(), &framed)?;
        wtxn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl AssetCache for LmdbAssetCache {
    async fn add_to_index(&self, id: &str, score: Score) -> FavoritesResult<()> {
        let mut wtxn = self.env.write_txn().map_err(LmdbCacheError::from)?;
        self.unindex(&mut wtxn, id)?;
        self.index
            .put(&mut wtxn, id.as_bytes(), &encode_score(score))
            .map_err(LmdbCacheError::from)?;
        self.by_score
            .put(&mut wtxn, &ScoreKey::new(score, id).encode(), &[])
            .map_err(LmdbCacheError::from)?;
        wtxn.commit().map_err(LmdbCacheError::from)?;
        Ok(())
    }

    async fn set_blob(&self, id: &str, bytes: Vec<u8>) -> FavoritesResult<()> {
        let expires_at = Utc::now()
            .timestamp_millis()
            .saturating_add(self.blob_ttl_millis);
        self.write_blob(id, &bytes, expires_at)?;
        Ok(())
    }

    async fn get_batch(&self, ids: &[AssetId]) -> FavoritesResult<HashMap<AssetId, Vec<u8>>> {
        let now = Utc::now().timestamp_millis();
        let rtxn = self.env.read_txn().map_err(LmdbCacheError::from)?;

        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            let Some(value) = self
                .blobs
                .get(&rtxn, id.as_bytes())
                .map_err(LmdbCacheError::from)?
            else {
                continue;
            };
            match unframe_blob(value) {
                Some((expires_at, payload)) if expires_at > now => {
                    found.insert(id.clone(), payload.to_vec());
                }
                Some(_) => {}
                None => {
                    return Err(LmdbCacheError::Corrupt(format!("blob for {id}")).into());
                }
            }
        }
        Ok(found)
    }

    async fn get_index_range(&self, start: i64, stop: i64) -> FavoritesResult<Vec<AssetId>> {
        let rtxn = self.env.read_txn().map_err(LmdbCacheError::from)?;
        let len = self.by_score.len(&rtxn).map_err(LmdbCacheError::from)?;
        let Some((from, to)) = resolve_range(len as usize, start, stop) else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::with_capacity(to - from);
        let iter = self
            .by_score
            .rev_iter(&rtxn)
            .map_err(LmdbCacheError::from)?;
        for entry in iter.skip(from).take(to - from) {
            let (key, _) = entry.map_err(LmdbCacheError::from)?;
            let key = ScoreKey::decode(key)
                .ok_or_else(|| LmdbCacheError::Corrupt("score key".to_string()))?;
            ids.push(key.into_id());
        }
        Ok(ids)
    }

    async fn remove(&self, id: &str) -> FavoritesResult<()> {
        let mut wtxn = self.env.write_txn().map_err(LmdbCacheError::from)?;
        self.unindex(&mut wtxn, id)?;
        self.blobs
            .delete(&mut wtxn, id.as_bytes())
            .map_err(LmdbCacheError::from)?;
        wtxn.commit().map_err(LmdbCacheError::from)?;
        Ok(())
    }

    async fn invalidate(&self, id: &str) -> FavoritesResult<()> {
        let mut wtxn = self.env.write_txn().map_err(LmdbCacheError::from)?;
        self.blobs
            .delete(&mut wtxn, id.as_bytes())
            .map_err(LmdbCacheError::from)?;
        wtxn.commit().map_err(LmdbCacheError::from)?;
        Ok(())
    }
}
