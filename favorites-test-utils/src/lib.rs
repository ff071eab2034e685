//! Favorites Test Utilities
//!
//! Shared test infrastructure for the favorites workspace:
//! - Recording port doubles that count calls and inject failures
//! - Proptest generators for every asset variant
//! - Fixtures for common scenarios
//! - Custom assertions over `FavoritesResult`
//! - A tracing subscriber initializer for test output

pub use favorites_core::{
    Asset, AssetHeader, AssetId, AssetKind, Audience, AudienceRules, CacheError, Chart,
    FavoritesError, FavoritesResult, Insight, OwnerId, Score, ServiceConfig, StorageError,
    ValidationError,
};
pub use favorites_storage::{
    AssetCache, AssetStore, AssetStream, Enricher, FavoriteService, InMemoryAssetCache,
    InMemoryAssetStore, NoopEnricher,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected_cache_error() -> FavoritesError {
    CacheError::Unavailable {
        reason: "injected failure".to_string(),
    }
    .into()
}

/// Install a fmt subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// RECORDING STORE
// ============================================================================

/// Snapshot of [`RecordingStore`] call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub save: usize,
    pub find_by_id: usize,
    pub find_all: usize,
    pub find_by_owner: usize,
    pub delete: usize,
    pub update_description: usize,
    /// Rows handed out by listing cursors.
    pub rows_pulled: usize,
}

impl StoreCalls {
    /// Calls that change stored data.
    pub fn mutations(&self) -> usize {
        self.save + self.delete + self.update_description
    }

    /// Every port call, mutations and reads.
    pub fn total(&self) -> usize {
        self.mutations() + self.find_by_id + self.find_all + self.find_by_owner
    }
}

#[derive(Debug, Default)]
struct StoreCounters {
    save: AtomicUsize,
    find_by_id: AtomicUsize,
    find_all: AtomicUsize,
    find_by_owner: AtomicUsize,
    delete: AtomicUsize,
    update_description: AtomicUsize,
    rows_pulled: AtomicUsize,
}

/// [`AssetStore`] double over [`InMemoryAssetStore`].
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryAssetStore,
    counters: Arc<StoreCounters>,
    saved: Mutex<Vec<Asset>>,
    fail_save: Mutex<Option<StorageError>>,
    fail_open: Mutex<Option<StorageError>>,
    fail_mutations: Mutex<Option<StorageError>>,
    fail_stream_after: Mutex<Option<usize>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `assets` directly, without recording calls.
    pub async fn seeded(assets: impl IntoIterator<Item = Asset>) -> Self {
        let store = Self::new();
        for asset in assets {
            // Fixtures use unique ids.
            let _ = store.inner.save(&asset).await;
        }
        store
    }

    pub fn inner(&self) -> &InMemoryAssetStore {
        &self.inner
    }

    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors()
    }

    pub fn calls(&self) -> StoreCalls {
        let c = &self.counters;
        StoreCalls {
            save: c.save.load(Ordering::SeqCst),
            find_by_id: c.find_by_id.load(Ordering::SeqCst),
            find_all: c.find_all.load(Ordering::SeqCst),
            find_by_owner: c.find_by_owner.load(Ordering::SeqCst),
            delete: c.delete.load(Ordering::SeqCst),
            update_description: c.update_description.load(Ordering::SeqCst),
            rows_pulled: c.rows_pulled.load(Ordering::SeqCst),
        }
    }

    /// Assets passed to `save`, in call order.
    pub fn saved(&self) -> Vec<Asset> {
        lock(&self.saved).clone()
    }

    /// Make every `save` fail with `error`.
    pub fn fail_save_with(&self, error: StorageError) {
        *lock(&self.fail_save) = Some(error);
    }

    /// Make opening a listing cursor fail with `error`.
    pub fn fail_open_with(&self, error: StorageError) {
        *lock(&self.fail_open) = Some(error);
    }

    /// Make every `delete` and `update_description` fail with `error`.
    pub fn fail_mutations_with(&self, error: StorageError) {
        *lock(&self.fail_mutations) = Some(error);
    }

    /// Listing cursors yield `rows` items, then fail before the next one.
    pub fn fail_stream_after(&self, rows: usize) {
        *lock(&self.fail_stream_after) = Some(rows);
    }

    fn check_open(&self) -> FavoritesResult<()> {
        match lock(&self.fail_open).clone() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn check_mutation(&self) -> FavoritesResult<()> {
        match lock(&self.fail_mutations).clone() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn record_rows(&self, mut rows: AssetStream) -> AssetStream {
        let counters = Arc::clone(&self.counters);
        let fail_after = *lock(&self.fail_stream_after);

        favorites_storage::boxed_stream(async_stream::try_stream! {
            let mut yielded = 0usize;
            while let Some(row) = rows.next().await {
                if fail_after == Some(yielded) {
                    Err::<(), _>(StorageError::CursorFailed {
                        reason: "injected failure".to_string(),
                    })?;
                }
                let asset = row?;
                counters.rows_pulled.fetch_add(1, Ordering::SeqCst);
                yielded += 1;
                yield asset;
            }
        })
    }
}

#[async_trait]
impl AssetStore for RecordingStore {
    async fn save(&self, asset: &Asset) -> FavoritesResult<()> {
        self.counters.save.fetch_add(1, Ordering::SeqCst);
        lock(&self.saved).push(asset.clone());
        if let Some(e) = lock(&self.fail_save).clone() {
            return Err(e.into());
        }
        self.inner.save(asset).await
    }

    async fn find_by_id(&self, id: &str) -> FavoritesResult<Asset> {
        self.counters.find_by_id.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }

    async fn find_all(&self, limit: usize, offset: usize) -> FavoritesResult<AssetStream> {
        self.counters.find_all.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;
        let rows = self.inner.find_all(limit, offset).await?;
        Ok(self.record_rows(rows))
    }

    async fn find_by_owner(
        &self,
        owner_id: &str,
        limit: usize,
        offset: usize,
    ) -> FavoritesResult<AssetStream> {
        self.counters.find_by_owner.fetch_add(1, Ordering::SeqCst);
        self.check_open()?;
        let rows = self.inner.find_by_owner(owner_id, limit, offset).await?;
        Ok(self.record_rows(rows))
    }

    async fn delete(&self, id: &str) -> FavoritesResult<()> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.check_mutation()?;
        self.inner.delete(id).await
    }

    async fn update_description(&self, id: &str, description: &str) -> FavoritesResult<Asset> {
        self.counters.update_description.fetch_add(1, Ordering::SeqCst);
        self.check_mutation()?;
        self.inner.update_description(id, description).await
    }
}

// ============================================================================
// RECORDING CACHE
// ============================================================================

/// Snapshot of [`RecordingCache`] call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheCalls {
    pub add_to_index: usize,
    pub set_blob: usize,
    pub get_batch: usize,
    pub get_index_range: usize,
    pub remove: usize,
    pub invalidate: usize,
}

impl CacheCalls {
    pub fn writes(&self) -> usize {
        self.add_to_index + self.set_blob + self.remove + self.invalidate
    }

    pub fn total(&self) -> usize {
        self.writes() + self.get_batch + self.get_index_range
    }
}

#[derive(Debug, Default)]
struct CacheLog {
    index_writes: Vec<(AssetId, Score)>,
    blob_writes: Vec<(AssetId, Vec<u8>)>,
    batches: Vec<Vec<AssetId>>,
    ranges: Vec<(i64, i64)>,
    removes: Vec<AssetId>,
    invalidates: Vec<AssetId>,
}

/// [`AssetCache`] double over [`InMemoryAssetCache`].
///
/// Every call is logged, including failed ones.
#[derive(Debug, Default)]
pub struct RecordingCache {
    inner: InMemoryAssetCache,
    log: Mutex<CacheLog>,
    fail_get_batch: AtomicBool,
    fail_index_range: AtomicBool,
    fail_writes: AtomicBool,
    fail_remove: AtomicBool,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index and store `asset` directly, without recording calls.
    pub async fn seed(&self, asset: &Asset, score: Score) {
        let _ = self.inner.add_to_index(asset.id(), score).await;
        if let Ok(bytes) = asset.encode() {
            let _ = self.inner.set_blob(asset.id(), bytes).await;
        }
    }

    pub fn inner(&self) -> &InMemoryAssetCache {
        &self.inner
    }

    pub fn calls(&self) -> CacheCalls {
        let log = lock(&self.log);
        CacheCalls {
            add_to_index: log.index_writes.len(),
            set_blob: log.blob_writes.len(),
            get_batch: log.batches.len(),
            get_index_range: log.ranges.len(),
            remove: log.removes.len(),
            invalidate: log.invalidates.len(),
        }
    }

    /// `(id, score)` pairs passed to `add_to_index`.
    pub fn index_writes(&self) -> Vec<(AssetId, Score)> {
        lock(&self.log).index_writes.clone()
    }

    /// `(id, bytes)` pairs passed to `set_blob`.
    pub fn blob_writes(&self) -> Vec<(AssetId, Vec<u8>)> {
        lock(&self.log).blob_writes.clone()
    }

    /// Id lists passed to `get_batch`.
    pub fn batches(&self) -> Vec<Vec<AssetId>> {
        lock(&self.log).batches.clone()
    }

    /// `(start, stop)` pairs passed to `get_index_range`.
    pub fn ranges(&self) -> Vec<(i64, i64)> {
        lock(&self.log).ranges.clone()
    }

    pub fn removes(&self) -> Vec<AssetId> {
        lock(&self.log).removes.clone()
    }

    pub fn fail_get_batch(&self, fail: bool) {
        self.fail_get_batch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_index_range(&self, fail: bool) {
        self.fail_index_range.store(fail, Ordering::SeqCst);
    }

    /// Fail `add_to_index` and `set_blob`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> FavoritesResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(injected_cache_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AssetCache for RecordingCache {
    async fn add_to_index(&self, id: &str, score: Score) -> FavoritesResult<()> {
        lock(&self.log).index_writes.push((id.to_string(), score));
        Self::check(&self.fail_writes)?;
        self.inner.add_to_index(id, score).await
    }

    async fn set_blob(&self, id: &str, bytes: Vec<u8>) -> FavoritesResult<()> {
        lock(&self.log).blob_writes.push((id.to_string(), bytes.clone()));
        Self::check(&self.fail_writes)?;
        self.inner.set_blob(id, bytes).await
    }

    async fn get_batch(&self, ids: &[AssetId]) -> FavoritesResult<HashMap<AssetId, Vec<u8>>> {
        lock(&self.log).batches.push(ids.to_vec());
        Self::check(&self.fail_get_batch)?;
        self.inner.get_batch(ids).await
    }

    async fn get_index_range(&self, start: i64, stop: i64) -> FavoritesResult<Vec<AssetId>> {
        lock(&self.log).ranges.push((start, stop));
        Self::check(&self.fail_index_range)?;
        self.inner.get_index_range(start, stop).await
    }

    async fn remove(&self, id: &str) -> FavoritesResult<()> {
        lock(&self.log).removes.push(id.to_string());
        Self::check(&self.fail_remove)?;
        self.inner.remove(id).await
    }

    async fn invalidate(&self, id: &str) -> FavoritesResult<()> {
        lock(&self.log).invalidates.push(id.to_string());
        Self::check(&self.fail_remove)?;
        self.inner.invalidate(id).await
    }
}

// ============================================================================
// RECORDING ENRICHER
// ============================================================================

/// [`Enricher`] double that records which ids it saw.
///
/// With a tag set, enrichment replaces the description with the tag so
/// tests can tell enriched copies from raw ones.
#[derive(Debug, Default)]
pub struct RecordingEnricher {
    seen: Mutex<Vec<AssetId>>,
    tag: Option<String>,
    fail: AtomicBool,
}

impl RecordingEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tagging(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        lock(&self.seen).len()
    }

    /// Number of enrich calls for `id`.
    pub fn calls_for(&self, id: &str) -> usize {
        lock(&self.seen).iter().filter(|seen| *seen == id).count()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Enricher for RecordingEnricher {
    async fn enrich(&self, asset: Asset) -> FavoritesResult<Asset> {
        lock(&self.seen).push(asset.id().clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(FavoritesError::Enrichment {
                reason: "injected failure".to_string(),
            });
        }
        Ok(match &self.tag {
            Some(tag) => asset.with_description(tag.clone()),
            None => asset,
        })
    }
}

/// A service wired to recording doubles, with handles kept for inspection.
pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub cache: Arc<RecordingCache>,
    pub enricher: Arc<RecordingEnricher>,
    pub service: FavoriteService<RecordingStore, RecordingCache, RecordingEnricher>,
}

impl Harness {
    pub fn new(store: RecordingStore, cache: RecordingCache, enricher: RecordingEnricher) -> Self {
        let store = Arc::new(store);
        let cache = Arc::new(cache);
        let enricher = Arc::new(enricher);
        let service =
            FavoriteService::new(Arc::clone(&store), Arc::clone(&cache), Arc::clone(&enricher));
        Self {
            store,
            cache,
            enricher,
            service,
        }
    }

    pub fn empty() -> Self {
        Self::new(RecordingStore::new(), RecordingCache::new(), RecordingEnricher::new())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for favorites assets.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_asset_id() -> impl Strategy<Value = AssetId> {
        "[a-z0-9]{1,12}"
    }

    pub fn arb_owner_id() -> impl Strategy<Value = OwnerId> {
        "user-[a-z0-9]{1,8}"
    }

    pub fn arb_label() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,23}"
    }

    pub fn arb_kind() -> impl Strategy<Value = AssetKind> {
        prop_oneof![
            Just(AssetKind::Chart),
            Just(AssetKind::Insight),
            Just(AssetKind::Audience),
        ]
    }

    /// A chart with at least one axis set.
    pub fn arb_chart() -> impl Strategy<Value = Chart> {
        (
            arb_asset_id(),
            arb_owner_id(),
            arb_label(),
            prop_oneof![
                (arb_label(), Just(None)).prop_map(|(x, y)| (Some(x), y)),
                (Just(None), arb_label()).prop_map(|(x, y)| (x, Some(y))),
                (arb_label(), arb_label()).prop_map(|(x, y)| (Some(x), Some(y))),
            ],
        )
            .prop_map(|(id, owner, name, (x, y))| Chart::new(id, owner, name).with_axes(x, y))
    }

    pub fn arb_insight() -> impl Strategy<Value = Insight> {
        (arb_asset_id(), arb_owner_id(), arb_label(), arb_label())
            .prop_map(|(id, owner, name, content)| Insight::new(id, owner, name, content))
    }

    /// Audience rules with a country and a consistent age range.
    pub fn arb_rules() -> impl Strategy<Value = AudienceRules> {
        (
            "[A-Z]{2}",
            proptest::option::of(prop_oneof![Just("female"), Just("male")]),
            proptest::option::of((0i32..60, 0i32..60)),
        )
            .prop_map(|(country, gender, ages)| {
                let mut rules = AudienceRules::for_country(country);
                if let Some(gender) = gender {
                    rules = rules.with_gender(gender);
                }
                if let Some((a, b)) = ages {
                    rules = rules.with_age_range(Some(a.min(b)), Some(a.max(b)));
                }
                rules
            })
    }

    pub fn arb_audience() -> impl Strategy<Value = Audience> {
        (arb_asset_id(), arb_owner_id(), arb_label(), arb_rules())
            .prop_map(|(id, owner, name, rules)| Audience::new(id, owner, name, rules))
    }

    /// Any valid asset.
    pub fn arb_asset() -> impl Strategy<Value = Asset> {
        prop_oneof![
            arb_chart().prop_map(Asset::from),
            arb_insight().prop_map(Asset::from),
            arb_audience().prop_map(Asset::from),
        ]
    }

    /// Valid assets with distinct ids.
    pub fn arb_assets(max: usize) -> impl Strategy<Value = Vec<Asset>> {
        proptest::collection::vec(arb_asset(), 0..=max).prop_map(|assets| {
            assets
                .into_iter()
                .enumerate()
                .map(|(i, asset)| match asset {
                    Asset::Chart(mut c) => {
                        c.header.id = format!("{i:04}-{}", c.header.id);
                        Asset::Chart(c)
                    }
                    Asset::Insight(mut n) => {
                        n.header.id = format!("{i:04}-{}", n.header.id);
                        Asset::Insight(n)
                    }
                    Asset::Audience(mut a) => {
                        a.header.id = format!("{i:04}-{}", a.header.id);
                        Asset::Audience(a)
                    }
                })
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built assets for common scenarios.

    use super::*;

    pub const OWNER: &str = "user-1";
    pub const OTHER_OWNER: &str = "user-2";

    pub fn insight(id: &str) -> Asset {
        Insight::new(id, OWNER, "Test", "Knowledge").into()
    }

    pub fn chart(id: &str) -> Asset {
        Chart::new(id, OWNER, "Revenue")
            .with_axes(Some("month".to_string()), Some("usd".to_string()))
            .into()
    }

    pub fn audience(id: &str) -> Asset {
        Audience::new(
            id,
            OWNER,
            "Young adults",
            AudienceRules::for_country("GR").with_age_range(Some(18), Some(30)),
        )
        .into()
    }

    /// `count` insights with ids `"0"`, `"1"`, ... owned by [`OWNER`].
    pub fn insights(count: usize) -> Vec<Asset> {
        (0..count).map(|i| insight(&i.to_string())).collect()
    }

    /// One asset of each variant.
    pub fn mixed() -> Vec<Asset> {
        vec![chart("chart-1"), insight("insight-1"), audience("audience-1")]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over favorites results.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &FavoritesResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &FavoritesResult<T>, id: &str) {
        match result {
            Err(FavoritesError::NotFound { id: got }) => assert_eq!(got, id, "Wrong id in NotFound"),
            other => panic!("Expected NotFound for {}, got: {:?}", id, other),
        }
    }

    #[track_caller]
    pub fn assert_forbidden<T: std::fmt::Debug>(result: &FavoritesResult<T>) {
        match result {
            Err(FavoritesError::Forbidden { .. }) => {}
            other => panic!("Expected Forbidden, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation<T: std::fmt::Debug>(
        result: &FavoritesResult<T>,
        expected: ValidationError,
    ) {
        match result {
            Err(FavoritesError::Validation(got)) => assert_eq!(got, &expected),
            other => panic!("Expected Validation({:?}), got: {:?}", expected, other),
        }
    }

    #[track_caller]
    pub fn assert_persistence<T: std::fmt::Debug>(result: &FavoritesResult<T>) {
        match result {
            Err(FavoritesError::Persistence(_)) => {}
            other => panic!("Expected Persistence error, got: {:?}", other),
        }
    }

    /// Assert the ids of `assets`, in order.
    #[track_caller]
    pub fn assert_ids(assets: &[Asset], expected: &[&str]) {
        let ids: Vec<&str> = assets.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(ids, expected, "Unexpected asset ids");
    }
}
