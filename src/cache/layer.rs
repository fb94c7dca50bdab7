//! Cache layer that decides between cached collections and the gateway.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::api::{EntityKind, ViewScope};

use super::scope::ScopeRouter;
use super::storage::{CacheKey, EntityStore};
use super::traits::{Entity, FetchOutcome, FetchParams, RecordGateway};

/// Tunables shared by every collection.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
  /// How long a fetched collection is served without a network call
  pub freshness_window: Duration,
  /// Treat a fetched-but-empty collection as stale
  pub empty_is_stale: bool,
  /// Scope used for view-scoped kinds until a view switches it
  pub default_scope: ViewScope,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      freshness_window: Duration::minutes(5),
      empty_is_stale: false,
      default_scope: ViewScope::My,
    }
  }
}

impl CacheSettings {
  pub fn with_freshness_window(mut self, window: Duration) -> Self {
    self.freshness_window = window;
    self
  }

  pub fn with_empty_is_stale(mut self, empty_is_stale: bool) -> Self {
    self.empty_is_stale = empty_is_stale;
    self
  }

  pub fn with_default_scope(mut self, scope: ViewScope) -> Self {
    self.default_scope = scope;
    self
  }
}

#[derive(Debug, Default)]
struct KindStatus {
  in_flight: usize,
  last_error: Option<String>,
}

pub(super) struct Shared<G> {
  pub(super) gateway: G,
  settings: CacheSettings,
  pub(super) store: Mutex<EntityStore>,
  pub(super) router: Mutex<ScopeRouter>,
  status: Mutex<HashMap<EntityKind, KindStatus>>,
  flights: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
  /// Bumped by `clear_all`; results of calls started in an older session are dropped
  epoch: AtomicU64,
  revision: watch::Sender<u64>,
}

/// Shared entity cache for one session.
///
/// Views fetch through it, read collections from it and mutate through it.
/// Cloning is cheap and every clone sees the same collections.
pub struct EntityCache<G: RecordGateway> {
  pub(super) shared: Arc<Shared<G>>,
}

impl<G: RecordGateway> EntityCache<G> {
  pub fn new(gateway: G, settings: CacheSettings) -> Self {
    let (revision, _) = watch::channel(0);
    Self {
      shared: Arc::new(Shared {
        gateway,
        settings,
        store: Mutex::new(EntityStore::new()),
        router: Mutex::new(ScopeRouter::new(settings.default_scope)),
        status: Mutex::new(HashMap::new()),
        flights: Mutex::new(HashMap::new()),
        epoch: AtomicU64::new(0),
        revision,
      }),
    }
  }

  pub fn gateway(&self) -> &G {
    &self.shared.gateway
  }

  // ===== Fetching =====

  /// Populate or refresh the collection for `T`.
  pub async fn fetch<T: Entity>(&self, params: FetchParams) -> FetchOutcome {
    self.fetch_kind(T::KIND, params).await
  }

  /// Populate or refresh a collection.
  ///
  /// 1. Resolve the cache key; a scope switch forces a refresh
  /// 2. If fresh and not forced, return without a network call
  /// 3. Otherwise list from the gateway and replace the collection
  /// 4. On failure keep the cached records and record the error
  ///
  /// Concurrent fetches for the same key wait for each other, then re-check
  /// freshness, so they share one gateway call unless forced.
  pub async fn fetch_kind(&self, kind: EntityKind, params: FetchParams) -> FetchOutcome {
    let route = lock(&self.shared.router).route(kind, params.scope);
    let force = params.force_refresh || route.force_refresh;
    let key = route.key;

    if !force && self.is_fresh(&key) {
      debug!(kind = %kind, scope = ?key.scope, "cache hit");
      return FetchOutcome::CacheHit;
    }

    let flight = self.flight(key);
    let _flight = flight.lock().await;

    if !force && self.is_fresh(&key) {
      debug!(kind = %kind, scope = ?key.scope, "cache hit after in-flight fetch");
      return FetchOutcome::CacheHit;
    }

    let epoch = self.epoch();
    let _loading = LoadingGuard::begin(self, kind);
    debug!(kind = %kind, scope = ?key.scope, force, "fetching from gateway");

    match self.shared.gateway.list(kind, key.scope).await {
      Ok(records) => {
        let count = records.len();
        if self.epoch() != epoch {
          debug!(kind = %kind, count, "discarding fetch result from a previous session");
          return FetchOutcome::Discarded;
        }
        lock(&self.shared.store).replace(key, records);
        self.update_status(kind, |s| s.last_error = None);
        self.notify();
        FetchOutcome::Refreshed { count }
      }
      Err(e) => {
        warn!(kind = %kind, scope = ?key.scope, error = %e, "fetch failed, keeping cached records");
        let error = e.to_string();
        if self.epoch() == epoch {
          self.update_status(kind, |s| s.last_error = Some(error.clone()));
          self.notify();
        }
        FetchOutcome::Failed { error }
      }
    }
  }

  /// Whether the entry can be served without a network call.
  fn is_fresh(&self, key: &CacheKey) -> bool {
    let settings = self.shared.settings;
    lock(&self.shared.store)
      .entry(key)
      .is_some_and(|e| e.is_fresh(Utc::now(), settings.freshness_window, settings.empty_is_stale))
  }

  // ===== Reading =====

  /// Typed records of the collection views currently show for `T`.
  ///
  /// Records that no longer decode (e.g. after a patch the type rejects) are skipped.
  pub fn records<T: Entity>(&self) -> Vec<T> {
    let kind = T::KIND;
    self
      .raw_records(kind)
      .into_iter()
      .filter_map(|record| match serde_json::from_value(record) {
        Ok(entity) => Some(entity),
        Err(e) => {
          debug!(kind = %kind, error = %e, "skipping undecodable cached record");
          None
        }
      })
      .collect()
  }

  pub fn raw_records(&self, kind: EntityKind) -> Vec<Value> {
    let key = self.active_key(kind);
    lock(&self.shared.store).records(&key)
  }

  pub fn last_fetched_at(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
    let key = self.active_key(kind);
    lock(&self.shared.store).last_fetched_at(&key)
  }

  pub fn is_loading(&self, kind: EntityKind) -> bool {
    lock(&self.shared.status)
      .get(&kind)
      .is_some_and(|s| s.in_flight > 0)
  }

  /// Error from the most recent failed fetch, cleared by the next successful one.
  pub fn last_error(&self, kind: EntityKind) -> Option<String> {
    lock(&self.shared.status)
      .get(&kind)
      .and_then(|s| s.last_error.clone())
  }

  // ===== View scope =====

  pub fn scope(&self, kind: EntityKind) -> Option<ViewScope> {
    lock(&self.shared.router).scope(kind)
  }

  /// Switch the scope a view-scoped kind is shown in; the next fetch is forced.
  pub fn set_scope(&self, kind: EntityKind, scope: ViewScope) {
    let changed = lock(&self.shared.router).set_scope(kind, scope);
    if changed {
      debug!(kind = %kind, scope = %scope, "view scope switched");
      self.notify();
    }
  }

  pub(super) fn active_key(&self, kind: EntityKind) -> CacheKey {
    lock(&self.shared.router).active_key(kind)
  }

  // ===== Session =====

  /// Drop every collection, timestamp, error and scope switch.
  ///
  /// Gateway calls still in flight will not write into the new session.
  pub fn clear_all(&self) {
    self.shared.epoch.fetch_add(1, Ordering::SeqCst);
    lock(&self.shared.store).clear_all();
    lock(&self.shared.router).reset();
    for status in lock(&self.shared.status).values_mut() {
      status.last_error = None;
    }
    info!("entity cache cleared");
    self.notify();
  }

  // ===== Change notification =====

  /// Receiver that changes whenever a collection, loading flag or error changes.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.shared.revision.subscribe()
  }

  #[cfg(test)]
  pub fn revision(&self) -> u64 {
    *self.shared.revision.borrow()
  }

  pub(super) fn notify(&self) {
    self.shared.revision.send_modify(|r| *r += 1);
  }

  pub(super) fn epoch(&self) -> u64 {
    self.shared.epoch.load(Ordering::SeqCst)
  }

  fn flight(&self, key: CacheKey) -> Arc<AsyncMutex<()>> {
    lock(&self.shared.flights).entry(key).or_default().clone()
  }

  fn update_status(&self, kind: EntityKind, f: impl FnOnce(&mut KindStatus)) {
    f(lock(&self.shared.status).entry(kind).or_default());
  }
}

impl<G: RecordGateway> Clone for EntityCache<G> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

/// Marks a kind as loading until dropped, on every exit path.
struct LoadingGuard<'a, G: RecordGateway> {
  cache: &'a EntityCache<G>,
  kind: EntityKind,
}

impl<'a, G: RecordGateway> LoadingGuard<'a, G> {
  fn begin(cache: &'a EntityCache<G>, kind: EntityKind) -> Self {
    cache.update_status(kind, |s| s.in_flight += 1);
    cache.notify();
    Self { cache, kind }
  }
}

impl<G: RecordGateway> Drop for LoadingGuard<'_, G> {
  fn drop(&mut self) {
    self
      .cache
      .update_status(self.kind, |s| s.in_flight = s.in_flight.saturating_sub(1));
    self.cache.notify();
  }
}

/// Store locks are never held across an await, so a poisoned lock only means
/// a panic mid-edit; the data is still structurally valid.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Client, Group, Matter};
  use crate::cache::testing::FakeGateway;
  use serde_json::json;

  fn three_matters() -> Vec<Value> {
    vec![
      json!({ "id": "m1", "name": "Estate of Doe", "status": "active" }),
      json!({ "id": "m2", "name": "Acme v. Widget", "status": "active" }),
      json!({ "id": "m3", "name": "Smith Lease", "status": "pending" }),
    ]
  }

  fn cache_with(gateway: FakeGateway) -> EntityCache<FakeGateway> {
    EntityCache::new(gateway, CacheSettings::default())
  }

  #[tokio::test]
  async fn test_second_fetch_within_window_is_cache_hit() {
    let gateway =
      FakeGateway::new().with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters());
    let cache = cache_with(gateway);

    let first = cache.fetch::<Matter>(FetchParams::default()).await;
    let second = cache.fetch::<Matter>(FetchParams::default()).await;

    assert_eq!(first, FetchOutcome::Refreshed { count: 3 });
    assert_eq!(second, FetchOutcome::CacheHit);
    assert_eq!(cache.gateway().list_calls(EntityKind::Matter), 1);
    assert_eq!(cache.records::<Matter>().len(), 3);
    assert!(cache.last_fetched_at(EntityKind::Matter).is_some());
  }

  #[tokio::test]
  async fn test_force_refresh_always_fetches() {
    let gateway =
      FakeGateway::new().with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters());
    let cache = cache_with(gateway);

    cache.fetch::<Matter>(FetchParams::default()).await;
    let forced = cache.fetch::<Matter>(FetchParams::forced()).await;

    assert_eq!(forced, FetchOutcome::Refreshed { count: 3 });
    assert_eq!(cache.gateway().list_calls(EntityKind::Matter), 2);
  }

  #[tokio::test]
  async fn test_expired_window_refetches() {
    let gateway =
      FakeGateway::new().with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters());
    let cache = EntityCache::new(
      gateway,
      CacheSettings::default().with_freshness_window(Duration::zero()),
    );

    cache.fetch::<Matter>(FetchParams::default()).await;
    let again = cache.fetch::<Matter>(FetchParams::default()).await;

    assert!(!again.is_cache_hit());
    assert_eq!(cache.gateway().list_calls(EntityKind::Matter), 2);
  }

  #[tokio::test]
  async fn test_scope_switch_never_serves_other_scope() {
    let gateway = FakeGateway::new()
      .with_collection(
        EntityKind::Matter,
        Some(ViewScope::My),
        vec![json!({ "id": "m1", "name": "Mine", "status": "active" })],
      )
      .with_collection(EntityKind::Matter, Some(ViewScope::All), three_matters());
    let cache = cache_with(gateway);

    cache.fetch::<Matter>(FetchParams::scoped(ViewScope::My)).await;
    assert_eq!(cache.records::<Matter>().len(), 1);

    let all = cache.fetch::<Matter>(FetchParams::scoped(ViewScope::All)).await;

    assert_eq!(all, FetchOutcome::Refreshed { count: 3 });
    assert_eq!(cache.scope(EntityKind::Matter), Some(ViewScope::All));
    assert_eq!(cache.records::<Matter>().len(), 3);
    assert_eq!(
      cache.gateway().list_scopes(EntityKind::Matter),
      vec![Some(ViewScope::My), Some(ViewScope::All)]
    );
  }

  #[tokio::test]
  async fn test_switching_back_is_forced_even_when_fresh() {
    let gateway = FakeGateway::new()
      .with_collection(EntityKind::Invoice, Some(ViewScope::My), Vec::new())
      .with_collection(EntityKind::Invoice, Some(ViewScope::All), Vec::new());
    let cache = cache_with(gateway);

    cache.fetch_kind(EntityKind::Invoice, FetchParams::scoped(ViewScope::My)).await;
    cache.fetch_kind(EntityKind::Invoice, FetchParams::scoped(ViewScope::All)).await;
    let back = cache
      .fetch_kind(EntityKind::Invoice, FetchParams::scoped(ViewScope::My))
      .await;

    assert!(!back.is_cache_hit());
    assert_eq!(cache.gateway().list_calls(EntityKind::Invoice), 3);
  }

  #[tokio::test]
  async fn test_set_scope_forces_next_fetch() {
    let gateway = FakeGateway::new();
    let cache = cache_with(gateway);

    cache.fetch_kind(EntityKind::Client, FetchParams::default()).await;
    cache.set_scope(EntityKind::Client, ViewScope::All);
    let outcome = cache.fetch_kind(EntityKind::Client, FetchParams::default()).await;

    assert!(!outcome.is_cache_hit());
    assert_eq!(
      cache.gateway().list_scopes(EntityKind::Client),
      vec![Some(ViewScope::My), Some(ViewScope::All)]
    );
  }

  #[tokio::test]
  async fn test_unscoped_kind_is_not_forced_by_scope() {
    let gateway = FakeGateway::new().with_collection(
      EntityKind::Group,
      None,
      vec![json!({ "id": "g1", "name": "Litigation" })],
    );
    let cache = cache_with(gateway);

    cache.fetch_kind(EntityKind::Group, FetchParams::scoped(ViewScope::My)).await;
    let second = cache
      .fetch_kind(EntityKind::Group, FetchParams::scoped(ViewScope::All))
      .await;

    assert!(second.is_cache_hit());
    assert_eq!(cache.gateway().list_scopes(EntityKind::Group), vec![None]);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_stale_records() {
    let gateway =
      FakeGateway::new().with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters());
    let cache = cache_with(gateway);

    cache.fetch::<Matter>(FetchParams::default()).await;
    let fetched_at = cache.last_fetched_at(EntityKind::Matter);
    cache.gateway().set_failing(true);

    let outcome = cache.fetch::<Matter>(FetchParams::forced()).await;

    assert!(matches!(outcome, FetchOutcome::Failed { .. }));
    assert_eq!(cache.records::<Matter>().len(), 3);
    assert_eq!(cache.last_fetched_at(EntityKind::Matter), fetched_at);
    assert!(cache.last_error(EntityKind::Matter).is_some());
    assert!(!cache.is_loading(EntityKind::Matter));
  }

  #[tokio::test]
  async fn test_success_clears_last_error() {
    let gateway = FakeGateway::new();
    gateway.set_failing(true);
    let cache = cache_with(gateway);

    cache.fetch::<Client>(FetchParams::default()).await;
    assert!(cache.last_error(EntityKind::Client).is_some());
    assert!(cache.last_fetched_at(EntityKind::Client).is_none());

    cache.gateway().set_failing(false);
    let outcome = cache.fetch::<Client>(FetchParams::default()).await;

    assert_eq!(outcome, FetchOutcome::Refreshed { count: 0 });
    assert!(cache.last_error(EntityKind::Client).is_none());
  }

  #[tokio::test]
  async fn test_empty_result_is_fresh_by_default() {
    let cache = cache_with(FakeGateway::new());

    cache.fetch_kind(EntityKind::ApiKey, FetchParams::default()).await;
    let second = cache.fetch_kind(EntityKind::ApiKey, FetchParams::default()).await;

    assert!(second.is_cache_hit());
    assert_eq!(cache.gateway().list_calls(EntityKind::ApiKey), 1);
  }

  #[tokio::test]
  async fn test_empty_result_is_stale_when_configured() {
    let cache = EntityCache::new(
      FakeGateway::new(),
      CacheSettings::default().with_empty_is_stale(true),
    );

    cache.fetch_kind(EntityKind::ApiKey, FetchParams::default()).await;
    let second = cache.fetch_kind(EntityKind::ApiKey, FetchParams::default()).await;

    assert!(!second.is_cache_hit());
    assert_eq!(cache.gateway().list_calls(EntityKind::ApiKey), 2);
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_call() {
    let gateway = FakeGateway::new()
      .with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters())
      .with_latency(std::time::Duration::from_millis(20));
    let cache = cache_with(gateway);

    let (a, b) = tokio::join!(
      cache.fetch::<Matter>(FetchParams::default()),
      cache.fetch::<Matter>(FetchParams::default())
    );

    assert_eq!(a, FetchOutcome::Refreshed { count: 3 });
    assert_eq!(b, FetchOutcome::CacheHit);
    assert_eq!(cache.gateway().list_calls(EntityKind::Matter), 1);
  }

  #[tokio::test]
  async fn test_many_concurrent_fetches_coalesce() {
    let gateway = FakeGateway::new()
      .with_collection(EntityKind::Client, Some(ViewScope::My), vec![json!({ "id": "c1" })])
      .with_latency(std::time::Duration::from_millis(20));
    let cache = cache_with(gateway);

    let outcomes = futures::future::join_all(
      (0..5).map(|_| cache.fetch::<Client>(FetchParams::default())),
    )
    .await;

    let hits = outcomes.iter().filter(|o| o.is_cache_hit()).count();
    assert_eq!(hits, 4);
    assert_eq!(cache.gateway().list_calls(EntityKind::Client), 1);
  }

  #[tokio::test]
  async fn test_loading_flag_during_fetch() {
    let gateway = FakeGateway::new().with_latency(std::time::Duration::from_millis(50));
    let cache = cache_with(gateway);

    let background = cache.clone();
    let handle = tokio::spawn(async move {
      background
        .fetch_kind(EntityKind::Event, FetchParams::default())
        .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert!(cache.is_loading(EntityKind::Event));

    handle.await.unwrap();
    assert!(!cache.is_loading(EntityKind::Event));
  }

  #[tokio::test]
  async fn test_clear_all_forces_next_fetch() {
    let gateway =
      FakeGateway::new().with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters());
    let cache = cache_with(gateway);

    cache.fetch::<Matter>(FetchParams::default()).await;
    cache.set_scope(EntityKind::Matter, ViewScope::All);
    cache.clear_all();

    assert!(cache.records::<Matter>().is_empty());
    assert!(cache.last_fetched_at(EntityKind::Matter).is_none());
    assert_eq!(cache.scope(EntityKind::Matter), Some(ViewScope::My));

    let outcome = cache.fetch::<Matter>(FetchParams::default()).await;
    assert_eq!(outcome, FetchOutcome::Refreshed { count: 3 });
    assert_eq!(cache.gateway().list_calls(EntityKind::Matter), 2);
  }

  #[tokio::test]
  async fn test_fetch_in_flight_across_clear_all_is_discarded() {
    let gateway = FakeGateway::new()
      .with_collection(EntityKind::Matter, Some(ViewScope::My), three_matters())
      .with_latency(std::time::Duration::from_millis(50));
    let cache = cache_with(gateway);

    let background = cache.clone();
    let handle =
      tokio::spawn(async move { background.fetch::<Matter>(FetchParams::default()).await });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    cache.clear_all();
    assert_eq!(handle.await.unwrap(), FetchOutcome::Discarded);

    assert!(cache.records::<Matter>().is_empty());
    assert!(cache.last_fetched_at(EntityKind::Matter).is_none());
  }

  #[tokio::test]
  async fn test_numeric_ids_survive_typed_reads() {
    let gateway = FakeGateway::new().with_collection(
      EntityKind::Group,
      None,
      vec![json!({ "id": 7, "name": "Litigation" })],
    );
    let cache = cache_with(gateway);

    cache.fetch::<Group>(FetchParams::default()).await;

    let groups = cache.records::<Group>();
    assert_eq!(cache.raw_records(EntityKind::Group).len(), 1);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, "7");
  }

  #[tokio::test]
  async fn test_subscribers_see_changes() {
    let cache = cache_with(FakeGateway::new());
    let mut rx = cache.subscribe();
    let before = *rx.borrow_and_update();

    cache.fetch_kind(EntityKind::Group, FetchParams::default()).await;

    assert!(rx.has_changed().unwrap());
    assert!(*rx.borrow() > before);
  }
}
