//! In-memory query cache: one entry per cache key, shared in-flight requests
//! and tag-based invalidation.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::api::{ApiError, ApiResult};
use crate::query::QueryState;

use super::traits::{CacheKey, Tag};

/// Future producing the raw JSON body of one request.
pub type FetchFuture = BoxFuture<'static, ApiResult<Value>>;

/// Starts one network request for a cache entry each time it is called.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

type SharedFetch = Shared<FetchFuture>;

/// Explicit cache store. Created at startup, cleared with [`QueryCache::reset`]
/// at sign-out, and passed to whoever needs it.
///
/// Cheap to clone; clones share the same entries.
///
/// Every fetch is spawned onto the current tokio runtime, so subscribing must
/// happen inside one.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<CacheInner>,
}

struct CacheInner {
  entries: Mutex<Entries>,
  /// How long an entry outlives its last subscriber
  keep_unused_for: Duration,
}

#[derive(Default)]
struct Entries {
  map: HashMap<String, CacheEntry>,
  /// Last request sequence number handed out
  next_seq: u64,
}

struct CacheEntry {
  key: CacheKey,
  tags: Vec<Tag>,
  fetcher: Fetcher,
  state: watch::Sender<QueryState<Value>>,
  /// Data must be refetched before it is served again
  stale: bool,
  /// Invalidated while a request was in flight; fetch again once it lands
  refetch_when_settled: bool,
  subscribers: usize,
  /// Subscribers that did not ask to skip
  active: usize,
  released_at: Option<Instant>,
  in_flight: Option<InFlight>,
  /// Responses from requests numbered at or below this are ignored
  epoch: u64,
  applied_seq: u64,
}

struct InFlight {
  seq: u64,
  future: SharedFetch,
}

impl CacheEntry {
  fn new(key: CacheKey, tags: Vec<Tag>, fetcher: Fetcher, epoch: u64) -> Self {
    let (state, _) = watch::channel(QueryState::Idle);
    Self {
      key,
      tags,
      fetcher,
      state,
      stale: false,
      refetch_when_settled: false,
      subscribers: 0,
      active: 0,
      released_at: None,
      in_flight: None,
      epoch,
      applied_seq: epoch,
    }
  }

  fn needs_fetch(&self) -> bool {
    if self.in_flight.is_some() {
      return false;
    }
    self.stale || matches!(*self.state.borrow(), QueryState::Idle | QueryState::Error(_))
  }

  fn provides_any(&self, tags: &[Tag]) -> bool {
    self.tags.iter().any(|tag| tags.contains(tag))
  }

  /// Entries with a request in flight are kept until it settles.
  fn is_expired(&self, now: Instant, keep_unused_for: Duration) -> bool {
    self.subscribers == 0
      && self.in_flight.is_none()
      && self
        .released_at
        .map(|released| now.duration_since(released) >= keep_unused_for)
        .unwrap_or(false)
  }
}

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
  entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop every entry released for longer than `keep_unused_for`.
fn sweep_expired(entries: &mut Entries, keep_unused_for: Duration) -> usize {
  let now = Instant::now();
  let before = entries.map.len();
  entries
    .map
    .retain(|_, entry| !entry.is_expired(now, keep_unused_for));
  let removed = before - entries.map.len();
  if removed > 0 {
    trace!(removed, "expired entries dropped");
  }
  removed
}

/// Start a request for `hash`, record it as in flight and spawn it so it runs
/// to completion even if nobody awaits it.
fn start_fetch(inner: &Arc<CacheInner>, entries: &mut Entries, hash: &str) -> Option<SharedFetch> {
  if !entries.map.contains_key(hash) {
    return None;
  }
  entries.next_seq += 1;
  let seq = entries.next_seq;
  let entry = entries.map.get_mut(hash)?;

  let request = (entry.fetcher)();
  let weak = Arc::downgrade(inner);
  let owned_hash = hash.to_string();
  let future = async move {
    let result = request.await;
    if let Some(inner) = weak.upgrade() {
      settle(&inner, &owned_hash, seq, &result);
    }
    result
  }
  .boxed()
  .shared();

  debug!(query = %entry.key, seq, "fetching");
  entry.in_flight = Some(InFlight {
    seq,
    future: future.clone(),
  });
  entry.stale = false;
  entry.refetch_when_settled = false;
  entry.state.send_replace(QueryState::Loading);

  tokio::spawn(future.clone());
  Some(future)
}

/// Apply a finished request to its entry unless a newer result already landed.
fn settle(inner: &Arc<CacheInner>, hash: &str, seq: u64, result: &ApiResult<Value>) {
  let mut entries = lock(&inner.entries);
  let Some(entry) = entries.map.get_mut(hash) else {
    trace!(seq, "response for evicted entry dropped");
    return;
  };

  if entry.in_flight.as_ref().is_some_and(|f| f.seq == seq) {
    entry.in_flight = None;
  }

  if entry.is_expired(Instant::now(), inner.keep_unused_for) {
    debug!(query = %entry.key, seq, "released entry dropped after its request settled");
    entries.map.remove(hash);
    return;
  }

  if seq <= entry.epoch || seq < entry.applied_seq {
    debug!(query = %entry.key, seq, "discarding superseded response");
    return;
  }
  entry.applied_seq = seq;

  match result {
    Ok(value) => {
      entry.state.send_replace(QueryState::Success(value.clone()));
    }
    Err(err) => {
      debug!(query = %entry.key, seq, error = %err, "query failed");
      entry.state.send_replace(QueryState::Error(err.clone()));
    }
  }

  let refetch = entry.refetch_when_settled && entry.active > 0 && entry.in_flight.is_none();
  if refetch {
    start_fetch(inner, &mut entries, hash);
  }
}

impl QueryCache {
  pub fn new(keep_unused_for: Duration) -> Self {
    Self {
      inner: Arc::new(CacheInner {
        entries: Mutex::new(Entries::default()),
        keep_unused_for,
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Entries> {
    lock(&self.inner.entries)
  }

  /// Subscribe to the entry for `key`, creating it if needed.
  ///
  /// Unless `skip` is set, a request is started when the entry has no usable
  /// data and nothing is in flight. An in-flight request is shared, fresh data
  /// is served as is. With `skip`, no request is ever started here.
  pub fn subscribe(&self, key: CacheKey, tags: Vec<Tag>, fetcher: Fetcher, skip: bool) -> Subscription {
    let mut entries = self.lock();
    sweep_expired(&mut entries, self.inner.keep_unused_for);

    let epoch = entries.next_seq;
    let entry = entries
      .map
      .entry(key.hash.clone())
      .or_insert_with(|| CacheEntry::new(key.clone(), tags, fetcher, epoch));

    entry.subscribers += 1;
    if !skip {
      entry.active += 1;
    }
    entry.released_at = None;
    let mut rx = entry.state.subscribe();

    let should_fetch = !skip && entry.needs_fetch();
    if !skip && !should_fetch {
      if entry.in_flight.is_some() {
        // Invalidated while only skip handles were mounted
        if entry.stale {
          entry.refetch_when_settled = true;
        }
        debug!(query = %key, "joining in-flight request");
      } else {
        debug!(query = %key, "cache hit");
      }
    }

    if should_fetch {
      start_fetch(&self.inner, &mut entries, &key.hash);
    }
    rx.mark_unchanged();

    Subscription {
      cache: self.clone(),
      key,
      skip,
      rx,
    }
  }

  fn unsubscribe(&self, hash: &str, skip: bool) {
    let mut entries = self.lock();
    let released = match entries.map.get_mut(hash) {
      Some(entry) => {
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if !skip {
          entry.active = entry.active.saturating_sub(1);
        }
        entry.subscribers == 0
      }
      None => return,
    };

    if !released {
      return;
    }
    if let Some(entry) = entries.map.get_mut(hash) {
      entry.released_at = Some(Instant::now());
    }
    sweep_expired(&mut entries, self.inner.keep_unused_for);
  }

  /// Wait for the in-flight request, or return what is cached.
  async fn result(&self, key: &CacheKey) -> ApiResult<Value> {
    let pending = {
      let entries = self.lock();
      let Some(entry) = entries.map.get(&key.hash) else {
        return Err(ApiError::NotFetched(key.to_string()));
      };
      match &entry.in_flight {
        Some(in_flight) => in_flight.future.clone(),
        None => {
          return match &*entry.state.borrow() {
            QueryState::Success(value) => Ok(value.clone()),
            QueryState::Error(err) => Err(err.clone()),
            QueryState::Idle | QueryState::Loading => Err(ApiError::NotFetched(key.to_string())),
          };
        }
      }
    };
    pending.await
  }

  /// Fetch now regardless of staleness.
  ///
  /// Joins a request already in flight. If that request was started before
  /// the entry was invalidated, waits for it to land and then fetches again,
  /// so there is never more than one request per key.
  async fn refetch(&self, key: &CacheKey) -> ApiResult<Value> {
    loop {
      let (future, outdated) = {
        let mut entries = self.lock();
        let joined = entries.map.get(&key.hash).and_then(|entry| {
          entry
            .in_flight
            .as_ref()
            .map(|f| (f.future.clone(), entry.stale))
        });
        match joined {
          Some(joined) => joined,
          None => match start_fetch(&self.inner, &mut entries, &key.hash) {
            Some(future) => (future, false),
            None => return Err(ApiError::NotFetched(key.to_string())),
          },
        }
      };

      let result = future.await;
      if !outdated {
        return result;
      }
      trace!(query = %key, "in-flight request predates invalidation, fetching again");
    }
  }

  /// Mark every entry carrying one of `tags` as stale.
  ///
  /// Entries with mounted (non-skip) subscribers refetch right away; entries
  /// nobody subscribes to are evicted so the next access goes to the network.
  pub fn invalidate(&self, tags: &[Tag]) {
    let mut entries = self.lock();
    let matching: Vec<String> = entries
      .map
      .iter()
      .filter(|(_, entry)| entry.provides_any(tags))
      .map(|(hash, _)| hash.clone())
      .collect();

    for hash in matching {
      let (subscribers, active, in_flight) = match entries.map.get(&hash) {
        Some(entry) => (entry.subscribers, entry.active, entry.in_flight.is_some()),
        None => continue,
      };

      if subscribers == 0 && !in_flight {
        if let Some(entry) = entries.map.remove(&hash) {
          debug!(query = %entry.key, "evicted by invalidation");
        }
        continue;
      }

      if let Some(entry) = entries.map.get_mut(&hash) {
        entry.stale = true;
        if active > 0 && in_flight {
          entry.refetch_when_settled = true;
        }
      }

      if active > 0 && !in_flight {
        start_fetch(&self.inner, &mut entries, &hash);
      }
    }
  }

  /// Drop all cached data. Entries still subscribed to go back to `Idle`
  /// and ignore responses to requests started before the reset.
  pub fn reset(&self) {
    let mut entries = self.lock();
    let epoch = entries.next_seq;
    entries.map.retain(|_, entry| entry.subscribers > 0);
    for entry in entries.map.values_mut() {
      entry.in_flight = None;
      entry.stale = false;
      entry.refetch_when_settled = false;
      entry.epoch = epoch;
      entry.state.send_replace(QueryState::Idle);
    }
    debug!(remaining = entries.map.len(), "cache reset");
  }

  /// Evict entries that have gone unused for longer than `keep_unused_for`.
  /// Returns how many were removed.
  ///
  /// Subscribing and unsubscribing sweep as well; this is for callers that
  /// want memory back while the cache is otherwise idle.
  pub fn prune(&self) -> usize {
    let mut entries = self.lock();
    sweep_expired(&mut entries, self.inner.keep_unused_for)
  }

  /// Current state of `key`, if it is cached.
  pub fn peek(&self, key: &CacheKey) -> Option<QueryState<Value>> {
    self
      .lock()
      .map
      .get(&key.hash)
      .map(|entry| entry.state.borrow().clone())
  }

  pub fn is_stale(&self, key: &CacheKey) -> bool {
    self
      .lock()
      .map
      .get(&key.hash)
      .map(|entry| entry.stale)
      .unwrap_or(false)
  }

  pub fn len(&self) -> usize {
    self.lock().map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// A mounted consumer of one cache entry. Dropping it unsubscribes.
pub struct Subscription {
  cache: QueryCache,
  key: CacheKey,
  skip: bool,
  rx: watch::Receiver<QueryState<Value>>,
}

impl Subscription {
  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  pub fn current(&self) -> QueryState<Value> {
    self.rx.borrow().clone()
  }

  /// Wait for the next state change. Returns false once the entry is gone.
  pub async fn changed(&mut self) -> bool {
    self.rx.changed().await.is_ok()
  }

  pub async fn result(&self) -> ApiResult<Value> {
    self.cache.result(&self.key).await
  }

  pub async fn refetch(&self) -> ApiResult<Value> {
    self.cache.refetch(&self.key).await
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cache.unsubscribe(&self.key.hash, self.skip);
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("skip", &self.skip)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Fetcher returning the 1-based call number after `delay`.
  fn counting_fetcher(calls: Arc<AtomicUsize>, delay: Duration) -> Fetcher {
    Arc::new(move || {
      let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
      async move {
        tokio::time::sleep(delay).await;
        Ok(json!(n))
      }
      .boxed()
    })
  }

  fn agents_key() -> CacheKey {
    CacheKey::new("getAgents", &()).unwrap()
  }

  #[tokio::test]
  async fn test_concurrent_subscribers_share_one_request() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(20));

    let a = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    let b = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert!(a.current().is_loading());

    let (ra, rb) = tokio::join!(a.result(), b.result());
    assert_eq!(ra, Ok(json!(1)));
    assert_eq!(rb, Ok(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn test_fresh_entry_is_served_without_request() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::ZERO);

    let first = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    first.result().await.unwrap();
    drop(first);

    let second = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert_eq!(second.current(), QueryState::Success(json!(1)));
    assert_eq!(second.result().await, Ok(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_skip_fetches_only_on_refetch() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = cache.subscribe(
      agents_key(),
      vec![Tag::Agents],
      counting_fetcher(calls.clone(), Duration::ZERO),
      true,
    );
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(sub.current(), QueryState::Idle);
    assert!(matches!(sub.result().await, Err(ApiError::NotFetched(_))));

    assert_eq!(sub.refetch().await, Ok(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
      cache.peek(&agents_key()),
      Some(QueryState::Success(json!(1)))
    );
  }

  #[tokio::test]
  async fn test_invalidate_refetches_mounted_subscribers() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(5));

    let a = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    let b = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    a.result().await.unwrap();

    cache.invalidate(&[Tag::Agents]);
    assert_eq!(a.result().await, Ok(json!(2)));
    assert_eq!(b.current(), QueryState::Success(json!(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_other_tag_is_noop() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = cache.subscribe(
      agents_key(),
      vec![Tag::Agents],
      counting_fetcher(calls.clone(), Duration::ZERO),
      false,
    );
    sub.result().await.unwrap();

    cache.invalidate(&[Tag::Workflows]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cache.is_stale(&agents_key()));
  }

  #[tokio::test]
  async fn test_invalidate_while_in_flight_refetches_after() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = cache.subscribe(
      agents_key(),
      vec![Tag::Agents],
      counting_fetcher(calls.clone(), Duration::from_millis(30)),
      false,
    );
    cache.invalidate(&[Tag::Agents]);

    // Still a single request in flight
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sub.result().await, Ok(json!(1)));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(sub.current(), QueryState::Success(json!(2)));
  }

  #[tokio::test]
  async fn test_invalidate_evicts_unsubscribed_entries() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::ZERO);

    let sub = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    sub.result().await.unwrap();
    drop(sub);
    assert_eq!(cache.len(), 1);

    cache.invalidate(&[Tag::Agents]);
    assert!(cache.is_empty());

    let sub = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert_eq!(sub.result().await, Ok(json!(2)));
  }

  #[tokio::test]
  async fn test_skip_subscribers_are_marked_stale_not_refetched() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::ZERO);

    let handle = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), true);
    handle.refetch().await.unwrap();

    cache.invalidate(&[Tag::Agents]);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_stale(&agents_key()));

    // The next real subscriber bypasses the stale data
    let view = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert_eq!(view.result().await, Ok(json!(2)));
  }

  #[tokio::test]
  async fn test_unused_entries_expire() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::ZERO);

    let immediate = QueryCache::new(Duration::ZERO);
    let sub = immediate.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    sub.result().await.unwrap();
    drop(sub);
    assert!(immediate.is_empty());

    let delayed = QueryCache::new(Duration::from_millis(20));
    let sub = delayed.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    sub.result().await.unwrap();
    drop(sub);
    assert_eq!(delayed.prune(), 0);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(delayed.prune(), 1);
    assert!(delayed.is_empty());
  }

  #[tokio::test]
  async fn test_errors_are_shared_and_retried_on_next_subscribe() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher: Fetcher = Arc::new(move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          Err(ApiError::Status {
            status: 500,
            message: "boom".to_string(),
          })
        } else {
          Ok(json!("ok"))
        }
      }
      .boxed()
    });

    let a = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    let err = a.result().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(a.current().error(), Some(&err));

    let b = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert_eq!(b.result().await, Ok(json!("ok")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_slow_response_does_not_overwrite_newer_result() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher: Fetcher = Arc::new(move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          tokio::time::sleep(Duration::from_millis(60)).await;
          Ok(json!("old"))
        } else {
          Ok(json!("new"))
        }
      }
      .boxed()
    });

    let sub = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    tokio::time::sleep(Duration::from_millis(5)).await;

    cache.reset();
    assert_eq!(sub.current(), QueryState::Idle);
    assert_eq!(sub.refetch().await, Ok(json!("new")));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sub.current(), QueryState::Success(json!("new")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_reset_drops_unsubscribed_entries() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::ZERO);

    let kept = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    kept.result().await.unwrap();

    let other_key = CacheKey::new("getWorkflows", &()).unwrap();
    let gone = cache.subscribe(other_key.clone(), vec![Tag::Workflows], fetcher, false);
    gone.result().await.unwrap();
    drop(gone);

    cache.reset();
    assert_eq!(cache.len(), 1);
    assert!(cache.peek(&other_key).is_none());
    assert_eq!(kept.current(), QueryState::Idle);
  }

  #[tokio::test]
  async fn test_subscriber_sees_state_changes() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut sub = cache.subscribe(
      agents_key(),
      vec![Tag::Agents],
      counting_fetcher(calls, Duration::from_millis(10)),
      false,
    );
    assert!(sub.current().is_loading());

    assert!(sub.changed().await);
    assert_eq!(sub.current(), QueryState::Success(json!(1)));
  }

  #[tokio::test]
  async fn test_refetch_after_invalidation_waits_for_fresh_data() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(40));

    let handle = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), true);
    let other = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, true);
    let earlier = tokio::spawn(async move { other.refetch().await });
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.invalidate(&[Tag::Agents]);
    assert_eq!(handle.refetch().await, Ok(json!(2)));

    assert_eq!(earlier.await.unwrap(), Ok(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
      cache.peek(&agents_key()),
      Some(QueryState::Success(json!(2)))
    );
    assert!(!cache.is_stale(&agents_key()));
  }

  #[tokio::test]
  async fn test_remount_during_flight_joins_request() {
    let cache = QueryCache::new(Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(30));

    let first = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher.clone(), false);
    tokio::time::sleep(Duration::from_millis(5)).await;
    drop(first);
    assert_eq!(cache.len(), 1);

    let second = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert!(second.current().is_loading());
    assert_eq!(second.result().await, Ok(json!(1)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(second);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_released_entry_is_dropped_when_its_request_lands() {
    let cache = QueryCache::new(Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = cache.subscribe(
      agents_key(),
      vec![Tag::Agents],
      counting_fetcher(calls.clone(), Duration::from_millis(20)),
      false,
    );
    drop(sub);
    assert_eq!(cache.len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entries_for_other_keys_are_swept() {
    let cache = QueryCache::new(Duration::from_millis(5));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = counting_fetcher(calls.clone(), Duration::ZERO);

    for id in 0..50 {
      let key = CacheKey::new("getAgent", &id).unwrap();
      let sub = cache.subscribe(key, vec![Tag::Agents], fetcher.clone(), false);
      sub.result().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(30)).await;
    let _sub = cache.subscribe(agents_key(), vec![Tag::Agents], fetcher, false);
    assert_eq!(cache.len(), 1);
  }
}
