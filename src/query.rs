//! Typed query and mutation endpoints on top of the query cache.
//!
//! Inspired by RTK Query: each endpoint describes how to build its request and
//! which tags it provides (queries) or invalidates (mutations). Consumers hold a
//! [`QuerySubscription`] for as long as they display the data.
//!
//! # Example
//!
//! ```ignore
//! let agents = api.query::<ListAgents>((), QueryOptions::default())?;
//!
//! // Wait for the first result (shared with every other subscriber)
//! let list = agents.result().await?;
//!
//! // After creating an agent, every mounted agents query refetches
//! api.mutate::<CreateAgent>(new_agent).await?;
//! ```

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

use crate::api::{ApiError, ApiResult, RequestDescriptor, Transport};
use crate::cache::{CacheKey, Fetcher, QueryCache, Subscription, Tag};

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query has not been started (or was skipped)
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Convert the success value; a failed conversion becomes an error state.
  pub fn try_map<U>(self, f: impl FnOnce(T) -> ApiResult<U>) -> QueryState<U> {
    match self {
      QueryState::Idle => QueryState::Idle,
      QueryState::Loading => QueryState::Loading,
      QueryState::Success(data) => match f(data) {
        Ok(mapped) => QueryState::Success(mapped),
        Err(e) => QueryState::Error(e),
      },
      QueryState::Error(e) => QueryState::Error(e),
    }
  }
}

/// Per-subscription options.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
  /// Never fetch on subscribe; only an explicit `refetch()` hits the network
  pub skip: bool,
}

impl QueryOptions {
  pub fn skip() -> Self {
    Self { skip: true }
  }
}

/// A cached read endpoint.
pub trait QueryEndpoint {
  /// Endpoint name, part of the cache key
  const NAME: &'static str;
  type Arg: Serialize;
  type Output: DeserializeOwned;

  fn request(arg: &Self::Arg) -> ApiResult<RequestDescriptor>;

  fn provides_tags(arg: &Self::Arg) -> Vec<Tag>;
}

/// An uncached write endpoint.
pub trait MutationEndpoint {
  const NAME: &'static str;
  type Arg;
  type Output: DeserializeOwned;

  fn request(arg: &Self::Arg) -> ApiResult<RequestDescriptor>;

  /// Tags to invalidate once the mutation succeeded.
  fn invalidates_tags(arg: &Self::Arg) -> Vec<Tag>;
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Query/mutation front end shared by every domain service.
#[derive(Clone)]
pub struct QueryApi {
  transport: Arc<dyn Transport>,
  cache: QueryCache,
}

impl QueryApi {
  pub fn new(transport: Arc<dyn Transport>, cache: QueryCache) -> Self {
    Self { transport, cache }
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  fn fetcher(&self, request: RequestDescriptor) -> Fetcher {
    let transport = Arc::clone(&self.transport);
    Arc::new(move || {
      let transport = Arc::clone(&transport);
      let request = request.clone();
      async move { transport.execute(request).await }.boxed()
    })
  }

  /// Subscribe to `E` with `arg`.
  ///
  /// Identical arguments share one cache entry and one in-flight request.
  pub fn query<E: QueryEndpoint>(
    &self,
    arg: E::Arg,
    options: QueryOptions,
  ) -> ApiResult<QuerySubscription<E::Output>> {
    let key = CacheKey::new(E::NAME, &arg)?;
    let request = E::request(&arg)?;
    let tags = E::provides_tags(&arg);

    let inner = self
      .cache
      .subscribe(key, tags, self.fetcher(request), options.skip);
    Ok(QuerySubscription::new(inner))
  }

  /// One-shot read through the cache.
  pub async fn fetch<E: QueryEndpoint>(&self, arg: E::Arg) -> ApiResult<E::Output> {
    let subscription = self.query::<E>(arg, QueryOptions::default())?;
    subscription.result().await
  }

  /// Run a mutation. On success its tags are invalidated, even if the body
  /// cannot be decoded.
  pub async fn mutate<M: MutationEndpoint>(&self, arg: M::Arg) -> ApiResult<M::Output> {
    let request = M::request(&arg)?;
    debug!(mutation = M::NAME, method = %request.method, url = %request.url, "running mutation");

    let value = self.transport.execute(request).await?;

    let tags = M::invalidates_tags(&arg);
    if !tags.is_empty() {
      self.cache.invalidate(&tags);
    }

    decode(value)
  }

  pub fn invalidate_tags(&self, tags: &[Tag]) {
    self.cache.invalidate(tags);
  }

  /// Drop every cached result (sign-out).
  pub fn reset(&self) {
    self.cache.reset();
  }
}

/// Typed handle on a cached query. Dropping it unsubscribes.
pub struct QuerySubscription<T> {
  inner: Subscription,
  _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> QuerySubscription<T> {
  fn new(inner: Subscription) -> Self {
    Self {
      inner,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &CacheKey {
    self.inner.key()
  }

  pub fn state(&self) -> QueryState<T> {
    self.inner.current().try_map(decode)
  }

  pub fn data(&self) -> Option<T> {
    match self.state() {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.inner.current().is_loading()
  }

  pub fn error(&self) -> Option<ApiError> {
    match self.state() {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Wait for the next state change. Returns false once the cache entry is gone.
  pub async fn changed(&mut self) -> bool {
    self.inner.changed().await
  }

  /// Result of the pending request, or the cached one.
  pub async fn result(&self) -> ApiResult<T> {
    decode(self.inner.result().await?)
  }

  /// Fetch again now, regardless of staleness or `skip`.
  pub async fn refetch(&self) -> ApiResult<T> {
    decode(self.inner.refetch().await?)
  }
}

impl<T> std::fmt::Debug for QuerySubscription<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QuerySubscription")
      .field("inner", &self.inner)
      .finish()
  }
}
