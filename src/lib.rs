//! Data-access client for the agent dashboard API.
//!
//! - [`api`]: request descriptors and the HTTP wrapper
//! - [`cache`]: in-memory query cache with deduplication and tag invalidation
//! - [`query`]: typed query/mutation endpoints and subscriptions
//! - [`services`]: agents, workflows, products and auth endpoints
//! - [`refetch`]: bulk refetch and invalidation after state changes

pub mod api;
pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod query;
pub mod refetch;
pub mod services;

#[cfg(test)]
mod test_support;

pub use api::{ApiError, ApiResult, ApiService, RequestDescriptor, Session};
pub use cache::{QueryCache, Tag};
pub use query::{QueryApi, QueryOptions, QueryState, QuerySubscription};
pub use refetch::{RefetchOutcome, Refetcher};
