//! In-memory query cache for API results.
//!
//! This module provides the storage side of the query layer:
//! - One entry per (endpoint, argument) pair, keyed by a stable hash
//! - At most one in-flight request per entry, shared by all subscribers
//! - Tag-based invalidation that refetches for mounted subscribers
//! - Eviction of entries nobody has subscribed to for a while

mod store;
mod traits;

pub use store::{FetchFuture, Fetcher, QueryCache, Subscription};
pub use traits::{CacheKey, Tag};
