//! Cache keys and invalidation tags.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::api::{ApiError, ApiResult};

/// Label grouping cache entries for bulk invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
  Agents,
  Workflows,
  Users,
  Files,
  Conversations,
  Products,
  /// Anything that depends on who is signed in
  Session,
}

impl Tag {
  pub const ALL: &'static [Tag] = &[
    Tag::Agents,
    Tag::Workflows,
    Tag::Users,
    Tag::Files,
    Tag::Conversations,
    Tag::Products,
    Tag::Session,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Tag::Agents => "Agents",
      Tag::Workflows => "Workflows",
      Tag::Users => "Users",
      Tag::Files => "Files",
      Tag::Conversations => "Conversations",
      Tag::Products => "Products",
      Tag::Session => "Session",
    }
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Identity of a cached query: endpoint name plus its serialized argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub endpoint: &'static str,
  /// Argument serialized as JSON
  pub arg: String,
  /// SHA256 of endpoint and argument, used as the map key
  pub hash: String,
}

impl CacheKey {
  pub fn new<A: Serialize + ?Sized>(endpoint: &'static str, arg: &A) -> ApiResult<Self> {
    let arg = serde_json::to_string(arg)
      .map_err(|e| ApiError::InvalidRequest(format!("Unserializable argument for {}: {}", endpoint, e)))?;

    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update([0u8]);
    hasher.update(arg.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(Self {
      endpoint,
      arg,
      hash,
    })
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.endpoint, self.arg)
  }
}
