//! Normalized errors for API calls.

use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error returned by the HTTP wrapper and everything built on it.
///
/// `Clone` so one in-flight request can hand the same failure to every
/// subscriber waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// The request never produced a response (connection refused, timeout, ...)
  #[error("network error: {0}")]
  Transport(String),

  /// The server answered with a non-2xx status
  #[error("request failed with status {status}: {message}")]
  Status { status: u16, message: String },

  /// A 2xx response whose body could not be decoded
  #[error("invalid response body: {0}")]
  Decode(String),

  /// The request could not be built (bad URL, unserializable body)
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// Result requested from a query that has never been fetched (skipped)
  #[error("query {0} has not been fetched")]
  NotFetched(String),
}

impl ApiError {
  /// HTTP status code, if the server responded.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_transport(&self) -> bool {
    matches!(self, ApiError::Transport(_))
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self.status(), Some(401) | Some(403))
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_builder() {
      ApiError::InvalidRequest(err.to_string())
    } else if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Transport(err.to_string())
    }
  }
}
