use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;

use super::error::{ApiError, ApiResult};
use super::request::RequestDescriptor;
use super::session::Session;

/// Executes request descriptors. The query cache only talks to this trait.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Issue exactly one request and return the parsed JSON body.
  async fn execute(&self, request: RequestDescriptor) -> ApiResult<Value>;
}

/// HTTP wrapper around the dashboard REST API.
///
/// One network call per invocation. No retries, no caching; every failure
/// propagates to the caller.
#[derive(Clone)]
pub struct ApiService {
  http: reqwest::Client,
  base_url: Url,
  session: Session,
}

impl ApiService {
  pub fn new(config: &ApiConfig, session: Session) -> ApiResult<Self> {
    let base_url = parse_base_url(&config.base_url)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url,
      session,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Issue a request and decode the body into `T`.
  pub async fn request_json<T: DeserializeOwned>(&self, request: RequestDescriptor) -> ApiResult<T> {
    let value = self.request(request).await?;
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
  }

  /// Issue a request and return the JSON body (`null` for empty bodies).
  pub async fn request(&self, request: RequestDescriptor) -> ApiResult<Value> {
    let url = resolve_url(&self.base_url, &request)?;
    let method = request.method;

    let mut builder = self.http.request(method.into(), url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if !request.has_header("authorization") {
      if let Some(token) = self.session.token() {
        builder = builder.bearer_auth(token);
      }
    }
    if let Some(body) = &request.data {
      builder = builder.json(body);
    }

    debug!(%method, %url, "sending request");

    let response = builder.send().await.map_err(|e| {
      warn!(%method, %url, error = %e, "request did not complete");
      ApiError::from(e)
    })?;

    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
      let message = error_message(&body, status);
      warn!(%method, %url, status = status.as_u16(), %message, "request rejected");
      return Err(ApiError::Status {
        status: status.as_u16(),
        message,
      });
    }

    if body.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Null);
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
  }
}

#[async_trait]
impl Transport for ApiService {
  async fn execute(&self, request: RequestDescriptor) -> ApiResult<Value> {
    self.request(request).await
  }
}

/// Parse the configured base URL, making sure relative paths join below it.
fn parse_base_url(raw: &str) -> ApiResult<Url> {
  let mut raw = raw.trim().to_string();
  if !raw.ends_with('/') {
    raw.push('/');
  }
  Url::parse(&raw).map_err(|e| ApiError::InvalidRequest(format!("Invalid base URL '{}': {}", raw, e)))
}

/// Build the final URL: join relative paths onto the base and append params.
fn resolve_url(base: &Url, request: &RequestDescriptor) -> ApiResult<Url> {
  let target = &request.url;
  let mut url = if target.starts_with("http://") || target.starts_with("https://") {
    Url::parse(target)
  } else {
    base.join(target.trim_start_matches('/'))
  }
  .map_err(|e| ApiError::InvalidRequest(format!("Invalid URL '{}': {}", target, e)))?;

  if !request.params.is_empty() {
    let mut pairs = url.query_pairs_mut();
    for (key, value) in &request.params {
      pairs.append_pair(key, value);
    }
  }

  Ok(url)
}

/// Pull a human-readable message out of an error response.
fn error_message(body: &[u8], status: StatusCode) -> String {
  if let Ok(value) = serde_json::from_slice::<Value>(body) {
    for field in ["message", "detail", "error"] {
      if let Some(message) = value.get(field).and_then(Value::as_str) {
        return message.to_string();
      }
    }
  }

  let text = String::from_utf8_lossy(body).trim().to_string();
  if !text.is_empty() {
    return text;
  }

  status
    .canonical_reason()
    .unwrap_or("unknown error")
    .to_string()
}
