//! Scripted transport for exercising the query layer without a server.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{ApiError, ApiResult, Method, RequestDescriptor, Transport};

#[derive(Default)]
pub struct FakeTransport {
  routes: Mutex<HashMap<(Method, String), ApiResult<Value>>>,
  requests: Mutex<Vec<RequestDescriptor>>,
  delay: Duration,
}

impl FakeTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay every response, so concurrent subscribers overlap.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn respond(&self, method: Method, url: &str, result: ApiResult<Value>) {
    self
      .routes
      .lock()
      .unwrap()
      .insert((method, url.to_string()), result);
  }

  /// Number of requests received for `method` and `url`.
  pub fn calls(&self, method: Method, url: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|req| req.method == method && req.url == url)
      .count()
  }

  pub fn requests(&self) -> Vec<RequestDescriptor> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for FakeTransport {
  async fn execute(&self, request: RequestDescriptor) -> ApiResult<Value> {
    self.requests.lock().unwrap().push(request.clone());
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    self
      .routes
      .lock()
      .unwrap()
      .get(&(request.method, request.url.clone()))
      .cloned()
      .unwrap_or_else(|| {
        Err(ApiError::Status {
          status: 404,
          message: format!("no route for {} {}", request.method, request.url),
        })
      })
  }
}
