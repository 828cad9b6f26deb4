//! Request descriptors handed to the HTTP wrapper.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::error::{ApiError, ApiResult};

/// HTTP method of a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

/// Everything needed to issue one API call.
///
/// `url` may be relative to the configured base URL (`/v1/agents/` and
/// `v1/agents/` are equivalent) or absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
  pub url: String,
  pub method: Method,
  /// Query string pairs, appended in order
  pub params: Vec<(String, String)>,
  /// JSON request body
  pub data: Option<Value>,
  pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method,
      params: Vec::new(),
      data: None,
      headers: Vec::new(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn post(url: impl Into<String>) -> Self {
    Self::new(Method::Post, url)
  }

  pub fn put(url: impl Into<String>) -> Self {
    Self::new(Method::Put, url)
  }

  pub fn patch(url: impl Into<String>) -> Self {
    Self::new(Method::Patch, url)
  }

  pub fn delete(url: impl Into<String>) -> Self {
    Self::new(Method::Delete, url)
  }

  pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
    self.params.push((key.into(), value.to_string()));
    self
  }

  pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((key.into(), value.into()));
    self
  }

  /// Attach a JSON body. Serialization failures surface as `InvalidRequest`.
  pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
    let value =
      serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    self.data = Some(value);
    Ok(self)
  }

  /// Attach an already-built JSON body.
  pub fn body(mut self, body: Value) -> Self {
    self.data = Some(body);
    self
  }

  pub fn has_header(&self, name: &str) -> bool {
    self
      .headers
      .iter()
      .any(|(key, _)| key.eq_ignore_ascii_case(name))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_builder_keeps_param_order() {
    let req = RequestDescriptor::get("/v1/agents/")
      .param("page", 2)
      .param("search", "bot");

    assert_eq!(req.method, Method::Get);
    assert_eq!(
      req.params,
      vec![
        ("page".to_string(), "2".to_string()),
        ("search".to_string(), "bot".to_string())
      ]
    );
  }

  #[test]
  fn test_json_body() {
    #[derive(Serialize)]
    struct Login<'a> {
      email: &'a str,
    }

    let req = RequestDescriptor::post("auth/login")
      .json(&Login { email: "a@b.c" })
      .unwrap();
    assert_eq!(req.data, Some(json!({ "email": "a@b.c" })));
  }

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let req = RequestDescriptor::get("x").header("Authorization", "Bearer t");
    assert!(req.has_header("authorization"));
    assert!(!req.has_header("accept"));
  }

  #[test]
  fn test_method_conversion() {
    assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
    assert_eq!(Method::Delete.to_string(), "DELETE");
  }
}
