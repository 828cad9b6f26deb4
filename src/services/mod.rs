//! Per-domain API services, each a set of query and mutation endpoints.

pub mod agents;
pub mod auth;
pub mod products;
pub mod workflows;

use serde::Serialize;

use crate::api::RequestDescriptor;

pub use agents::AgentService;
pub use auth::AuthService;
pub use products::ProductService;
pub use workflows::WorkflowService;

/// Paging and search arguments shared by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListParams {
  pub page: Option<u32>,
  pub search: Option<String>,
}

impl ListParams {
  pub fn page(page: u32) -> Self {
    Self {
      page: Some(page),
      ..Default::default()
    }
  }

  pub fn search(term: impl Into<String>) -> Self {
    Self {
      search: Some(term.into()),
      ..Default::default()
    }
  }

  fn apply(&self, mut request: RequestDescriptor) -> RequestDescriptor {
    if let Some(page) = self.page {
      request = request.param("page", page);
    }
    if let Some(search) = &self.search {
      request = request.param("search", search);
    }
    request
  }
}
