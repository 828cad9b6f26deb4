//! Named refetch handles plus bulk refetch and invalidation.
//!
//! The handles are skip subscriptions: they never fetch on their own, they only
//! exist so a refetch can be triggered from anywhere (e.g. right after sign-in).

use futures::future::{join_all, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::types::{Agent, Product, User, Workflow};
use crate::api::ApiResult;
use crate::cache::Tag;
use crate::query::{QueryApi, QueryOptions, QuerySubscription};
use crate::services::agents::ListAgents;
use crate::services::auth::CurrentUser;
use crate::services::products::ListProducts;
use crate::services::workflows::ListWorkflows;
use crate::services::ListParams;

/// Outcome of one refetch inside [`Refetcher::refetch_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefetchOutcome {
  pub name: &'static str,
  pub result: ApiResult<()>,
}

impl RefetchOutcome {
  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }
}

pub struct Refetcher {
  api: QueryApi,
  agents: QuerySubscription<Vec<Agent>>,
  workflows: QuerySubscription<Vec<Workflow>>,
  products: QuerySubscription<Vec<Product>>,
  current_user: QuerySubscription<User>,
}

impl Refetcher {
  pub fn new(api: &QueryApi) -> ApiResult<Self> {
    Ok(Self {
      api: api.clone(),
      agents: api.query::<ListAgents>(ListParams::default(), QueryOptions::skip())?,
      workflows: api.query::<ListWorkflows>(ListParams::default(), QueryOptions::skip())?,
      products: api.query::<ListProducts>(ListParams::default(), QueryOptions::skip())?,
      current_user: api.query::<CurrentUser>((), QueryOptions::skip())?,
    })
  }

  /// Refetch the agents list now, regardless of staleness.
  pub async fn refetch_agents(&self) -> ApiResult<Vec<Agent>> {
    self.agents.refetch().await
  }

  pub async fn refetch_workflows(&self) -> ApiResult<Vec<Workflow>> {
    self.workflows.refetch().await
  }

  pub async fn refetch_products(&self) -> ApiResult<Vec<Product>> {
    self.products.refetch().await
  }

  pub async fn refetch_current_user(&self) -> ApiResult<User> {
    self.current_user.refetch().await
  }

  /// Run every refetch concurrently. Never fails as a whole: each entry
  /// reports its own result.
  pub async fn refetch_all(&self) -> Vec<RefetchOutcome> {
    let refetches: Vec<BoxFuture<'_, RefetchOutcome>> = vec![
      outcome("agents", &self.agents).boxed(),
      outcome("workflows", &self.workflows).boxed(),
      outcome("products", &self.products).boxed(),
      outcome("current_user", &self.current_user).boxed(),
    ];

    let outcomes = join_all(refetches).await;
    for failed in outcomes.iter().filter(|o| !o.is_ok()) {
      if let Err(e) = &failed.result {
        warn!(query = failed.name, error = %e, "refetch failed");
      }
    }
    outcomes
  }

  /// Mark everything stale; mounted queries refetch immediately.
  pub fn invalidate_all_queries(&self) {
    debug!("invalidating all queries");
    self.api.invalidate_tags(Tag::ALL);
  }
}

async fn outcome<T: DeserializeOwned>(
  name: &'static str,
  subscription: &QuerySubscription<T>,
) -> RefetchOutcome {
  RefetchOutcome {
    name,
    result: subscription.refetch().await.map(|_| ()),
  }
}
