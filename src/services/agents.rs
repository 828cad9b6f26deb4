use serde::Serialize;
use serde_json::Value;

use crate::api::types::{Agent, AgentChanges, NewAgent};
use crate::api::{ApiResult, RequestDescriptor};
use crate::cache::Tag;
use crate::query::{MutationEndpoint, QueryApi, QueryEndpoint, QueryOptions, QuerySubscription};

use super::ListParams;

const AGENTS_PATH: &str = "/v1/agents/";

fn agent_path(id: &str) -> String {
  format!("{}{}/", AGENTS_PATH, id)
}

pub struct ListAgents;

impl QueryEndpoint for ListAgents {
  const NAME: &'static str = "getAgents";
  type Arg = ListParams;
  type Output = Vec<Agent>;

  fn request(arg: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(arg.apply(RequestDescriptor::get(AGENTS_PATH)))
  }

  fn provides_tags(_arg: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Agents]
  }
}

pub struct GetAgent;

impl QueryEndpoint for GetAgent {
  const NAME: &'static str = "getAgent";
  type Arg = String;
  type Output = Agent;

  fn request(id: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(RequestDescriptor::get(agent_path(id)))
  }

  fn provides_tags(_id: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Agents]
  }
}

pub struct CreateAgent;

impl MutationEndpoint for CreateAgent {
  const NAME: &'static str = "createAgent";
  type Arg = NewAgent;
  type Output = Agent;

  fn request(agent: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::post(AGENTS_PATH).json(agent)
  }

  fn invalidates_tags(_agent: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Agents]
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentUpdate {
  pub id: String,
  pub changes: AgentChanges,
}

pub struct UpdateAgent;

impl MutationEndpoint for UpdateAgent {
  const NAME: &'static str = "updateAgent";
  type Arg = AgentUpdate;
  type Output = Agent;

  fn request(update: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::patch(agent_path(&update.id)).json(&update.changes)
  }

  fn invalidates_tags(_update: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Agents]
  }
}

pub struct DeleteAgent;

impl MutationEndpoint for DeleteAgent {
  const NAME: &'static str = "deleteAgent";
  type Arg = String;
  type Output = Value;

  fn request(id: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(RequestDescriptor::delete(agent_path(id)))
  }

  fn invalidates_tags(_id: &Self::Arg) -> Vec<Tag> {
    // Workflows embed their agents
    vec![Tag::Agents, Tag::Workflows]
  }
}

/// Agents of the current tenant.
#[derive(Clone)]
pub struct AgentService {
  api: QueryApi,
}

impl AgentService {
  pub fn new(api: QueryApi) -> Self {
    Self { api }
  }

  pub async fn list(&self, params: ListParams) -> ApiResult<Vec<Agent>> {
    self.api.fetch::<ListAgents>(params).await
  }

  /// Keep the agents list mounted; it refetches whenever agents are invalidated.
  pub fn watch_list(
    &self,
    params: ListParams,
    options: QueryOptions,
  ) -> ApiResult<QuerySubscription<Vec<Agent>>> {
    self.api.query::<ListAgents>(params, options)
  }

  pub async fn get(&self, id: &str) -> ApiResult<Agent> {
    self.api.fetch::<GetAgent>(id.to_string()).await
  }

  pub async fn create(&self, agent: NewAgent) -> ApiResult<Agent> {
    self.api.mutate::<CreateAgent>(agent).await
  }

  pub async fn update(&self, id: &str, changes: AgentChanges) -> ApiResult<Agent> {
    self
      .api
      .mutate::<UpdateAgent>(AgentUpdate {
        id: id.to_string(),
        changes,
      })
      .await
  }

  pub async fn delete(&self, id: &str) -> ApiResult<()> {
    self.api.mutate::<DeleteAgent>(id.to_string()).await?;
    Ok(())
  }
}
