use serde::Serialize;
use serde_json::Value;

use crate::api::types::{NewWorkflow, Workflow, WorkflowChanges};
use crate::api::{ApiResult, RequestDescriptor};
use crate::cache::Tag;
use crate::query::{MutationEndpoint, QueryApi, QueryEndpoint, QueryOptions, QuerySubscription};

use super::ListParams;

const WORKFLOWS_PATH: &str = "/v1/workflow/";

fn workflow_path(id: &str) -> String {
  format!("{}{}/", WORKFLOWS_PATH, id)
}

pub struct ListWorkflows;

impl QueryEndpoint for ListWorkflows {
  const NAME: &'static str = "getWorkflows";
  type Arg = ListParams;
  type Output = Vec<Workflow>;

  fn request(arg: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(arg.apply(RequestDescriptor::get(WORKFLOWS_PATH)))
  }

  fn provides_tags(_arg: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Workflows]
  }
}

pub struct GetWorkflow;

impl QueryEndpoint for GetWorkflow {
  const NAME: &'static str = "getWorkflow";
  type Arg = String;
  type Output = Workflow;

  fn request(id: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(RequestDescriptor::get(workflow_path(id)))
  }

  fn provides_tags(_id: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Workflows]
  }
}

pub struct CreateWorkflow;

impl MutationEndpoint for CreateWorkflow {
  const NAME: &'static str = "createWorkflow";
  type Arg = NewWorkflow;
  type Output = Workflow;

  fn request(workflow: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::post(WORKFLOWS_PATH).json(workflow)
  }

  fn invalidates_tags(_workflow: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Workflows]
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowUpdate {
  pub id: String,
  pub changes: WorkflowChanges,
}

pub struct UpdateWorkflow;

impl MutationEndpoint for UpdateWorkflow {
  const NAME: &'static str = "updateWorkflow";
  type Arg = WorkflowUpdate;
  type Output = Workflow;

  fn request(update: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::put(workflow_path(&update.id)).json(&update.changes)
  }

  fn invalidates_tags(_update: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Workflows]
  }
}

pub struct DeleteWorkflow;

impl MutationEndpoint for DeleteWorkflow {
  const NAME: &'static str = "deleteWorkflow";
  type Arg = String;
  type Output = Value;

  fn request(id: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(RequestDescriptor::delete(workflow_path(id)))
  }

  fn invalidates_tags(_id: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Workflows]
  }
}

#[derive(Clone)]
pub struct WorkflowService {
  api: QueryApi,
}

impl WorkflowService {
  pub fn new(api: QueryApi) -> Self {
    Self { api }
  }

  pub async fn list(&self, params: ListParams) -> ApiResult<Vec<Workflow>> {
    self.api.fetch::<ListWorkflows>(params).await
  }

  pub fn watch_list(
    &self,
    params: ListParams,
    options: QueryOptions,
  ) -> ApiResult<QuerySubscription<Vec<Workflow>>> {
    self.api.query::<ListWorkflows>(params, options)
  }

  pub async fn get(&self, id: &str) -> ApiResult<Workflow> {
    self.api.fetch::<GetWorkflow>(id.to_string()).await
  }

  pub async fn create(&self, workflow: NewWorkflow) -> ApiResult<Workflow> {
    self.api.mutate::<CreateWorkflow>(workflow).await
  }

  pub async fn update(&self, id: &str, changes: WorkflowChanges) -> ApiResult<Workflow> {
    self
      .api
      .mutate::<UpdateWorkflow>(WorkflowUpdate {
        id: id.to_string(),
        changes,
      })
      .await
  }

  pub async fn delete(&self, id: &str) -> ApiResult<()> {
    self.api.mutate::<DeleteWorkflow>(id.to_string()).await?;
    Ok(())
  }
}
