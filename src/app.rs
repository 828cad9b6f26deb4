use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::types::{Agent, Product, Workflow};
use crate::api::{ApiService, Session};
use crate::cache::QueryCache;
use crate::commands::Command;
use crate::config::Config;
use crate::query::QueryApi;
use crate::refetch::Refetcher;
use crate::services::{AgentService, AuthService, ListParams, ProductService, WorkflowService};

/// Wires configuration, the HTTP wrapper, the query cache and the services.
pub struct App {
  config: Config,
  auth: AuthService,
  agents: AgentService,
  workflows: WorkflowService,
  products: ProductService,
  refetcher: Refetcher,
}

impl App {
  /// Build the client stack. Must be called inside the tokio runtime.
  pub fn new(config: Config) -> Result<Self> {
    let session = Session::new();
    if let Ok(token) = std::env::var("AGENTDASH_TOKEN") {
      session.set_token(token);
    }

    let http = ApiService::new(&config.api, session.clone())
      .map_err(|e| eyre!("Failed to create API client: {}", e))?;
    debug!(
      api = %config.api.base_url,
      socket = ?config.api.socket_url,
      oauth_client = ?config.api.oauth_client_id,
      "client configured"
    );
    let cache = QueryCache::new(config.cache.keep_unused_for());
    let api = QueryApi::new(Arc::new(http), cache);

    let refetcher =
      Refetcher::new(&api).map_err(|e| eyre!("Failed to register refetch handles: {}", e))?;

    Ok(Self {
      auth: AuthService::new(api.clone(), session),
      agents: AgentService::new(api.clone()),
      workflows: WorkflowService::new(api.clone()),
      products: ProductService::new(api),
      refetcher,
      config,
    })
  }

  /// Sign in with the configured account and refresh everything.
  pub async fn sign_in(&self) -> Result<()> {
    let email = self.config.get_email()?;
    let password = Config::get_password()?;

    self
      .auth
      .login(&email, &password)
      .await
      .map_err(|e| eyre!("Sign-in failed: {}", e))?;

    let failed = self
      .refetcher
      .refetch_all()
      .await
      .into_iter()
      .filter(|outcome| !outcome.is_ok())
      .count();
    if failed > 0 {
      warn!(failed, "some lists could not be refreshed after sign-in");
    }
    Ok(())
  }

  pub async fn run(&self, command: &Command) -> Result<()> {
    info!(command = command.name, "running command");

    match command.name {
      "agents" => {
        let agents = self.agents.list(ListParams::default()).await?;
        print_agents(&agents);
      }
      "workflows" => {
        let workflows = self.workflows.list(ListParams::default()).await?;
        print_workflows(&workflows);
      }
      "products" => {
        let products = self.products.list(ListParams::default()).await?;
        print_products(&products);
      }
      "me" => {
        let user = self.auth.current_user().await?;
        println!(
          "{} <{}>{}",
          user.name.as_deref().unwrap_or("-"),
          user.email,
          user
            .organization
            .as_deref()
            .map(|org| format!(" @ {}", org))
            .unwrap_or_default()
        );
      }
      "refresh" => {
        for outcome in self.refetcher.refetch_all().await {
          match outcome.result {
            Ok(()) => println!("{:<13} ok", outcome.name),
            Err(e) => println!("{:<13} failed: {}", outcome.name, e),
          }
        }
      }
      other => return Err(eyre!("Unknown command: {}", other)),
    }

    Ok(())
  }
}

fn print_agents(agents: &[Agent]) {
  if agents.is_empty() {
    println!("No agents.");
    return;
  }
  for agent in agents {
    println!(
      "{:<12} {:<28} {}",
      agent.id,
      agent.name,
      agent.status.as_deref().unwrap_or("-")
    );
  }
}

fn print_workflows(workflows: &[Workflow]) {
  if workflows.is_empty() {
    println!("No workflows.");
    return;
  }
  for workflow in workflows {
    println!(
      "{:<12} {:<28} {} agent(s)",
      workflow.id,
      workflow.name,
      workflow.agents.len()
    );
  }
}

fn print_products(products: &[Product]) {
  if products.is_empty() {
    println!("No products.");
    return;
  }
  for product in products {
    let price = product
      .price
      .map(|p| format!("{:.2}", p))
      .unwrap_or_else(|| "-".to_string());
    println!("{:<12} {:<28} {}", product.id, product.name, price);
  }
}
