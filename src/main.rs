use agentdash::{app, commands, config};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agentdash")]
#[command(about = "Command-line client for the agent dashboard API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/agentdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Sign in first (AGENTDASH_EMAIL / AGENTDASH_PASSWORD)
  #[arg(short, long)]
  login: bool,

  /// What to show: agents, workflows, products, me, refresh
  #[arg(default_value = "agents")]
  command: String,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Logs go to stderr so command output stays pipeable
  let (writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agentdash=warn")),
    )
    .with_writer(writer)
    .init();

  let command = commands::resolve(&args.command).ok_or_else(|| {
    let hints: Vec<&str> = commands::get_suggestions(&args.command)
      .iter()
      .map(|c| c.name)
      .collect();
    if hints.is_empty() {
      eyre!("Unknown command '{}'", args.command)
    } else {
      eyre!("Unknown command '{}'. Did you mean: {}?", args.command, hints.join(", "))
    }
  })?;

  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config)?;
  if args.login {
    app.sign_in().await?;
  }
  app.run(command).await?;

  Ok(())
}
