mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod summary;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::{ApiClient, ViewScope};
use cache::EntityCache;

#[derive(Parser, Debug)]
#[command(name = "caseload")]
#[command(about = "A terminal console for a practice-management record API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/caseload/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Initial view scope for clients, matters and invoices (my or all)
  #[arg(short, long)]
  scope: Option<ViewScope>,

  /// Record API base URL, overriding the config file
  #[arg(short, long)]
  url: Option<String>,
}

/// Log to a daily file; the terminal belongs to the UI.
/// Use RUST_LOG to control the level (e.g., RUST_LOG=caseload=debug).
fn init_tracing() -> Result<WorkerGuard> {
  let log_dir = config::Config::log_dir()?;
  std::fs::create_dir_all(&log_dir)?;

  let appender = tracing_appender::rolling::daily(log_dir, "caseload.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("caseload=info"));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .with(filter)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = init_tracing()?;

  // Load configuration, then apply command line overrides
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(scope) = args.scope {
    config.default_scope = scope;
  }
  if let Some(url) = args.url {
    config.api.url = url;
  }
  info!(url = %config.api.url, scope = %config.default_scope, "caseload starting");

  let client = ApiClient::new(&config.api, config::Config::get_api_token())?;
  let cache = EntityCache::new(client, config.cache_settings()?);

  let mut app = app::App::new(config, cache);
  app.run().await?;

  Ok(())
}
