//! Due-date hook server
//!
//! Receives Asana task-change webhooks and keeps due dates in line with task
//! priority and stage.

use anyhow::Result;
use clap::Parser;
use due_date_hook::cli::register::run_register;
use due_date_hook::cli::{Cli, Command};
use due_date_hook::client::AsanaClient;
use due_date_hook::clock::system_clock;
use due_date_hook::config::{Config, ConfigLoader};
use due_date_hook::dispatch::Dispatcher;
use due_date_hook::ledger::DedupLedger;
use due_date_hook::logging::{self, LogTarget};
use due_date_hook::rules::RuleEngine;
use due_date_hook::server::{WebhookServer, start_server};
use std::sync::Arc;
use tracing::{debug, info};

/// Build the collaborators and serve until interrupted.
async fn run_server(config: Config) -> Result<()> {
    config.validate_for_serve()?;

    let client = AsanaClient::new(&config.asana)?;
    let clock = system_clock();
    let ledger = Arc::new(DedupLedger::new(&config.ledger, clock.clone()));
    let rules = RuleEngine::new(config.rules.clone());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(client), ledger, rules, clock));

    let (shutdown_tx, addr) = start_server(
        WebhookServer::new(dispatcher),
        &config.bind_addr(),
        &config.server.webhook_path,
    )
    .await?;
    info!(
        "Server is running on port {} (health check at /api/health)",
        addr.port()
    );

    tokio::signal::ctrl_c().await?;
    info!("Received interrupt, stopping");
    let _ = shutdown_tx.send(());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    // If explicit config path given, set it as env var for ConfigLoader to pick up
    // SAFETY: set before any task reads the environment
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("DUE_HOOK_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    if let Some(path) = loader.config_path() {
        debug!("Loaded config from {}", path.display());
    }

    let config = loader.config_mut();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    let config = loader.into_config();

    match cli.command {
        None | Some(Command::Serve) => run_server(config).await,
        Some(Command::RegisterWebhook(args)) => {
            run_register(&config, &args).await?;
            Ok(())
        }
    }
}
