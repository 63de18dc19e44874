//! register-webhook subcommand
//!
//! Subscribes the running webhook server to task changes in an Asana
//! project. Asana performs the `X-Hook-Secret` handshake against the target
//! URL while the webhook is being created, so the server must be reachable
//! before this runs.

use anyhow::{Context, Result, bail};
use clap::Args;
use std::io::BufRead;

use crate::client::{AsanaClient, Webhook};
use crate::config::Config;

/// Arguments for the register-webhook subcommand
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Public URL of the webhook endpoint (falls back to WEBHOOK_URL)
    #[arg(long, value_name = "URL")]
    pub target_url: Option<String>,

    /// Project gid to watch
    ///
    /// Defaults to the first project of the first workspace visible to the
    /// access token.
    #[arg(long, value_name = "GID")]
    pub resource: Option<String>,

    /// Do not wait for confirmation before creating the webhook
    #[arg(short, long)]
    pub yes: bool,
}

impl RegisterArgs {
    /// Target URL from the flag or the `WEBHOOK_URL` environment variable.
    pub fn resolve_target_url(&self) -> Result<String> {
        let url = self
            .target_url
            .clone()
            .or_else(|| std::env::var("WEBHOOK_URL").ok())
            .filter(|u| !u.trim().is_empty());
        match url {
            Some(url) => Ok(url),
            None => bail!("Please set WEBHOOK_URL in environment variables or pass --target-url"),
        }
    }
}

/// Pick the resource to watch, discovering one if none was given.
async fn resolve_resource(client: &AsanaClient, args: &RegisterArgs) -> Result<String> {
    if let Some(ref resource) = args.resource {
        return Ok(resource.clone());
    }

    let workspaces = client.list_workspaces().await?;
    let workspace = workspaces.first().context("No workspaces found")?;
    eprintln!("Found workspace ID: {}", workspace.gid);

    let projects = client.list_projects(&workspace.gid).await?;
    let project = projects.first().context("No projects found")?;
    eprintln!("Found project ID: {}", project.gid);

    Ok(project.gid.clone())
}

/// Run the register-webhook command.
pub async fn run_register(config: &Config, args: &RegisterArgs) -> Result<Webhook> {
    let target_url = args.resolve_target_url()?;
    let client = AsanaClient::new(&config.asana)?;
    let resource = resolve_resource(&client, args).await?;

    eprintln!("Setting up webhook for URL: {}", target_url);
    if !args.yes {
        eprintln!("Please ensure your server is running before proceeding.");
        eprintln!("Press Enter to continue...");
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
    }

    let webhook = client
        .create_webhook(&resource, &target_url)
        .await
        .context("Error creating webhook")?;

    println!("Webhook setup complete!");
    println!("Webhook ID: {}", webhook.gid);
    println!("Monitoring resource: {}", webhook.resource.gid);
    println!("Target URL: {}", webhook.target);

    Ok(webhook)
}
