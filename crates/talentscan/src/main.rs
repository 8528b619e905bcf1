//! `talentscan` - scan a recruiting mailbox for candidates
//!
//! Compiles filter flags into a provider search query, runs the scan on the
//! server and lists the candidates it added.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;
mod relay;

use anyhow::Result;
use clap::Parser;
use talentscan_core::ClientConfig;
use talentscan_core::config::API_URL_ENV;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, LoginCommand};
use commands::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "talentscan=info,talentscan_core=info,talentscan_auth=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            ClientConfig::load_with_override(path, std::env::var(API_URL_ENV).ok()).await?
        }
        None => ClientConfig::load().await?,
    };
    info!("Using API at {}", config.api_url);

    let app = App::new(config).await?;
    match cli.command {
        Commands::Login(LoginCommand::Google) => app.login_google().await,
        Commands::Login(LoginCommand::Imap(args)) => app.login_imap(args).await,
        Commands::Logout => app.logout().await,
        Commands::Whoami => {
            app.whoami();
            Ok(())
        }
        Commands::Scan(args) => app.scan(&args).await,
        Commands::Candidates(args) => app.candidates(&args).await,
        Commands::Reset => {
            app.reset().await;
            Ok(())
        }
    }
}
