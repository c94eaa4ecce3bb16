//! `icfsctl` applies migrations, checks connectivity and inspects accounts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use icfs_config::util::redact_url;
use icfs_config::{Config, ConfigLoader};
use icfs_core::runtime::{self, LedgerRuntime};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "icfsctl", about = "icfs ledger operator tool")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Dotenv file read before the process environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Ignore any .env file
    #[arg(long, global = true, conflicts_with = "env_file")]
    no_env_file: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Validate configuration and connectivity
    Check,
    /// Print the effective configuration with secrets redacted
    Config,
    /// Show an account's balance
    Account {
        /// Username to look up
        username: String,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path.clone());
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path.clone());
    }
    if cli.no_env_file {
        loader = loader.without_env_file();
    }

    let load = loader.load().context("failed to load configuration")?;
    for warning in load.warnings.iter() {
        warn!("{warning}");
    }
    Ok(load.config)
}

fn print_config(config: &Config) {
    let database = config
        .database
        .url
        .as_deref()
        .map(redact_url)
        .unwrap_or_else(|| "<unset>".into());
    let sessions = config
        .redis
        .as_ref()
        .map(|redis| redact_url(&redis.url))
        .unwrap_or_else(|| "memory".into());

    println!("database:        {database}");
    println!("max_connections: {}", config.database.max_connections);
    println!("work_timeout:    {:?}", config.database.work_timeout);
    println!("sessions:        {sessions}");
    println!("session_ttl:     {:?}", config.auth.session_ttl);
    println!("{:?}", config.auth);
    if let Some(path) = &config.metadata.config_path {
        println!("config file:     {}", path.display());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Migrate => {
            let pool = runtime::connect_pool(&config)
                .await
                .context("failed to connect to Postgres")?;
            runtime::migrate(&pool).await?;
            pool.close().await;
        }
        Command::Check => {
            let runtime = LedgerRuntime::connect(&config)
                .await
                .context("failed to start ledger runtime")?;
            runtime.check().await.context("connectivity check failed")?;
            info!(
                sessions = runtime.sessions().describe(),
                "database and session store reachable"
            );
            runtime.shutdown().await;
        }
        Command::Config => print_config(&config),
        Command::Account { username } => {
            let runtime = LedgerRuntime::connect(&config)
                .await
                .context("failed to start ledger runtime")?;
            let account = runtime
                .auth()
                .get_account_by_username(&username)
                .await
                .with_context(|| format!("failed to look up {username}"))?;
            println!("id:      {}", account.id);
            println!("email:   {}", account.email);
            println!("credit:  {}", account.credit);
            println!("created: {}", account.created_at.to_rfc3339());
            runtime.shutdown().await;
        }
    }

    Ok(())
}
