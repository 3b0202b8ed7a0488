//! # Command Line Interface
//!
//! `serve` runs the gateway. The remaining commands are operator tooling that
//! talks to the database directly: migrations, tenants and credentials.

pub mod admin;

use crate::config::DatabaseConfig;
use crate::storage::{create_pool, list_applied_migrations, run_migrations, validate_migrations};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "keyrelay")]
#[command(about = "Multi-tenant credential gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL override
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Enable verbose logging for operator commands
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve,

    /// Apply pending migrations
    Migrate {
        /// List applied migrations instead of running them
        #[arg(long)]
        list: bool,
    },

    /// Tenant administration
    Tenant {
        #[command(subcommand)]
        command: admin::TenantCommands,
    },

    /// API key administration
    ApiKey {
        #[command(subcommand)]
        command: admin::ApiKeyCommands,
    },

    /// Bearer token issuance
    Token {
        #[command(subcommand)]
        command: admin::TokenCommands,
    },
}

/// Database settings from the environment with the CLI override applied
pub fn database_config(cli_override: Option<String>) -> anyhow::Result<DatabaseConfig> {
    let mut database = DatabaseConfig::from_env()?;
    if let Some(url) = cli_override {
        database.url = url;
    }
    Ok(database)
}

/// Run an operator command. `serve` is handled by the binary.
pub async fn run_command(
    command: Commands,
    database_url: Option<String>,
    verbose: bool,
) -> anyhow::Result<()> {
    initialise_logging(verbose);
    let database = database_config(database_url)?;

    match command {
        Commands::Serve => anyhow::bail!("serve is not an operator command"),
        Commands::Migrate { list } => handle_migrate(list, &database).await?,
        Commands::Tenant { command } => admin::handle_tenant_command(command, &database).await?,
        Commands::ApiKey { command } => admin::handle_api_key_command(command, &database).await?,
        Commands::Token { command } => admin::handle_token_command(command, &database).await?,
    }

    Ok(())
}

fn initialise_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Already installed elsewhere, e.g. in tests
    let _ = tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_env_filter(filter).with_writer(std::io::stderr).finish(),
    );
}

async fn handle_migrate(list: bool, database: &DatabaseConfig) -> anyhow::Result<()> {
    let pool = create_pool(&DatabaseConfig { auto_migrate: false, ..database.clone() }).await?;

    if list {
        let migrations = list_applied_migrations(&pool).await?;
        if migrations.is_empty() {
            println!("No migrations have been applied");
        } else {
            println!("{:<8} {:<32} {:<26} {:>8}", "Version", "Name", "Installed", "Time(ms)");
            for m in migrations {
                println!(
                    "{:<8} {:<32} {:<26} {:>8}",
                    m.version,
                    m.description,
                    m.installed_on.format("%Y-%m-%d %H:%M:%S UTC"),
                    m.execution_time
                );
            }
        }
        return Ok(());
    }

    run_migrations(&pool).await?;
    if validate_migrations(&pool).await? {
        println!("Database schema is up to date");
    } else {
        anyhow::bail!("Database schema still has pending migrations");
    }
    Ok(())
}
