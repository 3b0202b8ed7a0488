use clap::Parser;
use keyrelay::{
    api::{start_api_server, ApiState},
    cli::{database_config, run_command, Cli, Commands},
    forwarding::TargetTable,
    observability::{init_observability, log_config_info},
    storage::create_pool,
    AppConfig, APP_NAME, VERSION,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; a malformed one is worth a warning
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(cli.database_url).await,
        command => run_command(command, cli.database_url, cli.verbose).await,
    }
}

async fn serve(database_url: Option<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;
    config.database = database_config(database_url)?;
    config.validate()?;

    init_observability(&config.observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting keyrelay gateway");
    log_config_info(&config);

    if config.auth.admin_token.is_none() {
        info!("KEYRELAY_ADMIN_TOKEN not set; admin endpoints will reject every request");
    }

    let pool = create_pool(&config.database).await?;
    let state = ApiState::new(pool, config, TargetTable::default())?;

    start_api_server(state).await?;
    Ok(())
}
