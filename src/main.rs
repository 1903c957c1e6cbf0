use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_core::adapters::{
    PostgresAccountDirectory, PostgresInvoiceRepository, PostgresProductCatalog,
};
use storefront_core::cli::{self, Cli, Commands, DbCommands, InvoiceCommands};
use storefront_core::config::Config;
use storefront_core::gateway::XenditClient;
use storefront_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => {
            let pool = db::create_pool(&config).await?;
            db::run_migrations(&pool, Path::new("./migrations")).await
        }
        Commands::Invoice(InvoiceCommands::Show { external_id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_invoice_show(&pool, &external_id).await
        }
        Commands::Invoice(InvoiceCommands::MarkPaid { external_id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_invoice_mark_paid(&pool, &config, &external_id).await
        }
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool, Path::new("./migrations")).await?;

    let gateway = XenditClient::new(
        config.gateway_base_url.clone(),
        config.gateway_secret_key.clone(),
        config.gateway_timeout(),
    )?;
    tracing::info!("Payment gateway client initialized with URL: {}", config.gateway_base_url);

    let state = AppState::new(
        &config,
        Arc::new(PostgresInvoiceRepository::new(pool.clone())),
        Arc::new(PostgresProductCatalog::new(pool.clone())),
        Arc::new(PostgresAccountDirectory::new(pool)),
        Arc::new(gateway),
    );
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
