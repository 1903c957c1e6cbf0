use clap::{Parser, Subcommand};
use sqlx::PgPool;
use std::sync::Arc;

use crate::adapters::PostgresInvoiceRepository;
use crate::config::Config;
use crate::domain::InvoiceView;
use crate::use_cases::{CallbackPayload, InvoiceQueries, PaymentCallbackHandler};

#[derive(Parser)]
#[command(name = "storefront-core")]
#[command(about = "Storefront Core - invoice checkout and payment reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Invoice inspection and manual reconciliation
    #[command(subcommand)]
    Invoice(InvoiceCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// Print an invoice as JSON
    Show {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,
    },

    /// Mark an invoice paid, for payments confirmed outside the callback
    MarkPaid {
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,
    },
}

pub async fn handle_invoice_show(pool: &PgPool, external_id: &str) -> anyhow::Result<()> {
    let queries = InvoiceQueries::new(Arc::new(PostgresInvoiceRepository::new(pool.clone())));
    let invoice = queries.find_by_external_id(external_id).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&InvoiceView::at(invoice, chrono::Utc::now()))?
    );
    Ok(())
}

pub async fn handle_invoice_mark_paid(
    pool: &PgPool,
    config: &Config,
    external_id: &str,
) -> anyhow::Result<()> {
    let handler = PaymentCallbackHandler::new(
        Arc::new(PostgresInvoiceRepository::new(pool.clone())),
        config.callback_token.clone(),
    );

    let invoice = handler
        .apply(&CallbackPayload {
            external_id: external_id.to_string(),
            status: "PAID".to_string(),
        })
        .await?;

    tracing::info!(external_id = %external_id, "invoice marked paid from the command line");
    println!("✅ Invoice {} is paid", invoice.invoice.external_id);
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    println!("\n=== Configuration Report ===");
    println!("Server port:        {}", config.server_port);
    println!("Gateway base URL:   {}", config.gateway_base_url);
    println!("Gateway timeout:    {}s", config.gateway_timeout_secs);
    println!("Pool size:          {}", config.database_max_connections);

    let database_ok = match crate::db::create_pool(config).await {
        Ok(pool) => sqlx::query("SELECT 1").execute(&pool).await.is_ok(),
        Err(e) => {
            println!("  ❌ {}", e);
            false
        }
    };
    println!(
        "Database:           {}",
        if database_ok { "✅ OK" } else { "❌ FAIL" }
    );
    println!("============================\n");

    if !database_ok {
        anyhow::bail!("database is unreachable");
    }
    Ok(())
}
