use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use near_evm_relayer::config::{CliOverrides, Settings};
use near_evm_relayer::db::schema::{initialize_database, reset_database};

/// Creates the index schema, optionally emptying it.
#[derive(Parser)]
struct Args {
    #[command(flatten)]
    overrides: CliOverrides,

    /// Truncate every index table after creating the schema
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "near_evm_relayer=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load(&args.overrides)?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&settings.database)
        .await?;

    initialize_database(&pool).await?;
    if args.reset {
        reset_database(&pool).await?;
    }
    tracing::info!("Database initialized successfully");

    Ok(())
}
