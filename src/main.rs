use anyhow::Result;
use axum::Router;
use clap::Parser;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use near_evm_relayer::api::{self, AppState};
use near_evm_relayer::config::{parse_blacklist, validate_settings, CliOverrides, Settings};
use near_evm_relayer::db::schema::{initialize_database, reset_database};
use near_evm_relayer::db::PgStore;
use near_evm_relayer::engine::provider::default_key_path;
use near_evm_relayer::engine::{
    Engine, NearEngine, NearProvider, NearRpcClient, Provider, ReadOnlyProvider,
};
use near_evm_relayer::indexer::{BlockIndexer, RetryPolicy};
use near_evm_relayer::metrics::{self, Metrics};
use near_evm_relayer::rpc::{Dispatcher, MethodRegistry, ServerContext};

#[derive(Parser)]
#[command(version, about = "Ethereum JSON-RPC relay and block indexer for the NEAR EVM engine")]
struct Args {
    #[command(flatten)]
    overrides: CliOverrides,

    /// Reset the index before starting the sync
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();

    let default_filter = if args.overrides.debug {
        "near_evm_relayer=debug,tower_http=debug"
    } else {
        "near_evm_relayer=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load(&args.overrides).unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });
    if let Err(e) = validate_settings(&settings) {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    let network = settings.network_config()?;
    let blacklist = parse_blacklist(&settings.blacklist)?;

    info!(
        "Network {} (chain id {}), engine {} via {}",
        network.id, network.chain_id, settings.engine, settings.endpoint
    );
    if !blacklist.is_empty() {
        info!("Blacklisting {} addresses", blacklist.len());
    }

    let prometheus_handle = metrics::setup_metrics_recorder()?;
    let metrics = Metrics::new(prometheus_handle);

    info!("Prometheus metrics initialized");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&settings.database)
        .await?;

    info!("Successfully connected to database");

    initialize_database(&pool).await?;
    if args.reset {
        reset_database(&pool).await?;
        info!("Database reset successfully");
    }

    let call_timeout = Duration::from_millis(settings.indexer.call_timeout_ms);
    let rpc = NearRpcClient::new(settings.endpoint.clone(), call_timeout)?;
    let engine: Arc<dyn Engine> = Arc::new(NearEngine::new(rpc.clone(), network, settings.engine.clone()));

    match engine.latest_height().await {
        Ok(height) => info!("NEAR node reachable; final height {}", height),
        Err(e) => warn!("NEAR node not reachable yet: {}", e),
    }

    let provider: Arc<dyn Provider> = match &settings.signer {
        Some(signer) => {
            let path = settings
                .key_file
                .clone()
                .unwrap_or_else(|| default_key_path(&settings.network, signer));
            let provider = NearProvider::from_key_file(rpc, &path)?;
            if provider.account_id() != Some(signer.as_str()) {
                warn!(
                    "Key file {} belongs to {:?}, not the configured signer {}",
                    path.display(),
                    provider.account_id(),
                    signer
                );
            }
            Arc::new(provider)
        }
        None => {
            warn!("No signer configured; running in read-only mode");
            Arc::new(ReadOnlyProvider)
        }
    };

    let settings = Arc::new(settings);
    let context = ServerContext::new(settings.clone(), network, engine.clone(), provider);
    let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::standard()), context);

    let app = Router::new()
        .merge(api::create_router(AppState::new(dispatcher, blacklist)))
        .route("/metrics", axum::routing::get(move || async move {
            let metrics = metrics.render();
            (
                [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                metrics,
            )
        }));

    info!("Successfully initialized API router");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let indexer_handle = if settings.indexer.enabled {
        let indexer = BlockIndexer::new(
            engine,
            Arc::new(PgStore::new(pool.clone())),
            RetryPolicy::from(&settings.indexer),
            settings.indexer.start_height,
        );
        Some(tokio::spawn(async move { indexer.run(shutdown_rx).await }))
    } else {
        info!("Indexer disabled");
        None
    };

    let listener = TcpListener::bind(settings.listen_addr()).await?;
    info!("listening on {}", listener.local_addr()?);

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    match indexer_handle {
        Some(mut handle) => {
            let early = tokio::select! {
                served = server => {
                    served?;
                    None
                }
                finished = &mut handle => Some(finished),
            };
            let finished = match early {
                Some(finished) => finished,
                None => {
                    let _ = shutdown_tx.send(true);
                    handle.await
                }
            };
            match finished? {
                Ok(next) => info!("Indexer stopped; next height {}", next),
                Err(e) => {
                    error!("Indexer stopped with a fatal error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => server.await?,
    }

    info!("Relayer stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
