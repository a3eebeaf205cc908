use std::sync::Arc;

use clap::Parser;
use recap_core::{
    EmailSource, MemorySummaryStore, PgSummaryStore, RecapConfig, RecapError, SummaryStore,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use recap_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "recap.toml")]
    config: String,

    /// Check the selected store (Postgres or in-memory) and exit
    #[arg(long)]
    health: bool,

    /// Keep summaries in process memory instead of Postgres
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match RecapConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging — RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store: Arc<dyn SummaryStore> = if args.in_memory {
        if !args.health {
            tracing::warn!("Running with in-memory store — summaries are lost on exit");
        }
        Arc::new(MemorySummaryStore::new())
    } else {
        let pool = match recap_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        if !args.health {
            recap_core::db::run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");
        }
        Arc::new(PgSummaryStore::new(pool))
    };

    if args.health {
        match check_health(store.as_ref()).await {
            Ok(report) => println!("{}", report),
            Err(e) => {
                println!("❌ {} store health check failed: {}", store.name(), e);
                std::process::exit(1);
            }
        }
        println!("✅ Recap health check passed");
        return Ok(());
    }

    let emails: Arc<dyn EmailSource> = Arc::from(recap_core::create_source(&config.upstream)?);

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = HttpState {
        store,
        emails,
        config,
    };
    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}

/// Ask the selected store for its status, for `--health`.
async fn check_health(store: &dyn SummaryStore) -> Result<String, RecapError> {
    let info = store.health().await?;
    Ok(format!("✅ {} store reachable: {}", store.name(), info))
}
