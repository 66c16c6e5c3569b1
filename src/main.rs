use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::time::Duration;

use votesettle_backend::config::Config;
use votesettle_backend::engine::SettlementEngine;
use votesettle_backend::ledger::EthLedger;
use votesettle_backend::scheduler::ScanScheduler;
use votesettle_backend::state::AppState;
use votesettle_backend::store::{PgStore, SettlementStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let store = PgStore::new(pool);
    store.ensure_schema().await?;
    let store: Arc<dyn SettlementStore> = Arc::new(store);

    let ledger = Arc::new(EthLedger::connect(&config)?);

    let engine = Arc::new(SettlementEngine::new(
        ledger,
        store.clone(),
        config.gas_margin_pct,
    ));

    let scheduler = ScanScheduler::new(
        engine.clone(),
        Duration::from_secs(config.scan_interval_secs),
    );
    scheduler.start();

    let app = votesettle_backend::app(AppState { engine, store });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("server running on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
