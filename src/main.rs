use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use spend_insights::advice::AdviceService;
use spend_insights::api::{router, ApiState};
use spend_insights::config::Config;
use spend_insights::db::sqlite::connect;
use spend_insights::db::{SpendingSource, SqliteSource};
use spend_insights::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = connect(&cfg.db_path).await?;
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await?;
    info!(db_path = %cfg.db_path, users, "Database ready");
    if users == 0 {
        warn!("Database has no users yet; load data with `import <credit_card_transaction.csv>`");
    }

    let source = SqliteSource::new(pool);
    source.ping().await?;

    // --- Advice ---
    let advice = AdviceService::from_config(&cfg)?;
    info!(
        model = %cfg.advice_model,
        store = %cfg.advice_store_path,
        live = cfg.advice_api_key.is_some(),
        "Advice service ready"
    );

    // --- HTTP API ---
    let app = router(ApiState::new(source, advice)?);

    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
